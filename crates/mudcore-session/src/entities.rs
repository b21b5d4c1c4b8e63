//! Accounts, characters, and the views the lock engine sees of them.
//!
//! The router owns every account and character by id. Relations between
//! them (who puppets what, which sessions belong to whom) live in the
//! router's tables, never as pointers inside these structs.

use mudcore_lock::{
    AttrValue, ContentEntry, Entity, EntityRecord, LockSet, Permissions,
};
use mudcore_protocol::EntityId;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A persistent out-of-character identity.
#[derive(Debug, Clone)]
pub struct Account {
    pub record: EntityRecord,

    /// While set, permission checks use the lower of this account's and
    /// its puppet's tiers, and the superuser bypass is off.
    pub quelled: bool,

    /// The character most recently puppeted, for auto-puppet on login.
    pub last_puppet: Option<EntityId>,
}

impl Account {
    pub fn new(id: EntityId, key: impl Into<String>) -> Self {
        Self {
            record: EntityRecord::new(id, key),
            quelled: false,
            last_puppet: None,
        }
    }

    pub fn with_permission(mut self, perm: &str) -> Self {
        self.record.permissions.add(perm);
        self
    }

    pub fn with_locks(mut self, lockstring: &str) -> Self {
        self.record.locks = LockSet::parse(lockstring);
        self
    }
}

impl Entity for Account {
    fn id(&self) -> EntityId {
        self.record.id
    }

    fn key(&self) -> &str {
        &self.record.key
    }

    fn permissions(&self) -> &Permissions {
        &self.record.permissions
    }

    fn locks(&self) -> &LockSet {
        &self.record.locks
    }

    fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.record.attribute(name)
    }

    fn is_quelled(&self) -> bool {
        self.quelled
    }

    fn has_tag(&self, key: &str, category: Option<&str>) -> bool {
        self.record.tag_matches(key, category)
    }
}

// ---------------------------------------------------------------------------
// Character
// ---------------------------------------------------------------------------

/// A persistent in-game entity that accounts puppet.
#[derive(Debug, Clone)]
pub struct Character {
    pub record: EntityRecord,
}

impl Character {
    /// A character with no locks. Nobody can puppet it until a `puppet`
    /// lock is set.
    pub fn new(id: EntityId, key: impl Into<String>) -> Self {
        Self {
            record: EntityRecord::new(id, key),
        }
    }

    /// A character its owner (and admins) may puppet.
    pub fn owned_by(id: EntityId, key: impl Into<String>, owner: EntityId) -> Self {
        Self::new(id, key).with_locks(&format!("puppet: pid({owner}) OR perm(Admin)"))
    }

    pub fn with_permission(mut self, perm: &str) -> Self {
        self.record.permissions.add(perm);
        self
    }

    pub fn with_locks(mut self, lockstring: &str) -> Self {
        self.record.locks = LockSet::parse(lockstring);
        self
    }
}

impl Entity for Character {
    fn id(&self) -> EntityId {
        self.record.id
    }

    fn key(&self) -> &str {
        &self.record.key
    }

    fn permissions(&self) -> &Permissions {
        &self.record.permissions
    }

    fn locks(&self) -> &LockSet {
        &self.record.locks
    }

    fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.record.attribute(name)
    }

    fn has_tag(&self, key: &str, category: Option<&str>) -> bool {
        self.record.tag_matches(key, category)
    }

    fn contents(&self) -> &[ContentEntry] {
        &self.record.contents
    }

    fn location(&self) -> Option<EntityId> {
        self.record.location
    }
}

// ---------------------------------------------------------------------------
// Accessor views
// ---------------------------------------------------------------------------

/// A character as seen while an account drives it.
#[derive(Debug, Clone, Copy)]
pub struct PuppetView<'a> {
    pub character: &'a Character,
    pub account: &'a Account,
}

impl Entity for PuppetView<'_> {
    fn id(&self) -> EntityId {
        self.character.id()
    }

    fn key(&self) -> &str {
        self.character.key()
    }

    fn permissions(&self) -> &Permissions {
        self.character.permissions()
    }

    fn locks(&self) -> &LockSet {
        self.character.locks()
    }

    fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.character.attribute(name)
    }

    fn account(&self) -> Option<&dyn Entity> {
        Some(self.account)
    }

    fn is_quelled(&self) -> bool {
        self.account.quelled
    }

    fn has_tag(&self, key: &str, category: Option<&str>) -> bool {
        self.character.has_tag(key, category)
    }

    fn contents(&self) -> &[ContentEntry] {
        self.character.contents()
    }

    fn location(&self) -> Option<EntityId> {
        self.character.location()
    }
}

/// Whoever a session acts as: its puppet, or the bare account when
/// out of character.
#[derive(Debug, Clone, Copy)]
pub enum Accessor<'a> {
    Account(&'a Account),
    Puppet(PuppetView<'a>),
}

impl Accessor<'_> {
    fn entity(&self) -> &dyn Entity {
        match self {
            Self::Account(account) => *account,
            Self::Puppet(view) => view,
        }
    }
}

impl Entity for Accessor<'_> {
    fn id(&self) -> EntityId {
        self.entity().id()
    }

    fn key(&self) -> &str {
        self.entity().key()
    }

    fn permissions(&self) -> &Permissions {
        self.entity().permissions()
    }

    fn locks(&self) -> &LockSet {
        self.entity().locks()
    }

    fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.entity().attribute(name)
    }

    fn account(&self) -> Option<&dyn Entity> {
        self.entity().account()
    }

    fn is_quelled(&self) -> bool {
        self.entity().is_quelled()
    }

    fn has_tag(&self, key: &str, category: Option<&str>) -> bool {
        self.entity().has_tag(key, category)
    }

    fn contents(&self) -> &[ContentEntry] {
        self.entity().contents()
    }

    fn location(&self) -> Option<EntityId> {
        self.entity().location()
    }
}
