//! The capability interface the lock engine checks against.
//!
//! The engine never sees concrete game objects. Anything that wants to be
//! an accessor or an accessed entity implements [`Entity`]: accounts,
//! characters, rooms, or a test fixture. Only [`id`], [`key`],
//! [`permissions`] and [`locks`] are required; the rest default to
//! "nothing here", which makes the matching lock functions deny.
//!
//! [`id`]: Entity::id
//! [`key`]: Entity::key
//! [`permissions`]: Entity::permissions
//! [`locks`]: Entity::locks

use mudcore_protocol::EntityId;
use serde::{Deserialize, Serialize};

use crate::{AttrValue, Attributes, LockSet, Permissions};

/// Minimal view of a game entity.
pub trait Entity {
    /// Persistent identifier (the dbref).
    fn id(&self) -> EntityId;

    /// Display name, used when matching by name.
    fn key(&self) -> &str;

    /// Permissions held directly by this entity.
    fn permissions(&self) -> &Permissions;

    /// Locks protecting this entity.
    fn locks(&self) -> &LockSet;

    /// Attribute lookup.
    fn attribute(&self, _name: &str) -> Option<&AttrValue> {
        None
    }

    /// The account currently controlling this entity, if it is a puppet.
    ///
    /// Accounts themselves return `None`.
    fn account(&self) -> Option<&dyn Entity> {
        None
    }

    /// Whether the controlling account (or this account) is quelling.
    fn is_quelled(&self) -> bool {
        false
    }

    /// Tag membership. `category: None` matches uncategorised tags only.
    fn has_tag(&self, _key: &str, _category: Option<&str>) -> bool {
        false
    }

    /// What this entity carries.
    fn contents(&self) -> &[ContentEntry] {
        &[]
    }

    /// Where this entity is.
    fn location(&self) -> Option<EntityId> {
        None
    }
}

/// A reference to something inside another entity's inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub id: EntityId,
    pub key: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl ContentEntry {
    pub fn new(id: EntityId, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            aliases: Vec::new(),
        }
    }

    /// Matches a dbref (`#12`), the key, or an alias. Names compare
    /// case-insensitively.
    pub fn matches(&self, name_or_id: &str) -> bool {
        let needle = name_or_id.trim();
        if needle.starts_with('#') {
            return needle.parse::<EntityId>().is_ok_and(|id| id == self.id);
        }
        self.key.eq_ignore_ascii_case(needle)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(needle))
    }
}

/// A tag: a key with an optional category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl Tag {
    fn matches(&self, key: &str, category: Option<&str>) -> bool {
        self.key.eq_ignore_ascii_case(key.trim())
            && match (&self.category, category) {
                (None, None) => true,
                (Some(own), Some(wanted)) => own.eq_ignore_ascii_case(wanted.trim()),
                _ => false,
            }
    }
}

/// A plain, self-contained [`Entity`].
///
/// Used for objects and rooms that never have a controlling account, and
/// as the shared state inside the session layer's accounts and
/// characters.
#[derive(Debug, Clone, Default)]
pub struct EntityRecord {
    pub id: EntityId,
    pub key: String,
    pub permissions: Permissions,
    pub locks: LockSet,
    pub attributes: Attributes,
    pub tags: Vec<Tag>,
    pub contents: Vec<ContentEntry>,
    pub location: Option<EntityId>,
}

impl EntityRecord {
    pub fn new(id: EntityId, key: impl Into<String>) -> Self {
        Self {
            id,
            key: key.into(),
            ..Self::default()
        }
    }

    /// Builder-style permission grant.
    pub fn with_permission(mut self, perm: &str) -> Self {
        self.permissions.add(perm);
        self
    }

    /// Builder-style attribute.
    pub fn with_attribute(mut self, key: &str, value: impl Into<AttrValue>) -> Self {
        self.attributes.set(key, value);
        self
    }

    /// Adds a tag unless an identical one exists.
    pub fn add_tag(&mut self, key: &str, category: Option<&str>) {
        if !self.tags.iter().any(|t| t.matches(key, category)) {
            self.tags.push(Tag {
                key: key.trim().to_string(),
                category: category.map(|c| c.trim().to_string()),
            });
        }
    }

    pub fn tag_matches(&self, key: &str, category: Option<&str>) -> bool {
        self.tags.iter().any(|t| t.matches(key, category))
    }
}

impl Entity for EntityRecord {
    fn id(&self) -> EntityId {
        self.id
    }

    fn key(&self) -> &str {
        &self.key
    }

    fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    fn locks(&self) -> &LockSet {
        &self.locks
    }

    fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }

    fn has_tag(&self, key: &str, category: Option<&str>) -> bool {
        self.tag_matches(key, category)
    }

    fn contents(&self) -> &[ContentEntry] {
        &self.contents
    }

    fn location(&self) -> Option<EntityId> {
        self.location
    }
}
