//! The router: sole owner of the session ↔ account ↔ character graph.
//!
//! Every connection, login, puppet change and outbound message goes
//! through one [`Router`]. It keeps three tables keyed by id:
//!
//! - `sessions`: live connections and what they are bound to
//! - `logins`: account → its live sessions, in login order
//! - `puppeteers`: character → the one account puppeting it
//!
//! A character is puppeted by at most one account in every mode. Which
//! *sessions* of that account are bound to it depends on the
//! [`MultisessionMode`]:
//!
//! ```text
//! mode 0   [s1] ──→ hero           a second login evicts s1
//! mode 1   [s1, s2] ──→ hero       every session shares the puppet
//! mode 2   s1 ──→ hero, s2 ──→ mage  puppeting hero from s2 unbinds s1
//! mode 3   s1 ──→ hero ←── s2      co-puppeting allowed
//! ```
//!
//! # Concurrency note
//!
//! `Router` is a plain struct with `&mut self` mutators. The owner (the
//! `mudcore` crate) wraps it in a mutex, which serializes every state
//! change. Delivery is a non-blocking channel send, so holding that mutex
//! never waits on a socket.

use std::collections::HashMap;
use std::sync::Arc;

use mudcore_lock::{Entity, LockEngine};
use mudcore_protocol::{EntityId, Outbound, Payload, SessionId, Target};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::entities::{Accessor, Account, Character, PuppetView};
use crate::{MultisessionMode, PuppetDenied, RouterConfig, Session, SessionError};

/// Access type checked on a character before it can be puppeted.
pub const PUPPET_ACCESS: &str = "puppet";

/// What happened when a session logged in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Sessions disconnected to make room for this one (mode 0).
    pub evicted: Vec<SessionId>,
    /// The character the session is driving after login.
    pub puppet: Option<EntityId>,
}

/// What a successful puppet request changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PuppetOutcome {
    /// Sessions now bound to the character.
    pub bound: Vec<SessionId>,
    /// Sibling sessions that lost the character (mode 2).
    pub unbound: Vec<SessionId>,
    /// Previous puppets left with nobody driving them.
    pub released: Vec<EntityId>,
}

/// Who a session's input should be dispatched as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputContext {
    pub session: SessionId,
    pub account: Option<EntityId>,
    /// `None` means the session is out of character.
    pub puppet: Option<EntityId>,
}

/// Tracks live sessions and routes puppet changes and messages.
#[derive(Debug)]
pub struct Router {
    config: RouterConfig,
    engine: Arc<LockEngine>,
    sessions: HashMap<SessionId, Session>,
    accounts: HashMap<EntityId, Account>,
    characters: HashMap<EntityId, Character>,
    logins: HashMap<EntityId, Vec<SessionId>>,
    puppeteers: HashMap<EntityId, EntityId>,
    next_session: u64,
}

impl Router {
    pub fn new(config: RouterConfig, engine: Arc<LockEngine>) -> Self {
        let config = config.validated();
        debug!(
            mode = %config.multisession_mode,
            max_puppets = config.max_puppets,
            "router created"
        );
        Self {
            config,
            engine,
            sessions: HashMap::new(),
            accounts: HashMap::new(),
            characters: HashMap::new(),
            logins: HashMap::new(),
            puppeteers: HashMap::new(),
            next_session: 0,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn engine(&self) -> &LockEngine {
        &self.engine
    }

    // -----------------------------------------------------------------------
    // Registries
    // -----------------------------------------------------------------------

    /// Makes an account known to the router, replacing any previous copy.
    pub fn register_account(&mut self, account: Account) -> Option<Account> {
        let id = account.id();
        debug!(account = %id, key = account.key(), "account registered");
        self.accounts.insert(id, account)
    }

    /// Makes a character known to the router, replacing any previous copy.
    pub fn register_character(&mut self, character: Character) -> Option<Character> {
        let id = character.id();
        debug!(character = %id, key = character.key(), "character registered");
        self.characters.insert(id, character)
    }

    /// Unbinds a character from every session, then forgets it.
    pub fn remove_character(&mut self, id: EntityId) -> Option<Character> {
        for session in self.sessions_of_character(id) {
            if let Some(s) = self.sessions.get_mut(&session) {
                s.puppet = None;
                s.deliver(Outbound::Unpuppeted { character: id });
            }
        }
        self.puppeteers.remove(&id);
        for account in self.accounts.values_mut() {
            if account.last_puppet == Some(id) {
                account.last_puppet = None;
            }
        }
        let removed = self.characters.remove(&id);
        if removed.is_some() {
            info!(character = %id, "character removed");
        }
        removed
    }

    pub fn account(&self, id: EntityId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn account_mut(&mut self, id: EntityId) -> Option<&mut Account> {
        self.accounts.get_mut(&id)
    }

    pub fn character(&self, id: EntityId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: EntityId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    /// Turns quelling on or off for an account.
    pub fn set_quelled(&mut self, account: EntityId, quelled: bool) -> Result<(), SessionError> {
        let acc = self
            .accounts
            .get_mut(&account)
            .ok_or(SessionError::UnknownAccount(account))?;
        acc.quelled = quelled;
        info!(%account, quelled, "quelling changed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Registers a new connection. Frames for it are pushed into `sink`.
    pub fn session_connected(&mut self, sink: mpsc::UnboundedSender<Outbound>) -> SessionId {
        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.sessions.insert(id, Session::new(id, sink));
        info!(session = %id, "session connected");
        id
    }

    /// Binds a session to an account.
    ///
    /// In mode 0 any other session of the account is disconnected. In
    /// modes 0 and 1 the session joins the account's shared puppet, or,
    /// with `auto_puppet`, re-puppets the last character. A failed
    /// auto-puppet is logged and the login still succeeds.
    pub fn session_authenticated(
        &mut self,
        session: SessionId,
        account: EntityId,
    ) -> Result<LoginOutcome, SessionError> {
        let sess = self
            .sessions
            .get(&session)
            .ok_or(SessionError::UnknownSession(session))?;
        if sess.account.is_some() {
            return Err(SessionError::AlreadyLoggedIn(session));
        }
        if !self.accounts.contains_key(&account) {
            return Err(SessionError::UnknownAccount(account));
        }

        let mode = self.config.multisession_mode;
        let siblings = self.sessions_of_account(account);
        let shared = if mode.shares_puppet() {
            siblings.iter().find_map(|s| self.puppet_of(*s))
        } else {
            None
        };

        if let Some(sess) = self.sessions.get_mut(&session) {
            sess.account = Some(account);
            sess.puppet = shared;
            sess.last_activity = Instant::now();
            sess.deliver(Outbound::LoggedIn {
                account,
                puppet: shared,
            });
        }
        self.logins.entry(account).or_default().push(session);
        info!(%session, %account, mode = %mode, "session logged in");

        let mut outcome = LoginOutcome {
            evicted: Vec::new(),
            puppet: shared,
        };

        if mode == MultisessionMode::Single {
            for old in siblings {
                if let Some(s) = self.sessions.get(&old) {
                    s.deliver(Outbound::Disconnect {
                        reason: "logged in from another session".into(),
                    });
                }
                self.session_disconnected(old);
                info!(session = %old, %account, "evicted by new login");
                outcome.evicted.push(old);
            }
        }

        if shared.is_none() && mode.shares_puppet() && self.config.auto_puppet {
            let last = self.accounts.get(&account).and_then(|a| a.last_puppet);
            if let Some(character) = last {
                match self.puppet(session, character) {
                    Ok(_) => outcome.puppet = Some(character),
                    Err(denied) => warn!(
                        %session,
                        %character,
                        reason = denied.code(),
                        "auto-puppet failed"
                    ),
                }
            }
        }

        Ok(outcome)
    }

    /// Drops a session and releases its puppet binding.
    ///
    /// Idempotent: returns `None` if the session is already gone. A
    /// character left with no bound session becomes idle; it is never
    /// removed.
    pub fn session_disconnected(&mut self, session: SessionId) -> Option<Session> {
        let sess = self.sessions.remove(&session)?;
        if let Some(account) = sess.account {
            if let Some(list) = self.logins.get_mut(&account) {
                list.retain(|s| *s != session);
                if list.is_empty() {
                    self.logins.remove(&account);
                }
            }
            if let Some(character) = sess.puppet {
                self.release_if_unbound(account, character);
            }
        }
        info!(%session, account = ?sess.account, "session disconnected");
        Some(sess)
    }

    /// Refreshes a session's idle timer.
    pub fn touch(&mut self, session: SessionId) -> bool {
        match self.sessions.get_mut(&session) {
            Some(s) => {
                s.last_activity = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Sessions idle for at least the configured timeout as of `now`.
    pub fn idle_sessions(&self, now: Instant) -> Vec<SessionId> {
        let Some(timeout) = self.config.idle_timeout else {
            return Vec::new();
        };
        let mut idle: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| now.saturating_duration_since(s.last_activity) >= timeout)
            .map(|s| s.id)
            .collect();
        idle.sort();
        idle
    }

    // -----------------------------------------------------------------------
    // Puppeting
    // -----------------------------------------------------------------------

    /// Binds `character` to `session` (or, in modes 0 and 1, to every
    /// session of its account).
    ///
    /// Checked in order: the character is not held by another account,
    /// its `puppet` lock admits the account, and the account stays within
    /// `max_puppets`. A character the session already drives is a no-op.
    pub fn puppet(
        &mut self,
        session: SessionId,
        character: EntityId,
    ) -> Result<PuppetOutcome, PuppetDenied> {
        let sess = self
            .sessions
            .get(&session)
            .ok_or(PuppetDenied::NoSuchSession(session))?;
        let account_id = sess.account.ok_or(PuppetDenied::NotLoggedIn(session))?;
        let current = sess.puppet;
        let target = self
            .characters
            .get(&character)
            .ok_or(PuppetDenied::NoSuchCharacter(character))?;

        if let Some(&by) = self.puppeteers.get(&character) {
            if by != account_id {
                debug!(%session, %character, %by, "puppet denied, held by another account");
                return Err(PuppetDenied::AlreadyPuppeted { character, by });
            }
        }
        if current == Some(character) {
            return Ok(PuppetOutcome::default());
        }

        let account = self
            .accounts
            .get(&account_id)
            .ok_or(PuppetDenied::NotLoggedIn(session))?;
        if !self.engine.check(account, target, PUPPET_ACCESS) {
            debug!(%session, %character, account = %account_id, "puppet lock denied");
            return Err(PuppetDenied::LockDenied { character });
        }

        let mode = self.config.multisession_mode;
        let siblings = self.sessions_of_account(account_id);
        if !mode.shares_puppet() {
            let mut after: Vec<EntityId> = siblings
                .iter()
                .filter(|s| **s != session)
                .filter_map(|s| self.puppet_of(*s))
                .chain(std::iter::once(character))
                .collect();
            after.sort();
            after.dedup();
            if after.len() > self.config.max_puppets {
                debug!(
                    %session,
                    %character,
                    max = self.config.max_puppets,
                    "puppet denied, too many puppets"
                );
                return Err(PuppetDenied::MaxExceeded {
                    max: self.config.max_puppets,
                });
            }
        }

        let mut outcome = PuppetOutcome::default();

        if mode == MultisessionMode::PerSession {
            for sid in siblings.iter().filter(|s| **s != session) {
                if let Some(s) = self.sessions.get_mut(sid) {
                    if s.puppet == Some(character) {
                        s.puppet = None;
                        s.deliver(Outbound::Unpuppeted { character });
                        outcome.unbound.push(*sid);
                    }
                }
            }
        }

        let rebind = if mode.shares_puppet() {
            siblings
        } else {
            vec![session]
        };
        let mut previous: Vec<EntityId> = rebind
            .iter()
            .filter_map(|s| self.puppet_of(*s))
            .filter(|c| *c != character)
            .collect();
        previous.dedup();

        for sid in &rebind {
            if let Some(s) = self.sessions.get_mut(sid) {
                s.puppet = Some(character);
                s.deliver(Outbound::Puppeted { character });
                outcome.bound.push(*sid);
            }
        }
        for prev in previous {
            if self.release_if_unbound(account_id, prev) {
                outcome.released.push(prev);
            }
        }

        self.puppeteers.insert(character, account_id);
        if let Some(acc) = self.accounts.get_mut(&account_id) {
            acc.last_puppet = Some(character);
        }
        info!(
            %session,
            account = %account_id,
            %character,
            sessions = outcome.bound.len(),
            "character puppeted"
        );
        Ok(outcome)
    }

    /// Unbinds the session's puppet. In modes 0 and 1 every session of
    /// the account goes out of character together.
    ///
    /// Returns the character that was unbound, or `None` if the session
    /// was already out of character.
    pub fn unpuppet(&mut self, session: SessionId) -> Result<Option<EntityId>, PuppetDenied> {
        let sess = self
            .sessions
            .get(&session)
            .ok_or(PuppetDenied::NoSuchSession(session))?;
        let account = sess.account.ok_or(PuppetDenied::NotLoggedIn(session))?;
        let Some(character) = sess.puppet else {
            return Ok(None);
        };

        let targets = if self.config.multisession_mode.shares_puppet() {
            self.sessions_of_account(account)
        } else {
            vec![session]
        };
        for sid in targets {
            if let Some(s) = self.sessions.get_mut(&sid) {
                if s.puppet == Some(character) {
                    s.puppet = None;
                    s.deliver(Outbound::Unpuppeted { character });
                }
            }
        }
        self.release_if_unbound(account, character);
        info!(%session, %account, %character, "character unpuppeted");
        Ok(Some(character))
    }

    /// Forgets who puppets `character` if no session of `account` is
    /// still bound to it. Returns `true` if it was released.
    fn release_if_unbound(&mut self, account: EntityId, character: EntityId) -> bool {
        let still_bound = self.logins.get(&account).is_some_and(|list| {
            list.iter().any(|s| self.puppet_of(*s) == Some(character))
        });
        if still_bound {
            return false;
        }
        if self.puppeteers.remove(&character).is_some() {
            debug!(%character, %account, "character idle");
        }
        true
    }

    // -----------------------------------------------------------------------
    // Routing
    // -----------------------------------------------------------------------

    /// Delivers `payload` to every live session behind `target`.
    ///
    /// `only` narrows delivery to one of those sessions. Returns how many
    /// sessions received it; nobody online is a silent drop.
    pub fn route(&self, target: Target, payload: Payload, only: Option<SessionId>) -> usize {
        let mut recipients = self.resolve_target(target);
        if let Some(only) = only {
            recipients.retain(|s| *s == only);
        }
        if recipients.is_empty() {
            trace!(%target, "no live session, message dropped");
            return 0;
        }
        recipients
            .iter()
            .filter_map(|s| self.sessions.get(s))
            .filter(|s| {
                s.deliver(Outbound::Message {
                    payload: payload.clone(),
                })
            })
            .count()
    }

    /// The live sessions a target currently fans out to.
    pub fn resolve_target(&self, target: Target) -> Vec<SessionId> {
        match target {
            Target::Session(id) if self.sessions.contains_key(&id) => vec![id],
            Target::Session(_) => Vec::new(),
            Target::Account(account) => self.sessions_of_account(account),
            Target::Character(character) => self.sessions_of_character(character),
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn session(&self, id: SessionId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Live sessions of an account, in login order.
    pub fn sessions_of_account(&self, account: EntityId) -> Vec<SessionId> {
        self.logins.get(&account).cloned().unwrap_or_default()
    }

    /// Live sessions bound to a character.
    pub fn sessions_of_character(&self, character: EntityId) -> Vec<SessionId> {
        let Some(account) = self.puppeteers.get(&character) else {
            return Vec::new();
        };
        self.sessions_of_account(*account)
            .into_iter()
            .filter(|s| self.puppet_of(*s) == Some(character))
            .collect()
    }

    pub fn puppet_of(&self, session: SessionId) -> Option<EntityId> {
        self.sessions.get(&session).and_then(|s| s.puppet)
    }

    /// The account currently puppeting a character.
    pub fn puppeteer_of(&self, character: EntityId) -> Option<EntityId> {
        self.puppeteers.get(&character).copied()
    }

    /// Distinct characters an account is puppeting.
    pub fn puppets_of_account(&self, account: EntityId) -> Vec<EntityId> {
        let mut puppets: Vec<EntityId> = self
            .sessions_of_account(account)
            .into_iter()
            .filter_map(|s| self.puppet_of(s))
            .collect();
        puppets.sort();
        puppets.dedup();
        puppets
    }

    /// Who input from `session` acts as.
    pub fn resolve_input(&self, session: SessionId) -> Result<InputContext, SessionError> {
        let sess = self
            .sessions
            .get(&session)
            .ok_or(SessionError::UnknownSession(session))?;
        Ok(InputContext {
            session,
            account: sess.account,
            puppet: sess.puppet,
        })
    }

    /// The entity lock checks should see for a session: its puppet
    /// (with the account behind it) or the account when out of
    /// character. `None` before login.
    pub fn accessor(&self, session: SessionId) -> Option<Accessor<'_>> {
        let sess = self.sessions.get(&session)?;
        let account = self.accounts.get(&sess.account?)?;
        match sess.puppet.and_then(|c| self.characters.get(&c)) {
            Some(character) => Some(Accessor::Puppet(PuppetView { character, account })),
            None => Some(Accessor::Account(account)),
        }
    }

    /// Runs a lock check with the session's accessor. Sessions that have
    /// not logged in are denied.
    pub fn check_access(&self, session: SessionId, accessed: &dyn Entity, access_type: &str) -> bool {
        match self.accessor(session) {
            Some(accessor) => self.engine.check(&accessor, accessed, access_type),
            None => {
                debug!(%session, access_type, "access check before login, denying");
                false
            }
        }
    }
}
