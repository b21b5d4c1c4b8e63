//! Error types for the session layer.

use mudcore_protocol::{EntityId, SessionId};

/// Errors from session lifecycle and lookup operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// No live session has this id. It never existed or has already
    /// disconnected.
    #[error("no such session {0}")]
    UnknownSession(SessionId),

    /// The account was never registered with the router.
    #[error("no such account {0}")]
    UnknownAccount(EntityId),

    /// The session is already bound to an account.
    #[error("session {0} is already logged in")]
    AlreadyLoggedIn(SessionId),
}

/// Why a puppet request was refused.
///
/// These are expected outcomes, not faults. The command layer decides what
/// to tell the player.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PuppetDenied {
    /// Another account is puppeting the character.
    #[error("{character} is already puppeted by account {by}")]
    AlreadyPuppeted { character: EntityId, by: EntityId },

    /// The account already puppets as many characters as it may.
    #[error("cannot puppet more than {max} characters at once")]
    MaxExceeded { max: usize },

    /// The character's `puppet` lock refused the account.
    #[error("puppet lock on {character} denied access")]
    LockDenied { character: EntityId },

    #[error("session {0} is not logged in")]
    NotLoggedIn(SessionId),

    #[error("no such session {0}")]
    NoSuchSession(SessionId),

    #[error("no such character {0}")]
    NoSuchCharacter(EntityId),
}

impl PuppetDenied {
    /// Stable reason code for the wire and for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyPuppeted { .. } => "ALREADY_PUPPETED",
            Self::MaxExceeded { .. } => "MAX_EXCEEDED",
            Self::LockDenied { .. } => "LOCK_DENIED",
            Self::NotLoggedIn(_) => "NOT_LOGGED_IN",
            Self::NoSuchSession(_) => "NO_SUCH_SESSION",
            Self::NoSuchCharacter(_) => "NO_SUCH_CHARACTER",
        }
    }
}
