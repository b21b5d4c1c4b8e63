//! Core types shared by every mudcore layer.
//!
//! Everything in here is plain data: identifiers, the payloads that flow
//! out to connected clients, and the frames the external I/O layer
//! exchanges with a session. None of it knows about locks or routing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The persistent identifier of an entity (account, character, object).
///
/// Entities are addressed by "dbref" in lock-strings and admin tooling,
/// so the display form is `#42`. The newtype keeps entity ids from being
/// mixed up with [`SessionId`]s, which are ephemeral.
///
/// `#[serde(transparent)]` serializes this as the bare number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parses either dbref notation (`#42`) or a bare number (`42`).
impl FromStr for EntityId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(EntityId)
            .map_err(|_| ProtocolError::InvalidDbref(s.to_string()))
    }
}

/// Identifier of one live connection.
///
/// Sessions are created on connect and destroyed on disconnect; the id is
/// never reused within a process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Payload & Target
// ---------------------------------------------------------------------------

/// Something to show a client.
///
/// The core never renders markup or picks a wire encoding; it only moves
/// payloads to the right sessions. Rendering happens in the I/O layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Payload {
    /// Plain text output (may contain markup the I/O layer understands).
    Text { text: String },

    /// Out-of-band data for rich clients (e.g. a GMCP-style command).
    Oob { command: String, args: Vec<String> },
}

impl Payload {
    /// Shorthand for a [`Payload::Text`].
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Where an outbound payload should go.
///
/// The router resolves a target to the set of live sessions under the
/// active multisession mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Exactly one session.
    Session(SessionId),

    /// Every session the account currently has open.
    Account(EntityId),

    /// Every session currently puppeting this character.
    Character(EntityId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session(id) => write!(f, "session {id}"),
            Self::Account(id) => write!(f, "account {id}"),
            Self::Character(id) => write!(f, "character {id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session frames
// ---------------------------------------------------------------------------

/// A request arriving from a client connection.
///
/// Frames for one session are processed strictly in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Inbound {
    /// Authenticate the session. The token is opaque to the core and is
    /// handed to the configured authenticator.
    Login { token: String },

    /// Take control of a character.
    Puppet { character: EntityId },

    /// Release the current puppet and go out-of-character.
    Unpuppet,

    /// A line of input for the command layer.
    Command { text: String },

    /// Close the session.
    Quit,
}

/// A frame sent back towards a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outbound {
    /// Login succeeded. `puppet` is set when the session came up
    /// in-character (shared or auto-restored puppet).
    LoggedIn {
        account: EntityId,
        puppet: Option<EntityId>,
    },

    /// The session is now bound to this character.
    Puppeted { character: EntityId },

    /// The session lost its puppet and is out-of-character.
    Unpuppeted { character: EntityId },

    /// A routed payload.
    Message { payload: Payload },

    /// A request was refused. `code` follows HTTP conventions
    /// (401 auth, 403 lock denied, 404 unknown, 409 conflict).
    Error { code: u16, message: String },

    /// The server is closing this session.
    Disconnect { reason: String },
}
