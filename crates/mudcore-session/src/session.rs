//! A live connection as the router sees it.

use mudcore_protocol::{EntityId, Outbound, SessionId};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One physical connection. Created on connect, dropped on disconnect.
///
/// The router records which account it logged in as and which character
/// it is bound to; everything else about the connection (sockets, wire
/// format) belongs to whoever holds the other end of `sink`.
#[derive(Debug)]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) account: Option<EntityId>,
    pub(crate) puppet: Option<EntityId>,
    pub(crate) connected_at: Instant,
    pub(crate) last_activity: Instant,
    sink: mpsc::UnboundedSender<Outbound>,
}

impl Session {
    pub(crate) fn new(id: SessionId, sink: mpsc::UnboundedSender<Outbound>) -> Self {
        let now = Instant::now();
        Self {
            id,
            account: None,
            puppet: None,
            connected_at: now,
            last_activity: now,
            sink,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The account this session logged in as.
    pub fn account(&self) -> Option<EntityId> {
        self.account
    }

    /// The character this session currently drives.
    pub fn puppet(&self) -> Option<EntityId> {
        self.puppet
    }

    pub fn connected_at(&self) -> Instant {
        self.connected_at
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    pub fn is_logged_in(&self) -> bool {
        self.account.is_some()
    }

    /// Queues a frame for the connection. Returns `false` if the other
    /// end has gone away.
    pub fn deliver(&self, frame: Outbound) -> bool {
        self.sink.send(frame).is_ok()
    }
}
