//! Router configuration.

use std::fmt;
use std::time::Duration;

use tracing::warn;

// ---------------------------------------------------------------------------
// MultisessionMode
// ---------------------------------------------------------------------------

/// How sessions, accounts and characters may be combined.
///
/// | mode | sessions per account | puppets |
/// |---|---|---|
/// | 0 [`Single`](Self::Single) | one; a new login evicts the old | one, shared |
/// | 1 [`Shared`](Self::Shared) | many | one, shared by every session |
/// | 2 [`PerSession`](Self::PerSession) | many | one per session; puppeting steals from a sibling |
/// | 3 [`CoPuppet`](Self::CoPuppet) | many | one per session; siblings may share it |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MultisessionMode {
    #[default]
    Single,
    Shared,
    PerSession,
    CoPuppet,
}

impl MultisessionMode {
    /// Numeric level, 0 to 3.
    pub fn level(self) -> u8 {
        match self {
            Self::Single => 0,
            Self::Shared => 1,
            Self::PerSession => 2,
            Self::CoPuppet => 3,
        }
    }

    /// Mode for a numeric level, `None` above 3.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(Self::Single),
            1 => Some(Self::Shared),
            2 => Some(Self::PerSession),
            3 => Some(Self::CoPuppet),
            _ => None,
        }
    }

    /// Modes 0 and 1: every session of an account drives the same puppet.
    pub fn shares_puppet(self) -> bool {
        matches!(self, Self::Single | Self::Shared)
    }
}

impl fmt::Display for MultisessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

// ---------------------------------------------------------------------------
// RouterConfig
// ---------------------------------------------------------------------------

/// Tunables for the [`Router`](crate::Router).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterConfig {
    pub multisession_mode: MultisessionMode,

    /// Distinct characters one account may puppet at once, across all of
    /// its sessions.
    pub max_puppets: usize,

    /// In modes 0 and 1, re-puppet the account's last character on login.
    pub auto_puppet: bool,

    /// Sessions idle longer than this are reported by
    /// [`Router::idle_sessions`](crate::Router::idle_sessions). `None`
    /// disables idle disconnects.
    pub idle_timeout: Option<Duration>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            multisession_mode: MultisessionMode::Single,
            max_puppets: 1,
            auto_puppet: true,
            idle_timeout: None,
        }
    }
}

impl RouterConfig {
    /// Returns a copy with out-of-range values corrected.
    pub fn validated(mut self) -> Self {
        if self.max_puppets == 0 {
            warn!("max_puppets is 0, raising to 1");
            self.max_puppets = 1;
        }
        if self.multisession_mode.shares_puppet() && self.max_puppets > 1 {
            warn!(
                mode = %self.multisession_mode,
                max_puppets = self.max_puppets,
                "mode shares a single puppet, clamping max_puppets to 1"
            );
            self.max_puppets = 1;
        }
        if self.idle_timeout == Some(Duration::ZERO) {
            warn!("idle_timeout of zero would disconnect everyone, disabling");
            self.idle_timeout = None;
        }
        self
    }
}
