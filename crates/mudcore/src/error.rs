//! Unified error type for mudcore.

use std::path::PathBuf;

use mudcore_lock::LockError;
use mudcore_protocol::{ProtocolError, SessionId};
use mudcore_session::{PuppetDenied, SessionError};

/// Problems loading or applying [`CoreSettings`](crate::CoreSettings).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// Multisession modes run 0 to 3.
    #[error("multisession_mode must be 0-3, got {0}")]
    InvalidMode(u8),

    /// `lock_func_modules` names a module nobody provided to the builder.
    #[error("unknown lock function module {0:?}")]
    UnknownLockModule(String),
}

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum MudcoreError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Puppet(#[from] PuppetDenied),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session's task has ended; nothing more can be sent to it.
    #[error("session {0} is closed")]
    SessionClosed(SessionId),
}
