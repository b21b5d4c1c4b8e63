//! Error types for the lock layer.
//!
//! Lock *evaluation* never fails: a broken lock simply denies. These
//! errors only surface from strict parsing ([`LockSet::validate`]) and
//! from registry setup, where an admin or a config file can act on them.
//!
//! [`LockSet::validate`]: crate::LockSet::validate

/// Problems found while compiling a lock-string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// A clause had no `access_type:` prefix.
    #[error("lock clause {0:?} is missing an access type")]
    MissingAccessType(String),

    /// The access type was present but the expression after it was empty.
    #[error("lock for {0:?} has an empty expression")]
    EmptyExpression(String),

    /// The expression could not be parsed.
    #[error("lock for {access_type:?} is malformed at column {column}: {reason}")]
    Syntax {
        access_type: String,
        column: usize,
        reason: String,
    },

    /// The expression calls a function no registered module provides.
    #[error("lock for {access_type:?} calls unknown lock function {name:?}")]
    UnknownFunction { access_type: String, name: String },

    /// A lock function was called with an unsupported number of arguments.
    #[error("lock function {name:?} does not take {given} argument(s)")]
    Arity { name: String, given: usize },
}
