//! Error types for the protocol layer.

/// Errors raised while parsing identifiers or converting frames to and
/// from bytes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame could not be serialized.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Incoming bytes were not a valid frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A string was expected to be a dbref (`#12` or `12`).
    #[error("invalid dbref: {0:?}")]
    InvalidDbref(String),
}
