//! Shared vocabulary for mudcore.
//!
//! - **Identity** ([`EntityId`], [`SessionId`]): who and which connection.
//! - **Output** ([`Payload`], [`Target`]): what to send and to whom.
//! - **Frames** ([`Inbound`], [`Outbound`]): what a session task
//!   exchanges with the connection in front of it.
//! - **Codec** ([`FrameCodec`], [`JsonCodec`]): frames to and from bytes.
//!
//! ```text
//! I/O layer (bytes) → Protocol (frames) → Session router → Lock engine
//! ```

mod codec;
mod error;
mod types;

pub use codec::FrameCodec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{EntityId, Inbound, Outbound, Payload, SessionId, Target};
