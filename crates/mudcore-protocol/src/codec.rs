//! Frame codecs used by the I/O layer in front of a session.
//!
//! The core itself works on typed [`Inbound`]/[`Outbound`] frames. A
//! connection that speaks bytes (a websocket, a test harness) picks a
//! [`FrameCodec`] to turn its bytes into frames and back.
//!
//! Keeping the codec separate means the wire format can change (JSON
//! while developing, something compact later) without the router or the
//! lock engine noticing. Only the I/O layer and the codec agree on bytes.
//!
//! ```text
//! client bytes --decode_inbound--> Inbound --> session task
//! session task --> Outbound --encode_outbound--> client bytes
//! ```

use crate::{Inbound, Outbound, ProtocolError};

/// Converts session frames to and from bytes.
///
/// # Trait bounds
///
/// `Send + Sync + 'static` so one codec value can be shared by every
/// session task, whichever thread Tokio runs it on.
///
/// # Why not generic methods?
///
/// The methods name the concrete frame types instead of taking any
/// `T: Serialize`. A codec only ever sees these two enums, and fixed
/// signatures keep the trait object-safe, so an I/O layer can hold a
/// `Box<dyn FrameCodec>` chosen at startup.
pub trait FrameCodec: Send + Sync + 'static {
    /// Decodes a client frame.
    ///
    /// # Errors
    /// [`ProtocolError::Decode`] when the bytes are not a valid frame.
    /// The session stays open; the I/O layer decides whether to drop the
    /// connection.
    fn decode_inbound(&self, data: &[u8]) -> Result<Inbound, ProtocolError>;

    /// Encodes a server frame.
    fn encode_outbound(&self, frame: &Outbound) -> Result<Vec<u8>, ProtocolError>;
}

/// A [`FrameCodec`] speaking JSON objects tagged by `"type"`.
///
/// ```rust
/// use mudcore_protocol::{FrameCodec, Inbound, JsonCodec};
///
/// let frame = JsonCodec
///     .decode_inbound(br#"{"type":"Command","text":"look"}"#)
///     .unwrap();
/// assert_eq!(frame, Inbound::Command { text: "look".into() });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl FrameCodec for JsonCodec {
    fn decode_inbound(&self, data: &[u8]) -> Result<Inbound, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    fn encode_outbound(&self, frame: &Outbound) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(frame).map_err(ProtocolError::Encode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{EntityId, Payload};

    #[test]
    fn test_decode_inbound_puppet_frame() {
        let frame = JsonCodec
            .decode_inbound(br#"{"type":"Puppet","character":12}"#)
            .unwrap();
        assert_eq!(frame, Inbound::Puppet { character: EntityId(12) });
    }

    #[test]
    fn test_boxed_codec_decodes() {
        let codec: Box<dyn FrameCodec> = Box::new(JsonCodec);
        let frame = codec.decode_inbound(br#"{"type":"Quit"}"#).unwrap();
        assert_eq!(frame, Inbound::Quit);
    }

    #[test]
    fn test_decode_inbound_unknown_type_fails() {
        let err = JsonCodec
            .decode_inbound(br#"{"type":"Teleport"}"#)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_encode_outbound_nests_payload_under_message() {
        let frame = Outbound::Message {
            payload: Payload::text("You see a door."),
        };
        let bytes = JsonCodec.encode_outbound(&frame).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["type"], "Message");
        assert_eq!(value["payload"]["type"], "Text");
        assert_eq!(value["payload"]["text"], "You see a door.");
    }
}
