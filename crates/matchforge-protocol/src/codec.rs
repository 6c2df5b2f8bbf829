//! Codec trait and implementations for serializing gateway messages.
//!
//! The gateway doesn't care how envelopes become bytes, only that
//! something implements [`Codec`]. [`JsonCodec`] is the one shipped
//! today: browser and game-engine clients can read it without extra
//! tooling.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes bytes back.
///
/// The codec is shared by every connection handler, so it must be
/// `Send + Sync + 'static`. Decoding yields owned values
/// (`DeserializeOwned`) so the receive buffer can be dropped right away.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// Behind the `json` feature (enabled by default).
///
/// ## Example
///
/// ```rust
/// use matchforge_protocol::{Codec, Envelope, JsonCodec, MatchMessage, Payload};
///
/// let codec = JsonCodec;
///
/// let envelope = Envelope {
///     seq: 1,
///     timestamp: 5000,
///     payload: Payload::Match(MatchMessage::FindMatch {
///         region: "asia-northeast1".into(),
///     }),
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{Envelope, Payload, SystemMessage};

    #[test]
    fn test_json_codec_decode_garbage_is_decode_error() {
        let result: Result<Envelope, _> = JsonCodec.decode(b"not json at all");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encodes_readable_json() {
        let envelope = Envelope {
            seq: 3,
            timestamp: 10,
            payload: Payload::System(SystemMessage::Heartbeat { client_time: 7 }),
        };

        let bytes = JsonCodec.encode(&envelope).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("\"Heartbeat\""), "got {text}");
        assert!(text.contains("\"client_time\":7"), "got {text}");
    }
}
