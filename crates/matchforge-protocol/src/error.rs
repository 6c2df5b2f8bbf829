//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding gateway messages.
///
/// A `ProtocolError` always means the bytes or their shape were wrong,
/// never that the network or the matchmaking service failed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, an
    /// unknown message `type`, or a truncated frame.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but breaks a protocol rule, such as
    /// anything other than `Handshake` as a connection's first message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
