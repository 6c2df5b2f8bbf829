//! Unified error type for the Matchforge gateway.

use matchforge_protocol::ProtocolError;
use matchforge_session::SessionError;

use crate::transport::TransportError;

/// Top-level gateway error wrapping every crate-specific error.
///
/// The `#[from]` variants let `?` convert sub-crate errors directly.
#[derive(Debug, thiserror::Error)]
pub enum MatchforgeError {
    /// Socket-level failure: bind, accept, upgrade, send, or receive.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded, or broke a protocol rule.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A matchmaking session could not be started.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A match token could not be signed.
    #[error("match token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// The client's handshake token was rejected.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Invalid gateway configuration (bad environment value, missing
    /// token).
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err: MatchforgeError = ProtocolError::InvalidMessage("bad".into()).into();
        assert!(matches!(err, MatchforgeError::Protocol(_)));
        assert_eq!(err.to_string(), "invalid message: bad");
    }

    #[test]
    fn test_from_session_error() {
        let err: MatchforgeError = SessionError::NoRuntime.into();
        assert!(matches!(err, MatchforgeError::Session(_)));
    }

    #[test]
    fn test_from_transport_error() {
        let err: MatchforgeError = TransportError::Closed.into();
        assert!(matches!(err, MatchforgeError::Transport(_)));
    }

    #[test]
    fn test_auth_failed_message() {
        let err = MatchforgeError::AuthFailed("token mismatch".into());
        assert_eq!(err.to_string(), "authentication failed: token mismatch");
    }
}
