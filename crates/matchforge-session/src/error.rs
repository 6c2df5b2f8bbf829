//! Error types for the session layer.

/// Errors returned synchronously by
/// [`Matchmaker::start`](crate::Matchmaker::start).
///
/// Everything that goes wrong *after* a session has started is reported
/// through its terminal [`Outcome`](crate::Outcome) instead, never as a
/// `SessionError`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The request was rejected before any network activity: empty
    /// endpoint, non-positive timeout, and the like.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `start` was called outside of a Tokio runtime, so there is
    /// nowhere to run the background protocol.
    #[error("no Tokio runtime available to run the session")]
    NoRuntime,
}
