//! Error types for the frontend layer.
//!
//! Everything that can go wrong while talking to the matchmaking
//! frontend collapses into [`FrontendError`]. The session layer only
//! needs two facts from an error: a human-readable message, and whether
//! the failure was a deadline expiry (which is reported as a timeout,
//! not a failure).

use std::fmt;

/// Status codes reported by the matchmaking service.
///
/// These mirror the gRPC status codes so that the gRPC client can map
/// them one-to-one, but nothing else in the workspace depends on gRPC.
/// Mock frontends in tests construct them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// The call was cancelled, usually by the caller.
    Cancelled,
    /// Unknown error.
    Unknown,
    /// The request was rejected as invalid.
    InvalidArgument,
    /// The deadline expired before the call completed.
    DeadlineExceeded,
    /// A referenced entity (ticket, pool) does not exist.
    NotFound,
    /// The entity already exists.
    AlreadyExists,
    /// The caller may not perform this call.
    PermissionDenied,
    /// A quota or resource limit was hit.
    ResourceExhausted,
    /// The system is not in a state required for the call.
    FailedPrecondition,
    /// The call was aborted, typically due to a concurrency issue.
    Aborted,
    /// A value was outside the valid range.
    OutOfRange,
    /// The service does not implement the call.
    Unimplemented,
    /// Internal service error.
    Internal,
    /// The service is unreachable.
    Unavailable,
    /// Unrecoverable data loss.
    DataLoss,
    /// Missing or invalid credentials.
    Unauthenticated,
}

impl StatusCode {
    /// Returns the canonical upper-snake-case name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when calling the matchmaking frontend.
///
/// The `Display` output of a [`FrontendError::Status`] is the service's
/// own message, verbatim. The session layer prefixes it with the call
/// name, so a service error "pool not found" during ticket creation is
/// surfaced as `CreateTicket failed: pool not found`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontendError {
    /// The endpoint string could not be turned into a connection target.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The endpoint as given by the caller.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The service (or the transport underneath it) returned an error
    /// status. When the service gives no message, the code name is shown.
    #[error("{}", status_text(.code, .message))]
    Status {
        /// The status code.
        code: StatusCode,
        /// The service's error message (may be empty).
        message: String,
    },

    /// The service answered, but the answer makes no sense, for
    /// example a created ticket without an id.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FrontendError {
    /// Shorthand for building a [`FrontendError::Status`].
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Returns the status code, if this is a status error.
    pub fn code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// `true` if the call failed because its deadline expired.
    ///
    /// A watch stream that ends this way without an assignment is a
    /// timeout outcome rather than a failure.
    pub fn is_deadline_exceeded(&self) -> bool {
        self.code() == Some(StatusCode::DeadlineExceeded)
    }
}

fn status_text(code: &StatusCode, message: &str) -> String {
    if message.is_empty() {
        code.to_string()
    } else {
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_is_service_message() {
        let err = FrontendError::status(StatusCode::NotFound, "pool not found");
        assert_eq!(err.to_string(), "pool not found");
    }

    #[test]
    fn test_status_display_falls_back_to_code_name() {
        let err = FrontendError::status(StatusCode::Unavailable, "");
        assert_eq!(err.to_string(), "UNAVAILABLE");
    }

    #[test]
    fn test_is_deadline_exceeded_only_for_deadline_code() {
        assert!(
            FrontendError::status(StatusCode::DeadlineExceeded, "late")
                .is_deadline_exceeded()
        );
        assert!(
            !FrontendError::status(StatusCode::Cancelled, "bye")
                .is_deadline_exceeded()
        );
        assert!(!FrontendError::Malformed("x".into()).is_deadline_exceeded());
    }

    #[test]
    fn test_code_is_none_for_non_status_errors() {
        let err = FrontendError::InvalidEndpoint {
            endpoint: "::".into(),
            reason: "bad uri".into(),
        };
        assert_eq!(err.code(), None);
        assert!(err.to_string().contains("bad uri"));
    }
}
