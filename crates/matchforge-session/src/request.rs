//! What a session should do: where to connect, how long to wait, and
//! what ticket to register.

use std::time::Duration;

use matchforge_frontend::Ticket;

use crate::SessionError;

/// Parameters for one matchmaking attempt.
///
/// Build one with [`FindMatch::new`] and override the optional parts
/// with the builder methods:
///
/// ```rust
/// use std::time::Duration;
/// use matchforge_frontend::Ticket;
/// use matchforge_session::FindMatch;
///
/// let request = FindMatch::new("localhost:50504", Duration::from_secs(60))
///     .ticket(Ticket::new().with_tag("mode.session"))
///     .rpc_timeout(Duration::from_secs(5));
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct FindMatch {
    /// Frontend address, e.g. `localhost:50504`.
    pub endpoint: String,

    /// How long to wait for an assignment, measured from `start`.
    /// Exceeding it without an assignment yields
    /// [`Outcome::Timeout`](crate::Outcome::Timeout).
    pub timeout: Duration,

    /// Upper bound on each unary call (`CreateTicket`, `DeleteTicket`).
    ///
    /// Default: 10 seconds.
    pub rpc_timeout: Duration,

    /// The ticket template to register. Default: empty search fields.
    pub ticket: Ticket,
}

impl FindMatch {
    /// Default bound on unary calls.
    pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a request with an empty ticket template.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
            rpc_timeout: Self::DEFAULT_RPC_TIMEOUT,
            ticket: Ticket::default(),
        }
    }

    /// Creates a request from a timeout in (fractional) seconds, the way
    /// game-side callers usually hold it.
    ///
    /// # Errors
    /// [`SessionError::Config`] if `timeout_secs` is not a positive,
    /// finite number of seconds.
    pub fn from_secs(
        endpoint: impl Into<String>,
        timeout_secs: f64,
    ) -> Result<Self, SessionError> {
        if !timeout_secs.is_finite() || timeout_secs <= 0.0 {
            return Err(SessionError::Config(format!(
                "timeout must be a positive number of seconds, got {timeout_secs}"
            )));
        }
        let timeout = Duration::try_from_secs_f64(timeout_secs)
            .map_err(|e| SessionError::Config(format!("timeout out of range: {e}")))?;
        Ok(Self::new(endpoint, timeout))
    }

    /// Sets the ticket template.
    pub fn ticket(mut self, ticket: Ticket) -> Self {
        self.ticket = ticket;
        self
    }

    /// Sets the bound on each unary call.
    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Checks the request without touching the network.
    ///
    /// # Errors
    /// [`SessionError::Config`] for an empty endpoint or a zero timeout.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.endpoint.trim().is_empty() {
            return Err(SessionError::Config("endpoint must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(SessionError::Config("timeout must be positive".into()));
        }
        if self.rpc_timeout.is_zero() {
            return Err(SessionError::Config("rpc timeout must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_endpoint_and_positive_timeout() {
        let request = FindMatch::new("localhost:50504", Duration::from_secs(5));
        assert!(request.validate().is_ok());
        assert_eq!(request.rpc_timeout, FindMatch::DEFAULT_RPC_TIMEOUT);
    }

    #[test]
    fn test_validate_rejects_empty_endpoint() {
        let request = FindMatch::new("", Duration::from_secs(5));
        assert!(matches!(request.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_endpoint() {
        let request = FindMatch::new("   ", Duration::from_secs(5));
        assert!(matches!(request.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let request = FindMatch::new("localhost:50504", Duration::ZERO);
        assert!(matches!(request.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_rpc_timeout() {
        let request = FindMatch::new("localhost:50504", Duration::from_secs(5))
            .rpc_timeout(Duration::ZERO);
        assert!(matches!(request.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_from_secs_accepts_fractional_seconds() {
        let request = FindMatch::from_secs("localhost:50504", 2.5).unwrap();
        assert_eq!(request.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_from_secs_rejects_non_positive_and_non_finite() {
        for secs in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(
                    FindMatch::from_secs("localhost:50504", secs),
                    Err(SessionError::Config(_))
                ),
                "{secs} should be rejected"
            );
        }
    }
}
