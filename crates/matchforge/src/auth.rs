//! Authentication hook for gateway clients.
//!
//! The gateway calls an [`Authenticator`] with the token from the
//! client's `Handshake`. [`BearerAuthenticator`] compares it against a
//! single shared secret; implement the trait yourself to plug in a real
//! identity provider.

use std::sync::atomic::{AtomicU64, Ordering};

use matchforge_protocol::ClientId;

use crate::MatchforgeError;

/// Validates a client's handshake token and returns its identity.
///
/// ```rust
/// use matchforge::{Authenticator, MatchforgeError};
/// use matchforge_protocol::ClientId;
///
/// /// Accepts numeric tokens as client ids. Development only.
/// struct DevAuthenticator;
///
/// impl Authenticator for DevAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<ClientId, MatchforgeError> {
///         let id: u64 = token.parse().map_err(|_| {
///             MatchforgeError::AuthFailed("token must be a number".into())
///         })?;
///         Ok(ClientId(id))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the client's identity, or
    /// [`MatchforgeError::AuthFailed`] if the token is rejected.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<ClientId, MatchforgeError>> + Send;
}

/// Accepts clients presenting one shared bearer token.
///
/// The token may be sent bare (`secret`) or in header form
/// (`Bearer secret`, scheme case-insensitive). Each accepted client gets
/// a fresh, increasing [`ClientId`].
pub struct BearerAuthenticator {
    token: String,
    next_id: AtomicU64,
}

impl BearerAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            next_id: AtomicU64::new(1),
        }
    }

    fn matches(&self, presented: &str) -> bool {
        let mut parts = presented.split_whitespace();
        let credential = match (parts.next(), parts.next(), parts.next()) {
            (Some(token), None, None) => token,
            (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => token,
            _ => return false,
        };
        !self.token.is_empty() && credential == self.token
    }
}

impl Authenticator for BearerAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<ClientId, MatchforgeError> {
        if !self.matches(token) {
            return Err(MatchforgeError::AuthFailed("invalid bearer token".into()));
        }
        Ok(ClientId(self.next_id.fetch_add(1, Ordering::Relaxed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bearer_accepts_bare_and_header_forms() {
        let auth = BearerAuthenticator::new("secret-token");

        assert!(auth.authenticate("secret-token").await.is_ok());
        assert!(auth.authenticate("Bearer secret-token").await.is_ok());
        assert!(auth.authenticate("bearer secret-token").await.is_ok());
    }

    #[tokio::test]
    async fn test_bearer_rejects_wrong_token_and_scheme() {
        let auth = BearerAuthenticator::new("secret-token");

        for token in ["", "wrong", "Basic secret-token", "Bearer a b"] {
            assert!(
                matches!(
                    auth.authenticate(token).await,
                    Err(MatchforgeError::AuthFailed(_))
                ),
                "{token:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_bearer_with_empty_secret_rejects_everything() {
        let auth = BearerAuthenticator::new("");
        assert!(auth.authenticate("").await.is_err());
        assert!(auth.authenticate("Bearer").await.is_err());
    }

    #[tokio::test]
    async fn test_bearer_assigns_increasing_client_ids() {
        let auth = BearerAuthenticator::new("t");
        let a = auth.authenticate("t").await.unwrap();
        let b = auth.authenticate("t").await.unwrap();
        assert!(b.0 > a.0);
    }
}
