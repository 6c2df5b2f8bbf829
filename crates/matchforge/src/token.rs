//! Signed match tokens.
//!
//! Every `Matched` reply carries an HS256 JWT over the ticket, the
//! assigned server and the player details, so the game server can check
//! that a joining client really was matched by this gateway.

use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use matchforge_protocol::{PlayerInfo, ServerInfo};
use serde::{Deserialize, Serialize};

use crate::MatchforgeError;

/// Claims inside a match token. `iat` and `exp` are Unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchClaims {
    pub ticket_id: String,
    pub server: ServerInfo,
    pub player: PlayerInfo,
    pub iat: u64,
    pub exp: u64,
}

/// Signs match tokens with a shared HMAC secret.
pub struct MatchTokenIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl MatchTokenIssuer {
    /// Tokens signed with `secret` expire `ttl` after issue.
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Signs a token for one assignment.
    ///
    /// # Errors
    /// [`MatchforgeError::Token`] if encoding fails.
    pub fn issue(
        &self,
        ticket_id: &str,
        server: &ServerInfo,
        player: &PlayerInfo,
    ) -> Result<String, MatchforgeError> {
        let iat = jsonwebtoken::get_current_timestamp();
        let claims = MatchClaims {
            ticket_id: ticket_id.to_string(),
            server: server.clone(),
            player: player.clone(),
            iat,
            exp: iat.saturating_add(self.ttl.as_secs()),
        };
        Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)?)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation};

    use super::*;

    fn player() -> PlayerInfo {
        PlayerInfo {
            skill: 1.25,
            latency: 30.0,
            region: "us-west1".into(),
        }
    }

    #[test]
    fn test_issue_round_trips_with_same_secret() {
        let issuer = MatchTokenIssuer::new("jwt-secret", Duration::from_secs(3600));
        let server = ServerInfo::from_connection("10.0.0.5:7777");

        let token = issuer.issue("t1", &server, &player()).unwrap();
        let decoded = jsonwebtoken::decode::<MatchClaims>(
            &token,
            &DecodingKey::from_secret(b"jwt-secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        let claims = decoded.claims;
        assert_eq!(claims.ticket_id, "t1");
        assert_eq!(claims.server, server);
        assert_eq!(claims.player, player());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_issue_rejected_under_other_secret() {
        let issuer = MatchTokenIssuer::new("jwt-secret", Duration::from_secs(3600));
        let token = issuer
            .issue("t1", &ServerInfo::from_connection("10.0.0.5:7777"), &player())
            .unwrap();

        let result = jsonwebtoken::decode::<MatchClaims>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }
}
