//! Gateway configuration, usually read from the environment.

use std::time::Duration;

use crate::MatchforgeError;

/// Default Open Match frontend address inside a cluster.
pub const DEFAULT_FRONTEND: &str = "open-match-frontend.open-match.svc.cluster.local:50504";

/// Settings for a gateway instance.
///
/// | Variable | Field | Default |
/// |---|---|---|
/// | `OPEN_MATCH_FRONTEND_SERVICE` | `frontend_endpoint` | [`DEFAULT_FRONTEND`] |
/// | `ASSIGNMENT_TIMEOUT` (seconds) | `assignment_timeout` | 60 s |
/// | `BEARER_TOKEN` | `bearer_token` | required |
/// | `JWT_SECRET_KEY` | `jwt_secret` | required |
/// | `JWT_EXPIRATION_MINUTES` | `jwt_expiration` | 60 min |
/// | `PORT` | `bind_addr` = `0.0.0.0:<PORT>` | 8080 |
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub frontend_endpoint: String,
    /// How long each `FindMatch` waits for an assignment.
    pub assignment_timeout: Duration,
    /// Shared secret clients present in their handshake.
    pub bearer_token: String,
    /// A connection that sends nothing for this long is closed.
    pub idle_timeout: Duration,
    /// HMAC secret for the token in each `Matched` reply.
    pub jwt_secret: String,
    /// Lifetime of a match token.
    pub jwt_expiration: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            frontend_endpoint: DEFAULT_FRONTEND.to_string(),
            assignment_timeout: Duration::from_secs(60),
            bearer_token: String::new(),
            idle_timeout: Duration::from_secs(90),
            jwt_secret: String::new(),
            jwt_expiration: Duration::from_secs(60 * 60),
        }
    }
}

impl GatewayConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    /// [`MatchforgeError::Config`] if a variable is unparseable or
    /// `BEARER_TOKEN` or `JWT_SECRET_KEY` is missing.
    pub fn from_env() -> Result<Self, MatchforgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) but with a custom variable
    /// source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MatchforgeError> {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("OPEN_MATCH_FRONTEND_SERVICE") {
            config.frontend_endpoint = endpoint;
        }
        if let Some(raw) = lookup("ASSIGNMENT_TIMEOUT") {
            let secs: u64 = parse_var("ASSIGNMENT_TIMEOUT", &raw)?;
            if secs == 0 {
                return Err(MatchforgeError::Config(
                    "ASSIGNMENT_TIMEOUT must be positive".into(),
                ));
            }
            config.assignment_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("PORT") {
            let port: u16 = parse_var("PORT", &raw)?;
            config.bind_addr = format!("0.0.0.0:{port}");
        }
        if let Some(raw) = lookup("JWT_EXPIRATION_MINUTES") {
            let minutes: u64 = parse_var("JWT_EXPIRATION_MINUTES", &raw)?;
            if minutes == 0 {
                return Err(MatchforgeError::Config(
                    "JWT_EXPIRATION_MINUTES must be positive".into(),
                ));
            }
            config.jwt_expiration = Duration::from_secs(minutes.saturating_mul(60));
        }
        config.bearer_token = required(&lookup, "BEARER_TOKEN")?;
        config.jwt_secret = required(&lookup, "JWT_SECRET_KEY")?;

        Ok(config)
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, MatchforgeError> {
    lookup(key)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| MatchforgeError::Config(format!("{key} must be set")))
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, MatchforgeError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| MatchforgeError::Config(format!("{key}={raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_uses_defaults_with_only_secrets_set() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("BEARER_TOKEN", "s3cret"),
            ("JWT_SECRET_KEY", "jwt"),
        ]))
        .unwrap();

        assert_eq!(config.frontend_endpoint, DEFAULT_FRONTEND);
        assert_eq!(config.assignment_timeout, Duration::from_secs(60));
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.bearer_token, "s3cret");
        assert_eq!(config.jwt_secret, "jwt");
        assert_eq!(config.jwt_expiration, Duration::from_secs(3600));
    }

    #[test]
    fn test_from_lookup_reads_every_variable() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("OPEN_MATCH_FRONTEND_SERVICE", "localhost:50504"),
            ("ASSIGNMENT_TIMEOUT", "5"),
            ("BEARER_TOKEN", "t"),
            ("JWT_SECRET_KEY", "jwt"),
            ("JWT_EXPIRATION_MINUTES", "15"),
            ("PORT", "9000"),
        ]))
        .unwrap();

        assert_eq!(config.frontend_endpoint, "localhost:50504");
        assert_eq!(config.assignment_timeout, Duration::from_secs(5));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.jwt_expiration, Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_from_lookup_without_secrets_is_config_error() {
        for vars in [
            &[][..],
            &[("BEARER_TOKEN", "t")][..],
            &[("JWT_SECRET_KEY", "jwt")][..],
            &[("BEARER_TOKEN", "t"), ("JWT_SECRET_KEY", "")][..],
        ] {
            let result = GatewayConfig::from_lookup(lookup(vars));
            assert!(matches!(result, Err(MatchforgeError::Config(_))), "{vars:?}");
        }
    }

    #[test]
    fn test_from_lookup_rejects_unparseable_values() {
        for (key, value) in [
            ("ASSIGNMENT_TIMEOUT", "soon"),
            ("ASSIGNMENT_TIMEOUT", "0"),
            ("PORT", "99999"),
            ("JWT_EXPIRATION_MINUTES", "0"),
            ("JWT_EXPIRATION_MINUTES", "an hour"),
        ] {
            let result = GatewayConfig::from_lookup(lookup(&[
                ("BEARER_TOKEN", "t"),
                ("JWT_SECRET_KEY", "jwt"),
                (key, value),
            ]));
            assert!(
                matches!(result, Err(MatchforgeError::Config(_))),
                "{key}={value} should be rejected"
            );
        }
    }
}
