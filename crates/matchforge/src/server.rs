//! `MatchforgeServer` builder and accept loop.
//!
//! Ties the layers together: WebSocket transport → protocol → per-connection
//! handler → matchmaking sessions against the frontend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use matchforge_frontend::Connector;
use matchforge_protocol::JsonCodec;

use crate::handler::handle_connection;
use crate::token::MatchTokenIssuer;
use crate::transport::WebSocketListener;
use crate::{Authenticator, GatewayConfig, MatchforgeError};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared by every connection handler task.
pub(crate) struct GatewayState<C, A> {
    pub(crate) config: GatewayConfig,
    pub(crate) connector: C,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    pub(crate) tokens: MatchTokenIssuer,
}

/// Builder for configuring and starting a gateway.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use matchforge::prelude::*;
///
/// # async fn demo() -> Result<(), MatchforgeError> {
/// let server = MatchforgeServer::builder()
///     .bind("0.0.0.0:8080")
///     .frontend("localhost:50504")
///     .assignment_timeout(Duration::from_secs(60))
///     .jwt_secret("jwt-secret")
///     .build(GrpcConnector::new(), BearerAuthenticator::new("secret"))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct MatchforgeServerBuilder {
    config: GatewayConfig,
}

impl MatchforgeServerBuilder {
    /// Creates a builder with [`GatewayConfig::default`] settings, bound
    /// to `127.0.0.1:8080`.
    pub fn new() -> Self {
        Self {
            config: GatewayConfig {
                bind_addr: "127.0.0.1:8080".to_string(),
                ..GatewayConfig::default()
            },
        }
    }

    /// Replaces all settings at once, e.g. with
    /// [`GatewayConfig::from_env`].
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the Open Match frontend address.
    pub fn frontend(mut self, endpoint: &str) -> Self {
        self.config.frontend_endpoint = endpoint.to_string();
        self
    }

    /// Sets how long each `FindMatch` waits for an assignment.
    pub fn assignment_timeout(mut self, timeout: Duration) -> Self {
        self.config.assignment_timeout = timeout;
        self
    }

    /// Sets how long a silent connection stays open.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Sets the secret that signs the token in each `Matched` reply.
    pub fn jwt_secret(mut self, secret: &str) -> Self {
        self.config.jwt_secret = secret.to_string();
        self
    }

    /// Sets how long a match token stays valid.
    pub fn jwt_expiration(mut self, ttl: Duration) -> Self {
        self.config.jwt_expiration = ttl;
        self
    }

    /// Binds the listener. Frontend clients come from `connector`;
    /// handshake tokens are checked by `auth`.
    ///
    /// # Errors
    /// [`MatchforgeError::Config`] without a JWT secret, or a transport
    /// error if binding fails.
    pub async fn build<C, A>(
        self,
        connector: C,
        auth: A,
    ) -> Result<MatchforgeServer<C, A>, MatchforgeError>
    where
        C: Connector + Clone,
        A: Authenticator,
    {
        if self.config.jwt_secret.is_empty() {
            return Err(MatchforgeError::Config("a JWT secret is required".into()));
        }
        let listener = WebSocketListener::bind(&self.config.bind_addr).await?;

        let tokens = MatchTokenIssuer::new(&self.config.jwt_secret, self.config.jwt_expiration);
        let state = Arc::new(GatewayState {
            config: self.config,
            tokens,
            connector,
            auth,
            codec: JsonCodec,
        });

        Ok(MatchforgeServer { listener, state })
    }
}

impl Default for MatchforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound gateway. Call [`run`](Self::run) to start accepting clients.
pub struct MatchforgeServer<C, A> {
    listener: WebSocketListener,
    state: Arc<GatewayState<C, A>>,
}

impl MatchforgeServer<(), ()> {
    /// Creates a new builder.
    pub fn builder() -> MatchforgeServerBuilder {
        MatchforgeServerBuilder::new()
    }
}

impl<C, A> MatchforgeServer<C, A>
where
    C: Connector + Clone,
    A: Authenticator,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, MatchforgeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the task is dropped or the process exits.
    pub async fn run(self) -> Result<(), MatchforgeError> {
        tracing::info!(
            frontend = %self.state.config.frontend_endpoint,
            assignment_timeout_s = self.state.config.assignment_timeout.as_secs(),
            "Matchforge gateway running"
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, state).await {
                            tracing::debug!(%peer, error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
