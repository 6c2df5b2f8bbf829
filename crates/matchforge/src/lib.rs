//! # Matchforge
//!
//! A WebSocket matchmaking gateway in front of an Open Match frontend.
//!
//! Thin clients (browsers, game builds without a gRPC stack) connect
//! over WebSocket, authenticate with a bearer token, and send
//! `FindMatch`. The gateway registers a ticket, waits for an assignment
//! through a [`matchforge_session`] session, always deletes the ticket,
//! and replies with `Matched` (carrying a signed match token),
//! `MatchTimeout`, `MatchCancelled`, or an `Error`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use matchforge::prelude::*;
//!
//! # async fn demo() -> Result<(), MatchforgeError> {
//! let config = GatewayConfig::from_env()?;
//! let auth = BearerAuthenticator::new(config.bearer_token.clone());
//! let server = MatchforgeServer::builder()
//!     .config(config)
//!     .build(GrpcConnector::new(), auth)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod config;
mod error;
mod handler;
mod server;
mod token;
pub mod transport;

pub use auth::{Authenticator, BearerAuthenticator};
pub use config::{GatewayConfig, DEFAULT_FRONTEND};
pub use error::MatchforgeError;
pub use server::{MatchforgeServer, MatchforgeServerBuilder, PROTOCOL_VERSION};
pub use token::{MatchClaims, MatchTokenIssuer};

/// Installs a `tracing` subscriber that honours `RUST_LOG`, defaulting
/// to `info`. Safe to call more than once; later calls do nothing.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod prelude {
    //! Everything needed to run a gateway or talk to one.

    pub use matchforge_frontend::{Connector, FrontendClient, GrpcConnector, Ticket};
    pub use matchforge_protocol::{
        ClientId, Codec, Envelope, JsonCodec, MatchMessage, Payload, PlayerInfo, ServerInfo,
        SystemMessage,
    };
    pub use matchforge_session::{
        caller_queue, CallerQueue, Callbacks, FindMatch, Matchmaker, Outcome, QueueDispatcher,
        SessionHandle,
    };

    pub use crate::{
        Authenticator, BearerAuthenticator, GatewayConfig, MatchClaims, MatchforgeError,
        MatchforgeServer, MatchforgeServerBuilder, PROTOCOL_VERSION,
    };
}
