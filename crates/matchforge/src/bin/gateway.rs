//! Gateway binary: configuration from the environment, gRPC frontend,
//! bearer-token auth.

use matchforge::prelude::*;

#[tokio::main]
async fn main() -> Result<(), MatchforgeError> {
    matchforge::init_tracing();

    let config = GatewayConfig::from_env()?;
    let auth = BearerAuthenticator::new(config.bearer_token.clone());
    let server = MatchforgeServer::builder()
        .config(config)
        .build(GrpcConnector::new(), auth)
        .await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
