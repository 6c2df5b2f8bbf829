//! Per-connection handler: handshake, auth, and matchmaking requests.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Upgrade to WebSocket, receive Handshake, validate version
//!   2. Authenticate token, send HandshakeAck
//!   3. Loop: receive envelopes, and deliver matchmaking outcomes
//!
//! The handler task is the caller context of its connection's matchmaking
//! sessions. Session notifications land in a [`CallerQueue`] that the
//! loop drains alongside incoming frames, so replies are always written
//! from this task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use matchforge_frontend::{Connector, Ticket, TicketId};
use matchforge_protocol::{
    ClientId, Codec, Envelope, MatchMessage, Payload, PlayerInfo, ProtocolError, ServerInfo,
    SystemMessage,
};
use matchforge_session::{
    caller_queue, CallerQueue, Callbacks, FindMatch, Matchmaker, Outcome, QueueDispatcher,
    SessionHandle,
};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::server::{GatewayState, PROTOCOL_VERSION};
use crate::transport::{TransportError, WebSocketConnection};
use crate::{Authenticator, MatchforgeError};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tag every gateway ticket carries.
const MATCH_TAG: &str = "mode.session";

const TIMEOUT_MESSAGE: &str = "No match found within timeout period";

/// A matchmaking session in flight for this connection.
///
/// Dropping it cancels the session, which still deletes its ticket in
/// the background. Cancelling a finished session is a no-op.
struct ActiveMatch {
    handle: SessionHandle,
    player: PlayerInfo,
}

impl Drop for ActiveMatch {
    fn drop(&mut self) {
        self.handle.cancel();
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, A>(
    stream: TcpStream,
    peer: SocketAddr,
    state: Arc<GatewayState<C, A>>,
) -> Result<(), MatchforgeError>
where
    C: Connector + Clone,
    A: Authenticator,
{
    let conn = WebSocketConnection::upgrade(stream, peer).await?;
    let conn_id = conn.id();
    let start = Instant::now();

    let client_id = perform_handshake(&conn, &state, &start).await?;
    tracing::info!(%conn_id, %client_id, peer = %conn.peer(), "client authenticated");

    let (dispatcher, queue) = caller_queue();
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
    let mut handler = ConnectionHandler {
        matchmaker: Matchmaker::new(state.connector.clone(), dispatcher),
        conn,
        state,
        client_id,
        start,
        seq: 1,
        queue,
        outcome_tx,
        outcome_rx,
        active: None,
    };
    handler.run().await
}

/// Receives the Handshake, validates it, authenticates, and sends the Ack.
async fn perform_handshake<C, A>(
    conn: &WebSocketConnection,
    state: &GatewayState<C, A>,
    start: &Instant,
) -> Result<ClientId, MatchforgeError>
where
    C: Connector,
    A: Authenticator,
{
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => return Err(TransportError::Closed.into()),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let envelope: Envelope = match state.codec.decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            send_error(conn, &state.codec, 400, "malformed handshake", 0, start).await?;
            return Err(e.into());
        }
    };

    let (version, token) = match envelope.payload {
        Payload::System(SystemMessage::Handshake { version, token }) => (version, token),
        _ => {
            send_error(conn, &state.codec, 400, "expected Handshake", 0, start).await?;
            return Err(
                ProtocolError::InvalidMessage("first message must be Handshake".into()).into(),
            );
        }
    };

    if version != PROTOCOL_VERSION {
        let message = format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        send_error(conn, &state.codec, 400, &message, 0, start).await?;
        return Err(ProtocolError::InvalidMessage(message).into());
    }

    let client_id = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(client_id) => client_id,
        Err(e) => {
            tracing::info!(conn_id = %conn.id(), error = %e, "handshake rejected");
            send_error(conn, &state.codec, 401, "Unauthorized", 0, start).await?;
            return Err(e);
        }
    };

    let ack = Payload::System(SystemMessage::HandshakeAck {
        client_id,
        server_time: elapsed_ms(start),
    });
    send_envelope(conn, &state.codec, 0, start, ack).await?;

    Ok(client_id)
}

// ---------------------------------------------------------------------------
// ConnectionHandler: the authenticated message loop
// ---------------------------------------------------------------------------

struct ConnectionHandler<C: Connector, A: Authenticator> {
    conn: WebSocketConnection,
    state: Arc<GatewayState<C, A>>,
    client_id: ClientId,
    start: Instant,
    seq: u64,
    matchmaker: Matchmaker<C, QueueDispatcher>,
    /// Session notifications, run on this task.
    queue: CallerQueue,
    /// Where those notifications put the outcome.
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    outcome_rx: mpsc::UnboundedReceiver<Outcome>,
    active: Option<ActiveMatch>,
}

impl<C, A> ConnectionHandler<C, A>
where
    C: Connector + Clone,
    A: Authenticator,
{
    async fn run(&mut self) -> Result<(), MatchforgeError> {
        let client_id = self.client_id;
        let idle_timeout = self.state.config.idle_timeout;

        loop {
            tokio::select! {
                received = tokio::time::timeout(idle_timeout, self.conn.recv()) => {
                    let data = match received {
                        Ok(Ok(Some(data))) => data,
                        Ok(Ok(None)) => {
                            tracing::info!(%client_id, "connection closed cleanly");
                            break;
                        }
                        Ok(Err(e)) => {
                            tracing::debug!(%client_id, error = %e, "recv error");
                            break;
                        }
                        Err(_) => {
                            tracing::info!(%client_id, "connection idle, closing");
                            break;
                        }
                    };

                    let envelope: Envelope = match self.state.codec.decode(&data) {
                        Ok(envelope) => envelope,
                        Err(e) => {
                            tracing::debug!(%client_id, error = %e, "failed to decode envelope");
                            continue;
                        }
                    };

                    let should_close = match envelope.payload {
                        Payload::System(msg) => self.handle_system_message(msg).await?,
                        Payload::Match(msg) => {
                            self.handle_match_message(msg).await?;
                            false
                        }
                    };
                    if should_close {
                        break;
                    }
                }

                ran = self.queue.run_next() => {
                    // The matchmaker holds the dispatcher, so the queue
                    // only closes if the handler itself is torn down.
                    if !ran {
                        break;
                    }
                    while let Ok(outcome) = self.outcome_rx.try_recv() {
                        self.finish_match(outcome).await?;
                    }
                }
            }
        }

        if self.active.take().is_some() {
            tracing::info!(%client_id, "connection closed during matchmaking, cancelled");
        }
        Ok(())
    }

    /// Handles a system message. Returns `true` if the connection should
    /// close.
    async fn handle_system_message(&mut self, msg: SystemMessage) -> Result<bool, MatchforgeError> {
        match msg {
            SystemMessage::Heartbeat { client_time } => {
                let server_time = elapsed_ms(&self.start);
                self.send(Payload::System(SystemMessage::HeartbeatAck {
                    client_time,
                    server_time,
                }))
                .await?;
            }

            SystemMessage::Disconnect { reason } => {
                tracing::info!(client_id = %self.client_id, %reason, "client disconnected");
                if let Err(e) = self.conn.close().await {
                    tracing::debug!(client_id = %self.client_id, error = %e, "close failed");
                }
                return Ok(true);
            }

            _ => {
                tracing::debug!(client_id = %self.client_id, "ignoring unexpected system message");
            }
        }

        Ok(false)
    }

    async fn handle_match_message(&mut self, msg: MatchMessage) -> Result<(), MatchforgeError> {
        match msg {
            MatchMessage::FindMatch { region } => self.start_match(region).await,

            MatchMessage::CancelMatch => {
                if let Some(active) = &self.active {
                    tracing::info!(client_id = %self.client_id, "cancelling matchmaking");
                    // MatchCancelled is sent once the session reports back.
                    active.handle.cancel();
                    return Ok(());
                }
                self.send_error(404, "no matchmaking in progress").await
            }

            _ => {
                tracing::debug!(client_id = %self.client_id, "ignoring server-only match message");
                Ok(())
            }
        }
    }

    async fn start_match(&mut self, region: String) -> Result<(), MatchforgeError> {
        if self.active.is_some() {
            return self.send_error(409, "matchmaking already in progress").await;
        }

        let (ticket, player) = search_profile(&mut rand::rng(), &region);
        let config = &self.state.config;
        let request = FindMatch::new(config.frontend_endpoint.clone(), config.assignment_timeout)
            .ticket(ticket);

        let tx = self.outcome_tx.clone();
        let callbacks = Callbacks::new().on_outcome(move |outcome| {
            let _ = tx.send(outcome);
        });

        match self.matchmaker.start(request, callbacks) {
            Ok(handle) => {
                tracing::info!(client_id = %self.client_id, %region, "matchmaking started");
                self.active = Some(ActiveMatch { handle, player });
                Ok(())
            }
            Err(e) => {
                tracing::error!(client_id = %self.client_id, error = %e, "could not start matchmaking");
                self.send_error(500, &e.to_string()).await
            }
        }
    }

    /// Turns a session outcome into the reply for the client.
    async fn finish_match(&mut self, outcome: Outcome) -> Result<(), MatchforgeError> {
        let Some(active) = self.active.take() else {
            tracing::debug!(client_id = %self.client_id, %outcome, "outcome without active match");
            return Ok(());
        };
        let ticket_id = active.handle.ticket_id().map(TicketId::into_inner);

        let payload = match outcome {
            Outcome::Success(connection) => {
                let ticket_id = ticket_id.unwrap_or_default();
                let server = ServerInfo::from_connection(&connection);
                match self.state.tokens.issue(&ticket_id, &server, &active.player) {
                    Ok(jwt) => Payload::Match(MatchMessage::Matched {
                        ticket_id,
                        server,
                        player: active.player.clone(),
                        jwt,
                    }),
                    Err(e) => {
                        tracing::error!(client_id = %self.client_id, %ticket_id, error = %e, "could not sign match token");
                        Payload::System(SystemMessage::Error {
                            code: 500,
                            message: e.to_string(),
                        })
                    }
                }
            }
            Outcome::Timeout => Payload::Match(MatchMessage::MatchTimeout {
                ticket_id: ticket_id.unwrap_or_default(),
                message: TIMEOUT_MESSAGE.to_string(),
            }),
            Outcome::Failure(message) => Payload::System(SystemMessage::Error { code: 500, message }),
            Outcome::Cancelled => Payload::Match(MatchMessage::MatchCancelled { ticket_id }),
        };
        self.send(payload).await
    }

    async fn send(&mut self, payload: Payload) -> Result<(), MatchforgeError> {
        let seq = next_seq(&mut self.seq);
        send_envelope(&self.conn, &self.state.codec, seq, &self.start, payload).await
    }

    async fn send_error(&mut self, code: u16, message: &str) -> Result<(), MatchforgeError> {
        let seq = next_seq(&mut self.seq);
        send_error(&self.conn, &self.state.codec, code, message, seq, &self.start).await
    }
}

/// Builds the ticket template and the matching player details for a
/// `FindMatch` in `region`: skill uniform in `[0, 2)`, latency
/// exponentially distributed with mean 50.
fn search_profile<R: Rng>(rng: &mut R, region: &str) -> (Ticket, PlayerInfo) {
    let skill: f64 = rng.random_range(0.0..2.0);
    let latency = -50.0 * (1.0 - rng.random::<f64>()).ln();

    let ticket = Ticket::new()
        .with_tag(MATCH_TAG)
        .with_double_arg("skill", skill)
        .with_double_arg("latency", latency)
        .with_string_arg("region", region);
    let player = PlayerInfo {
        skill,
        latency,
        region: region.to_string(),
    };
    (ticket, player)
}

async fn send_envelope(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    seq: u64,
    start: &Instant,
    payload: Payload,
) -> Result<(), MatchforgeError> {
    let envelope = Envelope {
        seq,
        timestamp: elapsed_ms(start),
        payload,
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Sends a SystemMessage::Error envelope to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
    seq: u64,
    start: &Instant,
) -> Result<(), MatchforgeError> {
    let payload = Payload::System(SystemMessage::Error {
        code,
        message: message.to_string(),
    });
    send_envelope(conn, codec, seq, start, payload).await
}

fn elapsed_ms(start: &Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn test_search_profile_fills_ticket_and_player_consistently() {
        let mut rng = StdRng::seed_from_u64(7);
        let (ticket, player) = search_profile(&mut rng, "asia-northeast1");

        let fields = &ticket.search_fields;
        assert_eq!(fields.tags, vec![MATCH_TAG.to_string()]);
        assert_eq!(fields.double_args["skill"], player.skill);
        assert_eq!(fields.double_args["latency"], player.latency);
        assert_eq!(fields.string_args["region"], "asia-northeast1");
        assert_eq!(player.region, "asia-northeast1");
    }

    #[test]
    fn test_search_profile_values_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let (_, player) = search_profile(&mut rng, "eu");
            assert!((0.0..2.0).contains(&player.skill), "skill {}", player.skill);
            assert!(player.latency >= 0.0 && player.latency.is_finite());
        }
    }

    #[test]
    fn test_next_seq_increments() {
        let mut seq = 1;
        assert_eq!(next_seq(&mut seq), 1);
        assert_eq!(next_seq(&mut seq), 2);
        assert_eq!(seq, 3);
    }
}
