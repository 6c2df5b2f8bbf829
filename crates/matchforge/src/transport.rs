//! WebSocket transport built on `tokio-tungstenite`.
//!
//! The listener only accepts TCP; the WebSocket upgrade happens in the
//! connection's own task so a slow client can't stall the accept loop.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Binding the listening socket failed.
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    /// Accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The WebSocket upgrade handshake failed.
    #[error("websocket upgrade failed: {0}")]
    Upgrade(#[source] tungstenite::Error),

    /// Writing a frame to the peer failed.
    #[error("send failed: {0}")]
    Send(#[source] tungstenite::Error),

    /// Reading a frame from the peer failed.
    #[error("receive failed: {0}")]
    Receive(#[source] tungstenite::Error),

    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,
}

/// Opaque identifier for a connection, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Listens for incoming TCP connections.
pub struct WebSocketListener {
    listener: TcpListener,
}

impl WebSocketListener {
    /// Binds to `addr`. Use port `0` to let the OS pick one.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::Bind)?;
        tracing::info!(addr, "WebSocket listener bound");
        Ok(Self { listener })
    }

    /// The address actually bound, useful after binding port `0`.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener.local_addr().map_err(TransportError::Bind)
    }

    /// Waits for the next TCP connection. The WebSocket upgrade is left
    /// to [`WebSocketConnection::upgrade`].
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), TransportError> {
        self.listener.accept().await.map_err(TransportError::Accept)
    }
}

/// A single upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    ws: Mutex<WsStream>,
}

impl WebSocketConnection {
    /// Performs the server side of the WebSocket handshake.
    pub async fn upgrade(stream: TcpStream, peer: SocketAddr) -> Result<Self, TransportError> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(TransportError::Upgrade)?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %peer, "accepted WebSocket connection");

        Ok(Self {
            id,
            peer,
            ws: Mutex::new(ws),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sends one binary frame.
    pub async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = Message::Binary(data.to_vec().into());
        self.ws.lock().await.send(msg).await.map_err(TransportError::Send)
    }

    /// Receives the next text or binary frame.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    /// Cancel-safe: dropping the future loses no frame.
    pub async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            let msg = self.ws.lock().await.next().await;
            match msg {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.into())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => return Err(TransportError::Receive(e)),
            }
        }
    }

    /// Sends a close frame.
    pub async fn close(&self) -> Result<(), TransportError> {
        match self.ws.lock().await.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(TransportError::Send(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique_and_display_with_prefix() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn-"));
    }

    #[tokio::test]
    async fn test_bind_port_zero_reports_real_port() {
        let listener = WebSocketListener::bind("127.0.0.1:0").await.unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_invalid_address_is_bind_error() {
        let result = WebSocketListener::bind("not an address").await;
        assert!(matches!(result, Err(TransportError::Bind(_))));
    }
}
