//! Message types for the gateway's wire format.
//!
//! Everything here travels on the wire: it gets serialized, sent over
//! the WebSocket, and deserialized on the other side.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identifies an authenticated gateway client.
///
/// Serialized as a plain number (`#[serde(transparent)]`), so
/// `ClientId(42)` is `42` in JSON, not `{"0":42}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Match details
// ---------------------------------------------------------------------------

/// Where the matched game server lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Host part of the connection string.
    pub ip: String,
    /// Port part of the connection string; empty when there was none.
    pub port: String,
    /// The assignment's connection string, unmodified.
    pub connection: String,
}

impl ServerInfo {
    /// Splits an assignment connection string on its first `:`.
    ///
    /// ```rust
    /// use matchforge_protocol::ServerInfo;
    ///
    /// let info = ServerInfo::from_connection("10.0.0.5:7777");
    /// assert_eq!(info.ip, "10.0.0.5");
    /// assert_eq!(info.port, "7777");
    /// ```
    pub fn from_connection(connection: &str) -> Self {
        let (ip, port) = connection.split_once(':').unwrap_or((connection, ""));
        Self {
            ip: ip.to_string(),
            port: port.to_string(),
            connection: connection.to_string(),
        }
    }
}

/// The search attributes the gateway registered for this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub skill: f64,
    pub latency: f64,
    pub region: String,
}

// ---------------------------------------------------------------------------
// SystemMessage: connection plumbing
// ---------------------------------------------------------------------------

/// Connection-level messages: handshake, keep-alive, disconnect, errors.
///
/// Internally tagged (`#[serde(tag = "type")]`), so a heartbeat is
/// `{ "type": "Heartbeat", "client_time": 5000 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server, first message on every connection.
    /// `version` must equal the gateway's protocol version; `token` is
    /// checked by the gateway's authenticator.
    Handshake {
        version: u32,
        token: Option<String>,
    },

    /// Server → Client: handshake accepted.
    HandshakeAck {
        client_id: ClientId,
        server_time: u64,
    },

    /// Either direction: the connection is being closed.
    Disconnect { reason: String },

    /// Client → Server keep-alive; `client_time` is echoed back.
    Heartbeat { client_time: u64 },

    /// Server → Client keep-alive reply.
    HeartbeatAck {
        client_time: u64,
        server_time: u64,
    },

    /// Server → Client. `code` follows HTTP conventions: 400 bad
    /// request, 401 unauthorized, 409 conflict, 500 matchmaking failed.
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// MatchMessage: matchmaking requests and results
// ---------------------------------------------------------------------------

/// Matchmaking messages. Internally tagged like [`SystemMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MatchMessage {
    /// Client → Server: find me a match in `region`.
    FindMatch {
        #[serde(default)]
        region: String,
    },

    /// Client → Server: stop the matchmaking in flight.
    CancelMatch,

    /// Server → Client: a game server was assigned. `jwt` is a signed
    /// token over the same data, for the game server to verify.
    Matched {
        ticket_id: String,
        server: ServerInfo,
        player: PlayerInfo,
        jwt: String,
    },

    /// Server → Client: the assignment deadline passed.
    MatchTimeout { ticket_id: String, message: String },

    /// Server → Client: matchmaking stopped after a `CancelMatch`.
    /// `ticket_id` is absent if no ticket had been created yet.
    MatchCancelled { ticket_id: Option<String> },
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

/// What an envelope carries.
///
/// Adjacently tagged (`tag = "type", content = "data"`):
/// `{ "type": "Match", "data": { "type": "CancelMatch" } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),
    Match(MatchMessage),
}

/// The top-level message wrapper. Every frame on the wire is one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-sender sequence number.
    pub seq: u64,

    /// Milliseconds since the sender's connection started.
    pub timestamp: u64,

    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&ClientId(42)).unwrap(), "42");
        assert_eq!(ClientId(7).to_string(), "C-7");
    }

    #[test]
    fn test_server_info_splits_on_first_colon() {
        let info = ServerInfo::from_connection("10.0.0.5:7777");
        assert_eq!(info.ip, "10.0.0.5");
        assert_eq!(info.port, "7777");
        assert_eq!(info.connection, "10.0.0.5:7777");
    }

    #[test]
    fn test_server_info_without_port_leaves_port_empty() {
        let info = ServerInfo::from_connection("game-server.local");
        assert_eq!(info.ip, "game-server.local");
        assert_eq!(info.port, "");
    }

    #[test]
    fn test_server_info_keeps_rest_after_first_colon() {
        let info = ServerInfo::from_connection("host:1:2");
        assert_eq!(info.ip, "host");
        assert_eq!(info.port, "1:2");
    }

    #[test]
    fn test_handshake_json_format() {
        let msg = SystemMessage::Handshake {
            version: 1,
            token: Some("secret".into()),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Handshake");
        assert_eq!(json["version"], 1);
        assert_eq!(json["token"], "secret");
    }

    #[test]
    fn test_handshake_ack_json_format() {
        let msg = SystemMessage::HandshakeAck {
            client_id: ClientId(9),
            server_time: 150,
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "HandshakeAck");
        assert_eq!(json["client_id"], 9);
    }

    #[test]
    fn test_matched_json_format() {
        let msg = MatchMessage::Matched {
            ticket_id: "t1".into(),
            server: ServerInfo::from_connection("10.0.0.5:7777"),
            player: PlayerInfo {
                skill: 1.5,
                latency: 42.0,
                region: "us-west1".into(),
            },
            jwt: "header.claims.sig".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "Matched");
        assert_eq!(json["jwt"], "header.claims.sig");
        assert_eq!(json["ticket_id"], "t1");
        assert_eq!(json["server"]["ip"], "10.0.0.5");
        assert_eq!(json["server"]["port"], "7777");
        assert_eq!(json["player"]["skill"], 1.5);
        assert_eq!(json["player"]["region"], "us-west1");
    }

    #[test]
    fn test_find_match_region_defaults_to_empty() {
        let msg: MatchMessage = serde_json::from_str(r#"{"type":"FindMatch"}"#).unwrap();
        assert_eq!(
            msg,
            MatchMessage::FindMatch {
                region: String::new()
            }
        );
    }

    #[test]
    fn test_payload_is_adjacently_tagged() {
        let payload = Payload::Match(MatchMessage::CancelMatch);
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["type"], "Match");
        assert_eq!(json["data"]["type"], "CancelMatch");
    }

    #[test]
    fn test_envelope_decodes_from_client_json() {
        let json = r#"{
            "seq": 4,
            "timestamp": 100,
            "payload": { "type": "Match", "data": { "type": "FindMatch", "region": "eu" } }
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();

        assert_eq!(envelope.seq, 4);
        assert_eq!(
            envelope.payload,
            Payload::Match(MatchMessage::FindMatch {
                region: "eu".into()
            })
        );
    }

    #[test]
    fn test_match_cancelled_without_ticket_is_null() {
        let msg = MatchMessage::MatchCancelled { ticket_id: None };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json["ticket_id"].is_null());
    }

    #[test]
    fn test_decode_wrong_shape_returns_error() {
        let result: Result<Envelope, _> = serde_json::from_str(r#"{"name": "hello"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_unknown_message_type_returns_error() {
        let result: Result<MatchMessage, _> =
            serde_json::from_str(r#"{"type": "FlyToMoon", "speed": 9000}"#);
        assert!(result.is_err());
    }
}
