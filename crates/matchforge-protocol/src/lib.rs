//! Wire protocol for the Matchforge gateway.
//!
//! This crate defines what gateway clients and the gateway server say to
//! each other over a WebSocket:
//!
//! - **Types** ([`Envelope`], [`SystemMessage`], [`MatchMessage`]):
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding
//!   or decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between the socket (raw bytes) and the
//! gateway's connection handler. It knows nothing about tickets or the
//! frontend service; it only serializes and deserializes messages.
//!
//! ```text
//! WebSocket (bytes) → Protocol (Envelope) → Gateway handler → Matchmaking session
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientId, Envelope, MatchMessage, Payload, PlayerInfo, ServerInfo,
    SystemMessage,
};
