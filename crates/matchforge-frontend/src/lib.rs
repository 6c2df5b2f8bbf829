//! Matchmaking frontend contract for Matchforge.
//!
//! The matchmaking service (ticket storage, pool evaluation, assignment
//! production) lives elsewhere. This crate describes the three calls a
//! client makes against it and provides one real implementation:
//!
//! | Call | Request | Response |
//! |---|---|---|
//! | `CreateTicket` | [`Ticket`] template | [`TicketId`] |
//! | `WatchAssignments` | [`TicketId`] + deadline | stream of [`AssignmentUpdate`] |
//! | `DeleteTicket` | [`TicketId`] | nothing |
//!
//! # Feature Flags
//!
//! - `grpc` (default): [`GrpcConnector`], a client for the Open Match
//!   `openmatch.FrontendService` via `tonic`.

mod error;
#[cfg(feature = "grpc")]
mod grpc;
mod types;

pub use error::{FrontendError, StatusCode};
#[cfg(feature = "grpc")]
pub use grpc::{GrpcConnector, GrpcFrontend};
pub use types::{Assignment, AssignmentUpdate, SearchFields, Ticket, TicketId};

use std::future::Future;
use std::time::Duration;

use futures_util::stream::BoxStream;

/// The server-streaming response of `WatchAssignments`.
///
/// Dropping the stream cancels the call on the service side, which is
/// how a session stops watching once it has its assignment.
pub type AssignmentStream =
    BoxStream<'static, Result<AssignmentUpdate, FrontendError>>;

/// Opens clients for a frontend endpoint.
///
/// A session calls [`connect`](Connector::connect) once, from its
/// background task, with the endpoint the caller passed to `start`.
/// Implementations should connect lazily where they can: an unreachable
/// service then shows up as a `CreateTicket` failure, which is where the
/// caller expects it.
pub trait Connector: Send + Sync + 'static {
    /// The client produced for an endpoint.
    type Client: FrontendClient;

    /// Builds a client for `endpoint` (e.g. `localhost:50504`).
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Self::Client, FrontendError>> + Send;
}

/// The three frontend calls a matchmaking session makes.
///
/// Calls on one client are never issued concurrently by a session:
/// create, then watch, then delete.
pub trait FrontendClient: Send + Sync + 'static {
    /// Registers a ticket and returns the id the service assigned.
    fn create_ticket(
        &self,
        ticket: Ticket,
    ) -> impl Future<Output = Result<TicketId, FrontendError>> + Send;

    /// Opens the assignment stream for a ticket.
    ///
    /// `timeout` is the time left until the session's deadline; the
    /// service should end the stream with
    /// [`StatusCode::DeadlineExceeded`] once it passes. Callers enforce
    /// the deadline on their side as well.
    fn watch_assignments(
        &self,
        ticket_id: &TicketId,
        timeout: Duration,
    ) -> impl Future<Output = Result<AssignmentStream, FrontendError>> + Send;

    /// Deletes a ticket.
    fn delete_ticket(
        &self,
        ticket_id: &TicketId,
    ) -> impl Future<Output = Result<(), FrontendError>> + Send;
}
