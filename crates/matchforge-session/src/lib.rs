//! Matchmaking sessions for Matchforge.
//!
//! A session is one attempt at getting matched: register a ticket with
//! the frontend, wait (with a deadline) for the service to assign a
//! match, delete the ticket, and tell the caller how it went. Exactly
//! once, and always with the ticket cleaned up.
//!
//! 1. **Request**: [`FindMatch`] (endpoint, timeout, ticket template),
//!    validated synchronously by [`Matchmaker::start`].
//! 2. **Protocol**: runs on a background Tokio task against any
//!    [`Connector`](matchforge_frontend::Connector).
//! 3. **Notification**: one [`Outcome`], routed to the matching
//!    [`Callbacks`] handler on the caller's context via a
//!    [`Dispatcher`] (see [`caller_queue`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Gateway / game client (above)  ← starts sessions, receives outcomes
//!     ↕
//! Session Layer (this crate)     ← create → watch → delete, one outcome
//!     ↕
//! Frontend Layer (below)         ← CreateTicket / WatchAssignments / DeleteTicket
//! ```
//!
//! There is no retry anywhere in this crate. A session that fails is
//! finished; whether to try again is the caller's decision.

mod dispatch;
mod error;
mod outcome;
mod request;
mod session;

pub use dispatch::{caller_queue, CallerQueue, Dispatcher, QueueDispatcher, Task};
pub use error::SessionError;
pub use outcome::{Callbacks, Outcome};
pub use request::FindMatch;
pub use session::{Matchmaker, SessionHandle, SessionState};
