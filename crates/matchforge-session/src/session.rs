//! The matchmaking session: one ticket, one terminal outcome.
//!
//! A session drives a single ticket through the frontend and reports
//! exactly one [`Outcome`]:
//!
//! ```text
//!   Idle ──start──→ CreatingTicket ──ok──→ WatchingAssignments ──→ DeletingTicket ──→ Terminal
//!                         │                                                              ↑
//!                         └──────────────────── create failed (no ticket) ───────────────┘
//! ```
//!
//! Once a ticket exists it is deleted on every exit path: assignment,
//! deadline, stream error, cancellation, even a panic inside the
//! frontend client. A failed delete is logged and otherwise ignored;
//! it never changes the outcome.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use matchforge_frontend::{Connector, FrontendClient, FrontendError, TicketId};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::{Callbacks, Dispatcher, FindMatch, Outcome, SessionError};

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where a session is in its lifecycle.
///
/// States are only ever entered in declaration order, so they compare
/// with `<`: a session that is `>= DeletingTicket` will never open
/// another watch stream. States may be skipped (a failed create jumps
/// straight to `Terminal`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Created, background task not yet running.
    Idle,
    /// Connecting and issuing `CreateTicket`.
    CreatingTicket,
    /// Reading the `WatchAssignments` stream.
    WatchingAssignments,
    /// Issuing `DeleteTicket`.
    DeletingTicket,
    /// The outcome has been decided and handed to the dispatcher.
    Terminal,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CreatingTicket => "creating_ticket",
            Self::WatchingAssignments => "watching_assignments",
            Self::DeletingTicket => "deleting_ticket",
            Self::Terminal => "terminal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Shared state between the handle and the background task
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Progress {
    state: SessionState,
    ticket_id: Option<TicketId>,
    outcome: Option<Outcome>,
}

/// Owned by the [`SessionHandle`]; the background task only holds a
/// `Weak` to it, so dropping the handle tears the session's caller side
/// down while the protocol still runs to completion (and cleans up).
struct Shared {
    progress: Mutex<Progress>,
    /// `Some` until the terminal notification has been delivered.
    callbacks: Mutex<Option<Callbacks>>,
}

impl Shared {
    fn new(callbacks: Callbacks) -> Self {
        Self {
            progress: Mutex::new(Progress {
                state: SessionState::Idle,
                ticket_id: None,
                outcome: None,
            }),
            callbacks: Mutex::new(Some(callbacks)),
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, next: SessionState) {
        let mut progress = self.progress();
        debug_assert!(
            next > progress.state,
            "session state must move forward: {} -> {next}",
            progress.state
        );
        if next > progress.state {
            progress.state = next;
        }
    }

    /// Runs the terminal callback. Runs on the caller's context.
    fn deliver(&self, outcome: Outcome) {
        // Take the callbacks out before running them so a handler that
        // calls back into the handle can't deadlock on this mutex.
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.progress().outcome = Some(outcome.clone());

        match callbacks {
            Some(callbacks) => callbacks.deliver(outcome),
            None => tracing::warn!("terminal outcome already delivered, ignoring"),
        }
    }
}

// ---------------------------------------------------------------------------
// Matchmaker
// ---------------------------------------------------------------------------

/// Starts matchmaking sessions against one frontend.
///
/// The matchmaker itself holds no per-session state: it's a connector
/// plus a dispatcher. Every [`start`](Self::start) creates an
/// independent, single-use session.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use matchforge_frontend::GrpcConnector;
/// use matchforge_session::{caller_queue, Callbacks, FindMatch, Matchmaker};
///
/// # async fn demo() -> Result<(), matchforge_session::SessionError> {
/// let (dispatcher, mut queue) = caller_queue();
/// let matchmaker = Matchmaker::new(GrpcConnector::new(), dispatcher);
///
/// let _handle = matchmaker.start(
///     FindMatch::new("localhost:50504", Duration::from_secs(60)),
///     Callbacks::new()
///         .on_success(|connection| println!("connect to {connection}"))
///         .on_timeout(|| println!("no match")),
/// )?;
///
/// // The notification runs here, on the caller's task.
/// queue.run_next().await;
/// # Ok(())
/// # }
/// ```
pub struct Matchmaker<C: Connector, D: Dispatcher> {
    connector: Arc<C>,
    dispatcher: Arc<D>,
}

impl<C: Connector, D: Dispatcher> Clone for Matchmaker<C, D> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<C: Connector, D: Dispatcher> Matchmaker<C, D> {
    /// Creates a matchmaker that opens clients with `connector` and
    /// delivers notifications through `dispatcher`.
    pub fn new(connector: C, dispatcher: D) -> Self {
        Self {
            connector: Arc::new(connector),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Starts a session and returns immediately.
    ///
    /// The request is validated synchronously; nothing touches the
    /// network until the background task runs. Exactly one of the
    /// `callbacks` handlers fires afterwards, through the dispatcher,
    /// provided the returned handle is still alive at that point.
    ///
    /// # Errors
    /// - [`SessionError::Config`]: empty endpoint or zero timeout.
    /// - [`SessionError::NoRuntime`]: called outside a Tokio runtime.
    pub fn start(
        &self,
        request: FindMatch,
        callbacks: Callbacks,
    ) -> Result<SessionHandle, SessionError> {
        request.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SessionError::NoRuntime)?;

        // The deadline is anchored at start, not at the watch call.
        let now = Instant::now();
        let deadline = now
            .checked_add(request.timeout)
            .unwrap_or_else(|| far_future(now));
        let shared = Arc::new(Shared::new(callbacks));
        let cancel = CancellationToken::new();

        tracing::info!(
            endpoint = %request.endpoint,
            timeout_ms = saturating_millis(request.timeout),
            "starting matchmaking"
        );

        let worker = Worker {
            connector: Arc::clone(&self.connector),
            dispatcher: Arc::clone(&self.dispatcher),
            shared: Arc::downgrade(&shared),
            cancel: cancel.clone(),
            request,
            deadline,
        };
        let task = runtime.spawn(worker.run());

        Ok(SessionHandle {
            shared,
            cancel,
            task,
        })
    }
}

/// Stand-in deadline for timeouts too large to represent, about 30 years
/// out, matching what `tokio::time::timeout` does.
fn far_future(now: Instant) -> Instant {
    now + Duration::from_secs(86_400 * 365 * 30)
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// The caller's side of a running session.
///
/// Keep it alive for as long as you want the terminal notification:
/// dropping it discards the notification (the session still finishes
/// and deletes its ticket in the background). Dropping it does **not**
/// cancel the session; call [`cancel`](Self::cancel) for that.
pub struct SessionHandle {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Requests early termination.
    ///
    /// Safe to call at any time and from any thread, including while the
    /// watch stream is in flight. If a ticket exists it is still deleted
    /// before [`Outcome::Cancelled`] is delivered. Has no effect once
    /// the outcome is decided.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.progress().state
    }

    /// The ticket id, once `CreateTicket` has succeeded.
    pub fn ticket_id(&self) -> Option<TicketId> {
        self.shared.progress().ticket_id.clone()
    }

    /// The outcome, once it has been delivered to the callbacks.
    pub fn outcome(&self) -> Option<Outcome> {
        self.shared.progress().outcome.clone()
    }

    /// `true` once the background task has finished, including the
    /// ticket cleanup.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let progress = self.shared.progress();
        f.debug_struct("SessionHandle")
            .field("state", &progress.state)
            .field("ticket_id", &progress.ticket_id)
            .field("outcome", &progress.outcome)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Worker: the background protocol
// ---------------------------------------------------------------------------

struct Worker<C: Connector, D: Dispatcher> {
    connector: Arc<C>,
    dispatcher: Arc<D>,
    shared: Weak<Shared>,
    cancel: CancellationToken,
    request: FindMatch,
    deadline: Instant,
}

impl<C: Connector, D: Dispatcher> Worker<C, D> {
    async fn run(self) {
        let outcome = self.execute().await;
        self.advance(SessionState::Terminal);

        match &outcome {
            Outcome::Success(connection) => {
                tracing::info!(%connection, "match found");
            }
            Outcome::Failure(message) => {
                tracing::error!(%message, "matchmaking failed");
            }
            Outcome::Timeout => {
                tracing::warn!("no match found before the deadline");
            }
            Outcome::Cancelled => {
                tracing::info!("matchmaking cancelled");
            }
        }

        self.post(outcome);
    }

    async fn execute(&self) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        self.advance(SessionState::CreatingTicket);

        // Creation is not raced against cancellation: if the service
        // created a ticket we need its id to delete it.
        let created = AssertUnwindSafe(self.create_ticket()).catch_unwind().await;
        let (client, ticket_id) = match created {
            Ok(Ok(created)) => created,
            Ok(Err(message)) => return Outcome::Failure(message),
            Err(panic) => {
                return Outcome::Failure(format!(
                    "CreateTicket failed: unexpected fault: {}",
                    panic_message(panic.as_ref())
                ));
            }
        };
        self.record_ticket(&ticket_id);

        let watched = AssertUnwindSafe(self.watch(&client, &ticket_id))
            .catch_unwind()
            .await;
        let pending = match watched {
            Ok(outcome) => outcome,
            Err(panic) => Outcome::Failure(format!(
                "unexpected fault: {}",
                panic_message(panic.as_ref())
            )),
        };

        self.advance(SessionState::DeletingTicket);
        self.delete_ticket(&client, &ticket_id).await;
        pending
    }

    /// Connects and registers the ticket. Errors are already formatted
    /// as the failure message.
    async fn create_ticket(&self) -> Result<(C::Client, TicketId), String> {
        let endpoint = &self.request.endpoint;
        let client = self
            .connector
            .connect(endpoint)
            .await
            .map_err(|e| format!("CreateTicket failed: {e}"))?;

        tracing::info!(%endpoint, "creating ticket");
        let rpc_timeout = self.request.rpc_timeout;
        let call = client.create_ticket(self.request.ticket.clone());

        match time::timeout(rpc_timeout, call).await {
            Ok(Ok(ticket_id)) => {
                tracing::info!(%ticket_id, "ticket created");
                Ok((client, ticket_id))
            }
            Ok(Err(e)) => Err(format!("CreateTicket failed: {e}")),
            Err(_) => Err(format!(
                "CreateTicket failed: no response within {}ms",
                rpc_timeout.as_millis()
            )),
        }
    }

    /// Reads the assignment stream until an assignment, the deadline,
    /// an error, or cancellation.
    async fn watch(&self, client: &C::Client, ticket_id: &TicketId) -> Outcome {
        if self.cancel.is_cancelled() {
            return Outcome::Cancelled;
        }
        self.advance(SessionState::WatchingAssignments);

        let remaining = self.deadline.saturating_duration_since(Instant::now());
        tracing::info!(
            %ticket_id,
            remaining_ms = saturating_millis(remaining),
            "waiting for assignment"
        );

        let opened = tokio::select! {
            biased;
            opened = time::timeout_at(
                self.deadline,
                client.watch_assignments(ticket_id, remaining),
            ) => opened,
            _ = self.cancel.cancelled() => return Outcome::Cancelled,
        };
        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return watch_error(e),
            Err(_) => return Outcome::Timeout,
        };

        loop {
            // `biased` polls the stream first, and `timeout_at` polls its
            // inner future before its timer, so an assignment that is
            // already available wins over both cancellation and the
            // deadline.
            let next = tokio::select! {
                biased;
                next = time::timeout_at(self.deadline, stream.next()) => next,
                _ = self.cancel.cancelled() => return Outcome::Cancelled,
            };

            match next {
                Ok(Some(Ok(update))) => match update.connection() {
                    Some(connection) => {
                        let connection = connection.to_string();
                        tracing::info!(%ticket_id, %connection, "assignment received");
                        // Dropping the stream cancels the call; no need to
                        // wait for the service to close it.
                        drop(stream);
                        return Outcome::Success(connection);
                    }
                    None => {
                        tracing::debug!(%ticket_id, "update without assignment");
                    }
                },
                Ok(Some(Err(e))) => return watch_error(e),
                Ok(None) => {
                    return Outcome::Failure(
                        "WatchAssignments failed: stream closed before an assignment arrived"
                            .into(),
                    );
                }
                Err(_) => return Outcome::Timeout,
            }
        }
    }

    async fn delete_ticket(&self, client: &C::Client, ticket_id: &TicketId) {
        let call = time::timeout(self.request.rpc_timeout, client.delete_ticket(ticket_id));

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(Ok(()))) => tracing::info!(%ticket_id, "ticket deleted"),
            Ok(Ok(Err(e))) => {
                tracing::warn!(%ticket_id, error = %e, "failed to delete ticket");
            }
            Ok(Err(_)) => {
                tracing::warn!(%ticket_id, "failed to delete ticket: no response");
            }
            Err(panic) => tracing::warn!(
                %ticket_id,
                fault = %panic_message(panic.as_ref()),
                "failed to delete ticket: unexpected fault"
            ),
        }
    }

    fn advance(&self, next: SessionState) {
        if let Some(shared) = self.shared.upgrade() {
            shared.advance(next);
        }
    }

    fn record_ticket(&self, ticket_id: &TicketId) {
        if let Some(shared) = self.shared.upgrade() {
            shared.progress().ticket_id = Some(ticket_id.clone());
        }
    }

    /// Hands the outcome to the caller's context. The handle may be gone
    /// by the time the task runs; then the outcome is dropped.
    fn post(&self, outcome: Outcome) {
        let shared = self.shared.clone();
        self.dispatcher.dispatch(Box::new(move || match shared.upgrade() {
            Some(shared) => shared.deliver(outcome),
            None => tracing::debug!(%outcome, "session handle dropped, discarding outcome"),
        }));
    }
}

/// Classifies a watch error: deadline expiry is a timeout, anything
/// else a failure.
fn watch_error(error: FrontendError) -> Outcome {
    if error.is_deadline_exceeded() {
        Outcome::Timeout
    } else {
        Outcome::Failure(format!("WatchAssignments failed: {error}"))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use matchforge_frontend::StatusCode;

    use super::*;

    #[test]
    fn test_states_are_ordered_by_lifecycle() {
        assert!(SessionState::Idle < SessionState::CreatingTicket);
        assert!(SessionState::CreatingTicket < SessionState::WatchingAssignments);
        assert!(SessionState::WatchingAssignments < SessionState::DeletingTicket);
        assert!(SessionState::DeletingTicket < SessionState::Terminal);
    }

    #[test]
    fn test_watch_error_deadline_is_timeout() {
        let err = FrontendError::status(StatusCode::DeadlineExceeded, "deadline");
        assert_eq!(watch_error(err), Outcome::Timeout);
    }

    #[test]
    fn test_watch_error_other_is_failure_with_prefix() {
        let err = FrontendError::status(StatusCode::Unavailable, "connection reset");
        assert_eq!(
            watch_error(err),
            Outcome::Failure("WatchAssignments failed: connection reset".into())
        );
    }

    #[test]
    fn test_panic_message_reads_str_and_string_payloads() {
        let a: Box<dyn Any + Send> = Box::new("static");
        let b: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let c: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(a.as_ref()), "static");
        assert_eq!(panic_message(b.as_ref()), "owned");
        assert_eq!(panic_message(c.as_ref()), "panic with non-string payload");
    }

    #[test]
    fn test_shared_delivers_only_once() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = count.clone();
        let shared = Shared::new(Callbacks::new().on_outcome(move |_| {
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }));

        shared.deliver(Outcome::Timeout);
        shared.deliver(Outcome::Timeout);

        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(shared.progress().outcome, Some(Outcome::Timeout));
    }
}
