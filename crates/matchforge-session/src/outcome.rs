//! Terminal outcomes and the callbacks that receive them.

use std::fmt;

/// How a matchmaking session ended. Exactly one is produced per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The service assigned a match. Carries the connection string.
    Success(String),
    /// Something went wrong. Carries a human-readable description such
    /// as `CreateTicket failed: pool not found`.
    Failure(String),
    /// The deadline passed without an assignment.
    Timeout,
    /// The caller cancelled the session before it finished.
    Cancelled,
}

impl Outcome {
    /// `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The connection string, if the session succeeded.
    pub fn connection(&self) -> Option<&str> {
        match self {
            Self::Success(connection) => Some(connection),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(connection) => write!(f, "matched: {connection}"),
            Self::Failure(message) => write!(f, "failed: {message}"),
            Self::Timeout => f.write_str("timed out"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

type Handler<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// The caller's subscriptions for a session's terminal notification.
///
/// Register one handler per outcome you care about. When the session
/// ends, exactly one handler runs: the one matching the outcome, or the
/// [`on_outcome`](Callbacks::on_outcome) fallback if that outcome has no
/// dedicated handler. Outcomes with neither are dropped.
///
/// ```rust
/// use matchforge_session::{Callbacks, Outcome};
///
/// let callbacks = Callbacks::new()
///     .on_success(|connection| println!("connect to {connection}"))
///     .on_failure(|message| eprintln!("matchmaking failed: {message}"))
///     .on_timeout(|| eprintln!("no match found"));
/// # callbacks.deliver(Outcome::Timeout);
/// ```
#[derive(Default)]
pub struct Callbacks {
    on_success: Option<Handler<String>>,
    on_failure: Option<Handler<String>>,
    on_timeout: Option<Handler<()>>,
    on_cancelled: Option<Handler<()>>,
    on_outcome: Option<Handler<Outcome>>,
}

impl Callbacks {
    /// No handlers registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the connection string when a match is assigned.
    pub fn on_success(mut self, f: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Called with an error description when the session fails.
    pub fn on_failure(mut self, f: impl FnOnce(String) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    /// Called when the deadline passes without an assignment.
    pub fn on_timeout(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_timeout = Some(Box::new(move |()| f()));
        self
    }

    /// Called when the session was cancelled by the caller.
    pub fn on_cancelled(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancelled = Some(Box::new(move |()| f()));
        self
    }

    /// Fallback for outcomes without a dedicated handler.
    pub fn on_outcome(mut self, f: impl FnOnce(Outcome) + Send + 'static) -> Self {
        self.on_outcome = Some(Box::new(f));
        self
    }

    /// Runs the handler for `outcome`, consuming the callbacks so no
    /// second notification is possible.
    pub fn deliver(self, outcome: Outcome) {
        let Self {
            on_success,
            on_failure,
            on_timeout,
            on_cancelled,
            on_outcome,
        } = self;

        match outcome {
            Outcome::Success(connection) if on_success.is_some() => {
                if let Some(f) = on_success {
                    f(connection);
                }
            }
            Outcome::Failure(message) if on_failure.is_some() => {
                if let Some(f) = on_failure {
                    f(message);
                }
            }
            Outcome::Timeout if on_timeout.is_some() => {
                if let Some(f) = on_timeout {
                    f(());
                }
            }
            Outcome::Cancelled if on_cancelled.is_some() => {
                if let Some(f) = on_cancelled {
                    f(());
                }
            }
            other => {
                if let Some(f) = on_outcome {
                    f(other);
                }
            }
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .field("on_cancelled", &self.on_cancelled.is_some())
            .field("on_outcome", &self.on_outcome.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records which handler fired, and with what.
    fn recorder() -> (Arc<Mutex<Vec<String>>>, Callbacks) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c, d) = (log.clone(), log.clone(), log.clone(), log.clone());
        let callbacks = Callbacks::new()
            .on_success(move |conn| a.lock().unwrap().push(format!("success {conn}")))
            .on_failure(move |msg| b.lock().unwrap().push(format!("failure {msg}")))
            .on_timeout(move || c.lock().unwrap().push("timeout".into()))
            .on_cancelled(move || d.lock().unwrap().push("cancelled".into()));
        (log, callbacks)
    }

    #[test]
    fn test_deliver_success_runs_only_success_handler() {
        let (log, callbacks) = recorder();
        callbacks.deliver(Outcome::Success("10.0.0.5:7777".into()));
        assert_eq!(*log.lock().unwrap(), vec!["success 10.0.0.5:7777"]);
    }

    #[test]
    fn test_deliver_failure_passes_message() {
        let (log, callbacks) = recorder();
        callbacks.deliver(Outcome::Failure("CreateTicket failed: boom".into()));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["failure CreateTicket failed: boom"]
        );
    }

    #[test]
    fn test_deliver_timeout_and_cancelled() {
        let (log, callbacks) = recorder();
        callbacks.deliver(Outcome::Timeout);
        let (log2, callbacks2) = recorder();
        callbacks2.deliver(Outcome::Cancelled);

        assert_eq!(*log.lock().unwrap(), vec!["timeout"]);
        assert_eq!(*log2.lock().unwrap(), vec!["cancelled"]);
    }

    #[test]
    fn test_deliver_falls_back_to_on_outcome() {
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        let callbacks = Callbacks::new()
            .on_success(|_| panic!("success handler must not run"))
            .on_outcome(move |outcome| *slot.lock().unwrap() = Some(outcome));

        callbacks.deliver(Outcome::Timeout);

        assert_eq!(*seen.lock().unwrap(), Some(Outcome::Timeout));
    }

    #[test]
    fn test_deliver_without_handlers_is_a_no_op() {
        Callbacks::new().deliver(Outcome::Failure("ignored".into()));
    }

    #[test]
    fn test_outcome_accessors() {
        let success = Outcome::Success("1.2.3.4:5".into());
        assert!(success.is_success());
        assert_eq!(success.connection(), Some("1.2.3.4:5"));
        assert_eq!(Outcome::Timeout.connection(), None);
        assert_eq!(Outcome::Timeout.to_string(), "timed out");
    }
}
