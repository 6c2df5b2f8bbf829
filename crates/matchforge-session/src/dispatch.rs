//! Delivering notifications on the caller's execution context.
//!
//! A session's protocol runs on a background Tokio task, but its
//! terminal callback must run wherever the caller lives: a game's main
//! loop, a UI thread, a connection handler task. The background task
//! never calls the callback itself; it hands a [`Task`] to a
//! [`Dispatcher`], and the dispatcher gets it to the right place.
//!
//! [`caller_queue`] is the stock dispatcher: a queue the caller drains
//! from its own loop.
//!
//! ```text
//! background task ──dispatch(task)──→ QueueDispatcher ─┐
//!                                                      │ mpsc
//! caller loop ←──run_pending() / run_next()── CallerQueue
//! ```

use tokio::sync::mpsc;

/// A unit of work to run on the caller's context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Moves tasks onto the caller's designated execution context.
///
/// Implementations must not run the task inline on the calling thread
/// (that would be the session's background task). Dropping a task
/// instead of running it is allowed when the caller's context is gone.
pub trait Dispatcher: Send + Sync + 'static {
    /// Schedules `task` to run on the caller's context.
    fn dispatch(&self, task: Task);
}

/// Creates a connected dispatcher/queue pair.
///
/// Give the [`QueueDispatcher`] to a [`Matchmaker`](crate::Matchmaker);
/// keep the [`CallerQueue`] on the thread or task that should run
/// notifications, and drain it from there.
pub fn caller_queue() -> (QueueDispatcher, CallerQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (QueueDispatcher { tx }, CallerQueue { rx })
}

/// The sending half of [`caller_queue`]. Cheap to clone.
#[derive(Clone)]
pub struct QueueDispatcher {
    tx: mpsc::UnboundedSender<Task>,
}

impl Dispatcher for QueueDispatcher {
    fn dispatch(&self, task: Task) {
        if self.tx.send(task).is_err() {
            tracing::debug!("caller queue closed, dropping notification");
        }
    }
}

/// The receiving half of [`caller_queue`].
///
/// Frame-driven callers call [`run_pending`](Self::run_pending) once
/// per tick; async callers await [`run_next`](Self::run_next) inside
/// their `select!` loop.
pub struct CallerQueue {
    rx: mpsc::UnboundedReceiver<Task>,
}

impl CallerQueue {
    /// Runs every task that is already queued, without waiting.
    ///
    /// Returns how many tasks ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits for the next task and runs it.
    ///
    /// Returns `false` once every dispatcher has been dropped and the
    /// queue is empty, i.e. no notification can ever arrive again.
    ///
    /// Cancel-safe: if the future is dropped before a task arrives, no
    /// task is lost.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_dispatch_does_not_run_task_inline() {
        let (dispatcher, mut queue) = caller_queue();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();

        dispatcher.dispatch(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        // Nothing runs until the caller drains its queue.
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(queue.run_pending(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_pending_on_empty_queue_returns_zero() {
        let (_dispatcher, mut queue) = caller_queue();
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn test_dispatch_after_queue_dropped_is_silent() {
        let (dispatcher, queue) = caller_queue();
        drop(queue);
        dispatcher.dispatch(Box::new(|| panic!("must never run")));
    }

    #[tokio::test]
    async fn test_run_next_returns_false_when_all_dispatchers_dropped() {
        let (dispatcher, mut queue) = caller_queue();
        dispatcher.dispatch(Box::new(|| {}));
        drop(dispatcher);

        assert!(queue.run_next().await, "queued task still runs");
        assert!(!queue.run_next().await, "then the queue reports closed");
    }
}
