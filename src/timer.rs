//! Cancellable one-shot timers for round and vote deadlines.
//!
//! A timer owns the spawned task that will run its callback. Starting a
//! timer replaces any pending one, cancelling aborts it, and dropping the
//! timer (together with its room) aborts it as well.
//!
//! Cancellation alone does not make a callback safe: a callback that has
//! already woken up may be waiting for the room lock while the early path
//! completes. Callbacks therefore re-check their precondition (round number,
//! vote id) under the lock before acting.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct DeadlineTimer {
    handle: Option<JoinHandle<()>>,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self { handle: None }
    }

    /// Run `on_fire` after `after` elapses, replacing any pending timer
    pub fn start<F>(&mut self, after: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_fire.await;
        }));
    }

    /// Abort the pending callback, if any
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Forget the handle without aborting.
    ///
    /// Used from inside the callback itself: aborting the running task would
    /// cancel it at its next await point.
    pub fn disarm(&mut self) {
        self.handle = None;
    }

    pub fn is_armed(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
