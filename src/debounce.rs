//! Latest-call-wins debounce gate.
//!
//! Each call to [`Debouncer::run`] takes a new generation ticket, waits
//! out the quiet interval and only then runs its work. A later call (or
//! [`Debouncer::cancel`]) invalidates every earlier ticket, so superseded
//! calls return `None` without touching the network. Work that was already
//! running when it got superseded still finishes, but its result is
//! discarded.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::debug;

#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: AtomicU64::new(0),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run `work` once the gate has been quiet for the interval.
    ///
    /// Returns `None` if another call or a cancel arrived in the meantime.
    pub async fn run<F, Fut, T>(&self, work: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.interval).await;
        if !self.is_current(ticket) {
            debug!(ticket, "Debounced call superseded before start");
            return None;
        }

        let output = work().await;
        if !self.is_current(ticket) {
            debug!(ticket, "Debounced call superseded while running");
            return None;
        }
        Some(output)
    }

    /// Invalidate every pending call.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }
}
