//! Periodic refresh of the landing-page aggregates.
//!
//! Enqueues the hot and high-view refresh intents immediately on start,
//! then again after each full cadence. The cadence is measured from the
//! previous enqueue, so wall-clock drift accumulates; nothing downstream
//! cares about exact alignment.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use crate::cache::tasks::{Task, TaskQueue};
use crate::cache::worker::StopHandle;

pub struct RefreshScheduler {
    queue: Arc<TaskQueue>,
    cadence: Duration,
}

impl RefreshScheduler {
    pub fn new(queue: Arc<TaskQueue>, cadence: Duration) -> Self {
        Self { queue, cadence }
    }

    pub fn spawn(self) -> StopHandle {
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move {
            info!(cadence_secs = self.cadence.as_secs(), "refresh scheduler started");
            loop {
                self.queue.enqueue(Task::RefreshHotListings);
                self.queue.enqueue(Task::RefreshHighViewListings);
                tokio::select! {
                    _ = signal.notified() => break,
                    _ = tokio::time::sleep(self.cadence) => {}
                }
            }
            info!("refresh scheduler stopped");
        });
        StopHandle::new(shutdown, handle)
    }
}
