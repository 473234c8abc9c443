//! Update-intent queue.
//!
//! Request handlers record *intents* ("user 7 viewed listing 3") rather
//! than performing store or cache writes inline. The queue is a bounded
//! in-process FIFO: many producers, one consumer (the worker). Entries are
//! volatile — a crash loses whatever was queued, by design.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, gauge};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::infra::lock::mutex_lock;

const SOURCE: &str = "cache::tasks";

const METRIC_TASK_ENQUEUED: &str = "affitto_task_enqueued_total";
const METRIC_TASK_DROPPED: &str = "affitto_task_dropped_total";
const METRIC_TASK_QUEUE_LEN: &str = "affitto_task_queue_len";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteAction {
    Add,
    Remove,
}

impl FavoriteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }
}

/// The seven update intents the worker knows how to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Re-sample the hot-listings aggregate from the store.
    RefreshHotListings,
    /// Re-rank the high-view aggregate from the store.
    RefreshHighViewListings,
    /// Prepend a listing to a user's browsing history.
    RecordUserView { user_id: i64, listing_id: i64 },
    /// Add or remove a favorite.
    UpdateUserFavorite {
        user_id: i64,
        listing_id: i64,
        action: FavoriteAction,
    },
    /// Increment (or create at 1) a recommendation score.
    BumpRecommendation { user_id: i64, listing_id: i64 },
    /// Rebuild one listing's cached detail snapshot from the store.
    RefreshListingSnapshot { listing_id: i64 },
    /// Add one view to a listing's counter. The new count is computed
    /// inside the task body from the live store row, so stale snapshots
    /// on the read path can never lose or regress views.
    IncrementListingViewCount { listing_id: i64 },
    /// Overwrite a listing's view counter with an absolute value. Not
    /// part of the request flow; for host tooling (imports, repairs).
    SetListingViewCount { listing_id: i64, views: i64 },
}

impl Task {
    /// Stable kind label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RefreshHotListings => "refresh_hot_listings",
            Self::RefreshHighViewListings => "refresh_high_view_listings",
            Self::RecordUserView { .. } => "record_user_view",
            Self::UpdateUserFavorite { .. } => "update_user_favorite",
            Self::BumpRecommendation { .. } => "bump_recommendation",
            Self::RefreshListingSnapshot { .. } => "refresh_listing_snapshot",
            Self::IncrementListingViewCount { .. } => "increment_listing_view_count",
            Self::SetListingViewCount { .. } => "set_listing_view_count",
        }
    }
}

/// A task plus its queue bookkeeping.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub id: Uuid,
    pub seq: u64,
    pub task: Task,
    pub enqueued_at: OffsetDateTime,
}

/// Bounded FIFO of [`Task`]s.
///
/// When full, `enqueue` rejects the *new* intent: already-accepted work is
/// never displaced, and producers never block.
pub struct TaskQueue {
    queue: Mutex<VecDeque<QueuedTask>>,
    seq: AtomicU64,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            seq: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Appends a task. Returns `false` when the queue is full and the task
    /// was dropped.
    pub fn enqueue(&self, task: Task) -> bool {
        let kind = task.kind();
        let mut queue = mutex_lock(&self.queue, SOURCE, "enqueue");
        if queue.len() >= self.capacity {
            let depth = queue.len();
            drop(queue);
            warn!(
                task_kind = kind,
                depth,
                capacity = self.capacity,
                "task queue full; rejecting new intent"
            );
            counter!(METRIC_TASK_DROPPED, "kind" => kind).increment(1);
            return false;
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let queued = QueuedTask {
            id: Uuid::new_v4(),
            seq,
            task,
            enqueued_at: OffsetDateTime::now_utc(),
        };
        debug!(task_id = %queued.id, task_seq = seq, task_kind = kind, "task enqueued");
        queue.push_back(queued);
        gauge!(METRIC_TASK_QUEUE_LEN).set(queue.len() as f64);
        drop(queue);
        counter!(METRIC_TASK_ENQUEUED, "kind" => kind).increment(1);
        true
    }

    /// Removes and returns up to `limit` tasks in enqueue order.
    pub fn drain(&self, limit: usize) -> Vec<QueuedTask> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let take = limit.min(queue.len());
        let drained: Vec<QueuedTask> = queue.drain(..take).collect();
        gauge!(METRIC_TASK_QUEUE_LEN).set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_fifo_order() {
        let queue = TaskQueue::new(100);
        assert!(queue.enqueue(Task::RefreshHotListings));
        assert!(queue.enqueue(Task::RecordUserView {
            user_id: 1,
            listing_id: 2
        }));
        assert!(queue.enqueue(Task::RefreshHighViewListings));

        let drained = queue.drain(10);
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].task, Task::RefreshHotListings);
        assert_eq!(
            drained[1].task,
            Task::RecordUserView {
                user_id: 1,
                listing_id: 2
            }
        );
        assert_eq!(drained[2].task, Task::RefreshHighViewListings);
        assert!(drained[0].seq < drained[1].seq && drained[1].seq < drained[2].seq);
    }

    #[test]
    fn drain_respects_limit() {
        let queue = TaskQueue::new(100);
        for _ in 0..5 {
            queue.enqueue(Task::RefreshHotListings);
        }
        assert_eq!(queue.drain(2).len(), 2);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn full_queue_rejects_new_intents() {
        let queue = TaskQueue::new(2);
        assert!(queue.enqueue(Task::RefreshHotListings));
        assert!(queue.enqueue(Task::RefreshHighViewListings));
        assert!(!queue.enqueue(Task::RefreshListingSnapshot { listing_id: 1 }));
        assert_eq!(queue.len(), 2);

        // Draining frees capacity again.
        queue.drain(1);
        assert!(queue.enqueue(Task::RefreshListingSnapshot { listing_id: 1 }));
    }

    #[test]
    fn capacity_zero_clamps_to_one() {
        let queue = TaskQueue::new(0);
        assert!(queue.enqueue(Task::RefreshHotListings));
        assert!(!queue.enqueue(Task::RefreshHotListings));
    }

    #[test]
    fn concurrent_producers_lose_nothing_below_capacity() {
        use std::sync::Arc;

        let queue = Arc::new(TaskQueue::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for listing_id in 0..50 {
                        assert!(queue.enqueue(Task::RefreshListingSnapshot { listing_id }));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 400);
    }
}
