//! Background worker: the queue's single consumer.
//!
//! One tokio task polls the queue on a short interval and applies drained
//! tasks strictly in enqueue order. Every task body writes the store first,
//! then the cache, so a crash between the two leaves the cache stale (and
//! TTL-bounded) rather than ahead of the truth. A failed task is logged,
//! counted, and dropped; the loop never dies with it.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::application::repos::{RepoError, Store};
use crate::cache::config::CacheConfig;
use crate::cache::layer::{CacheLayer, ListingCard, ListingSnapshot, RecommendationEntry};
use crate::cache::tasks::{FavoriteAction, Task, TaskQueue};
use crate::domain::entities::RecommendationRecord;

/// Listings sampled into the hot aggregate.
pub const HOT_LISTINGS_SAMPLE: usize = 6;
/// Listings ranked into the high-view aggregate.
pub const HIGH_VIEW_LIMIT: usize = 10;

const METRIC_TASK_PROCESSED: &str = "affitto_task_processed_total";
const METRIC_TASK_FAILED: &str = "affitto_task_failed_total";
const METRIC_TASK_PROCESS_MS: &str = "affitto_task_process_ms";

/// Handle to a spawned background task; dropping it detaches the task.
pub struct StopHandle {
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl StopHandle {
    pub(crate) fn new(shutdown: Arc<Notify>, handle: JoinHandle<()>) -> Self {
        Self { shutdown, handle }
    }

    /// Requests shutdown and waits for the task to finish its current
    /// pass.
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.handle.await {
            error!(error = %err, "background task join failed");
        }
    }
}

/// Rebuilds the hot-listings aggregate from the store and caches it.
pub async fn refresh_hot_listings(
    store: &dyn Store,
    cache: &CacheLayer,
) -> Result<Vec<ListingCard>, RepoError> {
    let listings = store.sample_listings(HOT_LISTINGS_SAMPLE).await?;
    let cards: Vec<ListingCard> = listings.iter().map(ListingCard::from_record).collect();
    cache.set_hot_listings(&cards).await;
    Ok(cards)
}

/// Rebuilds the high-view aggregate from the store and caches it.
pub async fn refresh_high_view_listings(
    store: &dyn Store,
    cache: &CacheLayer,
) -> Result<Vec<ListingCard>, RepoError> {
    let listings = store.top_viewed_listings(HIGH_VIEW_LIMIT).await?;
    let cards: Vec<ListingCard> = listings.iter().map(ListingCard::with_views).collect();
    cache.set_high_view_listings(&cards).await;
    Ok(cards)
}

/// Populates the landing-page aggregates synchronously. Intended for
/// process boot, before the first requests arrive.
pub async fn prime_initial_cache(store: &dyn Store, cache: &CacheLayer) -> Result<(), RepoError> {
    refresh_hot_listings(store, cache).await?;
    refresh_high_view_listings(store, cache).await?;
    info!("landing-page cache primed");
    Ok(())
}

pub struct TaskWorker {
    config: CacheConfig,
    queue: Arc<TaskQueue>,
    store: Arc<dyn Store>,
    cache: Arc<CacheLayer>,
}

impl TaskWorker {
    pub fn new(
        config: CacheConfig,
        queue: Arc<TaskQueue>,
        store: Arc<dyn Store>,
        cache: Arc<CacheLayer>,
    ) -> Self {
        Self {
            config,
            queue,
            store,
            cache,
        }
    }

    /// Starts the consumer loop on a tokio task.
    pub fn spawn(self) -> StopHandle {
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);
        let handle = tokio::spawn(async move {
            info!(
                poll_interval_ms = self.config.poll_interval_ms,
                batch_limit = self.config.drain_batch_limit_clamped(),
                "task worker started"
            );
            let mut interval = tokio::time::interval(self.config.poll_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = signal.notified() => break,
                    _ = interval.tick() => {
                        self.drain_once().await;
                    }
                }
            }
            let discarded = self.queue.len();
            if discarded > 0 {
                warn!(discarded, "task worker stopping with undrained tasks");
            }
            info!("task worker stopped");
        });
        StopHandle::new(shutdown, handle)
    }

    /// Drains and applies one bounded batch. Returns the number of tasks
    /// taken off the queue.
    pub async fn drain_once(&self) -> usize {
        let batch = self.queue.drain(self.config.drain_batch_limit_clamped());
        let count = batch.len();
        for queued in batch {
            let kind = queued.task.kind();
            let started = Instant::now();
            match self.apply(&queued.task).await {
                Ok(()) => {
                    counter!(METRIC_TASK_PROCESSED, "kind" => kind).increment(1);
                }
                Err(err) => {
                    // At-most-once: the intent is gone, the cache stays
                    // stale until its TTL or the next overlapping write.
                    error!(
                        task_id = %queued.id,
                        task_kind = kind,
                        error = %err,
                        "task failed; dropping"
                    );
                    counter!(METRIC_TASK_FAILED, "kind" => kind).increment(1);
                }
            }
            histogram!(METRIC_TASK_PROCESS_MS, "kind" => kind)
                .record(started.elapsed().as_secs_f64() * 1000.0);
        }
        count
    }

    async fn apply(&self, task: &Task) -> Result<(), RepoError> {
        match *task {
            Task::RefreshHotListings => {
                refresh_hot_listings(self.store.as_ref(), &self.cache).await?;
                Ok(())
            }
            Task::RefreshHighViewListings => {
                refresh_high_view_listings(self.store.as_ref(), &self.cache).await?;
                Ok(())
            }
            Task::RecordUserView {
                user_id,
                listing_id,
            } => self.record_user_view(user_id, listing_id).await,
            Task::UpdateUserFavorite {
                user_id,
                listing_id,
                action,
            } => self.update_user_favorite(user_id, listing_id, action).await,
            Task::BumpRecommendation {
                user_id,
                listing_id,
            } => self.bump_recommendation(user_id, listing_id).await,
            Task::RefreshListingSnapshot { listing_id } => {
                self.refresh_listing_snapshot(listing_id).await
            }
            Task::IncrementListingViewCount { listing_id } => {
                self.increment_listing_view_count(listing_id).await
            }
            Task::SetListingViewCount { listing_id, views } => {
                self.set_listing_view_count(listing_id, views).await
            }
        }
    }

    async fn record_user_view(&self, user_id: i64, listing_id: i64) -> Result<(), RepoError> {
        let Some(mut user) = self.store.find_user(user_id).await? else {
            debug!(user_id, "user vanished before view was recorded; skipping");
            return Ok(());
        };
        user.record_view(listing_id);
        self.store.update_seen_ids(user_id, &user.seen_ids).await?;
        self.cache.set_user_history(user_id, &user.seen_ids).await;
        Ok(())
    }

    async fn update_user_favorite(
        &self,
        user_id: i64,
        listing_id: i64,
        action: FavoriteAction,
    ) -> Result<(), RepoError> {
        let Some(mut user) = self.store.find_user(user_id).await? else {
            debug!(user_id, "user vanished before favorite update; skipping");
            return Ok(());
        };
        let changed = match action {
            FavoriteAction::Add => user.add_favorite(listing_id),
            FavoriteAction::Remove => user.remove_favorite(listing_id),
        };
        if !changed {
            debug!(
                user_id,
                listing_id,
                action = action.as_str(),
                "favorite update was a no-op"
            );
            return Ok(());
        }
        self.store
            .update_collect_ids(user_id, &user.collect_ids)
            .await?;
        self.cache
            .set_user_favorites(user_id, &user.collect_ids)
            .await;
        Ok(())
    }

    async fn bump_recommendation(&self, user_id: i64, listing_id: i64) -> Result<(), RepoError> {
        let Some(listing) = self.store.find_listing(listing_id).await? else {
            debug!(listing_id, "listing vanished before recommendation bump; skipping");
            return Ok(());
        };
        let record = match self.store.find_recommendation(user_id, listing_id).await? {
            Some(mut record) => {
                record.bump();
                record
            }
            None => RecommendationRecord::for_view(user_id, &listing),
        };
        self.store.upsert_recommendation(record).await?;

        let records = self.store.recommendations_for_user(user_id).await?;
        let entries: Vec<RecommendationEntry> =
            records.iter().map(RecommendationEntry::from).collect();
        self.cache.set_recommendations(user_id, &entries).await;
        Ok(())
    }

    async fn refresh_listing_snapshot(&self, listing_id: i64) -> Result<(), RepoError> {
        let Some(listing) = self.store.find_listing(listing_id).await? else {
            debug!(listing_id, "listing vanished before snapshot refresh; skipping");
            return Ok(());
        };
        self.cache
            .set_listing_snapshot(&ListingSnapshot::from(&listing))
            .await;
        Ok(())
    }

    async fn increment_listing_view_count(&self, listing_id: i64) -> Result<(), RepoError> {
        let Some(mut listing) = self.store.find_listing(listing_id).await? else {
            debug!(listing_id, "listing vanished before view increment; skipping");
            return Ok(());
        };
        // The count comes from the live store row, not from whatever
        // snapshot the viewer happened to see: each queued view adds
        // exactly one, and the counter never goes backwards.
        let views = listing.page_views + 1;
        self.store.set_page_views(listing_id, views).await?;
        listing.page_views = views;
        self.cache
            .set_listing_snapshot(&ListingSnapshot::from(&listing))
            .await;
        Ok(())
    }

    async fn set_listing_view_count(&self, listing_id: i64, views: i64) -> Result<(), RepoError> {
        let Some(mut listing) = self.store.find_listing(listing_id).await? else {
            debug!(listing_id, "listing vanished before view-count write; skipping");
            return Ok(());
        };
        self.store.set_page_views(listing_id, views).await?;
        listing.page_views = views;
        self.cache
            .set_listing_snapshot(&ListingSnapshot::from(&listing))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{ListingsRepo, RecommendationsRepo, UsersRepo};
    use crate::cache::backend::MemoryBackend;
    use crate::cache::routing::ReplicatedCache;
    use crate::domain::entities::{HISTORY_LIMIT, test_listing, test_user};
    use crate::infra::memory::MemoryStore;

    struct Harness {
        store: Arc<MemoryStore>,
        cache: Arc<CacheLayer>,
        queue: Arc<TaskQueue>,
        worker: TaskWorker,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(CacheLayer::new(
            Arc::new(ReplicatedCache::new(Arc::new(MemoryBackend::new()))),
            CacheConfig::default(),
        ));
        let queue = Arc::new(TaskQueue::new(1000));
        let worker = TaskWorker::new(
            CacheConfig::default(),
            Arc::clone(&queue),
            store.clone() as Arc<dyn Store>,
            Arc::clone(&cache),
        );
        Harness {
            store,
            cache,
            queue,
            worker,
        }
    }

    #[tokio::test]
    async fn record_user_view_updates_store_and_cache() {
        let h = harness();
        h.store.insert_user(test_user(7));
        h.queue.enqueue(Task::RecordUserView {
            user_id: 7,
            listing_id: 3,
        });
        h.queue.enqueue(Task::RecordUserView {
            user_id: 7,
            listing_id: 5,
        });
        assert_eq!(h.worker.drain_once().await, 2);

        let user = h.store.find_user(7).await.unwrap().unwrap();
        assert_eq!(user.seen_ids, vec![5, 3]);
        assert_eq!(h.cache.user_history(7).await, Some(vec![5, 3]));
    }

    #[tokio::test]
    async fn history_stays_bounded() {
        let h = harness();
        h.store.insert_user(test_user(7));
        for listing_id in 0..(HISTORY_LIMIT as i64 + 3) {
            h.queue.enqueue(Task::RecordUserView {
                user_id: 7,
                listing_id,
            });
        }
        h.worker.drain_once().await;

        let history = h.cache.user_history(7).await.unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0], HISTORY_LIMIT as i64 + 2);
    }

    #[tokio::test]
    async fn duplicate_favorite_add_is_a_noop() {
        let h = harness();
        h.store.insert_user(test_user(7));
        for _ in 0..2 {
            h.queue.enqueue(Task::UpdateUserFavorite {
                user_id: 7,
                listing_id: 99,
                action: FavoriteAction::Add,
            });
        }
        h.worker.drain_once().await;

        let user = h.store.find_user(7).await.unwrap().unwrap();
        assert_eq!(user.collect_ids, vec![99]);
        let favorites = h.cache.user_favorites(7).await.unwrap();
        assert_eq!(favorites.len(), 1);
    }

    #[tokio::test]
    async fn recommendation_score_counts_views() {
        let h = harness();
        h.store.insert_listing(test_listing(3, 0));
        for _ in 0..3 {
            h.queue.enqueue(Task::BumpRecommendation {
                user_id: 7,
                listing_id: 3,
            });
        }
        h.worker.drain_once().await;

        let record = h.store.find_recommendation(7, 3).await.unwrap().unwrap();
        assert_eq!(record.score, 3);
        let entries = h.cache.recommendations(7).await.unwrap();
        assert_eq!(entries[0].score, 3);
    }

    #[tokio::test]
    async fn view_count_write_is_absolute_and_refreshes_snapshot() {
        let h = harness();
        h.store.insert_listing(test_listing(42, 5));
        h.queue.enqueue(Task::SetListingViewCount {
            listing_id: 42,
            views: 6,
        });
        h.worker.drain_once().await;

        let listing = h.store.find_listing(42).await.unwrap().unwrap();
        assert_eq!(listing.page_views, 6);
        let snapshot = h.cache.listing_snapshot(42).await.unwrap();
        assert_eq!(snapshot.page_views, 6);
    }

    #[tokio::test]
    async fn stale_viewers_cannot_lose_or_regress_views() {
        let h = harness();
        h.store.insert_listing(test_listing(42, 5));

        // First viewer's intent is applied...
        h.queue.enqueue(Task::IncrementListingViewCount { listing_id: 42 });
        h.worker.drain_once().await;
        assert_eq!(
            h.store.find_listing(42).await.unwrap().unwrap().page_views,
            6
        );

        // ...then two more viewers who both saw the old count of 5.
        // Each queued view still adds exactly one; the counter never
        // steps backwards.
        h.queue.enqueue(Task::IncrementListingViewCount { listing_id: 42 });
        h.queue.enqueue(Task::IncrementListingViewCount { listing_id: 42 });
        h.worker.drain_once().await;

        let listing = h.store.find_listing(42).await.unwrap().unwrap();
        assert_eq!(listing.page_views, 8);
        assert_eq!(h.cache.listing_snapshot(42).await.unwrap().page_views, 8);
    }

    #[tokio::test]
    async fn missing_entities_do_not_stall_the_batch() {
        let h = harness();
        h.store.insert_user(test_user(7));
        h.queue.enqueue(Task::RecordUserView {
            user_id: 999, // no such user
            listing_id: 1,
        });
        h.queue.enqueue(Task::RecordUserView {
            user_id: 7,
            listing_id: 1,
        });
        assert_eq!(h.worker.drain_once().await, 2);
        assert_eq!(h.cache.user_history(7).await, Some(vec![1]));
    }

    #[tokio::test]
    async fn refresh_tasks_rebuild_landing_aggregates() {
        let h = harness();
        for id in 1..=12 {
            h.store.insert_listing(test_listing(id, id * 10));
        }
        h.queue.enqueue(Task::RefreshHotListings);
        h.queue.enqueue(Task::RefreshHighViewListings);
        h.worker.drain_once().await;

        assert_eq!(h.cache.hot_listings().await.unwrap().len(), HOT_LISTINGS_SAMPLE);
        let high = h.cache.high_view_listings().await.unwrap();
        assert_eq!(high.len(), HIGH_VIEW_LIMIT);
        assert_eq!(high[0].page_views, Some(120));
    }

    #[tokio::test]
    async fn spawned_worker_drains_and_stops() {
        let h = harness();
        h.store.insert_user(test_user(7));
        h.queue.enqueue(Task::RecordUserView {
            user_id: 7,
            listing_id: 3,
        });

        let cache = Arc::clone(&h.cache);
        let queue = Arc::clone(&h.queue);
        let config = CacheConfig {
            poll_interval_ms: 5,
            ..CacheConfig::default()
        };
        let handle = TaskWorker::new(
            config,
            queue,
            h.store.clone() as Arc<dyn Store>,
            Arc::clone(&h.cache),
        )
        .spawn();

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        handle.stop().await;
        assert_eq!(cache.user_history(7).await, Some(vec![3]));
    }
}
