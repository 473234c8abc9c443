//! Per-user activity: history, favorites, recommendations.
//!
//! Reads are cache-aside against the user's store row (or recommendation
//! rows); mutations only enqueue intents and return whether the intent
//! was accepted.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::application::error::AppError;
use crate::application::repos::Store;
use crate::cache::layer::{CacheLayer, RecommendationEntry};
use crate::cache::tasks::{FavoriteAction, Task, TaskQueue};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;

pub struct UserActivityService {
    store: Arc<dyn Store>,
    cache: Arc<CacheLayer>,
    queue: Arc<TaskQueue>,
}

impl UserActivityService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<CacheLayer>, queue: Arc<TaskQueue>) -> Self {
        Self {
            store,
            cache,
            queue,
        }
    }

    async fn load_user(&self, user_id: i64) -> Result<UserRecord, AppError> {
        Ok(self
            .store
            .find_user(user_id)
            .await?
            .ok_or(DomainError::not_found("user"))?)
    }

    /// Browsing history, most recent first.
    pub async fn history(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        if let Some(seen_ids) = self.cache.user_history(user_id).await {
            return Ok(seen_ids);
        }
        debug!(user_id, "history miss; rebuilding from store");
        let user = self.load_user(user_id).await?;
        self.cache.set_user_history(user_id, &user.seen_ids).await;
        Ok(user.seen_ids)
    }

    pub async fn favorites(&self, user_id: i64) -> Result<BTreeSet<i64>, AppError> {
        if let Some(collect_ids) = self.cache.user_favorites(user_id).await {
            return Ok(collect_ids);
        }
        debug!(user_id, "favorites miss; rebuilding from store");
        let user = self.load_user(user_id).await?;
        self.cache
            .set_user_favorites(user_id, &user.collect_ids)
            .await;
        Ok(user.collect_ids.into_iter().collect())
    }

    /// Recommendation entries, highest score first.
    pub async fn recommendations(
        &self,
        user_id: i64,
    ) -> Result<Vec<RecommendationEntry>, AppError> {
        if let Some(entries) = self.cache.recommendations(user_id).await {
            return Ok(entries);
        }
        debug!(user_id, "recommendations miss; rebuilding from store");
        let mut records = self.store.recommendations_for_user(user_id).await?;
        records.sort_by(|a, b| b.score.cmp(&a.score));
        let entries: Vec<RecommendationEntry> =
            records.iter().map(RecommendationEntry::from).collect();
        self.cache.set_recommendations(user_id, &entries).await;
        Ok(entries)
    }

    /// Membership probe for one listing in the user's favorites.
    pub async fn is_favorite(&self, user_id: i64, listing_id: i64) -> Result<bool, AppError> {
        if let Some(collect_ids) = self.cache.user_favorites(user_id).await {
            return Ok(collect_ids.contains(&listing_id));
        }
        let user = self.load_user(user_id).await?;
        self.cache
            .set_user_favorites(user_id, &user.collect_ids)
            .await;
        Ok(user.is_favorite(listing_id))
    }

    /// Queues a history + recommendation update for a view. Returns
    /// `false` if either intent was rejected by a full queue.
    pub fn record_view(&self, user_id: i64, listing_id: i64) -> bool {
        let history = self.queue.enqueue(Task::RecordUserView {
            user_id,
            listing_id,
        });
        let recommend = self.queue.enqueue(Task::BumpRecommendation {
            user_id,
            listing_id,
        });
        history && recommend
    }

    /// Queues a favorite add/remove. Returns `false` if the intent was
    /// rejected by a full queue.
    pub fn set_favorite(&self, user_id: i64, listing_id: i64, action: FavoriteAction) -> bool {
        self.queue.enqueue(Task::UpdateUserFavorite {
            user_id,
            listing_id,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{RecommendationsRepo, UsersRepo};
    use crate::cache::backend::MemoryBackend;
    use crate::cache::config::CacheConfig;
    use crate::cache::routing::ReplicatedCache;
    use crate::domain::entities::test_user;
    use crate::infra::memory::MemoryStore;

    fn service() -> (UserActivityService, Arc<MemoryStore>, Arc<CacheLayer>, Arc<TaskQueue>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(CacheLayer::new(
            Arc::new(ReplicatedCache::new(Arc::new(MemoryBackend::new()))),
            CacheConfig::default(),
        ));
        let queue = Arc::new(TaskQueue::new(1000));
        let service = UserActivityService::new(
            store.clone() as Arc<dyn Store>,
            Arc::clone(&cache),
            Arc::clone(&queue),
        );
        (service, store, cache, queue)
    }

    #[tokio::test]
    async fn history_miss_falls_back_to_store_and_repopulates() {
        let (service, store, cache, _queue) = service();
        let mut user = test_user(7);
        user.seen_ids = vec![5, 3, 1];
        store.insert_user(user);

        assert_eq!(service.history(7).await.unwrap(), vec![5, 3, 1]);
        assert_eq!(cache.user_history(7).await, Some(vec![5, 3, 1]));
    }

    #[tokio::test]
    async fn favorites_probe_uses_cache_membership() {
        let (service, store, cache, _queue) = service();
        let mut user = test_user(7);
        user.collect_ids = vec![99];
        store.insert_user(user);

        // First probe misses and primes the cache.
        assert!(service.is_favorite(7, 99).await.unwrap());
        assert!(cache.user_favorites(7).await.is_some());
        assert!(!service.is_favorite(7, 100).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let (service, _store, _cache, _queue) = service();
        assert!(service.history(999).await.unwrap_err().is_not_found());
        assert!(service.favorites(999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn recommendations_miss_sorts_store_rows() {
        use crate::domain::entities::{RecommendationRecord, test_listing};

        let (service, store, _cache, _queue) = service();
        let low = RecommendationRecord {
            score: 1,
            ..RecommendationRecord::for_view(7, &test_listing(1, 0))
        };
        let mut high = RecommendationRecord::for_view(7, &test_listing(2, 0));
        high.score = 9;
        store.upsert_recommendation(low).await.unwrap();
        store.upsert_recommendation(high).await.unwrap();

        let entries = service.recommendations(7).await.unwrap();
        assert_eq!(entries[0].listing_id, 2);
        assert_eq!(entries[1].listing_id, 1);
    }

    #[tokio::test]
    async fn mutations_only_enqueue() {
        let (service, store, _cache, queue) = service();
        store.insert_user(test_user(7));

        assert!(service.record_view(7, 3));
        assert!(service.set_favorite(7, 3, FavoriteAction::Add));

        // Store untouched until the worker runs.
        let user = store.find_user(7).await.unwrap().unwrap();
        assert!(user.seen_ids.is_empty());
        assert!(user.collect_ids.is_empty());
        assert_eq!(queue.len(), 3);
    }
}
