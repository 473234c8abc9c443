//! In-memory store adapter.
//!
//! Implements the repository traits over plain maps, for the test suite
//! and self-contained deployments. The relational adapter lives in the
//! host application.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::application::repos::{
    ListingsRepo, RecommendationsRepo, RepoError, UsersRepo,
};
use crate::domain::entities::{ListingRecord, RecommendationRecord, UserRecord};
use crate::infra::lock::{rw_read, rw_write};

const SOURCE: &str = "infra::memory";

#[derive(Default)]
pub struct MemoryStore {
    listings: RwLock<HashMap<i64, ListingRecord>>,
    users: RwLock<HashMap<i64, UserRecord>>,
    recommendations: RwLock<HashMap<(i64, i64), RecommendationRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_listing(&self, listing: ListingRecord) {
        rw_write(&self.listings, SOURCE, "insert_listing").insert(listing.id, listing);
    }

    pub fn insert_user(&self, user: UserRecord) {
        rw_write(&self.users, SOURCE, "insert_user").insert(user.id, user);
    }
}

#[async_trait]
impl ListingsRepo for MemoryStore {
    async fn find_listing(&self, listing_id: i64) -> Result<Option<ListingRecord>, RepoError> {
        Ok(rw_read(&self.listings, SOURCE, "find_listing")
            .get(&listing_id)
            .cloned())
    }

    async fn sample_listings(&self, limit: usize) -> Result<Vec<ListingRecord>, RepoError> {
        let mut listings: Vec<ListingRecord> = rw_read(&self.listings, SOURCE, "sample_listings")
            .values()
            .cloned()
            .collect();
        fastrand::shuffle(&mut listings);
        listings.truncate(limit);
        Ok(listings)
    }

    async fn top_viewed_listings(&self, limit: usize) -> Result<Vec<ListingRecord>, RepoError> {
        let mut listings: Vec<ListingRecord> =
            rw_read(&self.listings, SOURCE, "top_viewed_listings")
                .values()
                .cloned()
                .collect();
        // Ties break on id for a stable ranking.
        listings.sort_by(|a, b| b.page_views.cmp(&a.page_views).then(a.id.cmp(&b.id)));
        listings.truncate(limit);
        Ok(listings)
    }

    async fn set_page_views(&self, listing_id: i64, views: i64) -> Result<(), RepoError> {
        let mut listings = rw_write(&self.listings, SOURCE, "set_page_views");
        let listing = listings.get_mut(&listing_id).ok_or(RepoError::NotFound)?;
        listing.page_views = views;
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, RepoError> {
        Ok(rw_read(&self.users, SOURCE, "find_user")
            .get(&user_id)
            .cloned())
    }

    async fn update_seen_ids(&self, user_id: i64, seen_ids: &[i64]) -> Result<(), RepoError> {
        let mut users = rw_write(&self.users, SOURCE, "update_seen_ids");
        let user = users.get_mut(&user_id).ok_or(RepoError::NotFound)?;
        user.seen_ids = seen_ids.to_vec();
        Ok(())
    }

    async fn update_collect_ids(&self, user_id: i64, collect_ids: &[i64]) -> Result<(), RepoError> {
        let mut users = rw_write(&self.users, SOURCE, "update_collect_ids");
        let user = users.get_mut(&user_id).ok_or(RepoError::NotFound)?;
        user.collect_ids = collect_ids.to_vec();
        Ok(())
    }
}

#[async_trait]
impl RecommendationsRepo for MemoryStore {
    async fn find_recommendation(
        &self,
        user_id: i64,
        listing_id: i64,
    ) -> Result<Option<RecommendationRecord>, RepoError> {
        Ok(rw_read(&self.recommendations, SOURCE, "find_recommendation")
            .get(&(user_id, listing_id))
            .cloned())
    }

    async fn upsert_recommendation(&self, record: RecommendationRecord) -> Result<(), RepoError> {
        rw_write(&self.recommendations, SOURCE, "upsert_recommendation")
            .insert((record.user_id, record.listing_id), record);
        Ok(())
    }

    async fn recommendations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<RecommendationRecord>, RepoError> {
        Ok(
            rw_read(&self.recommendations, SOURCE, "recommendations_for_user")
                .values()
                .filter(|record| record.user_id == user_id)
                .cloned()
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{test_listing, test_user};

    #[tokio::test]
    async fn sample_respects_limit() {
        let store = MemoryStore::new();
        for id in 1..=10 {
            store.insert_listing(test_listing(id, 0));
        }
        let sample = store.sample_listings(6).await.unwrap();
        assert_eq!(sample.len(), 6);
        let short = store.sample_listings(100).await.unwrap();
        assert_eq!(short.len(), 10);
    }

    #[tokio::test]
    async fn top_viewed_orders_descending() {
        let store = MemoryStore::new();
        store.insert_listing(test_listing(1, 5));
        store.insert_listing(test_listing(2, 50));
        store.insert_listing(test_listing(3, 20));
        let top = store.top_viewed_listings(2).await.unwrap();
        assert_eq!(top.iter().map(|l| l.id).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[tokio::test]
    async fn set_page_views_rejects_unknown_listing() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.set_page_views(404, 1).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_row() {
        let store = MemoryStore::new();
        let mut record = RecommendationRecord::for_view(7, &test_listing(3, 0));
        store.upsert_recommendation(record.clone()).await.unwrap();
        record.bump();
        store.upsert_recommendation(record).await.unwrap();

        let found = store.find_recommendation(7, 3).await.unwrap().unwrap();
        assert_eq!(found.score, 2);
        assert_eq!(store.recommendations_for_user(7).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn seen_ids_update_is_wholesale() {
        let store = MemoryStore::new();
        store.insert_user(test_user(7));
        store.update_seen_ids(7, &[3, 2, 1]).await.unwrap();
        let user = store.find_user(7).await.unwrap().unwrap();
        assert_eq!(user.seen_ids, vec![3, 2, 1]);
        assert!(matches!(
            store.update_seen_ids(999, &[1]).await,
            Err(RepoError::NotFound)
        ));
    }
}
