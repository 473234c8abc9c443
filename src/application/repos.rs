//! Repository traits describing the authoritative store.
//!
//! The relational implementation lives in the host application; this crate
//! only depends on these traits. Each method is transactional at
//! single-call granularity — the store applies it fully or returns an
//! error, and the caller never sees a partially-applied write.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{ListingRecord, RecommendationRecord, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("store error: {0}")]
    Persistence(String),
    #[error("store row not found")]
    NotFound,
    #[error("store operation timed out")]
    Timeout,
}

impl RepoError {
    pub fn persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait ListingsRepo: Send + Sync {
    async fn find_listing(&self, listing_id: i64) -> Result<Option<ListingRecord>, RepoError>;

    /// Up to `limit` listings drawn uniformly at random.
    async fn sample_listings(&self, limit: usize) -> Result<Vec<ListingRecord>, RepoError>;

    /// Up to `limit` listings ordered by view count, descending.
    async fn top_viewed_listings(&self, limit: usize) -> Result<Vec<ListingRecord>, RepoError>;

    /// Overwrites a listing's view counter with an absolute value.
    async fn set_page_views(&self, listing_id: i64, views: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, RepoError>;

    /// Replaces the user's browsing history wholesale.
    async fn update_seen_ids(&self, user_id: i64, seen_ids: &[i64]) -> Result<(), RepoError>;

    /// Replaces the user's favorites wholesale.
    async fn update_collect_ids(&self, user_id: i64, collect_ids: &[i64]) -> Result<(), RepoError>;
}

#[async_trait]
pub trait RecommendationsRepo: Send + Sync {
    async fn find_recommendation(
        &self,
        user_id: i64,
        listing_id: i64,
    ) -> Result<Option<RecommendationRecord>, RepoError>;

    /// Inserts or replaces the row keyed by `(user_id, listing_id)`.
    async fn upsert_recommendation(&self, record: RecommendationRecord) -> Result<(), RepoError>;

    async fn recommendations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<RecommendationRecord>, RepoError>;
}

/// The full store surface the worker and services operate against.
pub trait Store: ListingsRepo + UsersRepo + RecommendationsRepo {}

impl<T> Store for T where T: ListingsRepo + UsersRepo + RecommendationsRepo {}
