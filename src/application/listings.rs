//! Listing read paths: landing-page aggregates and the detail page.
//!
//! Reads are strictly cache-aside: try the cache, fall back to the store,
//! repopulate the cache on the way out. The detail read additionally
//! records its side effects (view count, history, recommendation) as
//! queued intents — it never writes the store inline.

use std::sync::Arc;

use tracing::debug;

use crate::application::error::AppError;
use crate::application::repos::Store;
use crate::cache::layer::{CacheLayer, ListingCard, ListingSnapshot};
use crate::cache::tasks::{Task, TaskQueue};
use crate::cache::worker::{refresh_high_view_listings, refresh_hot_listings};
use crate::domain::error::DomainError;

pub struct ListingService {
    store: Arc<dyn Store>,
    cache: Arc<CacheLayer>,
    queue: Arc<TaskQueue>,
}

impl ListingService {
    pub fn new(store: Arc<dyn Store>, cache: Arc<CacheLayer>, queue: Arc<TaskQueue>) -> Self {
        Self {
            store,
            cache,
            queue,
        }
    }

    /// Random landing-page sample. May be up to one refresh cadence stale.
    pub async fn hot_listings(&self) -> Result<Vec<ListingCard>, AppError> {
        if let Some(cards) = self.cache.hot_listings().await {
            return Ok(cards);
        }
        debug!("hot listings miss; rebuilding from store");
        Ok(refresh_hot_listings(self.store.as_ref(), &self.cache).await?)
    }

    /// Most-viewed landing-page ranking.
    pub async fn high_view_listings(&self) -> Result<Vec<ListingCard>, AppError> {
        if let Some(cards) = self.cache.high_view_listings().await {
            return Ok(cards);
        }
        debug!("high-view listings miss; rebuilding from store");
        Ok(refresh_high_view_listings(self.store.as_ref(), &self.cache).await?)
    }

    /// Detail-page read. Returns the current snapshot and queues the
    /// view's side effects; the returned view count does not yet include
    /// this view. The snapshot may be stale, so the increment is left to
    /// the worker, which counts against the live store row.
    pub async fn listing_detail(
        &self,
        listing_id: i64,
        viewer: Option<i64>,
    ) -> Result<ListingSnapshot, AppError> {
        let snapshot = match self.cache.listing_snapshot(listing_id).await {
            Some(snapshot) => snapshot,
            None => {
                let listing = self
                    .store
                    .find_listing(listing_id)
                    .await?
                    .ok_or(DomainError::not_found("listing"))?;
                let snapshot = ListingSnapshot::from(&listing);
                self.cache.set_listing_snapshot(&snapshot).await;
                snapshot
            }
        };

        self.queue.enqueue(Task::IncrementListingViewCount { listing_id });
        if let Some(user_id) = viewer {
            self.queue.enqueue(Task::RecordUserView {
                user_id,
                listing_id,
            });
            self.queue.enqueue(Task::BumpRecommendation {
                user_id,
                listing_id,
            });
        }
        Ok(snapshot)
    }
}
