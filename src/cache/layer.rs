//! Typed cache access layer.
//!
//! One getter/setter pair per cached aggregate. All operations are
//! fail-soft: getters return `Option` (any backend or decode failure is
//! reported as a miss), setters return `bool` (`false` means the write was
//! not applied and the cache may be stale until the TTL expires). Errors
//! are logged and counted here and never propagated.
//!
//! Wire formats, fixed by already-deployed caches:
//! - hot / high-view listings, recommendations, listing detail: JSON
//! - user history: list of decimal listing-id strings, most recent first
//! - user favorites: set of decimal listing-id strings

use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::config::CacheConfig;
use crate::cache::keys::CacheKey;
use crate::cache::routing::ReplicatedCache;
use crate::domain::entities::{ListingRecord, RecommendationRecord};

const METRIC_CACHE_HIT: &str = "affitto_cache_hit_total";
const METRIC_CACHE_MISS: &str = "affitto_cache_miss_total";
const METRIC_CACHE_ERROR: &str = "affitto_cache_error_total";

/// Card-sized listing projection for the landing-page collections.
///
/// `page_views` is present only in the high-view aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCard {
    pub id: i64,
    pub title: String,
    pub price: String,
    pub area: String,
    pub rooms: String,
    pub region: String,
    pub block: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_views: Option<i64>,
}

impl ListingCard {
    pub fn from_record(listing: &ListingRecord) -> Self {
        Self {
            id: listing.id,
            title: listing.title.clone(),
            price: listing.price.clone(),
            area: listing.area.clone(),
            rooms: listing.rooms.clone(),
            region: listing.region.clone(),
            block: listing.block.clone(),
            address: listing.address.clone(),
            page_views: None,
        }
    }

    /// Card with the view counter included, for the high-view aggregate.
    pub fn with_views(listing: &ListingRecord) -> Self {
        Self {
            page_views: Some(listing.page_views),
            ..Self::from_record(listing)
        }
    }
}

/// One scored entry in a user's recommendation aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub listing_id: i64,
    pub title: String,
    pub address: String,
    pub block: String,
    pub score: i64,
}

impl From<&RecommendationRecord> for RecommendationEntry {
    fn from(record: &RecommendationRecord) -> Self {
        Self {
            listing_id: record.listing_id,
            title: record.title.clone(),
            address: record.address.clone(),
            block: record.block.clone(),
            score: record.score,
        }
    }
}

/// Full flattened listing as cached for the detail page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSnapshot {
    pub id: i64,
    pub title: String,
    pub price: String,
    pub area: String,
    pub rooms: String,
    pub direction: String,
    pub rent_type: String,
    pub region: String,
    pub block: String,
    pub address: String,
    pub traffic: String,
    pub publish_time: String,
    pub facilities: String,
    pub highlights: String,
    pub matching: String,
    pub travel: String,
    pub page_views: i64,
    pub landlord: String,
    pub phone_num: String,
    pub house_num: String,
}

impl From<&ListingRecord> for ListingSnapshot {
    fn from(listing: &ListingRecord) -> Self {
        Self {
            id: listing.id,
            title: listing.title.clone(),
            price: listing.price.clone(),
            area: listing.area.clone(),
            rooms: listing.rooms.clone(),
            direction: listing.direction.clone(),
            rent_type: listing.rent_type.clone(),
            region: listing.region.clone(),
            block: listing.block.clone(),
            address: listing.address.clone(),
            traffic: listing.traffic.clone(),
            publish_time: listing.publish_time.clone(),
            facilities: listing.facilities.clone(),
            highlights: listing.highlights.clone(),
            matching: listing.matching.clone(),
            travel: listing.travel.clone(),
            page_views: listing.page_views,
            landlord: listing.landlord.clone(),
            phone_num: listing.phone_num.clone(),
            house_num: listing.house_num.clone(),
        }
    }
}

pub struct CacheLayer {
    cache: Arc<ReplicatedCache>,
    config: CacheConfig,
}

impl CacheLayer {
    pub fn new(cache: Arc<ReplicatedCache>, config: CacheConfig) -> Self {
        Self { cache, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn render(&self, key: &CacheKey) -> String {
        key.render(&self.config.key_prefix)
    }

    fn hit(key: &CacheKey) {
        counter!(METRIC_CACHE_HIT, "aggregate" => key.aggregate()).increment(1);
    }

    fn miss(key: &CacheKey) {
        counter!(METRIC_CACHE_MISS, "aggregate" => key.aggregate()).increment(1);
    }

    fn fault(key: &CacheKey, op: &'static str, err: &dyn std::fmt::Display) {
        warn!(
            op,
            aggregate = key.aggregate(),
            error = %err,
            "cache operation failed; degrading"
        );
        counter!(METRIC_CACHE_ERROR, "aggregate" => key.aggregate()).increment(1);
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let rendered = self.render(key);
        match self.cache.get(&rendered).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    Self::hit(key);
                    Some(value)
                }
                Err(err) => {
                    // An undecodable entry is as good as absent; the next
                    // write repairs it.
                    Self::fault(key, "decode", &err);
                    None
                }
            },
            Ok(None) => {
                Self::miss(key);
                None
            }
            Err(err) => {
                Self::fault(key, "get", &err);
                None
            }
        }
    }

    async fn write_json<T: Serialize>(&self, key: &CacheKey, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                Self::fault(key, "encode", &err);
                return false;
            }
        };
        let rendered = self.render(key);
        match self.cache.set(&rendered, &raw, self.config.ttl()).await {
            Ok(()) => true,
            Err(err) => {
                Self::fault(key, "set", &err);
                false
            }
        }
    }

    fn parse_ids(key: &CacheKey, raw: impl IntoIterator<Item = String>) -> Option<Vec<i64>> {
        let mut ids = Vec::new();
        for item in raw {
            match item.parse::<i64>() {
                Ok(id) => ids.push(id),
                Err(err) => {
                    Self::fault(key, "decode", &err);
                    return None;
                }
            }
        }
        Some(ids)
    }

    pub async fn hot_listings(&self) -> Option<Vec<ListingCard>> {
        self.read_json(&CacheKey::HotListings).await
    }

    pub async fn set_hot_listings(&self, cards: &[ListingCard]) -> bool {
        self.write_json(&CacheKey::HotListings, &cards).await
    }

    pub async fn high_view_listings(&self) -> Option<Vec<ListingCard>> {
        self.read_json(&CacheKey::HighViewListings).await
    }

    pub async fn set_high_view_listings(&self, cards: &[ListingCard]) -> bool {
        self.write_json(&CacheKey::HighViewListings, &cards).await
    }

    /// Browsing history, most recent first. At most 20 entries.
    pub async fn user_history(&self, user_id: i64) -> Option<Vec<i64>> {
        let key = CacheKey::UserHistory(user_id);
        match self.cache.get_list(&self.render(&key)).await {
            Ok(Some(items)) => {
                let ids = Self::parse_ids(&key, items)?;
                Self::hit(&key);
                Some(ids)
            }
            Ok(None) => {
                Self::miss(&key);
                None
            }
            Err(err) => {
                Self::fault(&key, "get_list", &err);
                None
            }
        }
    }

    pub async fn set_user_history(&self, user_id: i64, seen_ids: &[i64]) -> bool {
        let key = CacheKey::UserHistory(user_id);
        let items: Vec<String> = seen_ids.iter().map(i64::to_string).collect();
        match self
            .cache
            .replace_list(&self.render(&key), &items, self.config.ttl())
            .await
        {
            Ok(()) => true,
            Err(err) => {
                Self::fault(&key, "replace_list", &err);
                false
            }
        }
    }

    pub async fn user_favorites(&self, user_id: i64) -> Option<BTreeSet<i64>> {
        let key = CacheKey::UserFavorites(user_id);
        match self.cache.get_set(&self.render(&key)).await {
            Ok(Some(members)) => {
                let ids = Self::parse_ids(&key, members)?;
                Self::hit(&key);
                Some(ids.into_iter().collect())
            }
            Ok(None) => {
                Self::miss(&key);
                None
            }
            Err(err) => {
                Self::fault(&key, "get_set", &err);
                None
            }
        }
    }

    pub async fn set_user_favorites(&self, user_id: i64, collect_ids: &[i64]) -> bool {
        let key = CacheKey::UserFavorites(user_id);
        let members: BTreeSet<String> = collect_ids.iter().map(i64::to_string).collect();
        match self
            .cache
            .replace_set(&self.render(&key), &members, self.config.ttl())
            .await
        {
            Ok(()) => true,
            Err(err) => {
                Self::fault(&key, "replace_set", &err);
                false
            }
        }
    }

    /// Recommendation entries sorted by score, descending.
    pub async fn recommendations(&self, user_id: i64) -> Option<Vec<RecommendationEntry>> {
        let mut entries: Vec<RecommendationEntry> =
            self.read_json(&CacheKey::Recommendations(user_id)).await?;
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        Some(entries)
    }

    pub async fn set_recommendations(&self, user_id: i64, entries: &[RecommendationEntry]) -> bool {
        self.write_json(&CacheKey::Recommendations(user_id), &entries)
            .await
    }

    pub async fn listing_snapshot(&self, listing_id: i64) -> Option<ListingSnapshot> {
        self.read_json(&CacheKey::ListingDetail(listing_id)).await
    }

    pub async fn set_listing_snapshot(&self, snapshot: &ListingSnapshot) -> bool {
        self.write_json(&CacheKey::ListingDetail(snapshot.id), snapshot)
            .await
    }
}
