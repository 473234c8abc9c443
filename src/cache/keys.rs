//! Cache key namespace.
//!
//! All cached aggregates live in one flat string keyspace under a common
//! prefix. The exact shapes are load-bearing: a deployed cache may hold
//! entries written by earlier processes, so renaming a key orphans data.

/// Default key prefix for every cache entry.
pub const DEFAULT_KEY_PREFIX: &str = "rental_house:";

/// One cache key per aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Random sample of listings for the landing page.
    HotListings,
    /// Most-viewed listings for the landing page.
    HighViewListings,
    /// Per-user browsing history (ordered list).
    UserHistory(i64),
    /// Per-user favorites (unordered set).
    UserFavorites(i64),
    /// Per-user recommendation entries.
    Recommendations(i64),
    /// Full detail snapshot of one listing.
    ListingDetail(i64),
}

impl CacheKey {
    /// Renders the key under `prefix`.
    pub fn render(&self, prefix: &str) -> String {
        match self {
            Self::HotListings => format!("{prefix}hot_houses"),
            Self::HighViewListings => format!("{prefix}high_view_houses"),
            Self::UserHistory(user_id) => format!("{prefix}user_history:{user_id}"),
            Self::UserFavorites(user_id) => format!("{prefix}user_collection:{user_id}"),
            Self::Recommendations(user_id) => format!("{prefix}recommend:{user_id}"),
            Self::ListingDetail(listing_id) => format!("{prefix}house_detail:{listing_id}"),
        }
    }

    /// Stable aggregate label for metrics.
    pub fn aggregate(&self) -> &'static str {
        match self {
            Self::HotListings => "hot_listings",
            Self::HighViewListings => "high_view_listings",
            Self::UserHistory(_) => "user_history",
            Self::UserFavorites(_) => "user_favorites",
            Self::Recommendations(_) => "recommendations",
            Self::ListingDetail(_) => "listing_detail",
        }
    }
}
