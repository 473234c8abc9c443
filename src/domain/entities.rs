//! Core records for the rental-listing domain.
//!
//! These mirror the authoritative store's rows. The browsing-history and
//! favorites invariants live here as methods on [`UserRecord`] so that every
//! writer (the background worker today, anything else tomorrow) enforces the
//! same rules.

use serde::{Deserialize, Serialize};

/// Maximum number of listing ids retained in a user's browsing history.
pub const HISTORY_LIMIT: usize = 20;

/// A rental listing, flattened to the shape the store hands back.
///
/// Textual fields stay as the store's display strings (`price`, `area`,
/// `publish_time`, ...); only identifiers and counters are numeric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
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

/// A registered user, with the two listing-id lists the cache mirrors.
///
/// `seen_ids` is ordered most-recent-first and never exceeds
/// [`HISTORY_LIMIT`]; `collect_ids` is a duplicate-free favorites list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub password: String,
    pub email: String,
    pub address: String,
    pub collect_ids: Vec<i64>,
    pub seen_ids: Vec<i64>,
}

impl UserRecord {
    /// Records a listing view: moves (or inserts) the id to the front of the
    /// history and truncates to [`HISTORY_LIMIT`].
    pub fn record_view(&mut self, listing_id: i64) {
        self.seen_ids.retain(|id| *id != listing_id);
        self.seen_ids.insert(0, listing_id);
        self.seen_ids.truncate(HISTORY_LIMIT);
    }

    /// Adds a listing to the favorites. Returns `false` when it was already
    /// present, in which case nothing changed.
    pub fn add_favorite(&mut self, listing_id: i64) -> bool {
        if self.collect_ids.contains(&listing_id) {
            return false;
        }
        self.collect_ids.push(listing_id);
        true
    }

    /// Removes a listing from the favorites. Returns `false` when it was not
    /// present.
    pub fn remove_favorite(&mut self, listing_id: i64) -> bool {
        let before = self.collect_ids.len();
        self.collect_ids.retain(|id| *id != listing_id);
        self.collect_ids.len() != before
    }

    pub fn is_favorite(&self, listing_id: i64) -> bool {
        self.collect_ids.contains(&listing_id)
    }
}

/// Per-user, per-listing interest score. One row per (user, listing) pair;
/// the score grows by one for every recorded view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub user_id: i64,
    pub listing_id: i64,
    pub title: String,
    pub address: String,
    pub block: String,
    pub score: i64,
}

impl RecommendationRecord {
    /// A fresh row for a first view of `listing`, seeded with score 1.
    pub fn for_view(user_id: i64, listing: &ListingRecord) -> Self {
        Self {
            user_id,
            listing_id: listing.id,
            title: listing.title.clone(),
            address: listing.address.clone(),
            block: listing.block.clone(),
            score: 1,
        }
    }

    pub fn bump(&mut self) {
        self.score += 1;
    }
}

#[cfg(test)]
pub(crate) fn test_listing(id: i64, page_views: i64) -> ListingRecord {
    ListingRecord {
        id,
        title: format!("listing {id}"),
        price: "1200".into(),
        area: "45".into(),
        rooms: "2".into(),
        direction: "south".into(),
        rent_type: "whole".into(),
        region: "center".into(),
        block: "old town".into(),
        address: format!("{id} Oak Ave"),
        traffic: "metro".into(),
        publish_time: "2026-01-01".into(),
        facilities: "wifi".into(),
        highlights: "bright".into(),
        matching: "furnished".into(),
        travel: "10min".into(),
        page_views,
        landlord: "bob".into(),
        phone_num: "555".into(),
        house_num: format!("A-{id}"),
    }
}

#[cfg(test)]
pub(crate) fn test_user(id: i64) -> UserRecord {
    UserRecord {
        id,
        name: format!("user {id}"),
        password: "secret".into(),
        email: format!("user{id}@example.com"),
        address: "1 Main St".into(),
        collect_ids: Vec::new(),
        seen_ids: Vec::new(),
    }
}
