//! Cache consistency subsystem.
//!
//! Layering, bottom up:
//! - [`backend`]: one cache endpoint (in-memory, or Redis behind the
//!   `redis` feature)
//! - [`routing`]: primary/replica split with read failover
//! - [`layer`]: typed, fail-soft access to the named aggregates
//! - [`tasks`] / [`worker`]: bounded intent queue and its single consumer
//! - [`scheduler`]: periodic hot/high-view refresh
//!
//! Reads are cache-aside and writes are write-behind; the policies that
//! tie the pieces together live in [`crate::application`].

pub mod backend;
pub mod config;
pub mod keys;
pub mod layer;
#[cfg(feature = "redis")]
pub mod redis;
pub mod routing;
pub mod scheduler;
pub mod tasks;
pub mod worker;

pub use backend::{CacheBackend, CacheError, MemoryBackend};
pub use config::CacheConfig;
pub use keys::{CacheKey, DEFAULT_KEY_PREFIX};
pub use layer::{CacheLayer, ListingCard, ListingSnapshot, RecommendationEntry};
#[cfg(feature = "redis")]
pub use redis::RedisBackend;
pub use routing::ReplicatedCache;
pub use scheduler::RefreshScheduler;
pub use tasks::{FavoriteAction, QueuedTask, Task, TaskQueue};
pub use worker::{
    HIGH_VIEW_LIMIT, HOT_LISTINGS_SAMPLE, StopHandle, TaskWorker, prime_initial_cache,
    refresh_high_view_listings, refresh_hot_listings,
};
