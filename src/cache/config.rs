//! Cache subsystem configuration.
//!
//! Controls key naming, entry TTL, queue bounds, worker polling, and the
//! periodic refresh cadence via `affitto.toml`.

use std::time::Duration;

use serde::Deserialize;

use crate::cache::keys::DEFAULT_KEY_PREFIX;

// Default values for cache configuration
const DEFAULT_TTL_SECONDS: u64 = 60 * 60 * 24;
const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_DRAIN_BATCH_LIMIT: usize = 100;
const DEFAULT_REFRESH_CADENCE_SECONDS: u64 = 60 * 60;

/// Cache configuration from `affitto.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix applied to every cache key.
    pub key_prefix: String,
    /// Entry lifetime in seconds; reset on every write.
    pub ttl_seconds: u64,
    /// Maximum queued update intents before new ones are rejected.
    pub queue_capacity: usize,
    /// Worker queue-poll interval (ms).
    pub poll_interval_ms: u64,
    /// Maximum tasks drained per worker pass.
    pub drain_batch_limit: usize,
    /// Seconds between periodic hot/high-view refreshes.
    pub refresh_cadence_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            drain_batch_limit: DEFAULT_DRAIN_BATCH_LIMIT,
            refresh_cadence_seconds: DEFAULT_REFRESH_CADENCE_SECONDS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            key_prefix: settings.key_prefix.clone(),
            ttl_seconds: settings.ttl_seconds,
            queue_capacity: settings.queue_capacity,
            poll_interval_ms: settings.poll_interval_ms,
            drain_batch_limit: settings.drain_batch_limit,
            refresh_cadence_seconds: settings.refresh_cadence_seconds,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn refresh_cadence(&self) -> Duration {
        Duration::from_secs(self.refresh_cadence_seconds.max(1))
    }

    /// Drain batch limit, clamping to 1 if configured as zero.
    pub fn drain_batch_limit_clamped(&self) -> usize {
        self.drain_batch_limit.max(1)
    }
}
