//! Configuration layer: typed settings with layered precedence (file → env).

use std::{path::Path, str::FromStr};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "affitto";
const ENV_PREFIX: &str = "AFFITTO";

const DEFAULT_KEY_PREFIX: &str = "rental_house:";
const DEFAULT_TTL_SECONDS: u64 = 60 * 60 * 24;
const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_DRAIN_BATCH_LIMIT: usize = 100;
const DEFAULT_REFRESH_CADENCE_SECONDS: u64 = 60 * 60;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Primary cache endpoint URL; `None` selects the in-memory backend.
    pub primary_url: Option<String>,
    /// Read-replica endpoint URL, if the deployment has one.
    pub replica_url: Option<String>,
    pub key_prefix: String,
    pub ttl_seconds: u64,
    pub queue_capacity: usize,
    pub poll_interval_ms: u64,
    pub drain_batch_limit: usize,
    pub refresh_cadence_seconds: u64,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment).
pub fn load() -> Result<Settings, LoadError> {
    let raw: RawSettings = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;
    Settings::from_raw(raw)
}

/// Load settings from an explicit file, still honoring environment overrides.
pub fn load_from(path: &Path) -> Result<Settings, LoadError> {
    let raw: RawSettings = Config::builder()
        .add_source(File::from(path).required(true))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    primary_url: Option<String>,
    replica_url: Option<String>,
    key_prefix: Option<String>,
    ttl_seconds: Option<u64>,
    queue_capacity: Option<usize>,
    poll_interval_ms: Option<u64>,
    drain_batch_limit: Option<usize>,
    refresh_cadence_seconds: Option<u64>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, cache } = raw;

        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self { logging, cache })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let primary_url = normalize_url(cache.primary_url);
    let replica_url = normalize_url(cache.replica_url);
    if primary_url.is_none() && replica_url.is_some() {
        return Err(LoadError::invalid(
            "cache.replica_url",
            "a replica requires a primary_url",
        ));
    }

    let key_prefix = cache
        .key_prefix
        .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
    if key_prefix.trim().is_empty() {
        return Err(LoadError::invalid("cache.key_prefix", "must not be empty"));
    }

    let ttl_seconds = cache.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS);
    if ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_seconds",
            "must be greater than zero",
        ));
    }

    let queue_capacity = cache.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
    if queue_capacity == 0 {
        return Err(LoadError::invalid(
            "cache.queue_capacity",
            "must be greater than zero",
        ));
    }

    let poll_interval_ms = cache.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS);
    if poll_interval_ms == 0 {
        return Err(LoadError::invalid(
            "cache.poll_interval_ms",
            "must be greater than zero",
        ));
    }

    let drain_batch_limit = cache.drain_batch_limit.unwrap_or(DEFAULT_DRAIN_BATCH_LIMIT);
    if drain_batch_limit == 0 {
        return Err(LoadError::invalid(
            "cache.drain_batch_limit",
            "must be greater than zero",
        ));
    }

    let refresh_cadence_seconds = cache
        .refresh_cadence_seconds
        .unwrap_or(DEFAULT_REFRESH_CADENCE_SECONDS);
    if refresh_cadence_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.refresh_cadence_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CacheSettings {
        primary_url,
        replica_url,
        key_prefix,
        ttl_seconds,
        queue_capacity,
        poll_interval_ms,
        drain_batch_limit,
        refresh_cadence_seconds,
    })
}

fn normalize_url(url: Option<String>) -> Option<String> {
    url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests;
