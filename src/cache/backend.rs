//! Cache endpoint abstraction.
//!
//! A [`CacheBackend`] is one addressable cache endpoint (a Redis instance,
//! an in-process map, ...). It exposes the three value shapes the
//! subsystem stores: strings, ordered lists, and unordered sets. Lists and
//! sets are only ever replaced wholesale; absent, expired, and empty
//! collections all read as `None` so callers treat them uniformly as
//! misses.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    Connection(String),
    #[error("cache protocol error: {0}")]
    Protocol(String),
    #[error("cache operation timed out")]
    Timeout,
}

#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, CacheError>;

    /// Deletes the key and writes `items` in order. An empty slice leaves
    /// the key deleted.
    async fn replace_list(
        &self,
        key: &str,
        items: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError>;

    async fn get_set(&self, key: &str) -> Result<Option<BTreeSet<String>>, CacheError>;

    /// Deletes the key and writes `members`. An empty set leaves the key
    /// deleted.
    async fn replace_set(
        &self,
        key: &str,
        members: &BTreeSet<String>,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(Vec<String>),
    Set(BTreeSet<String>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process [`CacheBackend`] with per-entry expiry.
///
/// Backs the test suite and self-contained deployments. Expired entries
/// are evicted lazily on access.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_live(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.value.clone());
            }
        }
        // Either absent or expired; drop a stale entry if one is there.
        self.entries.remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        None
    }

    fn write(&self, key: &str, value: Value, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn wrong_type(expected: &'static str, found: &Value) -> CacheError {
        CacheError::Protocol(format!(
            "wrong value type: expected {expected}, found {}",
            found.kind()
        ))
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.read_live(key) {
            None => Ok(None),
            Some(Value::Text(text)) => Ok(Some(text)),
            Some(other) => Err(Self::wrong_type("string", &other)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.write(key, Value::Text(value.to_string()), ttl);
        Ok(())
    }

    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, CacheError> {
        match self.read_live(key) {
            None => Ok(None),
            Some(Value::List(items)) if items.is_empty() => Ok(None),
            Some(Value::List(items)) => Ok(Some(items)),
            Some(other) => Err(Self::wrong_type("list", &other)),
        }
    }

    async fn replace_list(
        &self,
        key: &str,
        items: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if items.is_empty() {
            self.entries.remove(key);
        } else {
            self.write(key, Value::List(items.to_vec()), ttl);
        }
        Ok(())
    }

    async fn get_set(&self, key: &str) -> Result<Option<BTreeSet<String>>, CacheError> {
        match self.read_live(key) {
            None => Ok(None),
            Some(Value::Set(members)) if members.is_empty() => Ok(None),
            Some(Value::Set(members)) => Ok(Some(members)),
            Some(other) => Err(Self::wrong_type("set", &other)),
        }
    }

    async fn replace_set(
        &self,
        key: &str,
        members: &BTreeSet<String>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if members.is_empty() {
            self.entries.remove(key);
        } else {
            self.write(key, Value::Set(members.clone()), ttl);
        }
        Ok(())
    }
}
