//! Primary/replica cache routing.
//!
//! Reads prefer the replica; any replica error triggers a single retry of
//! the identical read against the primary. Writes always go to the
//! primary and rely on the deployment's own replication. There is no
//! health tracking: routing is re-evaluated from scratch on every call.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::warn;

use crate::cache::backend::{CacheBackend, CacheError};

const METRIC_REPLICA_FAILOVER: &str = "affitto_cache_replica_failover_total";

pub struct ReplicatedCache {
    primary: Arc<dyn CacheBackend>,
    replica: Option<Arc<dyn CacheBackend>>,
}

impl ReplicatedCache {
    /// Single-endpoint deployment: all traffic to `primary`.
    pub fn new(primary: Arc<dyn CacheBackend>) -> Self {
        Self {
            primary,
            replica: None,
        }
    }

    pub fn with_replica(primary: Arc<dyn CacheBackend>, replica: Arc<dyn CacheBackend>) -> Self {
        Self {
            primary,
            replica: Some(replica),
        }
    }

    fn note_failover(op: &'static str, key: &str, err: &CacheError) {
        warn!(op, key, error = %err, "replica read failed; retrying against primary");
        counter!(METRIC_REPLICA_FAILOVER, "op" => op).increment(1);
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let Some(replica) = &self.replica else {
            return self.primary.get(key).await;
        };
        match replica.get(key).await {
            Ok(value) => Ok(value),
            Err(err) => {
                Self::note_failover("get", key, &err);
                self.primary.get(key).await
            }
        }
    }

    pub async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, CacheError> {
        let Some(replica) = &self.replica else {
            return self.primary.get_list(key).await;
        };
        match replica.get_list(key).await {
            Ok(items) => Ok(items),
            Err(err) => {
                Self::note_failover("get_list", key, &err);
                self.primary.get_list(key).await
            }
        }
    }

    pub async fn get_set(&self, key: &str) -> Result<Option<BTreeSet<String>>, CacheError> {
        let Some(replica) = &self.replica else {
            return self.primary.get_set(key).await;
        };
        match replica.get_set(key).await {
            Ok(members) => Ok(members),
            Err(err) => {
                Self::note_failover("get_set", key, &err);
                self.primary.get_set(key).await
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.primary.set(key, value, ttl).await
    }

    pub async fn replace_list(
        &self,
        key: &str,
        items: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.primary.replace_list(key, items, ttl).await
    }

    pub async fn replace_set(
        &self,
        key: &str,
        members: &BTreeSet<String>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.primary.replace_set(key, members, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::cache::backend::MemoryBackend;

    const TTL: Duration = Duration::from_secs(60);

    /// Backend whose every operation fails with a connection error.
    struct DownBackend;

    #[async_trait]
    impl CacheBackend for DownBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Connection("down".into()))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Connection("down".into()))
        }
        async fn get_list(&self, _key: &str) -> Result<Option<Vec<String>>, CacheError> {
            Err(CacheError::Connection("down".into()))
        }
        async fn replace_list(
            &self,
            _key: &str,
            _items: &[String],
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Connection("down".into()))
        }
        async fn get_set(&self, _key: &str) -> Result<Option<BTreeSet<String>>, CacheError> {
            Err(CacheError::Connection("down".into()))
        }
        async fn replace_set(
            &self,
            _key: &str,
            _members: &BTreeSet<String>,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Connection("down".into()))
        }
    }

    #[tokio::test]
    async fn reads_prefer_replica() {
        let primary = Arc::new(MemoryBackend::new());
        let replica = Arc::new(MemoryBackend::new());
        replica.set("k", "from-replica", TTL).await.unwrap();
        primary.set("k", "from-primary", TTL).await.unwrap();

        let cache = ReplicatedCache::with_replica(primary, replica);
        assert_eq!(
            cache.get("k").await.unwrap(),
            Some("from-replica".to_string())
        );
    }

    #[tokio::test]
    async fn replica_failure_falls_back_to_primary() {
        let primary = Arc::new(MemoryBackend::new());
        primary.set("k", "from-primary", TTL).await.unwrap();

        let cache = ReplicatedCache::with_replica(primary, Arc::new(DownBackend));
        assert_eq!(
            cache.get("k").await.unwrap(),
            Some("from-primary".to_string())
        );
    }

    #[tokio::test]
    async fn writes_bypass_replica() {
        let primary = Arc::new(MemoryBackend::new());
        let replica = Arc::new(MemoryBackend::new());
        let cache = ReplicatedCache::with_replica(primary.clone(), replica.clone());

        cache.set("k", "v", TTL).await.unwrap();
        assert_eq!(primary.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(replica.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn both_down_surfaces_the_primary_error() {
        let cache = ReplicatedCache::with_replica(Arc::new(DownBackend), Arc::new(DownBackend));
        assert!(matches!(
            cache.get("k").await,
            Err(CacheError::Connection(_))
        ));
    }
}
