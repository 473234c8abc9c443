//! Redis-backed cache endpoint (cargo feature `redis`).
//!
//! One `RedisBackend` per endpoint; the primary/replica split is composed
//! above this layer. Collection replacement runs as an atomic
//! DEL + RPUSH/SADD + EXPIRE pipeline so concurrent readers never observe
//! a half-written aggregate.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::cache::backend::{CacheBackend, CacheError};

#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Connects to `url` (e.g. `redis://127.0.0.1:6379/0`) and starts a
    /// reconnecting connection manager.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(map_err)?;
        let conn = ConnectionManager::new(client).await.map_err(map_err)?;
        Ok(Self { conn })
    }
}

fn map_err(err: redis::RedisError) -> CacheError {
    if err.is_timeout() {
        CacheError::Timeout
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        CacheError::Connection(err.to_string())
    } else {
        CacheError::Protocol(err.to_string())
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(map_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.set_ex(key, value, ttl.as_secs()).await.map_err(map_err)
    }

    async fn get_list(&self, key: &str) -> Result<Option<Vec<String>>, CacheError> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(key, 0, -1).await.map_err(map_err)?;
        Ok(if items.is_empty() { None } else { Some(items) })
    }

    async fn replace_list(
        &self,
        key: &str,
        items: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !items.is_empty() {
            pipe.rpush(key, items)
                .ignore()
                .expire(key, ttl.as_secs() as i64)
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await.map_err(map_err)
    }

    async fn get_set(&self, key: &str) -> Result<Option<BTreeSet<String>>, CacheError> {
        let mut conn = self.conn.clone();
        let members: BTreeSet<String> = conn.smembers(key).await.map_err(map_err)?;
        Ok(if members.is_empty() { None } else { Some(members) })
    }

    async fn replace_set(
        &self,
        key: &str,
        members: &BTreeSet<String>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !members.is_empty() {
            let members: Vec<&str> = members.iter().map(String::as_str).collect();
            pipe.sadd(key, members)
                .ignore()
                .expire(key, ttl.as_secs() as i64)
                .ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await.map_err(map_err)
    }
}
