//! Affitto — the cache-consistency and asynchronous-update core of a
//! rental-listing application.
//!
//! The host application owns HTTP routing, templating, and the relational
//! store. This crate owns everything between a request handler and those
//! collaborators:
//!
//! - **Cache access layer** ([`cache::CacheLayer`]): typed, fail-soft
//!   read/write helpers over a primary/replica key-value cache with a fixed
//!   key namespace and 24-hour TTLs.
//! - **Task queue** ([`cache::TaskQueue`]): a bounded in-process FIFO of
//!   update intents, safe for many producers and a single consumer.
//! - **Background worker** ([`cache::TaskWorker`]): drains the queue in
//!   enqueue order, applying each intent to the store and then the cache.
//! - **Scheduler** ([`cache::RefreshScheduler`]): periodically re-enqueues
//!   the hot/high-view refresh intents.
//! - **Read/write-path policy** ([`application::listings`],
//!   [`application::activity`]): strict cache-aside reads, write-behind
//!   mutations.
//!
//! The authoritative store is abstract (see [`application::repos`]); an
//! in-memory adapter lives in [`infra::memory`]. A Redis cache backend is
//! available behind the `redis` cargo feature.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
