//! Cache management module
//!
//! Every backend implements [`Cache`] over JSON values so the manager can
//! hand out `Arc<dyn Cache>` regardless of strategy.

mod config;
mod entry;
mod manager;
mod memory;
mod pattern;
mod storage;
mod strategy;
mod sweeper;

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::CacheError;

pub use config::CacheConfig;
pub use entry::{CacheEntry, is_expired};
pub use manager::CacheManager;
pub use memory::MemoryCache;
pub use pattern::{compile_glob, glob_to_regex};
pub use storage::StorageCache;
pub use strategy::{CacheStrategy, ParseCacheStrategyError};

/// Counters for a single cache instance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub max_size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// A named TTL + LRU cache of JSON values
pub trait Cache: Send + Sync {
    fn name(&self) -> &str;

    fn strategy(&self) -> CacheStrategy;

    /// Value for `key`, or `None` when absent or expired
    fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Insert `value`, evicting the least recently used entry when full
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Remove `key`, returning whether it was present
    fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Like `get` but without refreshing recency
    fn has(&self, key: &str) -> Result<bool, CacheError>;

    fn clear(&self) -> Result<(), CacheError>;

    /// Remove every key matching a `*` glob, returning the count
    fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Number of stored entries, expired ones included until swept
    fn size(&self) -> Result<usize, CacheError>;

    fn stats(&self) -> CacheStats;

    /// Remove all expired entries, returning the count
    fn purge_expired(&self) -> Result<usize, CacheError>;

    /// Stop background work and drop all entries
    fn destroy(&self);
}

pub(crate) fn record_hit(cache: &str) {
    metrics::counter!("lms_cache_hits_total", "cache" => cache.to_string()).increment(1);
}

pub(crate) fn record_miss(cache: &str) {
    metrics::counter!("lms_cache_misses_total", "cache" => cache.to_string()).increment(1);
}

pub(crate) fn record_eviction(cache: &str) {
    metrics::counter!("lms_cache_evictions_total", "cache" => cache.to_string()).increment(1);
}
