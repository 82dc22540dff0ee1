//! In-process TTL + LRU cache

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::config::CacheConfig;
use super::entry::CacheEntry;
use super::pattern::compile_glob;
use super::strategy::CacheStrategy;
use super::sweeper::{Sweep, spawn_sweeper};
use super::{Cache, CacheStats, record_eviction, record_hit, record_miss};
use crate::error::CacheError;

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    sequence: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

impl<V> CacheState<V> {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Remove the least recently used entry, returning its key
    fn evict_lru(&mut self) -> Option<String> {
        let key = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.recency())
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&key);
        self.evictions += 1;
        Some(key)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - self.entries.len();
        self.expirations += removed as u64;
        removed
    }
}

struct Inner<V> {
    state: Mutex<CacheState<V>>,
}

impl<V: Send + 'static> Sweep for Inner<V> {
    fn sweep(&self) -> usize {
        self.state.lock().purge_expired(Instant::now())
    }
}

/// Bounded in-memory cache with per-entry TTL and LRU eviction.
///
/// Size check, eviction and insertion happen under one lock, so the entry
/// count never exceeds `max_size`. Expired entries are removed lazily on
/// access and periodically by a background sweep.
pub struct MemoryCache<V = Value> {
    name: String,
    max_size: usize,
    default_ttl: Duration,
    inner: Arc<Inner<V>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<V: Clone + Send + 'static> MemoryCache<V> {
    pub fn new(name: impl Into<String>, config: &CacheConfig) -> Self {
        let name = name.into();
        let inner = Arc::new(Inner {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                sequence: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
        });

        let sweeper = config
            .cleanup_interval()
            .and_then(|every| spawn_sweeper(&name, Arc::downgrade(&inner), every));

        info!(
            "Created memory cache {} (max_size: {}, default_ttl: {:?})",
            name,
            config.max_size,
            config.default_ttl()
        );

        Self {
            name,
            max_size: config.max_size.max(1),
            default_ttl: config.default_ttl(),
            inner,
            sweeper: Mutex::new(sweeper),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up `key`, dropping it if expired and refreshing its recency otherwise
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let value = {
            let mut state = self.inner.state.lock();
            let value = match state.entries.get(key).map(|e| e.is_expired_at(now)) {
                None => None,
                Some(true) => {
                    state.entries.remove(key);
                    state.expirations += 1;
                    None
                }
                Some(false) => {
                    let sequence = state.next_sequence();
                    state.entries.get_mut(key).map(|entry| {
                        entry.touch(now, sequence);
                        entry.value.clone()
                    })
                }
            };
            if value.is_some() {
                state.hits += 1;
            } else {
                state.misses += 1;
            }
            value
        };

        if value.is_some() {
            record_hit(&self.name);
        } else {
            record_miss(&self.name);
        }

        value
    }

    /// Insert `value`; a new key on a full cache evicts the LRU entry first
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);

        let evicted = {
            let mut state = self.inner.state.lock();
            let evicted = if !state.entries.contains_key(key) && state.entries.len() >= self.max_size
            {
                state.evict_lru()
            } else {
                None
            };
            let sequence = state.next_sequence();
            state
                .entries
                .insert(key.to_string(), CacheEntry::new(value, now, ttl, sequence));
            evicted
        };

        if let Some(evicted) = evicted {
            debug!("Evicted {} from cache {}", evicted, self.name);
            record_eviction(&self.name);
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.state.lock().entries.remove(key).is_some()
    }

    /// Same expiry check as `get`, without touching recency
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        match state.entries.get(key).map(|e| e.is_expired_at(now)) {
            Some(false) => true,
            Some(true) => {
                state.entries.remove(key);
                state.expirations += 1;
                false
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.inner.state.lock().entries.clear();
    }

    pub fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let re = compile_glob(pattern)?;
        let mut state = self.inner.state.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !re.is_match(key));
        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(
                "Deleted {} entries matching {} from cache {}",
                removed, pattern, self.name
            );
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge_expired(&self) -> usize {
        self.inner.sweep()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expirations: state.expirations,
            size: state.entries.len(),
            max_size: self.max_size,
        }
    }

    /// Whether the background sweep task is alive
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Stop the sweep and drop every entry
    pub fn destroy(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        self.clear();
        debug!("Destroyed memory cache {}", self.name);
    }
}

impl<V> Drop for MemoryCache<V> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

impl Cache for MemoryCache<Value> {
    fn name(&self) -> &str {
        &self.name
    }

    fn strategy(&self) -> CacheStrategy {
        CacheStrategy::Memory
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(MemoryCache::get(self, key))
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        MemoryCache::set(self, key, value, ttl);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(MemoryCache::delete(self, key))
    }

    fn has(&self, key: &str) -> Result<bool, CacheError> {
        Ok(MemoryCache::has(self, key))
    }

    fn clear(&self) -> Result<(), CacheError> {
        MemoryCache::clear(self);
        Ok(())
    }

    fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        MemoryCache::delete_pattern(self, pattern)
    }

    fn size(&self) -> Result<usize, CacheError> {
        Ok(self.len())
    }

    fn stats(&self) -> CacheStats {
        MemoryCache::stats(self)
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(MemoryCache::purge_expired(self))
    }

    fn destroy(&self) {
        MemoryCache::destroy(self)
    }
}
