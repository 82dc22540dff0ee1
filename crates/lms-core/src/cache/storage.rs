//! Cache over a persistent key-value store
//!
//! Entries live in the store as JSON under `cache:{name}:{key}` with
//! wall-clock millisecond timestamps, so they survive as long as the store
//! does. Expiry, LRU and pattern rules match [`MemoryCache`].
//!
//! [`MemoryCache`]: super::MemoryCache

use chrono::Utc;
use lms_storage::KeyValueStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::entry::is_expired;
use super::pattern::compile_glob;
use super::strategy::CacheStrategy;
use super::sweeper::{Sweep, spawn_sweeper};
use super::{Cache, CacheStats, record_eviction, record_hit, record_miss};
use crate::error::CacheError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: Value,
    expires_at: i64,
    created_at: i64,
    access_count: u64,
    last_accessed: i64,
    #[serde(default)]
    sequence: u64,
}

impl StoredEntry {
    fn is_expired_at(&self, now_ms: i64) -> bool {
        is_expired(now_ms, self.expires_at)
    }
}

#[derive(Default)]
struct Counters {
    sequence: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

struct Inner {
    name: String,
    prefix: String,
    store: Arc<dyn KeyValueStore>,
    /// Serializes read-modify-write sequences against the store
    counters: Mutex<Counters>,
}

impl Inner {
    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn read(&self, full_key: &str) -> Result<Option<StoredEntry>, CacheError> {
        match self.store.get(full_key)? {
            None => Ok(None),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    warn!(
                        "Dropping undecodable entry {} from cache {}: {}",
                        full_key, self.name, e
                    );
                    self.store.remove(full_key)?;
                    Ok(None)
                }
            },
        }
    }

    fn write(&self, full_key: &str, entry: &StoredEntry) -> Result<(), CacheError> {
        let raw = serde_json::to_string(entry)?;
        self.store.set(full_key, &raw)?;
        Ok(())
    }

    fn purge_expired(&self, counters: &mut Counters) -> Result<usize, CacheError> {
        let now = Utc::now().timestamp_millis();
        let mut removed = 0;
        for full_key in self.store.keys_with_prefix(&self.prefix)? {
            if let Some(entry) = self.read(&full_key)?
                && entry.is_expired_at(now)
                && self.store.remove(&full_key)?
            {
                removed += 1;
            }
        }
        counters.expirations += removed as u64;
        Ok(removed)
    }
}

impl Sweep for Inner {
    fn sweep(&self) -> usize {
        let mut counters = self.counters.lock();
        match self.purge_expired(&mut counters) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to sweep cache {}: {}", self.name, e);
                0
            }
        }
    }
}

/// TTL + LRU cache persisted through a [`KeyValueStore`]
pub struct StorageCache {
    inner: Arc<Inner>,
    strategy: CacheStrategy,
    max_size: usize,
    default_ttl: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl StorageCache {
    pub fn new(
        name: impl Into<String>,
        strategy: CacheStrategy,
        store: Arc<dyn KeyValueStore>,
        config: &CacheConfig,
    ) -> Self {
        let name = name.into();
        let prefix = format!("cache:{}:", name);

        // Continue the access sequence of entries left by an earlier run
        let mut counters = Counters::default();
        match store.keys_with_prefix(&prefix) {
            Ok(keys) => {
                for key in keys {
                    if let Ok(Some(raw)) = store.get(&key)
                        && let Ok(entry) = serde_json::from_str::<StoredEntry>(&raw)
                    {
                        counters.sequence = counters.sequence.max(entry.sequence);
                    }
                }
            }
            Err(e) => warn!("Failed to scan existing entries of cache {}: {}", name, e),
        }

        let inner = Arc::new(Inner {
            name: name.clone(),
            prefix,
            store,
            counters: Mutex::new(counters),
        });

        let sweeper = config
            .cleanup_interval()
            .and_then(|every| spawn_sweeper(&name, Arc::downgrade(&inner), every));

        info!(
            "Created {} cache {} (max_size: {}, default_ttl: {:?})",
            strategy,
            name,
            config.max_size,
            config.default_ttl()
        );

        Self {
            inner,
            strategy,
            max_size: config.max_size.max(1),
            default_ttl: config.default_ttl(),
            sweeper: Mutex::new(sweeper),
        }
    }

    /// Evict the least recently used entry. Undecodable entries are dropped
    /// while scanning; returns false when nothing was left to evict.
    fn evict_lru(&self, counters: &mut Counters, keys: &[String]) -> Result<bool, CacheError> {
        let mut oldest: Option<(String, (i64, u64))> = None;
        for full_key in keys {
            let Some(entry) = self.inner.read(full_key)? else {
                continue;
            };
            let recency = (entry.last_accessed, entry.sequence);
            if oldest.as_ref().is_none_or(|(_, r)| recency < *r) {
                oldest = Some((full_key.clone(), recency));
            }
        }

        if let Some((full_key, _)) = oldest {
            self.inner.store.remove(&full_key)?;
            counters.evictions += 1;
            debug!("Evicted {} from cache {}", full_key, self.inner.name);
            record_eviction(&self.inner.name);
            return Ok(true);
        }
        Ok(false)
    }

    /// Make room for one new entry. The store may hold more than
    /// `max_size` entries when it was written with a larger limit.
    fn make_room(&self, counters: &mut Counters) -> Result<(), CacheError> {
        let prefix = &self.inner.prefix;
        let mut keys = self.inner.store.keys_with_prefix(prefix)?;
        if keys.len() < self.max_size {
            return Ok(());
        }

        let expired = self.inner.purge_expired(counters)?;
        if expired > 0 {
            keys = self.inner.store.keys_with_prefix(prefix)?;
        }
        while keys.len() >= self.max_size {
            if !self.evict_lru(counters, &keys)? {
                break;
            }
            keys = self.inner.store.keys_with_prefix(prefix)?;
        }
        Ok(())
    }
}

impl Drop for StorageCache {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

impl Cache for StorageCache {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn strategy(&self) -> CacheStrategy {
        self.strategy
    }

    fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let full_key = self.inner.full_key(key);
        let now = Utc::now().timestamp_millis();
        let mut counters = self.inner.counters.lock();

        let value = match self.inner.read(&full_key)? {
            None => None,
            Some(entry) if entry.is_expired_at(now) => {
                self.inner.store.remove(&full_key)?;
                counters.expirations += 1;
                None
            }
            Some(mut entry) => {
                counters.sequence += 1;
                entry.access_count += 1;
                entry.last_accessed = now;
                entry.sequence = counters.sequence;
                self.inner.write(&full_key, &entry)?;
                Some(entry.value)
            }
        };

        if value.is_some() {
            counters.hits += 1;
            record_hit(&self.inner.name);
        } else {
            counters.misses += 1;
            record_miss(&self.inner.name);
        }
        Ok(value)
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let full_key = self.inner.full_key(key);
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.unwrap_or(self.default_ttl).as_millis()).unwrap_or(i64::MAX);
        let mut counters = self.inner.counters.lock();

        if self.inner.store.get(&full_key)?.is_none() {
            self.make_room(&mut counters)?;
        }

        counters.sequence += 1;
        let entry = StoredEntry {
            value,
            expires_at: now.saturating_add(ttl_ms),
            created_at: now,
            access_count: 0,
            last_accessed: now,
            sequence: counters.sequence,
        };
        self.inner.write(&full_key, &entry)
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let _counters = self.inner.counters.lock();
        Ok(self.inner.store.remove(&self.inner.full_key(key))?)
    }

    fn has(&self, key: &str) -> Result<bool, CacheError> {
        let full_key = self.inner.full_key(key);
        let now = Utc::now().timestamp_millis();
        let mut counters = self.inner.counters.lock();

        match self.inner.read(&full_key)? {
            None => Ok(false),
            Some(entry) if entry.is_expired_at(now) => {
                self.inner.store.remove(&full_key)?;
                counters.expirations += 1;
                Ok(false)
            }
            Some(_) => Ok(true),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        let _counters = self.inner.counters.lock();
        let removed = self.inner.store.remove_prefix(&self.inner.prefix)?;
        debug!("Cleared {} entries from cache {}", removed, self.inner.name);
        Ok(())
    }

    fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let re = compile_glob(pattern)?;
        let _counters = self.inner.counters.lock();

        let mut removed = 0;
        for full_key in self.inner.store.keys_with_prefix(&self.inner.prefix)? {
            let key = &full_key[self.inner.prefix.len()..];
            if re.is_match(key) && self.inner.store.remove(&full_key)? {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(
                "Deleted {} entries matching {} from cache {}",
                removed, pattern, self.inner.name
            );
        }
        Ok(removed)
    }

    fn size(&self) -> Result<usize, CacheError> {
        Ok(self.inner.store.keys_with_prefix(&self.inner.prefix)?.len())
    }

    fn stats(&self) -> CacheStats {
        let size = self.size().unwrap_or(0);
        let counters = self.inner.counters.lock();
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expirations: counters.expirations,
            size,
            max_size: self.max_size,
        }
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        let mut counters = self.inner.counters.lock();
        self.inner.purge_expired(&mut counters)
    }

    fn destroy(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        if let Err(e) = self.clear() {
            warn!("Failed to clear cache {} on destroy: {}", self.inner.name, e);
        }
        debug!("Destroyed {} cache {}", self.strategy, self.inner.name);
    }
}
