//! Named cache registry

use lms_storage::{KeyValueStore, MemoryStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::config::CacheConfig;
use super::memory::MemoryCache;
use super::storage::StorageCache;
use super::strategy::CacheStrategy;
use super::Cache;

/// Registry of named caches.
///
/// The first `get_cache` call for a name decides its configuration; later
/// configs for that name are ignored. Owned by the composition root and
/// shared through `Arc`.
pub struct CacheManager {
    caches: RwLock<HashMap<String, Arc<dyn Cache>>>,
    defaults: CacheConfig,
    /// Backing store for `localStorage` caches, if configured
    local_store: Option<Arc<dyn KeyValueStore>>,
    /// Process-scoped store for `sessionStorage` caches
    session_store: Arc<dyn KeyValueStore>,
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheManager {
    pub fn new(defaults: CacheConfig) -> Self {
        info!(
            "Initializing cache manager (default strategy: {}, max_size: {}, default_ttl: {:?})",
            defaults.strategy,
            defaults.max_size,
            defaults.default_ttl()
        );

        Self {
            caches: RwLock::new(HashMap::new()),
            defaults,
            local_store: None,
            session_store: Arc::new(MemoryStore::new()),
        }
    }

    /// Enable the `localStorage` strategy over `store`
    pub fn with_local_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    pub fn defaults(&self) -> &CacheConfig {
        &self.defaults
    }

    /// Get the cache registered under `name`, creating it on first use
    pub fn get_cache(&self, name: &str, config: Option<CacheConfig>) -> Arc<dyn Cache> {
        if let Some(cache) = self.caches.read().get(name) {
            if config.is_some() {
                debug!("Cache {} already exists, ignoring new config", name);
            }
            return cache.clone();
        }

        let mut caches = self.caches.write();
        // Another caller may have created it between the two locks
        if let Some(cache) = caches.get(name) {
            return cache.clone();
        }

        let config = config.unwrap_or_else(|| self.defaults.clone());
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!("{} for cache {}, using defaults", e, name);
                CacheConfig {
                    strategy: config.strategy,
                    ..self.defaults.clone()
                }
            }
        };

        let cache = self.build(name, &config);
        caches.insert(name.to_string(), cache.clone());
        cache
    }

    fn build(&self, name: &str, config: &CacheConfig) -> Arc<dyn Cache> {
        let strategy = match config.strategy.parse::<CacheStrategy>() {
            Ok(strategy) => strategy,
            Err(e) => {
                warn!("{} for cache {}, falling back to memory", e, name);
                CacheStrategy::Memory
            }
        };

        match strategy {
            CacheStrategy::Memory => Arc::new(MemoryCache::new(name, config)),
            CacheStrategy::LocalStorage => match &self.local_store {
                Some(store) => Arc::new(StorageCache::new(name, strategy, store.clone(), config)),
                None => {
                    warn!(
                        "No persistent store configured for localStorage cache {}, falling back to memory",
                        name
                    );
                    Arc::new(MemoryCache::new(name, config))
                }
            },
            CacheStrategy::SessionStorage => Arc::new(StorageCache::new(
                name,
                strategy,
                self.session_store.clone(),
                config,
            )),
        }
    }

    /// Cache registered under `name`, without creating one
    pub fn get_existing(&self, name: &str) -> Option<Arc<dyn Cache>> {
        self.caches.read().get(name).cloned()
    }

    /// Destroy and unregister a cache, returning whether it existed
    pub fn remove_cache(&self, name: &str) -> bool {
        let removed = self.caches.write().remove(name);
        match removed {
            Some(cache) => {
                cache.destroy();
                info!("Removed cache {}", name);
                true
            }
            None => false,
        }
    }

    /// Destroy and unregister every cache
    pub fn clear_all_caches(&self) {
        let caches: Vec<_> = self.caches.write().drain().collect();
        let count = caches.len();
        for (_, cache) in caches {
            cache.destroy();
        }
        info!("Cleared {} caches", count);
    }

    /// Registered cache names, sorted
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        names
    }
}
