//! Configuration loading

use anyhow::{Context, Result};
use lms_core::{CacheConfig, ClientIdentity, KeyHash, RepositoryConfig};
use lms_http::HttpClientConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpClientConfig,
    #[serde(default)]
    pub client: ClientIdentity,
    /// Defaults for caches without their own `[caches.<name>]` table
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub caches: BTreeMap<String, CacheConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

/// Persistent key-value store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding the auth token and `localStorage` caches
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// One `[[repositories]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub entity: String,
    /// Collection path; `/{entity}` when omitted
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the cache to read through; the entity name when omitted
    #[serde(default)]
    pub cache: Option<String>,
    #[serde(default)]
    pub cache_ttl_ms: Option<u64>,
    #[serde(default)]
    pub key_hash: KeyHash,
    #[serde(default = "default_single_flight")]
    pub single_flight: bool,
}

impl RepositoryEntry {
    pub fn for_entity(entity: &str) -> Self {
        Self {
            entity: entity.to_string(),
            endpoint: None,
            cache: None,
            cache_ttl_ms: None,
            key_hash: KeyHash::default(),
            single_flight: default_single_flight(),
        }
    }

    pub fn cache_name(&self) -> &str {
        self.cache.as_deref().unwrap_or(&self.entity)
    }

    pub fn to_repository_config(&self) -> RepositoryConfig {
        let endpoint = self
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("/{}", self.entity));

        let mut config = RepositoryConfig::new(self.entity.clone(), endpoint)
            .with_key_hash(self.key_hash)
            .with_single_flight(self.single_flight);
        if let Some(ttl_ms) = self.cache_ttl_ms {
            config = config.with_cache_ttl(Duration::from_millis(ttl_ms));
        }
        config
    }
}

fn default_storage_path() -> String {
    "./.lms/storage.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_single_flight() -> bool {
    true
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Repository settings for `entity`, falling back to `/{entity}` defaults
    pub fn repository(&self, entity: &str) -> RepositoryEntry {
        self.repositories
            .iter()
            .find(|r| r.entity == entity)
            .cloned()
            .unwrap_or_else(|| RepositoryEntry::for_entity(entity))
    }

    /// Explicit configuration for the cache `name`, if any
    pub fn cache_config(&self, name: &str) -> Option<CacheConfig> {
        self.caches.get(name).cloned()
    }
}
