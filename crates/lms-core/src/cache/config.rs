//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CoreError;

/// Per-cache settings, applied only when the named cache is first built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// TTL for entries set without an explicit one
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,
    /// Background sweep interval; 0 disables the sweep
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    /// `memory`, `localStorage` or `sessionStorage`
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

fn default_max_size() -> usize {
    100
}

fn default_ttl_ms() -> u64 {
    5 * 60 * 1000
}

fn default_cleanup_interval_ms() -> u64 {
    60 * 1000
}

fn default_strategy() -> String {
    "memory".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            default_ttl_ms: default_ttl_ms(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            strategy: default_strategy(),
        }
    }
}

impl CacheConfig {
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn cleanup_interval(&self) -> Option<Duration> {
        (self.cleanup_interval_ms > 0).then(|| Duration::from_millis(self.cleanup_interval_ms))
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_size == 0 {
            return Err(CoreError::InvalidConfig(
                "cache max_size must be at least 1".to_string(),
            ));
        }
        if self.default_ttl_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "cache default_ttl_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
