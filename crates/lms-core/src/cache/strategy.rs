//! Cache storage strategies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing a cache strategy
#[derive(Debug, Clone)]
pub struct ParseCacheStrategyError(String);

impl fmt::Display for ParseCacheStrategyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid cache strategy: {}", self.0)
    }
}

impl std::error::Error for ParseCacheStrategyError {}

/// Where a cache keeps its entries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum CacheStrategy {
    /// In-process map
    #[default]
    Memory,
    /// Persistent key-value store shared across runs
    LocalStorage,
    /// Key-value store scoped to this process
    SessionStorage,
}

impl CacheStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStrategy::Memory => "memory",
            CacheStrategy::LocalStorage => "localStorage",
            CacheStrategy::SessionStorage => "sessionStorage",
        }
    }
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStrategy {
    type Err = ParseCacheStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', '-'], "").as_str() {
            "memory" => Ok(CacheStrategy::Memory),
            "localstorage" | "local" => Ok(CacheStrategy::LocalStorage),
            "sessionstorage" | "session" => Ok(CacheStrategy::SessionStorage),
            _ => Err(ParseCacheStrategyError(s.to_string())),
        }
    }
}
