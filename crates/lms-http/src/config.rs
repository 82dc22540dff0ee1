//! HTTP client configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::error::HttpError;

/// Upper bound on any single backoff delay (30 seconds)
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Retry/backoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per logical request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for the exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap applied after jitter
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter as a fraction of the exponential term (0.1 = up to 10%)
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<(), HttpError> {
        if self.max_attempts == 0 {
            return Err(HttpError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_delay_ms > MAX_BACKOFF_MS {
            return Err(HttpError::InvalidConfig(format!(
                "retry.max_delay_ms {} exceeds the {} ms ceiling",
                self.max_delay_ms, MAX_BACKOFF_MS
            )));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(HttpError::InvalidConfig(format!(
                "retry.base_delay_ms {} is greater than retry.max_delay_ms {}",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(HttpError::InvalidConfig(format!(
                "retry.jitter_ratio {} must be within [0, 1]",
                self.jitter_ratio
            )));
        }
        Ok(())
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Base URL that relative request paths are resolved against
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-attempt timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Headers added to every request unless already present
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_timeout_ms(),
            retry: RetryConfig::default(),
            default_headers: BTreeMap::new(),
        }
    }
}

impl HttpClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validate the configuration and return the parsed base URL
    pub fn validate(&self) -> Result<Option<Url>, HttpError> {
        if self.timeout_ms == 0 {
            return Err(HttpError::InvalidConfig(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }

        self.retry.validate()?;

        for name in self.default_headers.keys() {
            http::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                HttpError::InvalidConfig(format!("invalid default header name: {}", name))
            })?;
        }

        match &self.base_url {
            None => Ok(None),
            Some(raw) => {
                let url = Url::parse(raw).map_err(|e| {
                    HttpError::InvalidConfig(format!("invalid base_url {}: {}", raw, e))
                })?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(HttpError::InvalidConfig(format!(
                        "base_url must use http or https: {}",
                        raw
                    )));
                }
                Ok(Some(url))
            }
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    MAX_BACKOFF_MS
}

fn default_jitter_ratio() -> f64 {
    0.1
}

fn default_timeout_ms() -> u64 {
    10_000
}
