//! Core error types

use lms_http::HttpError;
use lms_storage::StorageError;
use thiserror::Error;

/// Failures of a cache backend
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(#[from] StorageError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache pattern {pattern}: {reason}")]
    Pattern { pattern: String, reason: String },
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rejected by hook: {0}")]
    Hook(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl CoreError {
    /// HTTP-like status for this error, if one applies
    pub fn status(&self) -> Option<u16> {
        match self {
            CoreError::Http(e) => e.status(),
            CoreError::Hook(_) => Some(400),
            CoreError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Whether the error is an expected runtime condition rather than a bug
    /// or misconfiguration
    pub fn is_operational(&self) -> bool {
        match self {
            CoreError::Http(e) => !matches!(
                e,
                HttpError::InvalidRequest(_) | HttpError::InvalidConfig(_) | HttpError::Decode(_)
            ),
            CoreError::Hook(_) | CoreError::NotFound(_) => true,
            CoreError::Storage(_)
            | CoreError::Cache(_)
            | CoreError::Serialization(_)
            | CoreError::InvalidConfig(_) => false,
        }
    }
}
