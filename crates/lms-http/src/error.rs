//! HTTP client error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HttpError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Client error: {status} - {message}")]
    Client { status: u16, message: String },

    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    #[error("Request aborted by interceptor {interceptor}: {reason}")]
    Aborted { interceptor: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl HttpError {
    /// Build an error from a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status >= 500 {
            HttpError::Server { status, message }
        } else {
            HttpError::Client { status, message }
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Client { status, .. } | HttpError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// 408 and 429 are the only retryable 4xx statuses; transport failures,
    /// timeouts and 5xx are always retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Network(_) | HttpError::Timeout(_) | HttpError::Server { .. } => true,
            HttpError::Client { status, .. } => matches!(status, 408 | 429),
            HttpError::Aborted { .. }
            | HttpError::InvalidRequest(_)
            | HttpError::InvalidConfig(_)
            | HttpError::Decode(_) => false,
        }
    }

    /// Whether the failure happened below the HTTP layer
    pub fn is_transport(&self) -> bool {
        matches!(self, HttpError::Network(_) | HttpError::Timeout(_))
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            HttpError::InvalidRequest(err.to_string())
        } else if err.is_decode() {
            HttpError::Decode(err.to_string())
        } else {
            HttpError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(HttpError::Network("reset".into()).is_retryable());
        assert!(HttpError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(HttpError::from_status(500, "boom").is_retryable());
        assert!(HttpError::from_status(503, "busy").is_retryable());
        assert!(HttpError::from_status(408, "slow").is_retryable());
        assert!(HttpError::from_status(429, "slow down").is_retryable());

        for status in [400, 401, 403, 404, 409, 422] {
            assert!(!HttpError::from_status(status, "").is_retryable(), "{status}");
        }

        assert!(!HttpError::Decode("bad".into()).is_retryable());
        assert!(
            !HttpError::Aborted {
                interceptor: "auth".into(),
                reason: "no".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_status_accessor() {
        assert_eq!(HttpError::from_status(404, "missing").status(), Some(404));
        assert_eq!(HttpError::from_status(502, "bad gateway").status(), Some(502));
        assert_eq!(HttpError::Network("x".into()).status(), None);
    }
}
