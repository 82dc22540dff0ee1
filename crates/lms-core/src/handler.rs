//! Normalization of core errors into application errors

use lms_http::redact::{REDACTED, is_sensitive};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, warn};

use crate::error::CoreError;

/// Structured context attached to an [`AppError`]
pub type ErrorContext = BTreeMap<String, Value>;

/// Status used when an error carries no HTTP status of its own
pub const FALLBACK_STATUS: u16 = 500;

/// Key fragments whose values never leave the process
const SENSITIVE_KEY_PARTS: [&str; 3] = ["password", "token", "secret"];

/// Error surfaced to callers of the data-access layer
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message} (status {status_code})")]
pub struct AppError {
    pub message: String,
    pub status_code: u16,
    pub is_operational: bool,
    pub context: ErrorContext,
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }
}

/// Turns any [`CoreError`] into an [`AppError`]
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, error: CoreError, context: ErrorContext) -> AppError;
}

/// Logs through `tracing` and redacts sensitive context values
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, error: CoreError, context: ErrorContext) -> AppError {
        let app_error = AppError {
            message: error.to_string(),
            status_code: error.status().unwrap_or(FALLBACK_STATUS),
            is_operational: error.is_operational(),
            context: redact_context(context),
        };

        if app_error.is_operational {
            warn!(
                "{} (status: {}, context: {:?})",
                app_error.message, app_error.status_code, app_error.context
            );
        } else {
            error!(
                "Unexpected error: {} (context: {:?})",
                app_error.message, app_error.context
            );
        }

        app_error
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    is_sensitive(&lower) || SENSITIVE_KEY_PARTS.iter().any(|part| lower.contains(part))
}

/// Mask sensitive values, descending into nested objects
pub fn redact_context(context: ErrorContext) -> ErrorContext {
    context
        .into_iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(&key) {
                Value::String(REDACTED.to_string())
            } else {
                redact_value(value)
            };
            (key, value)
        })
        .collect()
}

fn redact_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    let value = if is_sensitive_key(&key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_value(value)
                    };
                    (key, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact_value).collect()),
        other => other,
    }
}
