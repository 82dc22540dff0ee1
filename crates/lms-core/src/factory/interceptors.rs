//! Default interceptors installed on every factory-built client

use async_trait::async_trait;
use lms_http::{
    ErrorHook, FailedAttempt, HttpError, HttpRequest, RequestContext, RequestHook,
};
use lms_storage::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Store key holding the bearer token
pub const AUTH_TOKEN_KEY: &str = "auth_token";

pub const X_CLIENT_NAME: &str = "x-client-name";
pub const X_CLIENT_VERSION: &str = "x-client-version";

/// Identity sent with every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientIdentity {
    pub name: String,
    pub version: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            name: "lms-client".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Attaches the stored bearer token and the client identity headers
pub struct AuthInterceptor {
    store: Arc<dyn KeyValueStore>,
    identity: ClientIdentity,
}

impl AuthInterceptor {
    pub fn new(store: Arc<dyn KeyValueStore>, identity: ClientIdentity) -> Self {
        Self { store, identity }
    }
}

#[async_trait]
impl RequestHook for AuthInterceptor {
    fn name(&self) -> &str {
        "auth"
    }

    async fn on_request(
        &self,
        request: &mut HttpRequest,
        context: &RequestContext,
    ) -> Result<(), HttpError> {
        match self.store.get(AUTH_TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => {
                request.set_header("authorization", &format!("Bearer {}", token))?;
            }
            Ok(_) => debug!("[{}] No auth token stored", context.request_id),
            Err(e) => warn!(
                "[{}] Failed to read auth token, sending unauthenticated: {}",
                context.request_id, e
            ),
        }

        request.set_header(X_CLIENT_NAME, &self.identity.name)?;
        request.set_header(X_CLIENT_VERSION, &self.identity.version)?;
        Ok(())
    }
}

/// Drops the stored token when the backend answers 401.
///
/// 401 is terminal for the retry loop, so the failed call is not retried;
/// the next request goes out unauthenticated until a new token is stored.
pub struct UnauthorizedInterceptor {
    store: Arc<dyn KeyValueStore>,
}

impl UnauthorizedInterceptor {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ErrorHook for UnauthorizedInterceptor {
    fn name(&self) -> &str {
        "unauthorized"
    }

    async fn on_error(&self, failure: &FailedAttempt<'_>) -> Result<(), HttpError> {
        if failure.status() != Some(401) {
            return Ok(());
        }

        match self.store.remove(AUTH_TOKEN_KEY) {
            Ok(true) => info!(
                "[{}] Received 401, cleared stored auth token",
                failure.context.request_id
            ),
            Ok(false) => debug!(
                "[{}] Received 401 with no stored auth token",
                failure.context.request_id
            ),
            Err(e) => warn!(
                "[{}] Received 401 but failed to clear auth token: {}",
                failure.context.request_id, e
            ),
        }
        Ok(())
    }
}

/// Logs the server's `retry-after` hint on 429; backoff stays with the retry loop
#[derive(Debug, Default, Clone, Copy)]
pub struct RateLimitInterceptor;

impl RateLimitInterceptor {
    /// The `Retry-After` hint of a rate-limited attempt, if the backend sent one
    pub fn retry_after<'a>(failure: &FailedAttempt<'a>) -> Option<&'a str> {
        if failure.status() != Some(429) {
            return None;
        }
        failure.response.and_then(|r| r.header("retry-after"))
    }
}

#[async_trait]
impl ErrorHook for RateLimitInterceptor {
    fn name(&self) -> &str {
        "rate-limit"
    }

    async fn on_error(&self, failure: &FailedAttempt<'_>) -> Result<(), HttpError> {
        if failure.status() == Some(429) {
            let retry_after = Self::retry_after(failure).unwrap_or("unspecified");
            warn!(
                "[{}] Rate limited on attempt {} (retry-after: {})",
                failure.context.request_id, failure.context.attempt, retry_after
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_http::{HttpResponse, Method};
    use lms_storage::MemoryStore;
    use serde_json::json;

    fn context() -> RequestContext {
        RequestContext {
            client: "test".into(),
            request_id: "req_1_abc".into(),
            attempt: 1,
        }
    }

    fn identity() -> ClientIdentity {
        ClientIdentity {
            name: "lms-web".into(),
            version: "1.2.3".into(),
        }
    }

    #[tokio::test]
    async fn test_auth_attaches_token_and_identity() {
        let store = Arc::new(MemoryStore::new());
        store.set(AUTH_TOKEN_KEY, "secret-token").unwrap();
        let interceptor = AuthInterceptor::new(store, identity());

        let mut request = HttpRequest::get("/courses");
        interceptor.on_request(&mut request, &context()).await.unwrap();

        assert_eq!(request.header("authorization"), Some("Bearer secret-token"));
        assert_eq!(request.header(X_CLIENT_NAME), Some("lms-web"));
        assert_eq!(request.header(X_CLIENT_VERSION), Some("1.2.3"));
    }

    #[tokio::test]
    async fn test_auth_without_token() {
        let interceptor = AuthInterceptor::new(Arc::new(MemoryStore::new()), identity());

        let mut request = HttpRequest::get("/courses");
        interceptor.on_request(&mut request, &context()).await.unwrap();

        assert_eq!(request.header("authorization"), None);
        assert_eq!(request.header(X_CLIENT_NAME), Some("lms-web"));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token_only_on_401() {
        let store = Arc::new(MemoryStore::new());
        store.set(AUTH_TOKEN_KEY, "stale").unwrap();
        let interceptor = UnauthorizedInterceptor::new(store.clone());
        let request = HttpRequest::new(Method::Get, "/me");
        let ctx = context();

        let forbidden = HttpError::from_status(403, "forbidden");
        interceptor
            .on_error(&FailedAttempt {
                context: &ctx,
                request: &request,
                error: &forbidden,
                response: None,
            })
            .await
            .unwrap();
        assert!(store.get(AUTH_TOKEN_KEY).unwrap().is_some());

        let unauthorized = HttpError::from_status(401, "expired");
        interceptor
            .on_error(&FailedAttempt {
                context: &ctx,
                request: &request,
                error: &unauthorized,
                response: None,
            })
            .await
            .unwrap();
        assert!(store.get(AUTH_TOKEN_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_reads_retry_after() {
        let mut response = HttpResponse::json_body(429, json!({}));
        response
            .headers
            .insert("retry-after", http::HeaderValue::from_static("30"));
        let error = response.to_error();
        let request = HttpRequest::get("/courses");
        let ctx = context();

        let failure = FailedAttempt {
            context: &ctx,
            request: &request,
            error: &error,
            response: Some(&response),
        };

        assert_eq!(RateLimitInterceptor::retry_after(&failure), Some("30"));
        assert!(RateLimitInterceptor.on_error(&failure).await.is_ok());
    }

    #[test]
    fn test_retry_after_only_for_rate_limits() {
        let request = HttpRequest::get("/courses");
        let ctx = context();

        let mut unavailable = HttpResponse::json_body(503, json!({}));
        unavailable
            .headers
            .insert("retry-after", http::HeaderValue::from_static("30"));
        let error = unavailable.to_error();
        let failure = FailedAttempt {
            context: &ctx,
            request: &request,
            error: &error,
            response: Some(&unavailable),
        };
        assert_eq!(RateLimitInterceptor::retry_after(&failure), None);

        let bare = HttpResponse::json_body(429, json!({}));
        let error = bare.to_error();
        let failure = FailedAttempt {
            context: &ctx,
            request: &request,
            error: &error,
            response: Some(&bare),
        };
        assert_eq!(RateLimitInterceptor::retry_after(&failure), None);
    }
}
