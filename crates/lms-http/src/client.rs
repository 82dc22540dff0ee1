//! Resilient HTTP client
//!
//! Every logical request gets a request id and runs through the
//! interceptor pipeline inside the retry loop:
//!
//! 1. request hooks (registration order)
//! 2. transport call under a per-attempt timeout
//! 3. error hooks on failure, then retry classification and backoff
//! 4. response hooks once a response succeeds

use http::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::HttpClientConfig;
use crate::error::HttpError;
use crate::ids::generate_request_id;
use crate::interceptor::{FailedAttempt, Interceptor, RequestContext};
use crate::redact::redact_headers;
use crate::request::{HttpRequest, PreparedRequest, QueryParams, build_url};
use crate::response::HttpResponse;
use crate::retry::{RetryPolicy, RetryState, Sleeper, TokioSleeper};
use crate::transport::{ReqwestTransport, Transport};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Outcome of a single failed attempt
struct Failure {
    error: HttpError,
    response: Option<HttpResponse>,
}

impl From<HttpError> for Failure {
    fn from(error: HttpError) -> Self {
        Self {
            error,
            response: None,
        }
    }
}

/// HTTP client with interceptors, retries and per-attempt timeouts
pub struct HttpClient {
    name: String,
    config: HttpClientConfig,
    base_url: Option<Url>,
    policy: RetryPolicy,
    default_headers: HeaderMap,
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    interceptors: RwLock<Vec<Interceptor>>,
}

impl HttpClient {
    /// Create a client using the reqwest transport
    pub fn new(name: impl Into<String>, config: HttpClientConfig) -> Result<Self, HttpError> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Self::with_transport(name, config, transport)
    }

    /// Create a client over a custom transport
    pub fn with_transport(
        name: impl Into<String>,
        config: HttpClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, HttpError> {
        let name = name.into();
        let base_url = config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (key, value) in &config.default_headers {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| HttpError::InvalidConfig(format!("invalid header name: {}", key)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidConfig(format!("invalid value for header {}", key)))?;
            default_headers.insert(header_name, header_value);
        }

        info!(
            "Created HTTP client {} (base url: {}, timeout: {} ms, max attempts: {})",
            name,
            base_url.as_ref().map(|u| u.as_str()).unwrap_or("none"),
            config.timeout_ms,
            config.retry.max_attempts
        );

        Ok(Self {
            name,
            policy: RetryPolicy::from_config(&config.retry),
            config,
            base_url,
            default_headers,
            transport,
            sleeper: Arc::new(TokioSleeper),
            interceptors: RwLock::new(Vec::new()),
        })
    }

    /// Replace the backoff delay primitive
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Register an interceptor; it runs after all earlier ones of its kind
    pub fn add_interceptor(&self, interceptor: Interceptor) {
        debug!(
            "Registering {} interceptor {} on client {}",
            interceptor.kind().as_str(),
            interceptor.name(),
            self.name
        );
        self.interceptors.write().push(interceptor);
    }

    /// Snapshot of the registered interceptors, in registration order
    pub fn interceptors(&self) -> Vec<Interceptor> {
        self.interceptors.read().clone()
    }

    pub async fn get(&self, path: &str, params: QueryParams) -> Result<HttpResponse, HttpError> {
        self.request(HttpRequest::get(path).with_params(params)).await
    }

    pub async fn post(&self, path: &str, data: Value) -> Result<HttpResponse, HttpError> {
        self.request(HttpRequest::post(path, data)).await
    }

    pub async fn put(&self, path: &str, data: Value) -> Result<HttpResponse, HttpError> {
        self.request(HttpRequest::put(path, data)).await
    }

    pub async fn patch(&self, path: &str, data: Value) -> Result<HttpResponse, HttpError> {
        self.request(HttpRequest::patch(path, data)).await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse, HttpError> {
        self.request(HttpRequest::delete(path)).await
    }

    /// Execute a request through the interceptor pipeline and retry loop
    pub async fn request(&self, mut request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let request_id = generate_request_id();

        for (name, value) in &self.default_headers {
            if !request.headers.contains_key(name) {
                request.headers.insert(name.clone(), value.clone());
            }
        }
        let id_value = HeaderValue::from_str(&request_id)
            .map_err(|_| HttpError::InvalidRequest("invalid request id".to_string()))?;
        request.headers.insert(X_REQUEST_ID, id_value);

        metrics::counter!("lms_http_requests_total", "client" => self.name.clone()).increment(1);

        // Snapshot so registrations during the request don't affect it
        let interceptors = self.interceptors();
        let started = Instant::now();

        let mut state = RetryState::start();
        let mut context = RequestContext {
            client: self.name.clone(),
            request_id: request_id.clone(),
            attempt: 1,
        };
        let mut response = None;
        let mut last_error = None;

        while !state.is_terminal() {
            state = match state {
                RetryState::Attempting { attempt } => {
                    context.attempt = attempt;
                    let mut attempt_request = request.clone();

                    match self
                        .send_once(&mut attempt_request, &context, &interceptors)
                        .await
                    {
                        Ok(resp) => {
                            response = Some(resp);
                            state.on_success()
                        }
                        Err(failure) => {
                            self.run_error_hooks(
                                &FailedAttempt {
                                    context: &context,
                                    request: &attempt_request,
                                    error: &failure.error,
                                    response: failure.response.as_ref(),
                                },
                                &interceptors,
                            )
                            .await;

                            let next = state.on_failure(&failure.error, &self.policy);
                            if let RetryState::Sleeping { delay, .. } = next {
                                warn!(
                                    "[{}] Attempt {}/{} failed: {}; retrying in {:?}",
                                    request_id,
                                    attempt,
                                    self.policy.max_attempts,
                                    failure.error,
                                    delay
                                );
                            }
                            last_error = Some(failure.error);
                            next
                        }
                    }
                }
                RetryState::Sleeping { delay, .. } => {
                    metrics::counter!("lms_http_retries_total", "client" => self.name.clone())
                        .increment(1);
                    self.sleeper.sleep(delay).await;
                    state.on_wake()
                }
                terminal => terminal,
            };
        }

        match (state, response) {
            (RetryState::Succeeded, Some(mut response)) => {
                self.run_response_hooks(&mut response, &context, &interceptors)
                    .await?;
                info!(
                    "[{}] {} {} -> {} in {:?} (attempts: {})",
                    request_id,
                    request.method,
                    request.url,
                    response.status,
                    started.elapsed(),
                    context.attempt
                );
                Ok(response)
            }
            _ => {
                let err = last_error.unwrap_or_else(|| {
                    HttpError::Network("request finished without a response".to_string())
                });
                error!(
                    "[{}] {} {} failed after {} attempt(s) in {:?}: {}",
                    request_id,
                    request.method,
                    request.url,
                    context.attempt,
                    started.elapsed(),
                    err
                );
                Err(err)
            }
        }
    }

    /// One attempt: request hooks, URL resolution, timed transport call
    async fn send_once(
        &self,
        request: &mut HttpRequest,
        context: &RequestContext,
        interceptors: &[Interceptor],
    ) -> Result<HttpResponse, Failure> {
        for interceptor in interceptors {
            if let Interceptor::Request(hook) = interceptor {
                hook.on_request(request, context).await.map_err(|e| match e {
                    HttpError::Aborted { .. } => e,
                    other => HttpError::Aborted {
                        interceptor: hook.name().to_string(),
                        reason: other.to_string(),
                    },
                })?;
            }
        }

        let url = build_url(self.base_url.as_ref(), &request.url, &request.params)?;
        let timeout = request.timeout.unwrap_or_else(|| self.config.timeout());

        debug!(
            "[{}] {} {} (attempt {}/{}, timeout {:?}) headers: {:?}",
            context.request_id,
            request.method,
            url,
            context.attempt,
            self.policy.max_attempts,
            timeout,
            redact_headers(&request.headers)
        );

        let prepared = PreparedRequest {
            method: request.method,
            url,
            headers: request.headers.clone(),
            body: if request.method.has_body() {
                request.data.clone()
            } else {
                None
            },
        };

        // Dropping the transport future on timeout cancels the attempt
        let response = match tokio::time::timeout(timeout, self.transport.send(prepared)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(HttpError::Timeout(timeout).into()),
        };

        if response.is_success() {
            Ok(response)
        } else {
            Err(Failure {
                error: response.to_error(),
                response: Some(response),
            })
        }
    }

    async fn run_response_hooks(
        &self,
        response: &mut HttpResponse,
        context: &RequestContext,
        interceptors: &[Interceptor],
    ) -> Result<(), HttpError> {
        for interceptor in interceptors {
            if let Interceptor::Response(hook) = interceptor
                && let Err(e) = hook.on_response(response, context).await
            {
                warn!(
                    "[{}] Response interceptor {} rejected response: {}",
                    context.request_id,
                    hook.name(),
                    e
                );
                return Err(e);
            }
        }
        Ok(())
    }

    /// Error hooks observe the failure; their own errors are only logged
    async fn run_error_hooks(&self, failure: &FailedAttempt<'_>, interceptors: &[Interceptor]) {
        for interceptor in interceptors {
            if let Interceptor::Error(hook) = interceptor
                && let Err(e) = hook.on_error(failure).await
            {
                warn!(
                    "[{}] Error interceptor {} failed: {}",
                    failure.context.request_id,
                    hook.name(),
                    e
                );
            }
        }
    }
}
