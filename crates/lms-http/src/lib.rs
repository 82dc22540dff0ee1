//! LMS Resilient HTTP Client
//!
//! This crate provides the HTTP client used by the data-access layer:
//! an ordered interceptor pipeline wrapped in a retry/backoff loop with a
//! per-attempt timeout, running over a pluggable transport.

pub mod client;
pub mod config;
pub mod error;
pub mod ids;
pub mod interceptor;
pub mod redact;
pub mod request;
pub mod response;
pub mod retry;
pub mod transport;

pub use client::HttpClient;
pub use config::{HttpClientConfig, RetryConfig};
pub use error::HttpError;
pub use interceptor::{
    ErrorHook, FailedAttempt, HookKind, Interceptor, RequestContext, RequestHook, ResponseHook,
};
pub use request::{HttpRequest, Method, PreparedRequest, QueryParams};
pub use response::{HttpResponse, ResponseBody};
pub use retry::{RetryPolicy, RetryState, Sleeper, TokioSleeper};
pub use transport::{ReqwestTransport, Transport};
