//! Interceptor pipeline
//!
//! Interceptors are registered on a client as tagged variants, one per
//! hook kind. Within a kind they run strictly in registration order.
//!
//! - `Request` hooks run before every attempt and may mutate headers and
//!   params or abort the request.
//! - `Response` hooks run once on a successful response and may reject it.
//! - `Error` hooks observe every failed attempt; their own failures are
//!   logged and never replace the original error.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::HttpError;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// The stage an interceptor hooks into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Request,
    Response,
    Error,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Request => "request",
            HookKind::Response => "response",
            HookKind::Error => "error",
        }
    }
}

/// Per-attempt context shared with hooks
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client: String,
    pub request_id: String,
    pub attempt: u32,
}

/// Everything an error hook may inspect about a failed attempt
#[derive(Debug)]
pub struct FailedAttempt<'a> {
    pub context: &'a RequestContext,
    pub request: &'a HttpRequest,
    pub error: &'a HttpError,
    /// The response, when the failure came from an HTTP status
    pub response: Option<&'a HttpResponse>,
}

impl FailedAttempt<'_> {
    pub fn status(&self) -> Option<u16> {
        self.error.status()
    }
}

#[async_trait]
pub trait RequestHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_request(
        &self,
        request: &mut HttpRequest,
        context: &RequestContext,
    ) -> Result<(), HttpError>;
}

#[async_trait]
pub trait ResponseHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_response(
        &self,
        response: &mut HttpResponse,
        context: &RequestContext,
    ) -> Result<(), HttpError>;
}

#[async_trait]
pub trait ErrorHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_error(&self, failure: &FailedAttempt<'_>) -> Result<(), HttpError>;
}

/// A registered interceptor, tagged by hook kind
#[derive(Clone)]
pub enum Interceptor {
    Request(Arc<dyn RequestHook>),
    Response(Arc<dyn ResponseHook>),
    Error(Arc<dyn ErrorHook>),
}

impl Interceptor {
    pub fn request(hook: impl RequestHook + 'static) -> Self {
        Interceptor::Request(Arc::new(hook))
    }

    pub fn response(hook: impl ResponseHook + 'static) -> Self {
        Interceptor::Response(Arc::new(hook))
    }

    pub fn error(hook: impl ErrorHook + 'static) -> Self {
        Interceptor::Error(Arc::new(hook))
    }

    pub fn kind(&self) -> HookKind {
        match self {
            Interceptor::Request(_) => HookKind::Request,
            Interceptor::Response(_) => HookKind::Response,
            Interceptor::Error(_) => HookKind::Error,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Interceptor::Request(h) => h.name(),
            Interceptor::Response(h) => h.name(),
            Interceptor::Error(h) => h.name(),
        }
    }
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}
