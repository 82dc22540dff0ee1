//! HTTP client factory module

mod interceptors;
mod manager;

pub use interceptors::{
    AUTH_TOKEN_KEY, AuthInterceptor, ClientIdentity, RateLimitInterceptor,
    UnauthorizedInterceptor, X_CLIENT_NAME, X_CLIENT_VERSION,
};
pub use manager::HttpClientFactory;
