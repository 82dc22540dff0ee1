//! LMS Data-Access Core
//!
//! This crate provides the resilient data-access layer of the LMS client:
//! named TTL + LRU caches, a factory for preconfigured HTTP clients, and a
//! generic cache-aside repository with error normalization.

pub mod cache;
pub mod error;
pub mod factory;
pub mod handler;
pub mod repository;

pub use cache::{
    Cache, CacheConfig, CacheManager, CacheStats, CacheStrategy, MemoryCache, StorageCache,
};
pub use error::{CacheError, CoreError};
pub use factory::{AUTH_TOKEN_KEY, ClientIdentity, HttpClientFactory};
pub use handler::{AppError, DefaultErrorHandler, ErrorContext, ErrorHandler};
pub use repository::{BaseRepository, KeyHash, NoHooks, RepositoryConfig, RepositoryHooks};
