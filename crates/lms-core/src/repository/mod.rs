//! Cache-aside repositories

mod base;
mod hooks;
mod inflight;
mod keys;

pub use base::{BaseRepository, RepositoryConfig};
pub use hooks::{NoHooks, RepositoryHooks};
pub use inflight::InFlight;
pub use keys::{CacheKeys, KeyHash, canonical_params, rolling_hash, sha256_hash};
