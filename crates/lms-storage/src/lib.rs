//! LMS Key-Value Storage Layer
//!
//! This crate provides the synchronous key-value store abstraction used for
//! the persisted auth token and the storage-backed cache strategies.

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;

pub use backend::KeyValueStore;
pub use error::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;
