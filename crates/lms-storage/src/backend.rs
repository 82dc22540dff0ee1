//! Key-value store trait

use crate::error::StorageError;

/// Synchronous string key-value store
///
/// Implementations back the persisted auth token and the
/// `localStorage`/`sessionStorage` cache strategies. All operations are
/// synchronous so a read-modify-write sequence never spans an await point.
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value, returning whether it existed
    fn remove(&self, key: &str) -> Result<bool, StorageError>;

    /// List all keys starting with `prefix`
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Remove every key starting with `prefix`, returning how many were removed
    fn remove_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let keys = self.keys_with_prefix(prefix)?;
        let mut removed = 0;
        for key in keys {
            if self.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
