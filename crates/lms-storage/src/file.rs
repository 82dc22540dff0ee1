//! JSON file backed key-value store

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use crate::backend::KeyValueStore;
use crate::error::StorageError;

/// Key-value store persisted as a single JSON object on disk.
///
/// The whole map is held in memory and rewritten on every mutation using a
/// write-to-temp-then-rename, so a crash mid-write leaves the previous file
/// intact. The file holds the auth token, so it is created with mode 0600.
/// A mutation only becomes visible once it has been written, so a failed
/// call leaves both the file and the in-memory map unchanged.
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open a store, loading existing contents if the file exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            BTreeMap::new()
        };

        info!("Opened file store at {:?} ({} keys)", path, entries.len());

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the map and swap it in once persisted.
    /// `change` returns false when there is nothing to write.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool),
    ) -> Result<T, StorageError> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        let (result, changed) = change(&mut next);
        if changed {
            self.persist(&next)?;
            *entries = next;
        }
        Ok(result)
    }

    /// Persist the given snapshot atomically
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(entries)?;

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let temp_file = tempfile::NamedTempFile::new_in(parent)?;
        {
            let mut file = temp_file.as_file();
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        #[cfg(unix)]
        {
            let mut perms = temp_file.as_file().metadata()?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(temp_file.path(), perms)?;
        }

        temp_file
            .persist(&self.path)
            .map_err(|e| StorageError::Io(e.error))?;

        debug!("Persisted {} keys to {:?}", entries.len(), self.path);
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string());
            ((), true)
        })
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.mutate(|entries| {
            let removed = entries.remove(key).is_some();
            (removed, removed)
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(prefix));
            let removed = before - entries.len();
            (removed, removed > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("auth_token", "secret").unwrap();
            store.set("theme", "dark").unwrap();
            assert!(store.remove("theme").unwrap());
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("auth_token").unwrap().as_deref(), Some("secret"));
        assert!(reopened.get("theme").unwrap().is_none());
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set("k", "v").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            FileStore::open(&path),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let store = FileStore::open(nested.join("store.json")).unwrap();
        store.set("auth_token", "old").unwrap();
        store.set("cache:courses:a", "1").unwrap();

        std::fs::remove_dir_all(&nested).unwrap();

        assert!(store.set("auth_token", "new").is_err());
        assert!(store.remove("auth_token").is_err());
        assert!(store.remove_prefix("cache:").is_err());
        assert_eq!(store.get("auth_token").unwrap().as_deref(), Some("old"));
        assert_eq!(store.get("cache:courses:a").unwrap().as_deref(), Some("1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions_are_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = FileStore::open(&path).unwrap();
        store.set("auth_token", "secret").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
