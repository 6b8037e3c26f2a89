//! Key-value storage backends for the side stores.
//!
//! One durable (file-backed, survives restarts) and one session-scoped
//! (in-process, dropped with the process). Both sit behind the [`Storage`]
//! trait so the stores and the admin facade are backend-agnostic; tests run
//! the durable stores against the memory backend.

use crate::error::StorageError;
use dashmap::DashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Minimal string key-value persistence surface.
pub trait Storage: Send + Sync {
    /// Retrieve a value by key, or `None` if not present.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Insert or replace a key-value pair.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Remove a key. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Remove every key.
    fn clear(&self) -> Result<(), StorageError>;
    /// Sum of key length + value length over all entries. Unreadable
    /// entries count as zero rather than failing introspection.
    fn byte_size(&self) -> usize;
}

/// Durable backend: one `<key>.json` file per key under a root directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) the storage directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Keys are derived back from file names on iteration.
    fn key_for(path: &Path) -> Option<String> {
        if path.extension().is_some_and(|ext| ext == "json") {
            path.file_stem().map(|s| s.to_string_lossy().into_owned())
        } else {
            None
        }
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        fs::write(&path, value).map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if Self::key_for(&path).is_some() {
                fs::remove_file(&path).map_err(|source| StorageError::Io { path, source })?;
            }
        }
        Ok(())
    }

    fn byte_size(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            warn!(dir = %self.dir.display(), "storage directory unreadable, reporting empty");
            return 0;
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let key = Self::key_for(&path)?;
                let len = entry.metadata().ok()?.len() as usize;
                Some(key.len() + len)
            })
            .sum()
    }
}

/// Session-scoped backend: an in-process map that lives exactly as long as
/// the process, which is this crate's notion of a session.
#[derive(Default)]
pub struct MemoryStorage {
    map: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.get(key).map(|v| v.clone()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.map.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.map.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.map.clear();
        Ok(())
    }

    fn byte_size(&self) -> usize {
        self.map
            .iter()
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}
