//! Durable key-value slots for engine snapshots.
//!
//! The engine persists its whole state as one JSON document under a fixed
//! key. A [`StorageSlot`] is anything that can hold such documents:
//! - [`MemorySlot`]: process-local map, shared between clones
//! - [`FileSlot`]: one `<key>.json` file per key inside a directory

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::domain::{Asset, AssetId, HistoryLog};

/// Key under which the engine snapshot is stored
pub const STORAGE_KEY: &str = "pipeline_data";

/// Errors raised by storage slots
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move snapshot into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// A synchronous durable key-value slot
pub trait StorageSlot {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value stored under `key`
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Erase `key`; erasing a missing key is not an error
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// The persisted engine state.
///
/// Assets are stored as `[id, asset]` pairs in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub assets: Vec<(AssetId, Asset)>,

    #[serde(default)]
    pub history: HistoryLog,
}

/// In-memory slot. Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything is stored under `key`
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
}

impl StorageSlot for MemorySlot {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// File-backed slot storing each key as `<dir>/<key>.json`.
///
/// Writes are atomic: the document is written to a temp file in the same
/// directory and renamed over the target while an exclusive lock is held
/// on `<dir>/<key>.lock`.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    /// Open a slot rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Directory holding the slot files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document stored under `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn lock(&self, key: &str) -> Result<File, StorageError> {
        let path = self.dir.join(format!("{}.lock", key));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
        file.lock_exclusive()
            .map_err(|source| StorageError::Lock { path, source })?;
        Ok(file)
    }
}

impl StorageSlot for FileSlot {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let _lock = self.lock(key)?;

        let io_err = |source| StorageError::Io {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        tmp.write_all(value.as_bytes()).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&path)?;

        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let _lock = self.lock(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_slot_clones_share_state() {
        let mut slot = MemorySlot::new();
        let observer = slot.clone();

        slot.set(STORAGE_KEY, "{}").unwrap();
        assert!(observer.contains(STORAGE_KEY));
        assert_eq!(observer.get(STORAGE_KEY).unwrap().as_deref(), Some("{}"));

        slot.remove(STORAGE_KEY).unwrap();
        assert!(!observer.contains(STORAGE_KEY));
    }

    #[test]
    fn test_file_slot_set_get_remove() {
        let temp = TempDir::new().unwrap();
        let mut slot = FileSlot::open(temp.path().join("data")).unwrap();
        assert_eq!(slot.dir(), temp.path().join("data"));
        assert!(slot.dir().is_dir());

        assert!(slot.get(STORAGE_KEY).unwrap().is_none());

        slot.set(STORAGE_KEY, r#"{"assets":[]}"#).unwrap();
        assert!(slot.path_for(STORAGE_KEY).exists());
        assert_eq!(
            slot.get(STORAGE_KEY).unwrap().as_deref(),
            Some(r#"{"assets":[]}"#)
        );

        slot.set(STORAGE_KEY, "second").unwrap();
        assert_eq!(slot.get(STORAGE_KEY).unwrap().as_deref(), Some("second"));

        slot.remove(STORAGE_KEY).unwrap();
        assert!(slot.get(STORAGE_KEY).unwrap().is_none());

        // Removing twice is fine
        slot.remove(STORAGE_KEY).unwrap();
    }

    #[test]
    fn test_snapshot_layout() {
        let snapshot = Snapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert!(json["assets"].as_array().unwrap().is_empty());
        assert!(json["history"].as_array().unwrap().is_empty());
    }
}
