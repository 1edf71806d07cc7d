//! Content-addressed record store
//!
//! Two maps keyed by id or alias:
//! - durable records: serialized bytes, optionally mirrored to a directory
//! - live handles: in-process values that serialization cannot resurrect
//!
//! The store is append-only. Writing the same key twice with the same bytes
//! is a harmless overwrite, so concurrent writers need no coordination.
//! Mirrored files are replaced atomically: written to a temp file in the
//! same directory, synced, then renamed over the target.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, trace};

/// Longest file name most filesystems accept
const MAX_FILE_NAME: usize = 255;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Key `{0}` is too long to mirror to the record directory")]
    KeyTooLong(String),

    #[error("Failed to access record directory: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tempfile::PersistError> for StoreError {
    fn from(e: tempfile::PersistError) -> Self {
        StoreError::Io(e.error)
    }
}

pub struct Store<T> {
    records: DashMap<String, Arc<[u8]>>,
    live: DashMap<String, Arc<T>>,
    directory: Option<PathBuf>,
}

impl<T> Store<T> {
    /// A store held entirely in process memory.
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            live: DashMap::new(),
            directory: None,
        }
    }

    /// A store whose records are also written to `directory`.
    pub fn with_directory(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self {
            directory: Some(directory),
            ..Self::new()
        })
    }

    fn record_path(&self, key: &str) -> Result<Option<PathBuf>, StoreError> {
        let Some(dir) = &self.directory else {
            return Ok(None);
        };
        // Aliases are free-form, so file names are the key's hex bytes
        let encoded: String = key.bytes().map(|b| format!("{b:02x}")).collect();
        let file_name = format!("{encoded}.json");
        if file_name.len() > MAX_FILE_NAME {
            return Err(StoreError::KeyTooLong(key.to_string()));
        }
        Ok(Some(dir.join(file_name)))
    }

    fn stage(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile, StoreError> {
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        Ok(file)
    }

    pub fn put_record(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.put_records(&[key], bytes)
    }

    /// Store `bytes` under every key in `keys`, or under none of them.
    ///
    /// Every mirrored file is staged before any is renamed into place, and
    /// the in-process map changes only once the directory is up to date.
    /// Files are committed in order, so put the key readers rely on last.
    pub fn put_records(&self, keys: &[&str], bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(dir) = &self.directory {
            let mut staged = Vec::with_capacity(keys.len());
            for &key in keys {
                if let Some(path) = self.record_path(key)? {
                    staged.push((Self::stage(dir, bytes)?, path));
                }
            }
            for (file, path) in staged {
                file.persist(&path)?;
            }
        }

        for &key in keys {
            self.records.insert(key.to_string(), Arc::from(bytes));
            trace!(key, len = bytes.len(), "Stored record");
        }
        Ok(())
    }

    pub fn get_record(&self, key: &str) -> Result<Arc<[u8]>, StoreError> {
        if let Some(bytes) = self.records.get(key) {
            return Ok(bytes.clone());
        }

        let Ok(Some(path)) = self.record_path(key) else {
            return Err(StoreError::NotFound(key.to_string()));
        };
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(key, "Read record from directory");
                let bytes: Arc<[u8]> = Arc::from(bytes);
                self.records.insert(key.to_string(), bytes.clone());
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn put_live(&self, key: &str, value: Arc<T>) {
        self.live.insert(key.to_string(), value);
    }

    pub fn get_live(&self, key: &str) -> Option<Arc<T>> {
        self.live.get(key).map(|v| v.clone())
    }

}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}
