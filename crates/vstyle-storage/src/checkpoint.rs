//! Checkpoint store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use vstyle_models::CheckpointRecord;

use crate::error::{StorageError, StorageResult};

const RECORD_EXTENSION: &str = "json";

/// Key-value persistence for resume records.
pub trait CheckpointStore: Send + Sync {
    /// Persist `record` under `key`, replacing any previous record.
    fn save(&self, key: &str, record: &CheckpointRecord) -> StorageResult<()>;

    /// Load the record for `key`. Missing or unreadable records are `None`.
    fn load(&self, key: &str) -> StorageResult<Option<CheckpointRecord>>;

    /// Remove the record for `key`. Removing a missing key is not an error.
    fn clear(&self, key: &str) -> StorageResult<()>;

    /// All stored keys, sorted.
    fn list_keys(&self) -> StorageResult<Vec<String>>;
}

/// Stores each record as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{}.{}", key, RECORD_EXTENSION)))
    }
}

/// Keys become file names, so they must not escape the store directory.
fn validate_key(key: &str) -> StorageResult<()> {
    let valid = !key.is_empty()
        && key != "."
        && key != ".."
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::invalid_key(key))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, key: &str, record: &CheckpointRecord) -> StorageResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        // Write then rename so a crash never leaves a half-written record.
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(record)?;
        fs::write(&tmp, body).map_err(|e| StorageError::write_failed(key, e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StorageError::write_failed(key, e.to_string())
        })?;

        debug!(
            key = %key,
            last_frame = record.last_frame,
            total_frames = record.total_frames,
            "Saved checkpoint"
        );
        Ok(())
    }

    fn load(&self, key: &str) -> StorageResult<Option<CheckpointRecord>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<CheckpointRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring unreadable checkpoint");
                Ok(None)
            }
        }
    }

    fn clear(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key = %key, "Cleared checkpoint");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_keys(&self) -> StorageResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
