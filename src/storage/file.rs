//! File-based state store with atomic writes.
//!
//! Stores one `<key>.json` file per blob under `dirs::data_dir()/<namespace>/`.
//! Uses temp file + rename for atomic writes.

use super::StateStore;
use crate::GuardError;
use std::fs;
use std::path::{Path, PathBuf};

/// File-based state store.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory holding the state files.
    dir: PathBuf,
}

impl FileStore {
    /// Create a store for the given namespace under the platform data directory.
    pub fn with_namespace(namespace: &str) -> Result<Self, GuardError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| GuardError::StorageIO("Could not find data directory".to_string()))?;

        Self::new(base_dir.join(namespace))
    }

    /// Create a store rooted at a specific directory.
    pub fn new(dir: PathBuf) -> Result<Self, GuardError> {
        fs::create_dir_all(&dir)
            .map_err(|e| GuardError::StorageIO(format!("Failed to create state dir: {}", e)))?;
        Ok(Self { dir })
    }

    /// Directory holding the state files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are crate constants, but never let one escape the directory.
        let safe: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

impl StateStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>, GuardError> {
        let path = self.path_for(key);

        if !path.exists() {
            return Ok(None);
        }

        let blob = fs::read_to_string(&path)
            .map_err(|e| GuardError::StorageIO(format!("Failed to read {}: {}", key, e)))?;
        Ok(Some(blob))
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), GuardError> {
        let target_path = self.path_for(key);
        let temp_path = target_path.with_extension("tmp");

        fs::write(&temp_path, blob)
            .map_err(|e| GuardError::StorageIO(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, &target_path)
            .map_err(|e| GuardError::StorageIO(format!("Failed to rename state file: {}", e)))?;

        Ok(())
    }
}
