//! In-memory state store for ephemeral hosts and tests.

use super::StateStore;
use crate::GuardError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-local state store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a blob, e.g. state written by an earlier session.
    pub fn with_blob(key: &str, blob: &str) -> Self {
        let store = Self::new();
        if let Ok(mut blobs) = store.blobs.lock() {
            blobs.insert(key.to_string(), blob.to_string());
        }
        store
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, GuardError> {
        self.blobs
            .lock()
            .map_err(|_| GuardError::StorageIO("memory store lock poisoned".to_string()))
    }
}

impl StateStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, GuardError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn save(&self, key: &str, blob: &str) -> Result<(), GuardError> {
        self.lock()?.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}
