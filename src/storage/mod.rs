//! Durable keyed storage for guard state.
//!
//! The quota tracker and the result cache each persist one JSON blob under
//! a fixed key. Stores only move strings; encoding is the owner's job.

pub mod file;
pub mod memory;

use crate::GuardError;

/// Storage key for the quota tracker state.
pub const QUOTA_STATE_KEY: &str = "rate_limits";

/// Storage key for the result cache state.
pub const CACHE_STATE_KEY: &str = "verse_cache";

/// A keyed blob store.
pub trait StateStore: Send + Sync {
    /// Read the blob stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>, GuardError>;

    /// Replace the blob stored under `key`.
    fn save(&self, key: &str, blob: &str) -> Result<(), GuardError>;
}

pub use file::FileStore;
pub use memory::MemoryStore;
