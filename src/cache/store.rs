//! Bounded result cache with FIFO eviction.
//!
//! Entries are kept in insertion order. When a new key arrives at capacity
//! the oldest-inserted key is evicted; overwriting an existing key keeps its
//! position. Reads never reorder, so this is FIFO rather than LRU.
//!
//! The cache does not clear itself. Callers check [`ResultCache::is_stale`]
//! and call [`ResultCache::clear`].

use crate::clock::Clock;
use crate::protocol::models::VerseResult;
use crate::storage::{StateStore, CACHE_STATE_KEY};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A cached payload stamped with its insertion instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    /// The fetched payload.
    #[serde(flatten)]
    pub payload: VerseResult,

    /// When the payload was stored.
    #[serde(rename = "cached", with = "chrono::serde::ts_milliseconds")]
    pub cached_at: DateTime<Utc>,
}

/// Persisted cache state.
///
/// The JSON shape (`verses`, `count`, `lastCleared` in epoch milliseconds)
/// matches the state written by the browser guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheState {
    /// Reference → entry, in insertion order.
    #[serde(rename = "verses")]
    pub entries: IndexMap<String, CachedEntry>,

    /// Always `entries.len()`.
    pub count: usize,

    /// Instant of the last full clear.
    #[serde(rename = "lastCleared", with = "chrono::serde::ts_milliseconds")]
    pub last_cleared: DateTime<Utc>,
}

impl CacheState {
    /// Create an empty state cleared at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            entries: IndexMap::new(),
            count: 0,
            last_cleared: now,
        }
    }
}

/// Bounded reference → payload cache with persisted state.
pub struct ResultCache {
    max_size: usize,
    max_age: Duration,
    state: CacheState,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Load the cache from `store`, falling back to an empty cache.
    ///
    /// A loaded state has its count recomputed and any entries beyond
    /// `max_size` evicted oldest-first.
    pub fn load(
        max_size: usize,
        max_age: Duration,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let loaded = match store.load(CACHE_STATE_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<CacheState>(&blob) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse verse cache, starting empty");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load verse cache, starting empty");
                None
            }
        };

        let mut cache = Self {
            max_size,
            max_age,
            state: CacheState::new(clock.now_utc()),
            store,
            clock,
        };

        match loaded {
            Some(state) => {
                cache.state = state;
                if cache.repair() {
                    cache.persist();
                }
            }
            None => cache.persist(),
        }
        cache
    }

    /// Look up a cached payload.
    pub fn get(&self, key: &str) -> Option<&VerseResult> {
        self.state.entries.get(key).map(|entry| &entry.payload)
    }

    /// Store a payload, evicting the oldest entry if a new key would overflow.
    pub fn put(&mut self, key: &str, value: VerseResult) {
        let entry = CachedEntry {
            payload: value,
            cached_at: self.clock.now_utc(),
        };

        if let Some(existing) = self.state.entries.get_mut(key) {
            *existing = entry;
        } else {
            if self.state.count >= self.max_size {
                if let Some((evicted, _)) = self.state.entries.shift_remove_index(0) {
                    tracing::info!(reference = %evicted, "Cache full, evicted oldest entry");
                }
            }
            self.state.entries.insert(key.to_string(), entry);
            self.state.count = self.state.entries.len();
        }
        self.persist();
    }

    /// Remove every entry and restart the staleness clock.
    pub fn clear(&mut self) {
        self.state = CacheState::new(self.clock.now_utc());
        tracing::info!("Verse cache cleared");
        self.persist();
    }

    /// Number of cached entries.
    pub fn size(&self) -> usize {
        self.state.count
    }

    /// Capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Whether the last full clear is older than the cache horizon.
    pub fn is_stale(&self) -> bool {
        let age = self.clock.now_utc() - self.state.last_cleared;
        age.to_std().map(|age| age > self.max_age).unwrap_or(false)
    }

    /// Current state.
    pub fn state(&self) -> &CacheState {
        &self.state
    }

    /// Restore `count == entries.len() <= max_size`. Returns whether anything changed.
    fn repair(&mut self) -> bool {
        let mut changed = false;
        while self.state.entries.len() > self.max_size {
            self.state.entries.shift_remove_index(0);
            changed = true;
        }
        if self.state.count != self.state.entries.len() {
            self.state.count = self.state.entries.len();
            changed = true;
        }
        if changed {
            tracing::warn!(count = self.state.count, "Repaired inconsistent verse cache");
        }
        changed
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.state) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize verse cache");
                return;
            }
        };
        if let Err(e) = self.store.save(CACHE_STATE_KEY, &json) {
            tracing::warn!(error = %e, "Failed to save verse cache");
        }
    }
}
