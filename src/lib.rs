//! # Verseguard
//!
//! **Admission guard for a rate-limited, licensed scripture text API.**
//!
//! Verseguard sits between your application and an upstream verse service
//! whose terms cap request rates and passage sizes. Every call goes through
//! [`ApiGuard::request`], which decides whether the upstream may be hit:
//!
//! - **Result cache**: repeated references are served locally, uncounted
//! - **Bot heuristics**: denylisted identities and rapid-fire bursts are refused
//! - **Quotas**: 60 per minute, 1000 per hour, 5000 per day by default
//! - **Licensing limits**: at most 500 consecutive verses and at most half a book
//! - **Persistence**: quota usage and cached passages survive restarts
//!
//! ## Quickstart
//!
//! ```no_run
//! use verseguard::{ApiGuard, GuardConfig, VerseResult};
//!
//! # async fn run() -> Result<(), verseguard::GuardError> {
//! let guard = ApiGuard::new(GuardConfig::default())?;
//!
//! let outcome = guard
//!     .request("John 3:16", |reference| async move {
//!         // Call the upstream service here.
//!         Ok::<_, std::io::Error>(VerseResult::passage(format!("text of {reference}"), "ESV"))
//!     })
//!     .await;
//!
//! let result = outcome.into_result();
//! println!("{} ({})", result.text, result.version);
//! # Ok(())
//! # }
//! ```
//!
//! ## Guard order
//!
//! Cache, then bot detection, then quotas, then size. Only a request that
//! passes all four is counted, and it is counted before the fetch runs, so a
//! failed fetch still consumes quota.
//!
//! ## Configuration
//!
//! - `identity` - the client identity string inspected by the bot heuristic
//! - `storage_namespace` - directory name under the platform data dir
//! - `quota` - per-minute/hour/day limits
//! - `max_cache_entries` / `cache_max_age` - cache bounds
//!
//! See [`GuardConfig`] for full documentation.

#![deny(missing_docs)]
#![doc(html_root_url = "https://docs.rs/verseguard/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Storage layer
pub mod storage;

// Reference layer
pub mod reference;

// Policy layer
pub mod policy;

// Metering layer
pub mod meter;

// Cache layer
pub mod cache;

// Detection layer
pub mod detect;

// Protocol layer
pub mod protocol;

// Guard (main public API)
pub mod guard;

// Re-exports for public API
pub use cache::store::ResultCache;
pub use clock::{Clock, SystemClock};
pub use config::{AnomalyConfig, GuardConfig, QuotaLimits};
pub use detect::anomaly::{AnomalyDetector, HostProbe};
pub use errors::GuardError;
pub use guard::{ApiGuard, GuardStatus};
pub use meter::quota::{QuotaTracker, RemainingQuota};
pub use policy::size::{SizeValidator, SizeViolation};
pub use protocol::models::{GuardFailure, GuardOutcome, VerseResult};
pub use reference::ParsedReference;
pub use storage::{FileStore, MemoryStore, StateStore};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
