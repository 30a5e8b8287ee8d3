//! Verseguard error types.

use thiserror::Error;

/// Errors raised by the guard's plumbing: configuration and state storage.
///
/// Admission rejections are not errors; see [`crate::GuardFailure`].
#[derive(Debug, Error)]
pub enum GuardError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Reading or writing persisted state failed.
    #[error("Storage I/O error: {0}")]
    StorageIO(String),
}
