//! Fetch payloads and guard outcomes.

use crate::meter::quota::RemainingQuota;
use crate::policy::size::SizeViolation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload returned by the caller-supplied fetch function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseResult {
    /// Passage text (or a message, for failures).
    pub text: String,

    /// Translation or status label, e.g. `"ESV"`.
    pub version: String,

    /// Whether the upstream call produced a usable passage.
    pub success: bool,

    /// Failure code, when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerseResult {
    /// A successful passage.
    pub fn passage(text: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            version: version.into(),
            success: true,
            error: None,
        }
    }

    /// A renderable failure.
    pub fn failure(
        text: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            version: version.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Why the guard did not serve a passage.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum GuardFailure {
    /// The caller looks automated. Quota untouched.
    #[error("Automated requests are not permitted.")]
    BotDetected,

    /// A quota window is exhausted. Quota untouched.
    #[error("Rate limit reached. Please wait {wait_seconds} seconds.")]
    #[serde(rename = "rate_limit")]
    RateLimited {
        /// Seconds until the minute window reopens.
        wait_seconds: u64,
        /// Remaining calls per window.
        remaining: RemainingQuota,
    },

    /// The reference asks for too many verses. Quota and cache untouched.
    #[error("{0}")]
    VerseLimitExceeded(SizeViolation),

    /// The fetch function failed. Quota was consumed; nothing cached.
    #[error("Failed to fetch verse: {message}")]
    Upstream {
        /// The fetch function's error message.
        message: String,
    },
}

impl GuardFailure {
    /// Wire code for this failure.
    ///
    /// Upstream failures report the fetch function's own message.
    pub fn code(&self) -> &str {
        match self {
            GuardFailure::BotDetected => "bot_detected",
            GuardFailure::RateLimited { .. } => "rate_limit",
            GuardFailure::VerseLimitExceeded(_) => "verse_limit_exceeded",
            GuardFailure::Upstream { message } => message,
        }
    }

    /// Status label shown in place of a translation name.
    pub fn version_label(&self) -> &'static str {
        match self {
            GuardFailure::RateLimited { .. } => "Rate Limited",
            GuardFailure::VerseLimitExceeded(_) => "Validation Error",
            GuardFailure::BotDetected | GuardFailure::Upstream { .. } => "Error",
        }
    }
}

/// Result of one guarded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    /// Served from cache; nothing was checked or counted.
    Cached(VerseResult),

    /// The fetch function ran. The payload may itself report failure,
    /// in which case it was not cached.
    Fetched(VerseResult),

    /// Rejected before or during the fetch.
    Failed(GuardFailure),
}

impl GuardOutcome {
    /// Whether a usable passage came back.
    pub fn is_success(&self) -> bool {
        match self {
            GuardOutcome::Cached(result) | GuardOutcome::Fetched(result) => result.success,
            GuardOutcome::Failed(_) => false,
        }
    }

    /// Whether the payload came from the cache.
    pub fn from_cache(&self) -> bool {
        matches!(self, GuardOutcome::Cached(_))
    }

    /// The guard failure, if any.
    pub fn failure(&self) -> Option<&GuardFailure> {
        match self {
            GuardOutcome::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Collapse into a renderable payload.
    pub fn into_result(self) -> VerseResult {
        match self {
            GuardOutcome::Cached(result) | GuardOutcome::Fetched(result) => result,
            GuardOutcome::Failed(failure) => VerseResult::failure(
                failure.to_string(),
                failure.version_label(),
                failure.code(),
            ),
        }
    }
}

/// Parse a JSON payload into a [`VerseResult`].
pub fn parse_verse_result(body: &[u8]) -> Result<VerseResult, serde_json::Error> {
    serde_json::from_slice(body)
}
