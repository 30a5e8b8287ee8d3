//! Request quota tracking over three nested windows.
//!
//! Minute and hour windows slide: they count entries of one shared timestamp
//! log newer than `now - span`. The day window is periodic: a plain counter
//! that resets once its last reset is more than 24h old, never derived from
//! the log.
//!
//! Every access prunes the log to the longest sliding span and applies each
//! periodic window's reset.
//! State is persisted after each mutation; unreadable state is replaced by a
//! fresh one.

use crate::clock::Clock;
use crate::config::QuotaLimits;
use crate::storage::{StateStore, QUOTA_STATE_KEY};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a window counts requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Count log entries newer than `now - span`.
    Sliding {
        /// Length of the window.
        span: Duration,
    },
    /// Count since the last periodic reset; reset once `period` has elapsed.
    Periodic {
        /// Time between resets.
        period: Duration,
    },
}

/// Identifies one of the three quota windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    /// Trailing 60 seconds.
    Minute,
    /// Trailing hour.
    Hour,
    /// Daily period.
    Day,
}

/// One quota window: its policy and limit.
#[derive(Debug, Clone, Copy)]
pub struct QuotaWindow {
    /// Which window this is.
    pub kind: WindowKind,
    /// How it counts.
    pub policy: WindowPolicy,
    /// Maximum requests admitted within it.
    pub limit: u64,
}

impl QuotaWindow {
    /// Requests counted against this window at `now`.
    fn used(&self, state: &QuotaState, now: DateTime<Utc>) -> u64 {
        match self.policy {
            WindowPolicy::Sliding { span } => {
                let cutoff = now - span;
                state.request_timestamps.iter().filter(|t| **t > cutoff).count() as u64
            }
            WindowPolicy::Periodic { .. } => state.daily_count,
        }
    }

    /// Time from `now` until this window admits one more call, assuming it
    /// is currently full. `None` when the sliding log holds no entry.
    fn reopens_in(&self, state: &QuotaState, now: DateTime<Utc>) -> Option<Duration> {
        match self.policy {
            WindowPolicy::Sliding { span } => {
                let cutoff = now - span;
                state
                    .request_timestamps
                    .iter()
                    .find(|t| **t > cutoff)
                    .map(|oldest| *oldest + span - now)
            }
            // The reset fires once `last_reset` is strictly older than `period`.
            WindowPolicy::Periodic { period } => {
                Some(state.last_reset + period + Duration::milliseconds(1) - now)
            }
        }
    }
}

/// Remaining requests per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemainingQuota {
    /// Left in the trailing minute.
    pub minute: u64,
    /// Left in the trailing hour.
    pub hour: u64,
    /// Left in the current daily period.
    pub day: u64,
}

/// Persisted quota state.
///
/// The JSON shape (`requests` as epoch milliseconds, `dailyCount`,
/// `lastReset`) matches the state written by the browser guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    /// One instant per admitted call, oldest first, never older than an hour.
    #[serde(rename = "requests", with = "timestamp_millis_seq")]
    pub request_timestamps: Vec<DateTime<Utc>>,

    /// Calls admitted in the current daily period.
    #[serde(rename = "dailyCount")]
    pub daily_count: u64,

    /// Instant of the last daily reset.
    #[serde(rename = "lastReset", with = "chrono::serde::ts_milliseconds")]
    pub last_reset: DateTime<Utc>,
}

impl QuotaState {
    /// Create an empty state whose daily period starts at `now`.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            request_timestamps: Vec::new(),
            daily_count: 0,
            last_reset: now,
        }
    }

    /// Drop log entries older than the longest sliding span and reset the
    /// counter once a periodic window's period has elapsed.
    ///
    /// Returns whether anything changed.
    fn clean(&mut self, windows: &[QuotaWindow], now: DateTime<Utc>) -> bool {
        let mut changed = false;

        let horizon = windows
            .iter()
            .filter_map(|w| match w.policy {
                WindowPolicy::Sliding { span } => Some(span),
                WindowPolicy::Periodic { .. } => None,
            })
            .max();
        if let Some(horizon) = horizon {
            let before = self.request_timestamps.len();
            let cutoff = now - horizon;
            self.request_timestamps.retain(|t| *t > cutoff);
            changed |= self.request_timestamps.len() != before;
        }

        for window in windows {
            if let WindowPolicy::Periodic { period } = window.policy {
                if self.last_reset < now - period {
                    self.daily_count = 0;
                    self.last_reset = now;
                    changed = true;
                }
            }
        }
        changed
    }
}

/// Serde adapter for a list of instants as epoch milliseconds.
mod timestamp_millis_seq {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        timestamps: &[DateTime<Utc>],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(timestamps.iter().map(DateTime::timestamp_millis))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<DateTime<Utc>>, D::Error> {
        Vec::<i64>::deserialize(deserializer)?
            .into_iter()
            .map(|ms| {
                DateTime::from_timestamp_millis(ms)
                    .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {}", ms)))
            })
            .collect()
    }
}

/// Sliding/periodic quota tracker with persisted state.
pub struct QuotaTracker {
    windows: [QuotaWindow; 3],
    state: QuotaState,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl QuotaTracker {
    /// Load the tracker from `store`, falling back to fresh state.
    pub fn load(limits: QuotaLimits, store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let state = match store.load(QUOTA_STATE_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<QuotaState>(&blob) {
                Ok(state) => Some(state),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse quota state, starting fresh");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load quota state, starting fresh");
                None
            }
        };

        let mut tracker = Self {
            windows: windows_for(limits),
            state: QuotaState::new(clock.now_utc()),
            store,
            clock,
        };

        match state {
            Some(state) => {
                tracker.state = state;
                tracker.cleanup();
            }
            None => tracker.persist(),
        }
        tracker
    }

    /// Prune the timestamp log and apply the daily reset, persisting if changed.
    pub fn cleanup(&mut self) {
        let now = self.clock.now_utc();
        if self.state.clean(&self.windows, now) {
            tracing::debug!(
                logged = self.state.request_timestamps.len(),
                daily = self.state.daily_count,
                "Pruned quota state"
            );
            self.persist();
        }
    }

    /// Whether every window still has room for one more call.
    pub fn can_proceed(&mut self) -> bool {
        self.cleanup();
        let now = self.clock.now_utc();
        self.windows
            .iter()
            .all(|w| w.used(&self.state, now) < w.limit)
    }

    /// Count one call against every window.
    ///
    /// Call only when the upstream call is actually about to be made.
    pub fn record(&mut self) {
        let now = self.clock.now_utc();
        self.state.request_timestamps.push(now);
        self.state.daily_count += 1;
        self.persist();
    }

    /// Remaining calls per window.
    pub fn remaining(&mut self) -> RemainingQuota {
        self.cleanup();
        RemainingQuota {
            minute: self.remaining_in(WindowKind::Minute),
            hour: self.remaining_in(WindowKind::Hour),
            day: self.remaining_in(WindowKind::Day),
        }
    }

    /// Seconds until the minute window admits another call.
    ///
    /// Zero unless the minute window is exhausted. Only the minute window is
    /// considered.
    pub fn wait_seconds(&mut self) -> u64 {
        self.cleanup();
        if self.remaining_in(WindowKind::Minute) > 0 {
            return 0;
        }

        let now = self.clock.now_utc();
        match self.window(WindowKind::Minute).reopens_in(&self.state, now) {
            Some(wait) => {
                let wait_ms = wait.num_milliseconds();
                if wait_ms <= 0 {
                    0
                } else {
                    ((wait_ms + 999) / 1000) as u64
                }
            }
            None => 60,
        }
    }

    /// Forget all recorded calls and start a new daily period now.
    pub fn reset(&mut self) {
        self.state = QuotaState::new(self.clock.now_utc());
        tracing::info!("Quota state reset");
        self.persist();
    }

    /// Current state (as of the last access).
    pub fn state(&self) -> &QuotaState {
        &self.state
    }

    /// The configured windows.
    pub fn windows(&self) -> &[QuotaWindow] {
        &self.windows
    }

    fn window(&self, kind: WindowKind) -> &QuotaWindow {
        // windows_for builds exactly one window per kind
        self.windows
            .iter()
            .find(|w| w.kind == kind)
            .unwrap_or(&self.windows[0])
    }

    fn remaining_in(&self, kind: WindowKind) -> u64 {
        let window = self.window(kind);
        window
            .limit
            .saturating_sub(window.used(&self.state, self.clock.now_utc()))
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.state) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize quota state");
                return;
            }
        };
        if let Err(e) = self.store.save(QUOTA_STATE_KEY, &json) {
            tracing::warn!(error = %e, "Failed to save quota state");
        }
    }
}

fn windows_for(limits: QuotaLimits) -> [QuotaWindow; 3] {
    [
        QuotaWindow {
            kind: WindowKind::Minute,
            policy: WindowPolicy::Sliding {
                span: Duration::seconds(60),
            },
            limit: limits.per_minute,
        },
        QuotaWindow {
            kind: WindowKind::Hour,
            policy: WindowPolicy::Sliding {
                span: Duration::hours(1),
            },
            limit: limits.per_hour,
        },
        QuotaWindow {
            kind: WindowKind::Day,
            policy: WindowPolicy::Periodic {
                period: Duration::hours(24),
            },
            limit: limits.per_day,
        },
    ]
}
