//! API Guard - the main public API for Verseguard.
//!
//! The `ApiGuard` wraps a caller-supplied fetch function and decides, for
//! each reference, whether the call may reach the upstream service:
//! 1. Serve from cache when possible (no checks, nothing counted)
//! 2. Reject automated callers
//! 3. Enforce the minute/hour/day quotas
//! 4. Enforce the verse-count licensing limits
//! 5. Count the call, run the fetch, cache a successful payload
//!
//! Steps 1-5 up to the count run under one lock; the fetch itself runs
//! outside it, so a slow upstream never blocks other admissions.

use crate::cache::store::ResultCache;
use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use crate::detect::anomaly::{AnomalyDetector, HostProbe};
use crate::meter::quota::{QuotaTracker, RemainingQuota};
use crate::policy::size::{SizeValidator, SizeViolation};
use crate::protocol::models::{GuardFailure, GuardOutcome, VerseResult};
use crate::reference::{self, ParsedReference};
use crate::storage::{FileStore, StateStore};
use crate::GuardError;
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Read-only snapshot for monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardStatus {
    /// Remaining calls per window.
    pub remaining: RemainingQuota,
    /// Cached entries.
    pub cache_size: usize,
    /// Cache capacity.
    pub max_cache_size: usize,
    /// Whether every quota window has room.
    pub can_request: bool,
    /// Seconds until the minute window reopens (0 if open).
    pub wait_seconds: u64,
}

struct GuardState {
    quota: QuotaTracker,
    cache: ResultCache,
    detector: AnomalyDetector,
}

/// Admission guard in front of a rate-limited, licensed text API.
///
/// Create one instance per process and share it (it is `Send + Sync`).
pub struct ApiGuard {
    config: GuardConfig,
    clock: Arc<dyn Clock>,
    validator: SizeValidator,
    state: Mutex<GuardState>,
}

impl ApiGuard {
    /// Create a guard persisting under the configured namespace.
    ///
    /// Uses the system clock and no host capability probe.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The state directory cannot be created
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;
        let store = Arc::new(FileStore::with_namespace(&config.storage_namespace)?);
        Self::from_parts(config, Arc::new(SystemClock), store, None)
    }

    /// Create a guard from explicit collaborators.
    ///
    /// State is loaded from `store`; unreadable state starts fresh. A cache
    /// older than `cache_max_age` is cleared here.
    pub fn from_parts(
        config: GuardConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn StateStore>,
        probe: Option<Arc<dyn HostProbe>>,
    ) -> Result<Self, GuardError> {
        config.validate()?;

        let quota = QuotaTracker::load(config.quota, store.clone(), clock.clone());
        let mut cache = ResultCache::load(
            config.max_cache_entries,
            config.cache_max_age,
            store,
            clock.clone(),
        );
        if cache.is_stale() {
            tracing::info!("Verse cache older than retention horizon, clearing");
            cache.clear();
        }
        let detector = AnomalyDetector::new(config.anomaly, probe);

        Ok(Self {
            validator: SizeValidator::new(config.max_consecutive_verses),
            config,
            clock,
            state: Mutex::new(GuardState {
                quota,
                cache,
                detector,
            }),
        })
    }

    /// Run one guarded request.
    ///
    /// Never fails: every rejection comes back as [`GuardOutcome::Failed`].
    /// The call is counted before `fetch` is awaited, so a failed fetch still
    /// consumes quota. Only payloads with `success == true` are cached.
    pub async fn request<F, Fut, E>(&self, reference: &str, fetch: F) -> GuardOutcome
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<VerseResult, E>>,
        E: Display,
    {
        if let Err(exit) = self.admit(reference).await {
            return match exit {
                Admission::Cached(result) => GuardOutcome::Cached(result),
                Admission::Rejected(failure) => GuardOutcome::Failed(failure),
            };
        }

        match fetch(reference.to_string()).await {
            Ok(result) => {
                if result.success {
                    self.state
                        .lock()
                        .await
                        .cache
                        .put(reference, result.clone());
                } else {
                    tracing::warn!(
                        reference,
                        error = ?result.error,
                        "Upstream returned a failed payload"
                    );
                }
                GuardOutcome::Fetched(result)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(reference, error = %message, "Upstream fetch failed");
                GuardOutcome::Failed(GuardFailure::Upstream { message })
            }
        }
    }

    /// Admission sequence up to and including the quota count.
    ///
    /// `Ok(())` means the call was counted and the fetch may run.
    async fn admit(&self, reference: &str) -> Result<(), Admission> {
        let mut state = self.state.lock().await;

        if let Some(hit) = state.cache.get(reference) {
            tracing::debug!(reference, "Served from cache");
            return Err(Admission::Cached(hit.clone()));
        }

        let now = self.clock.now_utc();
        if let Some(signal) = state.detector.inspect(&self.config.identity, now) {
            tracing::warn!(reference, ?signal, "Bot detected, request blocked");
            return Err(Admission::Rejected(GuardFailure::BotDetected));
        }

        if !state.quota.can_proceed() {
            let remaining = state.quota.remaining();
            let wait_seconds = state.quota.wait_seconds();
            tracing::warn!(
                reference,
                minute = remaining.minute,
                hour = remaining.hour,
                day = remaining.day,
                wait_seconds,
                "Rate limit reached"
            );
            return Err(Admission::Rejected(GuardFailure::RateLimited {
                wait_seconds,
                remaining,
            }));
        }

        let parsed = reference::parse(reference);
        if let Err(violation) = self.validator.validate(&parsed) {
            tracing::warn!(
                reference,
                reason = violation.reason(),
                limit = violation.limit(),
                "Request denied"
            );
            return Err(Admission::Rejected(GuardFailure::VerseLimitExceeded(violation)));
        }
        if parsed.verse_count > 1 {
            tracing::debug!(
                reference,
                verses = parsed.verse_count,
                book = parsed.book.as_deref().unwrap_or("unknown"),
                "Requesting consecutive verses"
            );
        }

        state.quota.record();
        tracing::debug!(reference, "Request admitted");
        Ok(())
    }

    /// Parse and size-check a reference without touching any state.
    pub fn validate_reference(&self, reference: &str) -> Result<ParsedReference, SizeViolation> {
        let parsed = reference::parse(reference);
        self.validator.validate(&parsed)?;
        Ok(parsed)
    }

    /// Largest verse count a single query may request from `book`.
    pub fn max_verses(&self, book: &str) -> u32 {
        self.validator.max_verses(&reference::catalog::canonicalize(book))
    }

    /// Monitoring snapshot.
    pub async fn status(&self) -> GuardStatus {
        let mut state = self.state.lock().await;
        GuardStatus {
            remaining: state.quota.remaining(),
            cache_size: state.cache.size(),
            max_cache_size: state.cache.max_size(),
            can_request: state.quota.can_proceed(),
            wait_seconds: state.quota.wait_seconds(),
        }
    }

    /// Remaining calls per window.
    pub async fn remaining(&self) -> RemainingQuota {
        self.state.lock().await.quota.remaining()
    }

    /// Seconds until the minute window reopens.
    pub async fn wait_seconds(&self) -> u64 {
        self.state.lock().await.quota.wait_seconds()
    }

    /// Cached entries.
    pub async fn cache_size(&self) -> usize {
        self.state.lock().await.cache.size()
    }

    /// Empty the cache.
    pub async fn clear_cache(&self) {
        self.state.lock().await.cache.clear();
    }

    /// Forget recorded quota usage and the rapid-fire counter.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.quota.reset();
        state.detector.reset();
        tracing::info!("Guard reset");
    }

    /// One maintenance pass: prune quota state, clear a stale cache.
    pub async fn run_maintenance(&self) {
        let mut state = self.state.lock().await;
        state.quota.cleanup();
        if state.cache.is_stale() {
            tracing::info!("Periodic verse cache clear");
            state.cache.clear();
        }
    }

    /// Run [`run_maintenance`](Self::run_maintenance) every
    /// `maintenance_interval` on the current tokio runtime.
    ///
    /// The task ends once the last strong reference to the guard is dropped.
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let period = self.config.maintenance_interval;
        let guard: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(guard) = guard.upgrade() else {
                    break;
                };
                guard.run_maintenance().await;
            }
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }
}

/// Early exits from the admission sequence.
enum Admission {
    Cached(VerseResult),
    Rejected(GuardFailure),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::config::QuotaLimits;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0";

    fn clock() -> Arc<MockClock> {
        Arc::new(MockClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        ))
    }

    fn test_config() -> GuardConfig {
        GuardConfig {
            identity: BROWSER.to_string(),
            storage_namespace: "verseguard-test".to_string(),
            ..GuardConfig::default()
        }
    }

    fn guard_with(config: GuardConfig, clock: Arc<MockClock>) -> ApiGuard {
        ApiGuard::from_parts(config, clock, Arc::new(MemoryStore::new()), None).unwrap()
    }

    async fn esv(reference: String) -> Result<VerseResult, String> {
        Ok(VerseResult::passage(format!("text of {}", reference), "ESV"))
    }

    #[tokio::test]
    async fn test_fetch_then_cache_hit() {
        let clock = clock();
        let guard = guard_with(test_config(), clock.clone());
        let calls = AtomicUsize::new(0);

        let first = guard
            .request("John 3:16", |r| {
                calls.fetch_add(1, Ordering::SeqCst);
                esv(r)
            })
            .await;
        assert!(matches!(first, GuardOutcome::Fetched(ref v) if v.text == "text of John 3:16"));

        clock.advance(Duration::seconds(1));
        let second = guard
            .request("John 3:16", |r| {
                calls.fetch_add(1, Ordering::SeqCst);
                esv(r)
            })
            .await;
        assert!(second.from_cache());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(guard.remaining().await.minute, 59);
    }

    #[tokio::test]
    async fn test_bot_identity_blocked_without_quota() {
        let config = GuardConfig {
            identity: "curl/8.5.0".to_string(),
            ..test_config()
        };
        let guard = guard_with(config, clock());

        let outcome = guard.request("John 3:16", esv).await;
        assert_eq!(outcome.failure(), Some(&GuardFailure::BotDetected));
        assert_eq!(guard.remaining().await.day, 5000);
    }

    #[tokio::test]
    async fn test_oversized_request_not_counted() {
        let guard = guard_with(test_config(), clock());
        let calls = AtomicUsize::new(0);

        let outcome = guard
            .request("Philemon 1:1-20", |r| {
                calls.fetch_add(1, Ordering::SeqCst);
                esv(r)
            })
            .await;

        match outcome.failure() {
            Some(GuardFailure::VerseLimitExceeded(violation)) => assert_eq!(violation.limit(), 12),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(guard.remaining().await.day, 5000);
        assert_eq!(guard.cache_size().await, 0);
    }

    #[tokio::test]
    async fn test_upstream_error_consumes_quota_and_is_not_cached() {
        let clock = clock();
        let guard = guard_with(test_config(), clock.clone());

        let outcome = guard
            .request("John 3:16", |_| async { Err::<VerseResult, _>("connection reset") })
            .await;
        assert_eq!(
            outcome.failure(),
            Some(&GuardFailure::Upstream {
                message: "connection reset".to_string()
            })
        );
        assert_eq!(guard.remaining().await.day, 4999);
        assert_eq!(guard.cache_size().await, 0);

        // The next call for the same key goes upstream again.
        clock.advance(Duration::seconds(1));
        let retry = guard.request("John 3:16", esv).await;
        assert!(matches!(retry, GuardOutcome::Fetched(_)));
        assert_eq!(guard.cache_size().await, 1);
    }

    #[tokio::test]
    async fn test_failed_payload_not_cached() {
        let guard = guard_with(test_config(), clock());
        let outcome = guard
            .request("John 3:16", |_| async {
                Ok::<_, String>(VerseResult::failure("ESV API error", "Error", "upstream"))
            })
            .await;
        assert!(!outcome.is_success());
        assert!(matches!(outcome, GuardOutcome::Fetched(_)));
        assert_eq!(guard.cache_size().await, 0);
    }

    #[tokio::test]
    async fn test_rate_limit_after_sixty_calls() {
        let clock = clock();
        let guard = guard_with(test_config(), clock.clone());

        for i in 0..60 {
            let outcome = guard.request(&format!("Psalms 119:{}", i + 1), esv).await;
            assert!(outcome.is_success(), "call {i}");
            clock.advance(Duration::milliseconds(200));
        }

        let calls = AtomicUsize::new(0);
        let outcome = guard
            .request("John 1:1", |r| {
                calls.fetch_add(1, Ordering::SeqCst);
                esv(r)
            })
            .await;
        match outcome.failure() {
            Some(GuardFailure::RateLimited {
                wait_seconds,
                remaining,
            }) => {
                assert!(*wait_seconds <= 60);
                assert_eq!(*wait_seconds, 48);
                assert_eq!(remaining.minute, 0);
                assert_eq!(remaining.hour, 940);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Cached references are still served while rate limited.
        assert!(guard.request("Psalms 119:1", esv).await.from_cache());
    }

    #[tokio::test]
    async fn test_concurrent_requests_never_exceed_limit() {
        let config = GuardConfig {
            quota: QuotaLimits {
                per_minute: 2,
                ..QuotaLimits::default()
            },
            ..test_config()
        };
        let guard = guard_with(config, clock());
        let calls = AtomicUsize::new(0);
        let fetch = |r: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::task::yield_now().await;
                esv(r).await
            }
        };

        let (a, b, c, d) = tokio::join!(
            guard.request("John 1:1", fetch),
            guard.request("John 1:2", fetch),
            guard.request("John 1:3", fetch),
            guard.request("John 1:4", fetch),
        );
        let outcomes = [a, b, c, d];

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 2);
        let limited = outcomes
            .iter()
            .filter(|o| matches!(o.failure(), Some(GuardFailure::RateLimited { .. })))
            .count();
        assert_eq!(limited, 2);
        assert_eq!(guard.remaining().await.minute, 0);
    }

    #[tokio::test]
    async fn test_rapid_fire_trips_detector() {
        let clock = clock();
        let guard = guard_with(test_config(), clock.clone());

        let mut outcomes = Vec::new();
        for i in 0..8 {
            outcomes.push(guard.request(&format!("Rom 8:{}", i + 1), esv).await);
            clock.advance(Duration::milliseconds(20));
        }
        assert!(outcomes[..6].iter().all(GuardOutcome::is_success));
        assert_eq!(outcomes[6].failure(), Some(&GuardFailure::BotDetected));
        // Bot rejections were not counted.
        assert_eq!(guard.remaining().await.day, 5000 - 6);
    }

    #[tokio::test]
    async fn test_status_and_reset() {
        let clock = clock();
        let guard = guard_with(test_config(), clock.clone());
        guard.request("John 3:16", esv).await;

        let status = guard.status().await;
        assert_eq!(status.cache_size, 1);
        assert_eq!(status.max_cache_size, 500);
        assert!(status.can_request);
        assert_eq!(status.wait_seconds, 0);
        assert_eq!(status.remaining.minute, 59);

        guard.reset().await;
        assert_eq!(guard.remaining().await.day, 5000);
        // Reset leaves the cache alone.
        assert_eq!(guard.cache_size().await, 1);

        guard.clear_cache().await;
        assert_eq!(guard.cache_size().await, 0);
    }

    #[tokio::test]
    async fn test_stale_cache_cleared_at_startup() {
        let clock = clock();
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        {
            let guard =
                ApiGuard::from_parts(test_config(), clock.clone(), store.clone(), None).unwrap();
            guard.request("John 3:16", esv).await;
        }

        clock.advance(Duration::days(31));
        let guard = ApiGuard::from_parts(test_config(), clock.clone(), store, None).unwrap();
        assert_eq!(guard.cache_size().await, 0);
    }

    #[tokio::test]
    async fn test_run_maintenance_prunes_and_clears() {
        let clock = clock();
        let guard = guard_with(test_config(), clock.clone());
        guard.request("John 3:16", esv).await;

        clock.advance(Duration::days(31));
        guard.run_maintenance().await;

        assert_eq!(guard.cache_size().await, 0);
        let state = guard.state.lock().await;
        assert!(state.quota.state().request_timestamps.is_empty());
        assert_eq!(state.quota.state().daily_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_maintenance_runs_on_interval() {
        let clock = clock();
        let guard = Arc::new(guard_with(test_config(), clock.clone()));
        guard.request("John 3:16", esv).await;
        let handle = guard.spawn_maintenance();

        clock.advance(Duration::days(31));
        tokio::time::sleep(std::time::Duration::from_secs(5 * 60 + 1)).await;
        tokio::task::yield_now().await;

        assert_eq!(guard.cache_size().await, 0);
        handle.abort();
    }

    #[test]
    fn test_validate_reference_is_side_effect_free() {
        let guard = guard_with(test_config(), clock());
        assert!(guard.validate_reference("John 3:16").is_ok());
        assert!(guard.validate_reference("Gen 1:1-600").is_err());
        assert_eq!(guard.max_verses("Rom"), 216);
        assert_eq!(guard.max_verses("Psalms"), 500);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GuardConfig {
            max_cache_entries: 0,
            ..test_config()
        };
        let result = ApiGuard::from_parts(config, clock(), Arc::new(MemoryStore::new()), None);
        assert!(matches!(result, Err(GuardError::ConfigError(_))));
    }
}
