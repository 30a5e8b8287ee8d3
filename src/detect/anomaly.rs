//! Heuristic detection of automated callers.
//!
//! Three signals, any one of which flags a call:
//! - the identity string contains a denylisted token (per call, no memory);
//! - rapid-fire timing: calls closer than `min_interval` bump a counter,
//!   slower calls decay it by one, and the caller stays flagged while the
//!   counter exceeds `burst_threshold`;
//! - an optional host probe reporting missing capabilities.
//!
//! State is in memory only.

use crate::config::AnomalyConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Identity substrings that mark an automated client (matched lower-cased).
pub const IDENTITY_DENYLIST: &[&str] = &[
    "bot",
    "crawler",
    "spider",
    "scraper",
    "curl",
    "wget",
    "python-requests",
    "axios",
    "fetch",
    "headless",
];

/// Host-environment capability probe.
///
/// Browser-like hosts report whether the usual environment is present.
/// Hosts without such a notion pass no probe at all.
pub trait HostProbe: Send + Sync {
    /// Whether the host looks like an interactive client.
    fn has_expected_capabilities(&self) -> bool;
}

/// Which signal flagged a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalySignal {
    /// Identity string matched the denylist.
    Identity(&'static str),
    /// Rapid-fire counter above threshold.
    RapidFire(u32),
    /// Host probe reported missing capabilities.
    MissingCapabilities,
}

/// Bot/abuse heuristic with decaying rapid-fire counter.
pub struct AnomalyDetector {
    config: AnomalyConfig,
    probe: Option<Arc<dyn HostProbe>>,
    suspicious_activity: u32,
    last_request: Option<DateTime<Utc>>,
}

impl AnomalyDetector {
    /// Create a detector. `probe` of `None` disables the capability signal.
    pub fn new(config: AnomalyConfig, probe: Option<Arc<dyn HostProbe>>) -> Self {
        Self {
            config,
            probe,
            suspicious_activity: 0,
            last_request: None,
        }
    }

    /// Classify one call at `now`. Updates timing state on every call.
    pub fn is_suspicious(&mut self, identity: &str, now: DateTime<Utc>) -> bool {
        self.inspect(identity, now).is_some()
    }

    /// Like [`is_suspicious`](Self::is_suspicious), reporting the signal that fired.
    pub fn inspect(&mut self, identity: &str, now: DateTime<Utc>) -> Option<AnomalySignal> {
        let rapid = self.last_request.is_some_and(|last| {
            (now - last)
                .to_std()
                .map(|gap| gap < self.config.min_interval)
                // Clock went backwards: treat as rapid.
                .unwrap_or(true)
        });
        if rapid {
            self.suspicious_activity = self.suspicious_activity.saturating_add(1);
        } else {
            self.suspicious_activity = self.suspicious_activity.saturating_sub(1);
        }
        self.last_request = Some(now);

        let lowered = identity.to_lowercase();
        if let Some(token) = IDENTITY_DENYLIST.iter().copied().find(|t| lowered.contains(t)) {
            return Some(AnomalySignal::Identity(token));
        }

        if self.suspicious_activity > self.config.burst_threshold {
            return Some(AnomalySignal::RapidFire(self.suspicious_activity));
        }

        if let Some(probe) = &self.probe {
            if !probe.has_expected_capabilities() {
                return Some(AnomalySignal::MissingCapabilities);
            }
        }

        None
    }

    /// Current rapid-fire counter.
    pub fn suspicious_activity(&self) -> u32 {
        self.suspicious_activity
    }

    /// Zero the rapid-fire counter.
    pub fn reset(&mut self) {
        self.suspicious_activity = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()
    }

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(AnomalyConfig::default(), None)
    }

    struct NoScreen;

    impl HostProbe for NoScreen {
        fn has_expected_capabilities(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_browser_identity_passes() {
        let mut d = detector();
        assert!(!d.is_suspicious(BROWSER, start()));
    }

    #[test]
    fn test_denylisted_identities() {
        for identity in [
            "Googlebot/2.1",
            "curl/8.5.0",
            "Wget/1.21",
            "python-requests/2.31",
            "HeadlessChrome/120",
        ] {
            let mut d = detector();
            assert!(d.is_suspicious(identity, start()), "{identity}");
        }
    }

    #[test]
    fn test_identity_match_is_per_call() {
        let mut d = detector();
        let t = start();
        assert!(d.is_suspicious("some-crawler", t));
        assert!(!d.is_suspicious(BROWSER, t + Duration::seconds(1)));
        assert_eq!(d.suspicious_activity(), 0);
    }

    #[test]
    fn test_burst_flags_sixth_rapid_call() {
        let mut d = detector();
        let mut t = start();
        assert!(!d.is_suspicious(BROWSER, t));

        for n in 1..=5 {
            t = t + Duration::milliseconds(50);
            assert!(!d.is_suspicious(BROWSER, t), "rapid call {n}");
        }
        t = t + Duration::milliseconds(50);
        assert!(d.is_suspicious(BROWSER, t));
        assert_eq!(d.suspicious_activity(), 6);
    }

    #[test]
    fn test_counter_decays_one_step_per_call() {
        let mut d = detector();
        let mut t = start();
        d.is_suspicious(BROWSER, t);
        for _ in 0..7 {
            t = t + Duration::milliseconds(10);
            d.is_suspicious(BROWSER, t);
        }
        assert_eq!(d.suspicious_activity(), 7);

        // A normal-paced call decays to 6, still above the threshold.
        t = t + Duration::milliseconds(150);
        assert!(d.is_suspicious(BROWSER, t));
        assert_eq!(d.suspicious_activity(), 6);

        t = t + Duration::seconds(1);
        assert!(!d.is_suspicious(BROWSER, t));
        assert_eq!(d.suspicious_activity(), 5);

        // One more rapid call re-flags immediately.
        t = t + Duration::milliseconds(20);
        assert!(d.is_suspicious(BROWSER, t));
    }

    #[test]
    fn test_one_slow_call_clears_a_six_call_burst() {
        let mut d = detector();
        let mut t = start();
        d.is_suspicious(BROWSER, t);
        for _ in 0..6 {
            t = t + Duration::milliseconds(50);
            d.is_suspicious(BROWSER, t);
        }
        assert_eq!(d.suspicious_activity(), 6);

        // Decay is one step per slow call, so 6 drops to the threshold itself.
        t = t + Duration::milliseconds(200);
        assert!(!d.is_suspicious(BROWSER, t));
        assert_eq!(d.suspicious_activity(), 5);
    }

    #[test]
    fn test_gap_of_exactly_min_interval_is_not_rapid() {
        let mut d = detector();
        let t = start();
        d.is_suspicious(BROWSER, t);
        d.is_suspicious(BROWSER, t + Duration::milliseconds(100));
        assert_eq!(d.suspicious_activity(), 0);
    }

    #[test]
    fn test_timing_updated_even_when_identity_flags() {
        let mut d = detector();
        let t = start();
        d.is_suspicious("curl/8", t);
        d.is_suspicious(BROWSER, t + Duration::milliseconds(10));
        assert_eq!(d.suspicious_activity(), 1);
    }

    #[test]
    fn test_reset_zeroes_counter() {
        let mut d = detector();
        let mut t = start();
        for _ in 0..8 {
            d.is_suspicious(BROWSER, t);
            t = t + Duration::milliseconds(1);
        }
        assert!(d.suspicious_activity() > 5);
        d.reset();
        assert_eq!(d.suspicious_activity(), 0);
    }

    #[test]
    fn test_host_probe_signal() {
        let mut d = AnomalyDetector::new(AnomalyConfig::default(), Some(Arc::new(NoScreen)));
        assert_eq!(
            d.inspect(BROWSER, start()),
            Some(AnomalySignal::MissingCapabilities)
        );
    }

    #[test]
    fn test_signal_reports_token() {
        let mut d = detector();
        assert_eq!(
            d.inspect("Mozilla/5.0 (compatible; bingbot/2.0)", start()),
            Some(AnomalySignal::Identity("bot"))
        );
    }
}
