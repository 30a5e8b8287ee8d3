//! Verseguard configuration.

use crate::GuardError;
use std::time::Duration;

/// Request quotas for the three nested windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    /// Maximum admitted calls within any trailing 60 seconds.
    pub per_minute: u64,

    /// Maximum admitted calls within any trailing hour.
    pub per_hour: u64,

    /// Maximum admitted calls per daily period (reset 24h after the last reset).
    pub per_day: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1000,
            per_day: 5000,
        }
    }
}

/// Tuning for the rapid-fire request heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalyConfig {
    /// Calls arriving closer together than this count as rapid-fire.
    pub min_interval: Duration,

    /// The caller is flagged once the rapid-fire counter exceeds this.
    pub burst_threshold: u32,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
            burst_threshold: 5,
        }
    }
}

/// Configuration for the API guard.
///
/// The defaults encode the upstream API's terms of use. Hosts normally
/// override only `identity` and `storage_namespace`.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Identity string of the calling agent (a user-agent, in browser terms).
    pub identity: String,

    /// Namespace for persisted state under the platform data directory.
    /// Each host application should use its own namespace.
    pub storage_namespace: String,

    /// Per-minute, per-hour and per-day request quotas.
    pub quota: QuotaLimits,

    /// Absolute cap on consecutive verses in a single reference.
    pub max_consecutive_verses: u32,

    /// Maximum number of cached results.
    pub max_cache_entries: usize,

    /// Age after which the whole cache is considered stale and cleared.
    pub cache_max_age: Duration,

    /// Interval of the background pruning pass.
    pub maintenance_interval: Duration,

    /// Bot heuristic tuning.
    pub anomaly: AnomalyConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            identity: concat!("verseguard/", env!("CARGO_PKG_VERSION")).to_string(),
            storage_namespace: "verseguard".to_string(),
            quota: QuotaLimits::default(),
            max_consecutive_verses: 500,
            max_cache_entries: 500,
            cache_max_age: Duration::from_secs(30 * 24 * 60 * 60),
            maintenance_interval: Duration::from_secs(5 * 60),
            anomaly: AnomalyConfig::default(),
        }
    }
}

impl GuardConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), GuardError> {
        if self.storage_namespace.trim().is_empty() {
            return Err(GuardError::ConfigError(
                "storage_namespace cannot be empty".to_string(),
            ));
        }

        let QuotaLimits {
            per_minute,
            per_hour,
            per_day,
        } = self.quota;
        if per_minute == 0 || per_hour == 0 || per_day == 0 {
            return Err(GuardError::ConfigError(
                "quota limits must be non-zero".to_string(),
            ));
        }
        if per_minute > per_hour || per_hour > per_day {
            return Err(GuardError::ConfigError(format!(
                "quota limits must not shrink as windows grow, got {}/min {}/hour {}/day",
                per_minute, per_hour, per_day
            )));
        }

        if self.max_consecutive_verses == 0 {
            return Err(GuardError::ConfigError(
                "max_consecutive_verses must be non-zero".to_string(),
            ));
        }
        if self.max_cache_entries == 0 {
            return Err(GuardError::ConfigError(
                "max_cache_entries must be non-zero".to_string(),
            ));
        }
        if self.maintenance_interval.is_zero() {
            return Err(GuardError::ConfigError(
                "maintenance_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GuardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quota.per_minute, 60);
        assert_eq!(config.quota.per_hour, 1000);
        assert_eq!(config.quota.per_day, 5000);
        assert_eq!(config.max_cache_entries, 500);
    }

    #[test]
    fn empty_namespace_rejected() {
        let config = GuardConfig {
            storage_namespace: "  ".to_string(),
            ..GuardConfig::default()
        };
        assert!(matches!(config.validate(), Err(GuardError::ConfigError(_))));
    }

    #[test]
    fn zero_quota_rejected() {
        let mut config = GuardConfig::default();
        config.quota.per_hour = 0;
        assert!(matches!(config.validate(), Err(GuardError::ConfigError(_))));
    }

    #[test]
    fn shrinking_windows_rejected() {
        let mut config = GuardConfig::default();
        config.quota.per_minute = 2000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("2000/min"));
    }

    #[test]
    fn zero_cache_rejected() {
        let config = GuardConfig {
            max_cache_entries: 0,
            ..GuardConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
