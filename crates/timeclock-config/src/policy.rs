//! Validated policy structures

use crate::schema::{RawConfig, RawServiceConfig, RawSessionConfig};
use std::path::PathBuf;
use std::time::Duration;
use timeclock_util::data_dir_without_env;

/// Cooldown after a completed cycle when none is configured
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(120);

/// Extra time an idle session is kept after its cooldown ends
pub const DEFAULT_EVICTION_GRACE: Duration = Duration::from_secs(600);

/// Interval between idle-session sweeps
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Validated policy ready for use by the coordinator and the service
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub service: ServiceConfig,
    pub session: SessionPolicy,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            session: SessionPolicy::from_raw(raw.session),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(data_dir_without_env),
            log_file: raw.log_file,
            log_level: raw
                .log_level
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_raw(RawServiceConfig::default())
    }
}

/// Panel lifecycle policy enforced by the session coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Minimum wait between a clock-out and the next cycle start
    pub cooldown: Duration,

    /// Idle sessions are evicted once `cooldown + eviction_grace` has
    /// passed since their last clock-out
    pub eviction_grace: Duration,

    /// How often the service sweeps for evictable sessions
    pub eviction_interval: Duration,
}

impl SessionPolicy {
    fn from_raw(raw: RawSessionConfig) -> Self {
        Self {
            cooldown: raw
                .cooldown_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_COOLDOWN),
            eviction_grace: raw
                .eviction_grace_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_EVICTION_GRACE),
            eviction_interval: raw
                .eviction_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_EVICTION_INTERVAL),
        }
    }

    /// Policy with the given cooldown and default eviction timing
    pub fn with_cooldown(cooldown: Duration) -> Self {
        Self {
            cooldown,
            ..Self::default()
        }
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            eviction_grace: DEFAULT_EVICTION_GRACE,
            eviction_interval: DEFAULT_EVICTION_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = Policy::default();
        assert_eq!(policy.session.cooldown, Duration::from_secs(120));
        assert_eq!(policy.session.eviction_grace, Duration::from_secs(600));
        assert_eq!(policy.service.log_level, "info");
        assert!(policy.service.log_file.is_none());
    }

    #[test]
    fn test_partial_session_overrides() {
        let session = SessionPolicy::from_raw(RawSessionConfig {
            cooldown_seconds: Some(5),
            ..Default::default()
        });
        assert_eq!(session.cooldown, Duration::from_secs(5));
        assert_eq!(session.eviction_interval, DEFAULT_EVICTION_INTERVAL);
    }

    #[test]
    fn test_log_level_normalized() {
        let service = ServiceConfig::from_raw(RawServiceConfig {
            log_level: Some("DEBUG".into()),
            ..Default::default()
        });
        assert_eq!(service.log_level, "debug");
    }
}
