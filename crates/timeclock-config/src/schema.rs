//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Process-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Panel and cooldown settings
    #[serde(default)]
    pub session: RawSessionConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the event database
    pub data_dir: Option<PathBuf>,

    /// Append logs to this file in addition to stderr
    pub log_file: Option<PathBuf>,

    /// Default log filter: "trace", "debug", "info", "warn" or "error"
    pub log_level: Option<String>,
}

/// Session coordinator settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessionConfig {
    /// Wait after a clock-out before a new cycle may start
    pub cooldown_seconds: Option<u64>,

    /// How long an idle session is kept after its cooldown ends
    pub eviction_grace_seconds: Option<u64>,

    /// How often idle sessions are swept
    pub eviction_interval_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_session_section() {
        let toml_str = r#"
            config_version = 1

            [session]
            cooldown_seconds = 300
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.session.cooldown_seconds, Some(300));
        assert!(config.session.eviction_grace_seconds.is_none());
        assert!(config.service.data_dir.is_none());
    }
}
