//! Configuration validation

use crate::schema::RawConfig;
use thiserror::Error;

/// Longest cooldown accepted (one day)
pub const MAX_COOLDOWN_SECONDS: u64 = 86_400;

/// Accepted `log_level` values
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("Unknown log level '{0}' (expected one of trace, debug, info, warn, error)")]
    UnknownLogLevel(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(level) = &config.service.log_level
        && !LOG_LEVELS.contains(&level.to_lowercase().as_str())
    {
        errors.push(ValidationError::UnknownLogLevel(level.clone()));
    }

    let session = &config.session;

    if let Some(cooldown) = session.cooldown_seconds
        && cooldown > MAX_COOLDOWN_SECONDS
    {
        errors.push(ValidationError::InvalidValue {
            field: "session.cooldown_seconds",
            message: format!("{cooldown} exceeds the maximum of {MAX_COOLDOWN_SECONDS}"),
        });
    }

    if session.eviction_interval_seconds == Some(0) {
        errors.push(ValidationError::InvalidValue {
            field: "session.eviction_interval_seconds",
            message: "must be greater than zero".into(),
        });
    }

    errors
}
