//! Configuration validation

use crate::RawConfig;

/// A single validation problem; all problems are reported at once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a raw config for problems, returning every error found.
pub fn validate_config(raw: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if raw.gateway.guild_id.trim().is_empty() {
        errors.push(ValidationError::new("gateway.guild_id", "must not be empty"));
    }

    if raw.gateway.token_env.trim().is_empty() {
        errors.push(ValidationError::new("gateway.token_env", "must not be empty"));
    }

    if !raw.gateway.api_base.starts_with("http://") && !raw.gateway.api_base.starts_with("https://")
    {
        errors.push(ValidationError::new(
            "gateway.api_base",
            "must be an http(s) URL",
        ));
    }

    if raw.gateway.request_timeout_seconds == 0 {
        errors.push(ValidationError::new(
            "gateway.request_timeout_seconds",
            "must be at least 1",
        ));
    }

    if raw.engine.reconcile_interval_seconds < 10 {
        errors.push(ValidationError::new(
            "engine.reconcile_interval_seconds",
            "must be at least 10",
        ));
    }

    if raw.engine.retry_attempts == 0 {
        errors.push(ValidationError::new(
            "engine.retry_attempts",
            "must be at least 1",
        ));
    }

    errors
}
