//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, probabilities in [0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::new("listener.host", "must not be empty"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if !LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "logging.level",
            format!("unknown level `{}`", config.logging.level),
        ));
    }

    let remote = &config.logging.remote;
    if remote.enabled {
        if reqwest::Url::parse(&remote.url).is_err() {
            errors.push(ValidationError::new(
                "logging.remote.url",
                format!("`{}` is not a valid URL", remote.url),
            ));
        }
        if remote.timeout_ms == 0 {
            errors.push(ValidationError::new("logging.remote.timeout_ms", "must be greater than 0"));
        }
        if remote.queue_capacity == 0 {
            errors.push(ValidationError::new("logging.remote.queue_capacity", "must be greater than 0"));
        }
    }

    let scheduler = &config.scheduler;
    if scheduler.interval_secs == 0 {
        errors.push(ValidationError::new("scheduler.interval_secs", "must be greater than 0"));
    }
    if !(0.0..=1.0).contains(&scheduler.failure_probability) {
        errors.push(ValidationError::new(
            "scheduler.failure_probability",
            "must be between 0 and 1",
        ));
    }
    if scheduler.tasks.is_empty() {
        errors.push(ValidationError::new("scheduler.tasks", "must name at least one task"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
