//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool size > 0, backoff bounded, rates in [0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;

use crate::config::schema::RelayConfig;

/// Largest accepted `backoff.max_exponent`.
const MAX_EXPONENT_LIMIT: u32 = 30;

/// A single semantic violation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
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

pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoint.name.trim().is_empty() {
        errors.push(ValidationError::new("endpoint.name", "must not be empty"));
    }
    if config.pool.connection_count == 0 {
        errors.push(ValidationError::new("pool.connection_count", "must be at least 1"));
    }
    if config.backoff.max_exponent > MAX_EXPONENT_LIMIT {
        errors.push(ValidationError::new(
            "backoff.max_exponent",
            format!("must be at most {}", MAX_EXPONENT_LIMIT),
        ));
    }
    if config.backoff.cap_secs == 0 {
        errors.push(ValidationError::new("backoff.cap_secs", "must be at least 1"));
    }
    if config.backoff.max_jitter_ms == 0 {
        errors.push(ValidationError::new("backoff.max_jitter_ms", "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&config.simulation.failure_rate) {
        errors.push(ValidationError::new(
            "simulation.failure_rate",
            "must be between 0 and 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
