//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ConfigValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Trial length exceeds maximum allowed (365 days)")]
    InvalidTrialLength,

    #[error("Grace window must be between 1 and 90 days")]
    InvalidGraceWindow,

    #[error("Version-conflict retries must be between 1 and 10")]
    InvalidVersionRetries,

    #[error("Charge timeout must be between 1 and 300 seconds")]
    InvalidChargeTimeout,

    #[error("Charge retry attempts must be between 1 and 10")]
    InvalidChargeRetries,

    #[error("Charge retry backoff exceeds maximum allowed (60s)")]
    InvalidChargeBackoff,

    #[error("Sweep interval must be between 1 second and 24 hours")]
    InvalidSweepInterval,

    #[error("Sweeper batch size must be between 1 and 10000")]
    InvalidBatchSize,
}
