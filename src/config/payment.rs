//! Payment configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ConfigValidationError;

/// Payment gateway call configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// How long to wait for the gateway before a charge counts as failed
    #[serde(default = "default_charge_timeout_secs")]
    pub charge_timeout_secs: u64,

    /// Total charge attempts per operation (first try included)
    #[serde(default = "default_charge_retry_attempts")]
    pub charge_retry_attempts: u32,

    /// Base backoff between charge attempts, in milliseconds
    #[serde(default = "default_charge_retry_backoff_ms")]
    pub charge_retry_backoff_ms: u64,
}

impl PaymentConfig {
    /// Gateway timeout as a [`Duration`]
    pub fn charge_timeout(&self) -> Duration {
        Duration::from_secs(self.charge_timeout_secs)
    }

    /// Base retry backoff as a [`Duration`]
    pub fn charge_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.charge_retry_backoff_ms)
    }

    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.charge_timeout_secs == 0 || self.charge_timeout_secs > 300 {
            return Err(ConfigValidationError::InvalidChargeTimeout);
        }
        if self.charge_retry_attempts == 0 || self.charge_retry_attempts > 10 {
            return Err(ConfigValidationError::InvalidChargeRetries);
        }
        if self.charge_retry_backoff_ms > 60_000 {
            return Err(ConfigValidationError::InvalidChargeBackoff);
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            charge_timeout_secs: default_charge_timeout_secs(),
            charge_retry_attempts: default_charge_retry_attempts(),
            charge_retry_backoff_ms: default_charge_retry_backoff_ms(),
        }
    }
}

fn default_charge_timeout_secs() -> u64 {
    30
}

fn default_charge_retry_attempts() -> u32 {
    2
}

fn default_charge_retry_backoff_ms() -> u64 {
    250
}
