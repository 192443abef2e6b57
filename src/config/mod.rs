//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment
//! variables using the `config` and `dotenvy` crates. Configuration is
//! loaded with the `TRUSTRAIL_` prefix and nested values use double
//! underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use trustrail_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Sweeping every {:?}", config.sweeper.sweep_interval());
//! ```

mod billing;
mod error;
mod payment;
mod sweeper;

pub use billing::BillingConfig;
pub use error::{ConfigError, ConfigValidationError};
pub use payment::PaymentConfig;
pub use sweeper::SweeperConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Contains all configuration sections for the TrustRail billing service.
/// Load using [`AppConfig::load()`] which reads from environment variables.
/// Every value has a default, so an empty environment yields a working
/// configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[serde(default)]
    pub log_json: bool,

    /// Billing policy (trial lengths, grace window, write retries)
    #[serde(default)]
    pub billing: BillingConfig,

    /// Payment gateway call behavior (timeout, retries, backoff)
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Background sweeper (interval, batch size)
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `TRUSTRAIL` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `TRUSTRAIL__BILLING__GRACE_WINDOW_DAYS=14` -> `billing.grace_window_days = 14`
    /// - `TRUSTRAIL__SWEEPER__BATCH_SIZE=500` -> `sweeper.batch_size = 500`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("TRUSTRAIL")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// Performs semantic validation of configuration: day ranges, retry
    /// counts, timeout bounds, and sweeper limits.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.billing.validate()?;
        self.payment.validate()?;
        self.sweeper.validate()?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            billing: BillingConfig::default(),
            payment: PaymentConfig::default(),
            sweeper: SweeperConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info,trustrail_billing=debug".to_string()
}
