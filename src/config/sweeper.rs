//! Renewal sweeper configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ConfigValidationError;

/// Background sweeper configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SweeperConfig {
    /// Seconds between sweep passes
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Maximum subscriptions per pass per sweep
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

impl SweeperConfig {
    /// Sweep interval as a [`Duration`]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate sweeper configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.sweep_interval_secs == 0 || self.sweep_interval_secs > 86_400 {
            return Err(ConfigValidationError::InvalidSweepInterval);
        }
        if self.batch_size == 0 || self.batch_size > 10_000 {
            return Err(ConfigValidationError::InvalidBatchSize);
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_sweep_interval_secs() -> u64 {
    3600
}

fn default_batch_size() -> u32 {
    100
}
