//! Billing policy configuration

use serde::Deserialize;

use super::error::ConfigValidationError;

/// Billing policy configuration (trials, grace, write retries)
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Trial length for Basic signups, in days (0 disables the trial)
    #[serde(default = "default_trial_days_basic")]
    pub trial_days_basic: u32,

    /// Trial length for Premium signups, in days (0 disables the trial)
    #[serde(default = "default_trial_days_premium")]
    pub trial_days_premium: u32,

    /// Trial length for Enterprise signups, in days (0 disables the trial)
    #[serde(default = "default_trial_days_enterprise")]
    pub trial_days_enterprise: u32,

    /// How long a subscription keeps access after a failed renewal, in days
    #[serde(default = "default_grace_window_days")]
    pub grace_window_days: u32,

    /// How many times a write is retried after a version conflict
    #[serde(default = "default_max_version_retries")]
    pub max_version_retries: u32,
}

impl BillingConfig {
    /// Validate billing configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let trials = [
            self.trial_days_basic,
            self.trial_days_premium,
            self.trial_days_enterprise,
        ];
        if trials.iter().any(|days| *days > 365) {
            return Err(ConfigValidationError::InvalidTrialLength);
        }
        if self.grace_window_days == 0 || self.grace_window_days > 90 {
            return Err(ConfigValidationError::InvalidGraceWindow);
        }
        if self.max_version_retries == 0 || self.max_version_retries > 10 {
            return Err(ConfigValidationError::InvalidVersionRetries);
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            trial_days_basic: default_trial_days_basic(),
            trial_days_premium: default_trial_days_premium(),
            trial_days_enterprise: default_trial_days_enterprise(),
            grace_window_days: default_grace_window_days(),
            max_version_retries: default_max_version_retries(),
        }
    }
}

fn default_trial_days_basic() -> u32 {
    14
}

fn default_trial_days_premium() -> u32 {
    14
}

fn default_trial_days_enterprise() -> u32 {
    30
}

fn default_grace_window_days() -> u32 {
    7
}

fn default_max_version_retries() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_billing_defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.trial_days_basic, 14);
        assert_eq!(config.trial_days_premium, 14);
        assert_eq!(config.trial_days_enterprise, 30);
        assert_eq!(config.grace_window_days, 7);
        assert_eq!(config.max_version_retries, 3);
    }

    #[test]
    fn test_disabled_trials_are_valid() {
        let config = BillingConfig {
            trial_days_basic: 0,
            trial_days_premium: 0,
            trial_days_enterprise: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_trial_too_long() {
        let config = BillingConfig {
            trial_days_premium: 366,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_grace_window() {
        let config = BillingConfig {
            grace_window_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BillingConfig {
            grace_window_days: 91,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_version_retries() {
        let config = BillingConfig {
            max_version_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
