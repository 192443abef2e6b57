//! Plan tier and billing cycle definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription tier determining entitlements and price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Baseline tier every company falls back to after expiry.
    ///
    /// - Price: none
    /// - Access: claim profile, reply to a small number of reviews
    Free,

    /// Entry paid tier for small businesses.
    ///
    /// - Access: analytics, review widgets, invitation campaigns
    Basic,

    /// Growth tier with API access and branding control.
    Premium,

    /// Top tier for agencies and large accounts.
    Enterprise,
}

impl PlanTier {
    /// Returns true for tiers that carry a recurring charge.
    pub fn is_paid(&self) -> bool {
        !matches!(self, PlanTier::Free)
    }

    /// Human-readable tier name for notifications and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            PlanTier::Free => "Free",
            PlanTier::Basic => "Basic",
            PlanTier::Premium => "Premium",
            PlanTier::Enterprise => "Enterprise",
        }
    }

    /// Ordering rank used to distinguish upgrades from downgrades.
    pub fn rank(&self) -> u8 {
        match self {
            PlanTier::Free => 0,
            PlanTier::Basic => 1,
            PlanTier::Premium => 2,
            PlanTier::Enterprise => 3,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Recurrence period for billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    /// Renews on the same day-of-month each month.
    Monthly,

    /// Renews on the same date each year.
    Annual,
}

impl BillingCycle {
    /// Number of calendar months in one cycle.
    pub fn months(&self) -> u32 {
        match self {
            BillingCycle::Monthly => 1,
            BillingCycle::Annual => 12,
        }
    }

    /// Human-readable cycle name.
    pub fn display_name(&self) -> &'static str {
        match self {
            BillingCycle::Monthly => "Monthly",
            BillingCycle::Annual => "Annual",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
