//! Per-period usage metering.
//!
//! A [`UsageMeter`] tracks consumed units for each metered feature of the
//! current plan. Checks and increments happen in one call so a rejected
//! consumption never moves a counter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::errors::SubscriptionError;
use super::Feature;

/// Counter state for one metered feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureUsage {
    /// Per-period quota. `None` means unlimited.
    pub limit: Option<u64>,

    /// Units consumed in the current period.
    pub used: u64,
}

/// Counters at or above this share of their quota report `NearLimit`.
const NEAR_LIMIT_PERCENT: u64 = 80;

/// How much quota headroom a feature has left.
///
/// A read model for callers deciding whether to warn the company or block
/// the action outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UsageStatus {
    /// Comfortably inside the quota, or no quota at all.
    UnderLimit,

    /// Inside the warning band just below the quota.
    NearLimit { percent: u8 },

    /// The quota is exhausted.
    AtLimit,
}

impl UsageStatus {
    /// Classifies one counter against its own quota.
    pub fn of(meter: &FeatureUsage) -> Self {
        let Some(limit) = meter.limit else {
            return Self::UnderLimit;
        };
        if meter.used >= limit {
            return Self::AtLimit;
        }
        // used < limit here, so the share is always below 100.
        let percent = meter.used * 100 / limit;
        if percent >= NEAR_LIMIT_PERCENT {
            Self::NearLimit {
                percent: percent as u8,
            }
        } else {
            Self::UnderLimit
        }
    }
}

/// Usage counters for every metered feature of the active plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UsageMeter {
    meters: BTreeMap<Feature, FeatureUsage>,
}

impl UsageMeter {
    /// Builds a meter from a plan's quota table, all counters at zero.
    pub fn from_limits(limits: &BTreeMap<Feature, Option<u64>>) -> Self {
        let meters = limits
            .iter()
            .map(|(feature, limit)| {
                (
                    *feature,
                    FeatureUsage {
                        limit: *limit,
                        used: 0,
                    },
                )
            })
            .collect();
        Self { meters }
    }

    /// Consumes `amount` units of `feature`, or rejects without changing
    /// any counter.
    ///
    /// Features the plan does not meter are rejected with a zero limit.
    /// Unlimited meters always accept and still count.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriptionError::QuotaExceeded`] when the consumption
    /// would push the counter past its quota.
    pub fn consume(&mut self, feature: Feature, amount: u64) -> Result<(), SubscriptionError> {
        let Some(meter) = self.meters.get_mut(&feature) else {
            return Err(SubscriptionError::quota_exceeded(feature, 0, 0, amount));
        };
        match meter.limit {
            Some(limit) => {
                let after = meter.used.saturating_add(amount);
                if after > limit {
                    return Err(SubscriptionError::quota_exceeded(
                        feature, limit, meter.used, amount,
                    ));
                }
                meter.used = after;
            }
            None => {
                meter.used = meter.used.saturating_add(amount);
            }
        }
        Ok(())
    }

    /// Zeroes all counters, keeping the quota table.
    pub fn reset(&mut self) {
        for meter in self.meters.values_mut() {
            meter.used = 0;
        }
    }

    /// Swaps in a new quota table, carrying over consumed units for
    /// features metered by both tables. Features the new table drops lose
    /// their counters; new ones start at zero.
    pub fn replace_limits(&mut self, limits: &BTreeMap<Feature, Option<u64>>) {
        let mut meters = BTreeMap::new();
        for (feature, limit) in limits {
            let used = self.meters.get(feature).map_or(0, |m| m.used);
            meters.insert(
                *feature,
                FeatureUsage {
                    limit: *limit,
                    used,
                },
            );
        }
        self.meters = meters;
    }

    /// First meter whose consumed units would not fit under `limits`, as
    /// `(feature, limit, used)`. A feature with usage that `limits` does
    /// not meter at all counts as a zero-limit violation.
    pub fn violation_against(
        &self,
        limits: &BTreeMap<Feature, Option<u64>>,
    ) -> Option<(Feature, u64, u64)> {
        for (feature, meter) in &self.meters {
            if meter.used == 0 {
                continue;
            }
            match limits.get(feature) {
                Some(Some(limit)) if meter.used > *limit => {
                    return Some((*feature, *limit, meter.used));
                }
                Some(_) => {}
                None => return Some((*feature, 0, meter.used)),
            }
        }
        None
    }

    /// Counter state for one feature, if the plan meters it.
    pub fn meter(&self, feature: Feature) -> Option<&FeatureUsage> {
        self.meters.get(&feature)
    }

    /// Units consumed for `feature`, zero if unmetered.
    pub fn used(&self, feature: Feature) -> u64 {
        self.meters.get(&feature).map_or(0, |m| m.used)
    }

    /// Iterates all meters in feature order.
    pub fn iter(&self) -> impl Iterator<Item = (&Feature, &FeatureUsage)> {
        self.meters.iter()
    }
}
