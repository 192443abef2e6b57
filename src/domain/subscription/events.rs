//! Facts emitted by lifecycle transitions.
//!
//! Every completed transition produces exactly one fact. Facts are handed
//! to the notifier after the new state is durably saved, so consumers may
//! treat them as confirmations, never as intents.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CompanyId, Money, SubscriptionId, Timestamp};

use super::{BillingCycle, PlanTier, SubscriptionStatus};

/// A state change that already happened to a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubscriptionEvent {
    /// A subscription came into existence, in trial or directly active.
    Created {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        tier: PlanTier,
        billing_cycle: BillingCycle,
        status: SubscriptionStatus,
        occurred_at: Timestamp,
    },

    /// An immediate tier upgrade completed, including its prorated charge.
    UpgradeCompleted {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        from_tier: PlanTier,
        to_tier: PlanTier,
        prorated_charge: Money,
        occurred_at: Timestamp,
    },

    /// A downgrade was recorded to take effect at the next renewal.
    DowngradeScheduled {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        from_tier: PlanTier,
        to_tier: PlanTier,
        effective_at: Timestamp,
        occurred_at: Timestamp,
    },

    /// A cancellation was recorded to finalize at the period boundary.
    CancellationScheduled {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        reason: String,
        effective_at: Timestamp,
        occurred_at: Timestamp,
    },

    /// A renewal charge cleared and the next period began.
    RenewalSucceeded {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        tier: PlanTier,
        amount: Money,
        next_billing_date: Timestamp,
        occurred_at: Timestamp,
    },

    /// A renewal charge was declined or errored.
    RenewalFailed {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        reason: String,
        occurred_at: Timestamp,
    },

    /// A failed renewal pushed the subscription into its grace period.
    EnteredGracePeriod {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        grace_ends_at: Timestamp,
        occurred_at: Timestamp,
    },

    /// The subscription reached its terminal cancelled state.
    Cancelled {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        reason: String,
        occurred_at: Timestamp,
    },

    /// The subscription expired and fell back to the free baseline.
    Expired {
        subscription_id: SubscriptionId,
        company_id: CompanyId,
        occurred_at: Timestamp,
    },
}

impl SubscriptionEvent {
    /// Stable routing key for logs and downstream consumers.
    pub fn event_type(&self) -> &'static str {
        match self {
            SubscriptionEvent::Created { .. } => "subscription.created",
            SubscriptionEvent::UpgradeCompleted { .. } => "subscription.upgrade_completed",
            SubscriptionEvent::DowngradeScheduled { .. } => "subscription.downgrade_scheduled",
            SubscriptionEvent::CancellationScheduled { .. } => {
                "subscription.cancellation_scheduled"
            }
            SubscriptionEvent::RenewalSucceeded { .. } => "subscription.renewal_succeeded",
            SubscriptionEvent::RenewalFailed { .. } => "subscription.renewal_failed",
            SubscriptionEvent::EnteredGracePeriod { .. } => "subscription.entered_grace_period",
            SubscriptionEvent::Cancelled { .. } => "subscription.cancelled",
            SubscriptionEvent::Expired { .. } => "subscription.expired",
        }
    }

    /// The subscription the fact belongs to.
    pub fn subscription_id(&self) -> SubscriptionId {
        match self {
            SubscriptionEvent::Created {
                subscription_id, ..
            }
            | SubscriptionEvent::UpgradeCompleted {
                subscription_id, ..
            }
            | SubscriptionEvent::DowngradeScheduled {
                subscription_id, ..
            }
            | SubscriptionEvent::CancellationScheduled {
                subscription_id, ..
            }
            | SubscriptionEvent::RenewalSucceeded {
                subscription_id, ..
            }
            | SubscriptionEvent::RenewalFailed {
                subscription_id, ..
            }
            | SubscriptionEvent::EnteredGracePeriod {
                subscription_id, ..
            }
            | SubscriptionEvent::Cancelled {
                subscription_id, ..
            }
            | SubscriptionEvent::Expired {
                subscription_id, ..
            } => *subscription_id,
        }
    }

    /// The company that owns the subscription.
    pub fn company_id(&self) -> CompanyId {
        match self {
            SubscriptionEvent::Created { company_id, .. }
            | SubscriptionEvent::UpgradeCompleted { company_id, .. }
            | SubscriptionEvent::DowngradeScheduled { company_id, .. }
            | SubscriptionEvent::CancellationScheduled { company_id, .. }
            | SubscriptionEvent::RenewalSucceeded { company_id, .. }
            | SubscriptionEvent::RenewalFailed { company_id, .. }
            | SubscriptionEvent::EnteredGracePeriod { company_id, .. }
            | SubscriptionEvent::Cancelled { company_id, .. }
            | SubscriptionEvent::Expired { company_id, .. } => *company_id,
        }
    }

    /// When the transition took effect.
    pub fn occurred_at(&self) -> Timestamp {
        match self {
            SubscriptionEvent::Created { occurred_at, .. }
            | SubscriptionEvent::UpgradeCompleted { occurred_at, .. }
            | SubscriptionEvent::DowngradeScheduled { occurred_at, .. }
            | SubscriptionEvent::CancellationScheduled { occurred_at, .. }
            | SubscriptionEvent::RenewalSucceeded { occurred_at, .. }
            | SubscriptionEvent::RenewalFailed { occurred_at, .. }
            | SubscriptionEvent::EnteredGracePeriod { occurred_at, .. }
            | SubscriptionEvent::Cancelled { occurred_at, .. }
            | SubscriptionEvent::Expired { occurred_at, .. } => *occurred_at,
        }
    }
}
