//! Subscription aggregate.
//!
//! # Design Decisions
//!
//! - **Explicit clocks**: every time-dependent operation takes `now` as a
//!   parameter instead of reading the system clock, so schedules and
//!   expiries are reproducible in tests and replays.
//! - **Periods anchor on billing dates**: a renewal advances the schedule
//!   from the previous next billing date, never from the moment the sweep
//!   happened to run, so late processing cannot drift the calendar.
//! - **The aggregate never talks to money or storage**: charging and
//!   persistence belong to the application layer. Methods here only
//!   validate and apply state, which keeps the charge-then-commit
//!   ordering in one place.
//!
//! # Invariants
//!
//! - `status` only moves along the transitions `SubscriptionStatus` allows.
//! - Usage counters never exceed their quotas.
//! - `entitlements` and usage quotas always match the catalog entry for
//!   `tier`, except after expiry, when they fall back to the free
//!   baseline while `tier` keeps its historical value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::foundation::{
    CompanyId, Money, PaymentMethodRef, StateMachine, SubscriptionId, Timestamp,
};

use super::catalog::EntitlementCatalog;
use super::errors::SubscriptionError;
use super::proration::whole_days_between;
use super::schedule;
use super::usage::{UsageMeter, UsageStatus};
use super::{BillingCycle, Feature, PlanTier, SubscriptionStatus};

/// Statuses in which lifecycle operations may act on the subscription.
const LIVE_STATUSES: &[SubscriptionStatus] = &[
    SubscriptionStatus::Trial,
    SubscriptionStatus::Active,
    SubscriptionStatus::GracePeriod,
];

/// A company's plan membership and everything that hangs off it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub company_id: CompanyId,

    /// Current plan tier. Kept as a historical record after expiry even
    /// though entitlements fall back to the free baseline.
    pub tier: PlanTier,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,

    /// Gateway token for the stored payment method, if one is on file.
    pub payment_method: Option<PaymentMethodRef>,

    /// Features currently granted.
    pub entitlements: BTreeSet<Feature>,

    /// Per-period consumption counters for metered features.
    pub usage: UsageMeter,

    /// Downgrade target to apply at the next renewal.
    pub pending_tier_change: Option<PlanTier>,

    /// When set, the next renewal finalizes a cancellation instead of
    /// charging.
    pub cancel_at_period_end: bool,
    pub cancellation_reason: Option<String>,

    pub created_at: Timestamp,
    pub trial_ends_at: Option<Timestamp>,

    /// Start of the period currently being consumed.
    pub current_period_started_at: Timestamp,

    /// When the next renewal charge falls due. During a trial this is the
    /// trial end, where conversion happens.
    pub next_billing_date: Timestamp,

    pub grace_ends_at: Option<Timestamp>,

    /// When cancellation was requested, immediate or scheduled.
    pub cancelled_at: Option<Timestamp>,

    /// When the subscription stopped providing access.
    pub ended_at: Option<Timestamp>,

    /// Optimistic-locking revision. Zero until first saved.
    pub version: u64,
}

impl Subscription {
    /// Creates a subscription for `company_id` on `tier`.
    ///
    /// With `trial_days > 0` the subscription starts in trial and its
    /// first billing date is the trial end, where conversion happens.
    /// Otherwise it is active immediately and bills one cycle from `now`.
    pub fn create(
        company_id: CompanyId,
        tier: PlanTier,
        billing_cycle: BillingCycle,
        payment_method: Option<PaymentMethodRef>,
        trial_days: u32,
        now: Timestamp,
    ) -> Self {
        let plan = EntitlementCatalog::plan(tier);
        let (status, trial_ends_at, next_billing_date) = if trial_days > 0 {
            let trial_end = schedule::trial_end(now, trial_days);
            (SubscriptionStatus::Trial, Some(trial_end), trial_end)
        } else {
            (
                SubscriptionStatus::Active,
                None,
                schedule::next_billing_date(now, billing_cycle),
            )
        };

        Self {
            id: SubscriptionId::new(),
            company_id,
            tier,
            billing_cycle,
            status,
            payment_method,
            entitlements: plan.entitlements.clone(),
            usage: UsageMeter::from_limits(&plan.usage_limits),
            pending_tier_change: None,
            cancel_at_period_end: false,
            cancellation_reason: None,
            created_at: now,
            trial_ends_at,
            current_period_started_at: now,
            next_billing_date,
            grace_ends_at: None,
            cancelled_at: None,
            ended_at: None,
            version: 0,
        }
    }

    // ====================================================================
    // Queries
    // ====================================================================

    /// Whether the company can currently use its entitlements.
    pub fn has_access(&self) -> bool {
        self.status.has_access()
    }

    /// Whether the current plan grants `feature`.
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.entitlements.contains(&feature)
    }

    /// How close the company is to the quota for `feature`.
    ///
    /// Features the plan does not grant report [`UsageStatus::AtLimit`];
    /// granted features without a meter never approach one.
    pub fn usage_status(&self, feature: Feature) -> UsageStatus {
        if !self.has_feature(feature) {
            return UsageStatus::AtLimit;
        }
        match self.usage.meter(feature) {
            Some(meter) => UsageStatus::of(meter),
            None => UsageStatus::UnderLimit,
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Recurring price of the current tier and cycle.
    pub fn current_price(&self) -> Money {
        EntitlementCatalog::price(self.tier, self.billing_cycle)
    }

    /// Whole days until the next billing date, zero once it has passed.
    pub fn days_remaining(&self, now: Timestamp) -> u32 {
        whole_days_between(now, self.next_billing_date)
    }

    /// Calendar length of the period currently being consumed, in days.
    pub fn current_period_days(&self) -> u32 {
        whole_days_between(self.current_period_started_at, self.next_billing_date)
    }

    /// Whether a renewal attempt is due at `now`. Trials fall due at
    /// conversion, active subscriptions at their billing date, and grace
    /// subscriptions on every sweep until the window closes.
    pub fn is_due_for_renewal(&self, now: Timestamp) -> bool {
        match self.status {
            SubscriptionStatus::Trial | SubscriptionStatus::Active => {
                !now.is_before(&self.next_billing_date)
            }
            SubscriptionStatus::GracePeriod => self
                .grace_ends_at
                .map_or(false, |grace_end| now.is_before(&grace_end)),
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired => false,
        }
    }

    /// Whether the grace window has closed without a successful retry.
    pub fn is_due_for_grace_expiry(&self, now: Timestamp) -> bool {
        self.status == SubscriptionStatus::GracePeriod
            && self
                .grace_ends_at
                .map_or(false, |grace_end| !now.is_before(&grace_end))
    }

    // ====================================================================
    // Mutations
    // ====================================================================

    /// Consumes `amount` units of `feature`, rejecting atomically if the
    /// quota would be exceeded or the subscription no longer has access.
    pub fn consume(&mut self, feature: Feature, amount: u64) -> Result<(), SubscriptionError> {
        self.guard("consume usage on", LIVE_STATUSES)?;
        self.usage.consume(feature, amount)
    }

    /// Moves to a strictly higher tier, swapping in its entitlements and
    /// quotas while preserving consumed units. Any scheduled downgrade is
    /// discarded.
    ///
    /// The caller charges the prorated difference before applying this.
    pub fn upgrade_to(&mut self, new_tier: PlanTier) -> Result<(), SubscriptionError> {
        self.guard("upgrade", LIVE_STATUSES)?;
        if new_tier.rank() <= self.tier.rank() {
            return Err(SubscriptionError::invalid_tier_change(
                self.tier,
                new_tier,
                "upgrade target must be a higher tier",
            ));
        }

        let plan = EntitlementCatalog::plan(new_tier);
        if let Some((feature, limit, used)) = self.usage.violation_against(&plan.usage_limits) {
            return Err(SubscriptionError::quota_exceeded(feature, limit, used, 0));
        }

        self.tier = new_tier;
        self.entitlements = plan.entitlements.clone();
        self.usage.replace_limits(&plan.usage_limits);
        self.pending_tier_change = None;
        Ok(())
    }

    /// Schedules a move to a strictly lower tier at the next renewal.
    /// Until then the current plan stays fully in force. A second call
    /// overwrites the previously scheduled target.
    pub fn schedule_downgrade(&mut self, new_tier: PlanTier) -> Result<(), SubscriptionError> {
        self.guard("downgrade", LIVE_STATUSES)?;
        if new_tier.rank() >= self.tier.rank() {
            return Err(SubscriptionError::invalid_tier_change(
                self.tier,
                new_tier,
                "downgrade target must be a lower tier",
            ));
        }
        self.pending_tier_change = Some(new_tier);
        Ok(())
    }

    /// Applies a scheduled downgrade, if any. Called at renewal before
    /// the period price is determined.
    pub fn apply_pending_downgrade(&mut self) {
        if let Some(new_tier) = self.pending_tier_change.take() {
            let plan = EntitlementCatalog::plan(new_tier);
            self.tier = new_tier;
            self.entitlements = plan.entitlements.clone();
            self.usage.replace_limits(&plan.usage_limits);
        }
    }

    /// Records a cancellation request.
    ///
    /// Immediate cancellation terminates now. Otherwise access continues
    /// until the period boundary, where the next sweep finalizes it
    /// instead of charging. Repeating the request updates the reason.
    pub fn cancel(
        &mut self,
        reason: impl Into<String>,
        immediately: bool,
        now: Timestamp,
    ) -> Result<(), SubscriptionError> {
        self.guard("cancel", LIVE_STATUSES)?;
        self.cancellation_reason = Some(reason.into());
        self.cancelled_at = Some(now);
        if immediately {
            self.status = self.status.transition_to(SubscriptionStatus::Cancelled)?;
            self.cancel_at_period_end = false;
            self.ended_at = Some(now);
        } else {
            self.cancel_at_period_end = true;
        }
        Ok(())
    }

    /// Finalizes a scheduled cancellation at the period boundary.
    pub fn finalize_cancellation(&mut self) -> Result<(), SubscriptionError> {
        self.guard("finalize cancellation of", LIVE_STATUSES)?;
        let boundary = self.next_billing_date;
        self.status = self.status.transition_to(SubscriptionStatus::Cancelled)?;
        self.cancel_at_period_end = false;
        self.ended_at = Some(boundary);
        Ok(())
    }

    /// Starts the next period after a successful (or zero-amount) renewal
    /// charge: activates, resets counters, and advances the schedule one
    /// cycle from the previous billing date.
    pub fn renewed(&mut self) -> Result<(), SubscriptionError> {
        self.guard("renew", LIVE_STATUSES)?;
        if self.status != SubscriptionStatus::Active {
            self.status = self.status.transition_to(SubscriptionStatus::Active)?;
        }
        let previous = self.next_billing_date;
        self.current_period_started_at = previous;
        self.next_billing_date = schedule::next_billing_date(previous, self.billing_cycle);
        self.usage.reset();
        self.grace_ends_at = None;
        Ok(())
    }

    /// Enters the grace period after a failed renewal charge. The billing
    /// date stays put so the retry charges the same period.
    pub fn enter_grace(&mut self, grace_ends_at: Timestamp) -> Result<(), SubscriptionError> {
        self.guard("start a grace period for", &[SubscriptionStatus::Active])?;
        self.status = self
            .status
            .transition_to(SubscriptionStatus::GracePeriod)?;
        self.grace_ends_at = Some(grace_ends_at);
        Ok(())
    }

    /// Terminates the subscription, dropping entitlements to the free
    /// baseline. Reached from an unconverted trial or an exhausted grace
    /// period.
    pub fn expire(&mut self, now: Timestamp) -> Result<(), SubscriptionError> {
        self.guard(
            "expire",
            &[SubscriptionStatus::Trial, SubscriptionStatus::GracePeriod],
        )?;
        self.status = self.status.transition_to(SubscriptionStatus::Expired)?;
        let baseline = EntitlementCatalog::plan(PlanTier::Free);
        self.entitlements = baseline.entitlements.clone();
        self.usage.replace_limits(&baseline.usage_limits);
        self.pending_tier_change = None;
        self.cancel_at_period_end = false;
        self.ended_at = Some(now);
        Ok(())
    }

    fn guard(
        &self,
        operation: &str,
        allowed: &[SubscriptionStatus],
    ) -> Result<(), SubscriptionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(SubscriptionError::invalid_transition(
                self.status,
                operation,
                allowed.to_vec(),
            ))
        }
    }
}
