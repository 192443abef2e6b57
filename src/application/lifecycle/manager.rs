//! Subscription lifecycle engine.
//!
//! Coordinates the aggregate, the payment gateway, and the store for every
//! company-initiated operation: signup, upgrade, downgrade, cancellation,
//! and usage consumption. Renewal and expiry sweeps live in
//! [`renewal`](super::renewal).
//!
//! # Design Decisions
//!
//! - **Charge before commit**: money moves only while the aggregate copy
//!   being built is still private. If the charge fails, the stored state
//!   never changes; if the save conflicts, the retry reuses the same
//!   idempotency key and the gateway replays the receipt instead of
//!   charging twice.
//! - **Facts follow durability**: notifications go out after `save`
//!   succeeds, and a delivery failure is logged, never propagated.
//! - **Only retryable failures retry**: version conflicts restart the
//!   operation from a fresh read; retryable gateway errors re-charge with
//!   linear backoff. Everything else surfaces to the caller unchanged.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::domain::foundation::{
    CompanyId, Money, PaymentMethodRef, SubscriptionId, Timestamp, ValidationError,
};
use crate::domain::subscription::proration::prorated_adjustment;
use crate::domain::subscription::{
    BillingCycle, EntitlementCatalog, Feature, PlanTier, Subscription, SubscriptionError,
    SubscriptionEvent, SubscriptionStatus, UsageStatus,
};
use crate::ports::{
    ChargeReceipt, ChargeRequest, PaymentGateway, StoreError, SubscriptionNotifier,
    SubscriptionStore,
};

use super::locks::SubscriptionLocks;

/// Tunable policy for the lifecycle engine.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Trial length per tier. Tiers absent from the map start active.
    pub trial_days: BTreeMap<PlanTier, u32>,

    /// Days a failed renewal may be retried before the subscription expires.
    pub grace_window_days: u32,

    /// Attempts per operation when optimistic saves conflict.
    pub max_version_retries: u32,

    /// Upper bound on a single gateway call.
    pub charge_timeout: Duration,

    /// Attempts per charge when the gateway fails retryably.
    pub charge_retry_attempts: u32,

    /// Base delay between charge attempts, multiplied by the attempt number.
    pub charge_retry_backoff: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            trial_days: BTreeMap::from([
                (PlanTier::Basic, 14),
                (PlanTier::Premium, 14),
                (PlanTier::Enterprise, 30),
            ]),
            grace_window_days: 7,
            max_version_retries: 3,
            charge_timeout: Duration::from_secs(30),
            charge_retry_attempts: 2,
            charge_retry_backoff: Duration::from_millis(250),
        }
    }
}

impl LifecycleConfig {
    /// Sets the trial length for one tier.
    pub fn with_trial_days(mut self, tier: PlanTier, days: u32) -> Self {
        self.trial_days.insert(tier, days);
        self
    }

    /// Removes all trials, so every paid signup charges immediately.
    pub fn without_trials(mut self) -> Self {
        self.trial_days.clear();
        self
    }

    pub fn with_grace_window_days(mut self, days: u32) -> Self {
        self.grace_window_days = days;
        self
    }

    pub fn with_max_version_retries(mut self, retries: u32) -> Self {
        self.max_version_retries = retries;
        self
    }

    pub fn with_charge_timeout(mut self, timeout: Duration) -> Self {
        self.charge_timeout = timeout;
        self
    }

    pub fn with_charge_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.charge_retry_attempts = attempts;
        self.charge_retry_backoff = backoff;
        self
    }

    /// Trial length for `tier`, zero when the tier has no trial.
    pub fn trial_days_for(&self, tier: PlanTier) -> u32 {
        self.trial_days.get(&tier).copied().unwrap_or(0)
    }
}

/// Command to open a subscription for a company.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionRequest {
    pub company_id: CompanyId,
    pub tier: PlanTier,
    pub billing_cycle: BillingCycle,
    pub payment_method: Option<PaymentMethodRef>,
}

/// The lifecycle engine. One instance serves all subscriptions.
pub struct SubscriptionLifecycleManager {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn SubscriptionNotifier>,
    locks: SubscriptionLocks,
    config: LifecycleConfig,
}

impl SubscriptionLifecycleManager {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn SubscriptionNotifier>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            locks: SubscriptionLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Opens a subscription, in trial when the tier grants one.
    ///
    /// Paid tiers without a trial collect the first period up front;
    /// nothing is stored if that charge fails.
    pub async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
        now: Timestamp,
    ) -> Result<Subscription, SubscriptionError> {
        // 1. One live subscription per company.
        if let Some(existing) = self
            .store
            .find_non_terminal_by_company(request.company_id)
            .await?
        {
            return Err(SubscriptionError::already_subscribed(
                request.company_id,
                existing.id,
            ));
        }

        // 2. Build the aggregate.
        let mut subscription = Subscription::create(
            request.company_id,
            request.tier,
            request.billing_cycle,
            request.payment_method,
            self.config.trial_days_for(request.tier),
            now,
        );

        // 3. A directly active paid plan collects its first period before
        //    anything becomes visible.
        let price = subscription.current_price();
        if subscription.status == SubscriptionStatus::Active && price.is_positive() {
            let Some(payment_method) = subscription.payment_method.clone() else {
                return Err(ValidationError::empty_field("payment_method").into());
            };
            self.collect_charge(ChargeRequest {
                payment_method,
                amount: price,
                idempotency_key: creation_key(subscription.id),
                description: format!(
                    "TrustRail {} {} subscription",
                    subscription.tier, subscription.billing_cycle
                ),
            })
            .await?;
        }

        // 4. Persist, then announce.
        subscription.version = self.store.save(&subscription, 0).await?;

        info!(
            subscription_id = %subscription.id,
            company_id = %subscription.company_id,
            tier = %subscription.tier,
            status = ?subscription.status,
            "subscription created"
        );
        self.publish(SubscriptionEvent::Created {
            subscription_id: subscription.id,
            company_id: subscription.company_id,
            tier: subscription.tier,
            billing_cycle: subscription.billing_cycle,
            status: subscription.status,
            occurred_at: now,
        })
        .await;

        Ok(subscription)
    }

    /// Moves a subscription to a higher tier immediately, charging the
    /// prorated difference for the rest of the current period.
    ///
    /// Trials upgrade without charge; the conversion at trial end collects
    /// the new tier's full price.
    pub async fn upgrade(
        &self,
        id: SubscriptionId,
        new_tier: PlanTier,
        now: Timestamp,
    ) -> Result<Subscription, SubscriptionError> {
        let _guard = self.locks.acquire(id).await;

        let mut attempt: u32 = 1;
        let (saved, from_tier, charged) = loop {
            // 1. Fresh read; version conflicts restart from here.
            let current = self.store.load(id).await?;

            // 2. Validate and apply on a private copy.
            let mut updated = current.clone();
            updated.upgrade_to(new_tier)?;

            // 3. Price the remainder of the period. A trial has no paid
            //    period to adjust.
            let adjustment = if current.status == SubscriptionStatus::Trial {
                Money::zero(current.current_price().currency())
            } else {
                prorated_adjustment(
                    current.current_price(),
                    EntitlementCatalog::price(new_tier, current.billing_cycle),
                    current.current_period_days(),
                    current.days_remaining(now),
                )?
            };

            // 4. Collect before committing the new entitlements.
            let charged = if adjustment.is_positive() {
                let Some(payment_method) = current.payment_method.clone() else {
                    return Err(ValidationError::empty_field("payment_method").into());
                };
                Some(
                    self.collect_charge(ChargeRequest {
                        payment_method,
                        amount: adjustment,
                        idempotency_key: upgrade_key(
                            id,
                            new_tier,
                            current.current_period_started_at,
                        ),
                        description: format!("TrustRail {} upgrade", new_tier),
                    })
                    .await?,
                )
            } else {
                None
            };

            // 5. Commit optimistically.
            match self.store.save(&updated, current.version).await {
                Ok(version) => {
                    updated.version = version;
                    break (updated, current.tier, charged);
                }
                Err(StoreError::VersionConflict {
                    expected, actual, ..
                }) if attempt < self.config.max_version_retries => {
                    warn!(
                        subscription_id = %id,
                        attempt,
                        expected,
                        actual,
                        "version conflict during upgrade, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        let prorated_charge = charged.map_or_else(
            || Money::zero(saved.current_price().currency()),
            |receipt| receipt.amount,
        );
        info!(
            subscription_id = %saved.id,
            company_id = %saved.company_id,
            from_tier = %from_tier,
            to_tier = %new_tier,
            charged = %prorated_charge,
            "subscription upgraded"
        );
        self.publish(SubscriptionEvent::UpgradeCompleted {
            subscription_id: saved.id,
            company_id: saved.company_id,
            from_tier,
            to_tier: new_tier,
            prorated_charge,
            occurred_at: now,
        })
        .await;

        Ok(saved)
    }

    /// Records a downgrade to take effect at the next renewal. The current
    /// tier stays in force for the period already paid.
    pub async fn schedule_downgrade(
        &self,
        id: SubscriptionId,
        new_tier: PlanTier,
        now: Timestamp,
    ) -> Result<Subscription, SubscriptionError> {
        let _guard = self.locks.acquire(id).await;
        let saved = self
            .mutate_with_retry(id, |sub| sub.schedule_downgrade(new_tier))
            .await?;

        info!(
            subscription_id = %saved.id,
            company_id = %saved.company_id,
            from_tier = %saved.tier,
            to_tier = %new_tier,
            "downgrade scheduled"
        );
        self.publish(SubscriptionEvent::DowngradeScheduled {
            subscription_id: saved.id,
            company_id: saved.company_id,
            from_tier: saved.tier,
            to_tier: new_tier,
            effective_at: saved.next_billing_date,
            occurred_at: now,
        })
        .await;

        Ok(saved)
    }

    /// Cancels a subscription, immediately or at the period boundary.
    ///
    /// A scheduled cancellation keeps access until the boundary and is
    /// finalized by the renewal sweep without a further charge.
    pub async fn cancel(
        &self,
        id: SubscriptionId,
        reason: impl Into<String>,
        immediately: bool,
        now: Timestamp,
    ) -> Result<Subscription, SubscriptionError> {
        let reason = reason.into();
        let _guard = self.locks.acquire(id).await;
        let saved = self
            .mutate_with_retry(id, |sub| sub.cancel(reason.clone(), immediately, now))
            .await?;

        info!(
            subscription_id = %saved.id,
            company_id = %saved.company_id,
            immediately,
            reason = %reason,
            "cancellation recorded"
        );
        let event = if immediately {
            SubscriptionEvent::Cancelled {
                subscription_id: saved.id,
                company_id: saved.company_id,
                reason,
                occurred_at: now,
            }
        } else {
            SubscriptionEvent::CancellationScheduled {
                subscription_id: saved.id,
                company_id: saved.company_id,
                reason,
                effective_at: saved.next_billing_date,
                occurred_at: now,
            }
        };
        self.publish(event).await;

        Ok(saved)
    }

    /// Consumes metered usage, persisting the new counter atomically with
    /// the quota check. Returns the headroom left after consumption.
    pub async fn consume_usage(
        &self,
        id: SubscriptionId,
        feature: Feature,
        amount: u64,
    ) -> Result<UsageStatus, SubscriptionError> {
        let _guard = self.locks.acquire(id).await;
        let saved = self
            .mutate_with_retry(id, |sub| sub.consume(feature, amount))
            .await?;
        Ok(saved.usage_status(feature))
    }

    /// Current state of a subscription.
    pub async fn get_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Subscription, SubscriptionError> {
        Ok(self.store.load(id).await?)
    }

    // ========================================================================
    // Internals, shared with the renewal sweep
    // ========================================================================

    pub(super) fn store(&self) -> &Arc<dyn SubscriptionStore> {
        &self.store
    }

    pub(super) fn locks(&self) -> &SubscriptionLocks {
        &self.locks
    }

    /// Loads, applies, and saves under optimistic locking, restarting from
    /// a fresh read when another writer got there first.
    pub(super) async fn mutate_with_retry<F>(
        &self,
        id: SubscriptionId,
        apply: F,
    ) -> Result<Subscription, SubscriptionError>
    where
        F: Fn(&mut Subscription) -> Result<(), SubscriptionError>,
    {
        let mut attempt: u32 = 1;
        loop {
            let mut subscription = self.store.load(id).await?;
            let loaded_version = subscription.version;
            apply(&mut subscription)?;

            match self.store.save(&subscription, loaded_version).await {
                Ok(version) => {
                    subscription.version = version;
                    return Ok(subscription);
                }
                Err(StoreError::VersionConflict {
                    expected, actual, ..
                }) if attempt < self.config.max_version_retries => {
                    warn!(
                        subscription_id = %id,
                        attempt,
                        expected,
                        actual,
                        "version conflict, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Runs one charge to completion: bounded by the configured timeout,
    /// retried with linear backoff while the failure is retryable.
    pub(super) async fn collect_charge(
        &self,
        request: ChargeRequest,
    ) -> Result<ChargeReceipt, SubscriptionError> {
        let mut attempt: u32 = 1;
        loop {
            let charge = self.gateway.charge(request.clone());
            let error: SubscriptionError = match timeout(self.config.charge_timeout, charge).await {
                Ok(Ok(receipt)) => return Ok(receipt),
                Ok(Err(payment_error)) => payment_error.into(),
                Err(_elapsed) => SubscriptionError::payment_unavailable(format!(
                    "charge timed out after {}ms",
                    self.config.charge_timeout.as_millis()
                )),
            };

            if !error.is_retryable() || attempt >= self.config.charge_retry_attempts {
                return Err(error);
            }
            warn!(
                idempotency_key = %request.idempotency_key,
                attempt,
                error = %error,
                "charge attempt failed, retrying"
            );
            sleep(self.config.charge_retry_backoff * attempt).await;
            attempt += 1;
        }
    }

    /// Hands a fact to the notifier. Delivery failures are logged and
    /// never affect the operation that produced the fact.
    pub(super) async fn publish(&self, event: SubscriptionEvent) {
        if let Err(err) = self.notifier.notify(&event).await {
            warn!(
                event_type = event.event_type(),
                subscription_id = %event.subscription_id(),
                error = %err,
                "notification delivery failed"
            );
        }
    }
}

/// Deduplication key for a signup's first charge.
fn creation_key(id: SubscriptionId) -> String {
    format!("create:{id}")
}

/// Deduplication key for an upgrade charge, scoped to the billing period
/// it adjusts so a retried upgrade cannot double-collect.
fn upgrade_key(id: SubscriptionId, to_tier: PlanTier, period_started_at: Timestamp) -> String {
    format!(
        "upgrade:{id}:{to_tier}:{}",
        period_started_at.as_datetime().date_naive()
    )
}

/// Deduplication key for a renewal charge, scoped to the billing date.
pub(super) fn renewal_key(id: SubscriptionId, next_billing_date: Timestamp) -> String {
    format!(
        "renewal:{id}:{}",
        next_billing_date.as_datetime().date_naive()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemorySubscriptionStore, MockPaymentGateway, RecordingNotifier};
    use crate::ports::PaymentError;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    // ════════════════════════════════════════════════════════════════════════════
    // Test Rig
    // ════════════════════════════════════════════════════════════════════════════

    struct Rig {
        manager: SubscriptionLifecycleManager,
        store: InMemorySubscriptionStore,
        gateway: MockPaymentGateway,
        notifier: RecordingNotifier,
    }

    fn rig_with(config: LifecycleConfig) -> Rig {
        let store = InMemorySubscriptionStore::new();
        let gateway = MockPaymentGateway::new();
        let notifier = RecordingNotifier::new();
        let manager = SubscriptionLifecycleManager::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            Arc::new(notifier.clone()),
            config,
        );
        Rig {
            manager,
            store,
            gateway,
            notifier,
        }
    }

    fn rig() -> Rig {
        rig_with(LifecycleConfig::default())
    }

    /// Rig whose paid signups activate and charge immediately.
    fn rig_without_trials() -> Rig {
        rig_with(LifecycleConfig::default().without_trials())
    }

    fn ts(year: i32, month: u32, day: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap())
    }

    fn request(tier: PlanTier) -> CreateSubscriptionRequest {
        CreateSubscriptionRequest {
            company_id: CompanyId::new(),
            tier,
            billing_cycle: BillingCycle::Monthly,
            payment_method: Some(PaymentMethodRef::new("pm_tok_visa").unwrap()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Creation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn trial_creation_skips_the_gateway() {
        let rig = rig();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Trial);
        assert_eq!(sub.trial_ends_at, Some(ts(2024, 6, 15)));
        assert_eq!(sub.version, 1);
        assert_eq!(rig.gateway.request_count(), 0);
        assert_eq!(rig.notifier.delivered_types(), vec!["subscription.created"]);
    }

    #[tokio::test]
    async fn direct_creation_charges_the_first_period() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        let requests = rig.gateway.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].amount.amount(), dec!(10.00));
        assert_eq!(requests[0].idempotency_key, format!("create:{}", sub.id));
    }

    #[tokio::test]
    async fn free_tier_creation_never_charges() {
        let rig = rig_without_trials();
        let mut req = request(PlanTier::Free);
        req.payment_method = None;

        let sub = rig
            .manager
            .create_subscription(req, ts(2024, 6, 1))
            .await
            .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(rig.gateway.request_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_company_subscriptions_are_rejected() {
        let rig = rig();
        let req = request(PlanTier::Basic);
        let first = rig
            .manager
            .create_subscription(req.clone(), ts(2024, 6, 1))
            .await
            .unwrap();

        let err = rig
            .manager
            .create_subscription(req, ts(2024, 6, 2))
            .await
            .unwrap_err();

        match err {
            SubscriptionError::AlreadySubscribed { existing, .. } => {
                assert_eq!(existing, first.id);
            }
            other => panic!("expected AlreadySubscribed, got {:?}", other),
        }
        assert_eq!(rig.store.count(), 1);
    }

    #[tokio::test]
    async fn direct_paid_creation_requires_a_payment_method() {
        let rig = rig_without_trials();
        let mut req = request(PlanTier::Basic);
        req.payment_method = None;

        let err = rig
            .manager
            .create_subscription(req, ts(2024, 6, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::Validation(_)));
        assert_eq!(rig.store.count(), 0);
        assert_eq!(rig.gateway.request_count(), 0);
    }

    #[tokio::test]
    async fn declined_creation_charge_saves_nothing() {
        let rig = rig_without_trials();
        rig.gateway
            .fail_always(PaymentError::card_declined("card was declined"));

        let err = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::PaymentFailed { .. }));
        assert_eq!(rig.store.count(), 0);
        assert!(rig.notifier.delivered().is_empty());
    }

    #[tokio::test]
    async fn notifier_failures_never_fail_the_operation() {
        let rig = rig();
        rig.notifier.set_failing(true);

        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        assert!(rig.notifier.delivered().is_empty());
        let stored = rig.store.load(sub.id).await.unwrap();
        assert_eq!(stored.version, 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Upgrades
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn upgrade_charges_the_prorated_difference() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        // Halfway through a 30-day period: (30 - 10) * 15/30 = 10.00.
        let upgraded = rig
            .manager
            .upgrade(sub.id, PlanTier::Premium, ts(2024, 6, 16))
            .await
            .unwrap();

        assert_eq!(upgraded.tier, PlanTier::Premium);
        assert_eq!(upgraded.version, 2);

        let requests = rig.gateway.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].amount.amount(), dec!(10.00));
        assert_eq!(
            requests[1].idempotency_key,
            format!("upgrade:{}:Premium:2024-06-01", sub.id)
        );

        let delivered = rig.notifier.delivered();
        match delivered.last().unwrap() {
            SubscriptionEvent::UpgradeCompleted {
                from_tier,
                to_tier,
                prorated_charge,
                ..
            } => {
                assert_eq!(*from_tier, PlanTier::Basic);
                assert_eq!(*to_tier, PlanTier::Premium);
                assert_eq!(prorated_charge.amount(), dec!(10.00));
            }
            other => panic!("expected UpgradeCompleted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn trial_upgrades_are_free_until_conversion() {
        let rig = rig();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        let upgraded = rig
            .manager
            .upgrade(sub.id, PlanTier::Premium, ts(2024, 6, 5))
            .await
            .unwrap();

        assert_eq!(upgraded.status, SubscriptionStatus::Trial);
        assert_eq!(upgraded.tier, PlanTier::Premium);
        assert_eq!(rig.gateway.request_count(), 0);

        match rig.notifier.delivered().last().unwrap() {
            SubscriptionEvent::UpgradeCompleted {
                prorated_charge, ..
            } => assert!(prorated_charge.is_zero()),
            other => panic!("expected UpgradeCompleted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn upgrade_rejects_lower_or_equal_tiers() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Premium), ts(2024, 6, 1))
            .await
            .unwrap();

        let err = rig
            .manager
            .upgrade(sub.id, PlanTier::Basic, ts(2024, 6, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::InvalidTierChange { .. }));

        let stored = rig.store.load(sub.id).await.unwrap();
        assert_eq!(stored.tier, PlanTier::Premium);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn declined_upgrade_leaves_the_subscription_untouched() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();
        rig.gateway
            .fail_always(PaymentError::card_declined("card was declined"));

        let err = rig
            .manager
            .upgrade(sub.id, PlanTier::Premium, ts(2024, 6, 16))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::PaymentFailed { .. }));

        let stored = rig.store.load(sub.id).await.unwrap();
        assert_eq!(stored.tier, PlanTier::Basic);
        assert_eq!(stored.version, 1);
        assert_eq!(rig.notifier.delivered_types(), vec!["subscription.created"]);
    }

    #[tokio::test]
    async fn upgrade_retries_after_a_version_conflict() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        rig.store.fail_next_save(StoreError::VersionConflict {
            subscription_id: sub.id,
            expected: 1,
            actual: 2,
        });

        let upgraded = rig
            .manager
            .upgrade(sub.id, PlanTier::Premium, ts(2024, 6, 16))
            .await
            .unwrap();

        assert_eq!(upgraded.tier, PlanTier::Premium);
        assert_eq!(upgraded.version, 2);
        // The retried charge reused its idempotency key: two upgrade calls
        // reached the gateway, one charge was collected.
        assert_eq!(rig.gateway.request_count(), 3);
        assert_eq!(rig.gateway.collected_count(), 2);
    }

    #[tokio::test]
    async fn version_conflicts_exhaust_into_an_error() {
        let rig = rig_with(
            LifecycleConfig::default()
                .without_trials()
                .with_max_version_retries(1),
        );
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        rig.store.fail_next_save(StoreError::VersionConflict {
            subscription_id: sub.id,
            expected: 1,
            actual: 2,
        });

        let err = rig
            .manager
            .upgrade(sub.id, PlanTier::Premium, ts(2024, 6, 16))
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::VersionConflict { .. }));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Charge timeout and retry policy
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test(start_paused = true)]
    async fn charge_timeouts_surface_as_payment_unavailable() {
        let rig = rig_with(
            LifecycleConfig::default()
                .without_trials()
                .with_charge_timeout(Duration::from_millis(50))
                .with_charge_retries(1, Duration::from_millis(10)),
        );
        rig.gateway.set_delay(Duration::from_millis(200));

        let err = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::PaymentUnavailable { .. }));
        assert!(err.is_retryable());
        assert_eq!(rig.store.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_gateway_errors_are_retried_with_backoff() {
        let rig = rig_without_trials();
        rig.gateway
            .push_error(PaymentError::rate_limited("too many requests"));

        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(rig.gateway.request_count(), 2);
        assert_eq!(rig.gateway.collected_count(), 1);
    }

    #[tokio::test]
    async fn non_retryable_declines_fail_on_the_first_attempt() {
        let rig = rig_without_trials();
        rig.gateway
            .push_error(PaymentError::insufficient_funds("insufficient funds"));

        let err = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::PaymentFailed { .. }));
        assert_eq!(rig.gateway.request_count(), 1);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Downgrade and cancellation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn scheduled_downgrade_emits_its_fact() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Premium), ts(2024, 6, 1))
            .await
            .unwrap();

        let saved = rig
            .manager
            .schedule_downgrade(sub.id, PlanTier::Basic, ts(2024, 6, 10))
            .await
            .unwrap();

        assert_eq!(saved.tier, PlanTier::Premium);
        assert_eq!(saved.pending_tier_change, Some(PlanTier::Basic));

        match rig.notifier.delivered().last().unwrap() {
            SubscriptionEvent::DowngradeScheduled {
                from_tier,
                to_tier,
                effective_at,
                ..
            } => {
                assert_eq!(*from_tier, PlanTier::Premium);
                assert_eq!(*to_tier, PlanTier::Basic);
                assert_eq!(*effective_at, ts(2024, 7, 1));
            }
            other => panic!("expected DowngradeScheduled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn immediate_cancellation_is_terminal_and_announced() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        let saved = rig
            .manager
            .cancel(sub.id, "too expensive", true, ts(2024, 6, 10))
            .await
            .unwrap();

        assert_eq!(saved.status, SubscriptionStatus::Cancelled);
        assert_eq!(saved.ended_at, Some(ts(2024, 6, 10)));
        assert_eq!(
            rig.notifier.delivered_types(),
            vec!["subscription.created", "subscription.cancelled"]
        );
    }

    #[tokio::test]
    async fn scheduled_cancellation_keeps_access_until_the_boundary() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        let saved = rig
            .manager
            .cancel(sub.id, "switching providers", false, ts(2024, 6, 10))
            .await
            .unwrap();

        assert_eq!(saved.status, SubscriptionStatus::Active);
        assert!(saved.cancel_at_period_end);
        assert!(saved.has_access());

        match rig.notifier.delivered().last().unwrap() {
            SubscriptionEvent::CancellationScheduled { effective_at, .. } => {
                assert_eq!(*effective_at, ts(2024, 7, 1));
            }
            other => panic!("expected CancellationScheduled, got {:?}", other),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Usage
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn consume_usage_persists_and_reports_headroom() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        let status = rig
            .manager
            .consume_usage(sub.id, Feature::ReviewResponses, 85)
            .await
            .unwrap();
        assert_eq!(status, UsageStatus::NearLimit { percent: 85 });

        let stored = rig.store.load(sub.id).await.unwrap();
        assert_eq!(stored.usage.used(Feature::ReviewResponses), 85);
    }

    #[tokio::test]
    async fn consume_rejections_change_nothing() {
        let rig = rig_without_trials();
        let sub = rig
            .manager
            .create_subscription(request(PlanTier::Basic), ts(2024, 6, 1))
            .await
            .unwrap();

        let status = rig
            .manager
            .consume_usage(sub.id, Feature::ReviewResponses, 100)
            .await
            .unwrap();
        assert_eq!(status, UsageStatus::AtLimit);

        let err = rig
            .manager
            .consume_usage(sub.id, Feature::ReviewResponses, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::QuotaExceeded { .. }));

        let stored = rig.store.load(sub.id).await.unwrap();
        assert_eq!(stored.usage.used(Feature::ReviewResponses), 100);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn get_subscription_maps_missing_ids_to_not_found() {
        let rig = rig();
        let err = rig
            .manager
            .get_subscription(SubscriptionId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::NotFound { .. }));
    }
}
