//! Renewal, grace resolution, and expiry.
//!
//! One entry point, [`SubscriptionLifecycleManager::renew`], serves every
//! billing-date event: trial conversion, period renewal, grace retries,
//! finalizing scheduled cancellations, and expiring lapsed grace windows.
//! The sweeper calls it for each due subscription and inspects the
//! returned [`RenewalOutcome`].

use tracing::{info, warn};

use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::subscription::{
    schedule, Subscription, SubscriptionError, SubscriptionEvent, SubscriptionStatus,
};
use crate::ports::{ChargeRequest, StoreError};

use super::manager::{renewal_key, SubscriptionLifecycleManager};

/// What one renewal attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The charge cleared (or the tier is free) and the next period began.
    Renewed,

    /// The billing date has not arrived; nothing changed.
    NotDue,

    /// A scheduled cancellation ended the subscription at the boundary.
    CancellationFinalized,

    /// The charge failed and the subscription entered its grace window.
    EnteredGrace,

    /// A grace retry failed; the window is still open.
    StillInGrace,

    /// A trial conversion failed or a grace window lapsed.
    Expired,
}

impl SubscriptionLifecycleManager {
    /// Attempts the billing-date event a subscription is due for.
    ///
    /// The charge is collected for the tier the customer will hold during
    /// the new period, so a pending downgrade takes effect before pricing.
    /// The schedule always advances from the previous billing date, never
    /// from `now`, and the call is a [`RenewalOutcome::NotDue`] no-op when
    /// nothing is due yet.
    pub async fn renew(
        &self,
        id: SubscriptionId,
        now: Timestamp,
    ) -> Result<RenewalOutcome, SubscriptionError> {
        let _guard = self.locks().acquire(id).await;

        let mut attempt: u32 = 1;
        loop {
            // Re-dispatched from a fresh read after every version conflict.
            let current = self.store().load(id).await?;

            if current.is_terminal() {
                return Ok(RenewalOutcome::NotDue);
            }

            // A lapsed grace window expires instead of charging again.
            if current.is_due_for_grace_expiry(now) {
                self.expire_under_lock(id, now).await?;
                return Ok(RenewalOutcome::Expired);
            }

            if !current.is_due_for_renewal(now) {
                return Ok(RenewalOutcome::NotDue);
            }

            // A scheduled cancellation finalizes at the boundary, unpaid.
            if current.cancel_at_period_end {
                return self.finalize_cancellation_under_lock(id, now).await;
            }

            // 1. Apply a scheduled downgrade before pricing.
            let mut updated = current.clone();
            updated.apply_pending_downgrade();

            // 2. Collect the new period's price. Free tiers renew without
            //    a gateway round trip.
            let amount = updated.current_price();
            if amount.is_positive() {
                let Some(payment_method) = updated.payment_method.clone() else {
                    return self
                        .fail_renewal(&current, "no payment method on file".to_string(), now)
                        .await;
                };
                let charge = self
                    .collect_charge(ChargeRequest {
                        payment_method,
                        amount,
                        idempotency_key: renewal_key(id, updated.next_billing_date),
                        description: format!(
                            "TrustRail {} {} renewal",
                            updated.tier, updated.billing_cycle
                        ),
                    })
                    .await;
                match charge {
                    Ok(_receipt) => {}
                    Err(
                        err @ (SubscriptionError::PaymentFailed { .. }
                        | SubscriptionError::PaymentUnavailable { .. }),
                    ) => {
                        return self.fail_renewal(&current, err.to_string(), now).await;
                    }
                    Err(err) => return Err(err),
                }
            }

            // 3. Advance the period and commit.
            updated.renewed()?;
            match self.store().save(&updated, current.version).await {
                Ok(version) => {
                    updated.version = version;
                    info!(
                        subscription_id = %updated.id,
                        company_id = %updated.company_id,
                        tier = %updated.tier,
                        amount = %amount,
                        next_billing_date = %updated.next_billing_date,
                        "subscription renewed"
                    );
                    self.publish(SubscriptionEvent::RenewalSucceeded {
                        subscription_id: updated.id,
                        company_id: updated.company_id,
                        tier: updated.tier,
                        amount,
                        next_billing_date: updated.next_billing_date,
                        occurred_at: now,
                    })
                    .await;
                    return Ok(RenewalOutcome::Renewed);
                }
                Err(StoreError::VersionConflict {
                    expected, actual, ..
                }) if attempt < self.config().max_version_retries => {
                    warn!(
                        subscription_id = %id,
                        attempt,
                        expected,
                        actual,
                        "version conflict during renewal, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Expires a subscription whose grace window has lapsed, or a trial
    /// that can no longer convert. Entitlements fall back to the free
    /// baseline.
    pub async fn expire(
        &self,
        id: SubscriptionId,
        now: Timestamp,
    ) -> Result<Subscription, SubscriptionError> {
        let _guard = self.locks().acquire(id).await;
        self.expire_under_lock(id, now).await
    }

    async fn expire_under_lock(
        &self,
        id: SubscriptionId,
        now: Timestamp,
    ) -> Result<Subscription, SubscriptionError> {
        let expired = self.mutate_with_retry(id, |sub| sub.expire(now)).await?;

        info!(
            subscription_id = %expired.id,
            company_id = %expired.company_id,
            "subscription expired"
        );
        self.publish(SubscriptionEvent::Expired {
            subscription_id: expired.id,
            company_id: expired.company_id,
            occurred_at: now,
        })
        .await;

        Ok(expired)
    }

    async fn finalize_cancellation_under_lock(
        &self,
        id: SubscriptionId,
        now: Timestamp,
    ) -> Result<RenewalOutcome, SubscriptionError> {
        let finalized = self
            .mutate_with_retry(id, |sub| sub.finalize_cancellation())
            .await?;

        info!(
            subscription_id = %finalized.id,
            company_id = %finalized.company_id,
            "scheduled cancellation finalized"
        );
        self.publish(SubscriptionEvent::Cancelled {
            subscription_id: finalized.id,
            company_id: finalized.company_id,
            reason: finalized
                .cancellation_reason
                .clone()
                .unwrap_or_else(|| "cancelled at period end".to_string()),
            occurred_at: now,
        })
        .await;

        Ok(RenewalOutcome::CancellationFinalized)
    }

    /// The charge could not be collected. Trials expire on the spot;
    /// active subscriptions get a grace window; grace subscriptions keep
    /// waiting until their window closes.
    async fn fail_renewal(
        &self,
        current: &Subscription,
        reason: String,
        now: Timestamp,
    ) -> Result<RenewalOutcome, SubscriptionError> {
        warn!(
            subscription_id = %current.id,
            company_id = %current.company_id,
            status = ?current.status,
            reason = %reason,
            "renewal charge failed"
        );
        self.publish(SubscriptionEvent::RenewalFailed {
            subscription_id: current.id,
            company_id: current.company_id,
            reason,
            occurred_at: now,
        })
        .await;

        match current.status {
            // Trials have no grace period.
            SubscriptionStatus::Trial => {
                self.expire_under_lock(current.id, now).await?;
                Ok(RenewalOutcome::Expired)
            }
            SubscriptionStatus::Active => {
                let grace_ends_at = schedule::grace_end(now, self.config().grace_window_days);
                let graced = self
                    .mutate_with_retry(current.id, |sub| sub.enter_grace(grace_ends_at))
                    .await?;

                self.publish(SubscriptionEvent::EnteredGracePeriod {
                    subscription_id: graced.id,
                    company_id: graced.company_id,
                    grace_ends_at,
                    occurred_at: now,
                })
                .await;
                Ok(RenewalOutcome::EnteredGrace)
            }
            SubscriptionStatus::GracePeriod => Ok(RenewalOutcome::StillInGrace),
            // Unreachable behind the due checks, but harmless.
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired => {
                Ok(RenewalOutcome::NotDue)
            }
        }
    }
}
