//! In-memory subscription store.
//!
//! The reference store for single-process deployments and tests. Version
//! checks happen under one write lock, so racing writers observe the same
//! optimistic-locking behavior a database-backed store would give them.
//! Supports error injection for exercising failure paths.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::domain::foundation::{CompanyId, SubscriptionId, Timestamp};
use crate::domain::subscription::Subscription;
use crate::ports::{StoreError, SubscriptionStore};

/// Internal mutable state.
#[derive(Default)]
struct StoreState {
    subscriptions: HashMap<SubscriptionId, Subscription>,

    /// Error to return on the next `save` call.
    next_save_error: Option<StoreError>,
}

/// Thread-safe in-memory implementation of [`SubscriptionStore`].
#[derive(Clone, Default)]
pub struct InMemorySubscriptionStore {
    inner: Arc<RwLock<StoreState>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored subscriptions, terminal ones included.
    pub fn count(&self) -> usize {
        self.inner.read().unwrap().subscriptions.len()
    }

    /// Inject an error to return from the next `save` call.
    pub fn fail_next_save(&self, error: StoreError) {
        self.inner.write().unwrap().next_save_error = Some(error);
    }
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn load(&self, id: SubscriptionId) -> Result<Subscription, StoreError> {
        self.inner
            .read()
            .unwrap()
            .subscriptions
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                subscription_id: id,
            })
    }

    async fn save(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut state = self.inner.write().unwrap();
        if let Some(err) = state.next_save_error.take() {
            return Err(err);
        }

        let actual = state
            .subscriptions
            .get(&subscription.id)
            .map_or(0, |stored| stored.version);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                subscription_id: subscription.id,
                expected: expected_version,
                actual,
            });
        }

        let mut stored = subscription.clone();
        stored.version = expected_version + 1;
        state.subscriptions.insert(subscription.id, stored);
        Ok(expected_version + 1)
    }

    async fn find_non_terminal_by_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<Subscription>, StoreError> {
        let state = self.inner.read().unwrap();
        Ok(state
            .subscriptions
            .values()
            .find(|sub| sub.company_id == company_id && !sub.is_terminal())
            .cloned())
    }

    async fn find_due_for_renewal(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<SubscriptionId>, StoreError> {
        let state = self.inner.read().unwrap();
        let mut due: Vec<&Subscription> = state
            .subscriptions
            .values()
            .filter(|sub| sub.is_due_for_renewal(now))
            .collect();
        due.sort_by_key(|sub| sub.next_billing_date);
        due.truncate(limit as usize);
        Ok(due.into_iter().map(|sub| sub.id).collect())
    }

    async fn find_due_for_grace_expiry(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<SubscriptionId>, StoreError> {
        let state = self.inner.read().unwrap();
        let mut due: Vec<&Subscription> = state
            .subscriptions
            .values()
            .filter(|sub| sub.is_due_for_grace_expiry(now))
            .collect();
        due.sort_by_key(|sub| sub.grace_ends_at);
        due.truncate(limit as usize);
        Ok(due.into_iter().map(|sub| sub.id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PaymentMethodRef;
    use crate::domain::subscription::{BillingCycle, PlanTier};
    use chrono::{TimeZone, Utc};

    fn ts(year: i32, month: u32, day: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap())
    }

    fn new_sub(now: Timestamp) -> Subscription {
        Subscription::create(
            CompanyId::new(),
            PlanTier::Basic,
            BillingCycle::Monthly,
            Some(PaymentMethodRef::new("pm_tok_test").unwrap()),
            0,
            now,
        )
    }

    #[tokio::test]
    async fn save_assigns_versions_and_load_round_trips() {
        let store = InMemorySubscriptionStore::new();
        let mut sub = new_sub(ts(2024, 6, 1));

        let v1 = store.save(&sub, 0).await.unwrap();
        assert_eq!(v1, 1);

        sub.version = v1;
        let v2 = store.save(&sub, v1).await.unwrap();
        assert_eq!(v2, 2);

        let loaded = store.load(sub.id).await.unwrap();
        assert_eq!(loaded.version, 2);
        assert_eq!(loaded.company_id, sub.company_id);
    }

    #[tokio::test]
    async fn stale_versions_are_rejected() {
        let store = InMemorySubscriptionStore::new();
        let sub = new_sub(ts(2024, 6, 1));
        store.save(&sub, 0).await.unwrap();

        let err = store.save(&sub, 0).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::VersionConflict {
                subscription_id: sub.id,
                expected: 0,
                actual: 1,
            }
        );
    }

    #[tokio::test]
    async fn loading_missing_subscriptions_reports_not_found() {
        let store = InMemorySubscriptionStore::new();
        let id = SubscriptionId::new();
        let err = store.load(id).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::NotFound {
                subscription_id: id
            }
        );
    }

    #[tokio::test]
    async fn company_lookup_skips_terminal_subscriptions() {
        let store = InMemorySubscriptionStore::new();
        let now = ts(2024, 6, 1);
        let mut sub = new_sub(now);
        let company = sub.company_id;
        sub.cancel("done", true, now).unwrap();
        store.save(&sub, 0).await.unwrap();

        assert!(store
            .find_non_terminal_by_company(company)
            .await
            .unwrap()
            .is_none());

        let live = Subscription::create(
            company,
            PlanTier::Premium,
            BillingCycle::Monthly,
            None,
            14,
            now,
        );
        store.save(&live, 0).await.unwrap();

        let found = store
            .find_non_terminal_by_company(company)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, live.id);
    }

    #[tokio::test]
    async fn renewal_query_orders_by_billing_date_and_respects_limit() {
        let store = InMemorySubscriptionStore::new();
        let early = new_sub(ts(2024, 5, 1));
        let late = new_sub(ts(2024, 5, 20));
        let not_due = new_sub(ts(2024, 6, 10));
        for sub in [&early, &late, &not_due] {
            store.save(sub, 0).await.unwrap();
        }

        let due = store
            .find_due_for_renewal(ts(2024, 6, 25), 10)
            .await
            .unwrap();
        assert_eq!(due, vec![early.id, late.id]);

        let capped = store
            .find_due_for_renewal(ts(2024, 6, 25), 1)
            .await
            .unwrap();
        assert_eq!(capped, vec![early.id]);
    }

    #[tokio::test]
    async fn grace_expiry_query_finds_closed_windows_only() {
        let store = InMemorySubscriptionStore::new();
        let now = ts(2024, 6, 1);

        let mut expired_window = new_sub(now);
        expired_window.enter_grace(ts(2024, 7, 5)).unwrap();
        store.save(&expired_window, 0).await.unwrap();

        let mut open_window = new_sub(now);
        open_window.enter_grace(ts(2024, 7, 20)).unwrap();
        store.save(&open_window, 0).await.unwrap();

        let due = store
            .find_due_for_grace_expiry(ts(2024, 7, 10), 10)
            .await
            .unwrap();
        assert_eq!(due, vec![expired_window.id]);
    }

    #[tokio::test]
    async fn injected_save_errors_fire_once() {
        let store = InMemorySubscriptionStore::new();
        let sub = new_sub(ts(2024, 6, 1));

        store.fail_next_save(StoreError::Unavailable {
            reason: "disk full".to_string(),
        });

        assert!(matches!(
            store.save(&sub, 0).await,
            Err(StoreError::Unavailable { .. })
        ));
        assert_eq!(store.save(&sub, 0).await.unwrap(), 1);
    }
}
