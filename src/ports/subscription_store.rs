//! Subscription store port - persistence with optimistic locking.
//!
//! Every save names the version the caller loaded. The store rejects the
//! write if someone else saved in between, and the application layer
//! re-reads and re-applies. This keeps the engine correct under
//! concurrent sweeps and user-initiated operations without holding locks
//! across I/O.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{CompanyId, SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError};

/// Why a store operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("subscription {subscription_id} not found")]
    NotFound { subscription_id: SubscriptionId },

    #[error(
        "version conflict on subscription {subscription_id}: expected {expected}, found {actual}"
    )]
    VersionConflict {
        subscription_id: SubscriptionId,
        expected: u64,
        actual: u64,
    },

    #[error("subscription store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl From<StoreError> for SubscriptionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { subscription_id } => {
                SubscriptionError::not_found(subscription_id)
            }
            StoreError::VersionConflict {
                subscription_id,
                expected,
                actual,
            } => SubscriptionError::version_conflict(subscription_id, expected, actual),
            StoreError::Unavailable { reason } => SubscriptionError::infrastructure(reason),
        }
    }
}

/// Port for subscription persistence.
///
/// Implementations must make `save` atomic with respect to the version
/// check: two writers racing on the same expected version must not both
/// succeed.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Loads a subscription by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no subscription exists under
    /// the id.
    async fn load(&self, id: SubscriptionId) -> Result<Subscription, StoreError>;

    /// Persists a subscription if `expected_version` still matches the
    /// stored one. A never-saved subscription carries version zero.
    ///
    /// Returns the newly stored version, `expected_version + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] when another writer saved
    /// first.
    async fn save(
        &self,
        subscription: &Subscription,
        expected_version: u64,
    ) -> Result<u64, StoreError>;

    /// The company's live subscription, if it has one. Cancelled and
    /// expired subscriptions do not count.
    async fn find_non_terminal_by_company(
        &self,
        company_id: CompanyId,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Subscriptions with a renewal attempt due at `now`: trials at their
    /// conversion date, active subscriptions past their billing date, and
    /// grace subscriptions still inside their window.
    ///
    /// Returns ids only; the caller re-loads under its own lock. At most
    /// `limit` results, oldest billing date first.
    async fn find_due_for_renewal(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<SubscriptionId>, StoreError>;

    /// Grace subscriptions whose window has closed by `now`, ready to
    /// expire. Returns at most `limit` ids.
    async fn find_due_for_grace_expiry(
        &self,
        now: Timestamp,
        limit: u32,
    ) -> Result<Vec<SubscriptionId>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn subscription_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SubscriptionStore) {}
    }

    #[test]
    fn version_conflict_converts_to_the_domain_error() {
        let id = SubscriptionId::new();
        let err: SubscriptionError = StoreError::VersionConflict {
            subscription_id: id,
            expected: 2,
            actual: 3,
        }
        .into();

        assert!(matches!(
            err,
            SubscriptionError::VersionConflict {
                expected: 2,
                actual: 3,
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[test]
    fn unavailable_converts_to_infrastructure() {
        let err: SubscriptionError = StoreError::Unavailable {
            reason: "connection refused".to_string(),
        }
        .into();
        assert!(matches!(err, SubscriptionError::Infrastructure { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_errors_render_their_context() {
        let id = SubscriptionId::new();
        let err = StoreError::VersionConflict {
            subscription_id: id,
            expected: 1,
            actual: 4,
        };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("expected 1"));
        assert!(msg.contains("found 4"));
    }
}
