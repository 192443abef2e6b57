//! Subscription lifecycle errors.
//!
//! Every rejected operation maps to one variant here. Variants carry the
//! data a caller needs to act on the rejection, and [`code`] gives the
//! stable machine-readable identifier.
//!
//! [`code`]: SubscriptionError::code

use std::fmt;

use crate::domain::foundation::{
    CompanyId, DomainError, ErrorCode, SubscriptionId, ValidationError,
};

use super::{Feature, PlanTier, SubscriptionStatus};

/// Why a subscription operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The operation is not defined for the subscription's current status.
    InvalidTransition {
        current: SubscriptionStatus,
        operation: String,
        allowed: Vec<SubscriptionStatus>,
    },

    /// A consumption would push a metered feature past its quota.
    QuotaExceeded {
        feature: Feature,
        limit: u64,
        used: u64,
        requested: u64,
    },

    /// The gateway definitively declined a charge.
    PaymentFailed { reason: String },

    /// The gateway could not be reached or timed out.
    PaymentUnavailable { reason: String },

    /// A concurrent writer saved the subscription first.
    VersionConflict {
        subscription_id: SubscriptionId,
        expected: u64,
        actual: u64,
    },

    /// No subscription exists under the given id.
    NotFound { subscription_id: SubscriptionId },

    /// The company already has a live subscription.
    AlreadySubscribed {
        company_id: CompanyId,
        existing: SubscriptionId,
    },

    /// The requested tier change is not valid in this direction or state.
    InvalidTierChange {
        from: PlanTier,
        to: PlanTier,
        reason: String,
    },

    /// Malformed input caught before any state was touched.
    Validation(ValidationError),

    /// The store or another dependency failed outside our control.
    Infrastructure { message: String },
}

impl SubscriptionError {
    pub fn invalid_transition(
        current: SubscriptionStatus,
        operation: impl Into<String>,
        allowed: Vec<SubscriptionStatus>,
    ) -> Self {
        Self::InvalidTransition {
            current,
            operation: operation.into(),
            allowed,
        }
    }

    pub fn quota_exceeded(feature: Feature, limit: u64, used: u64, requested: u64) -> Self {
        Self::QuotaExceeded {
            feature,
            limit,
            used,
            requested,
        }
    }

    pub fn payment_failed(reason: impl Into<String>) -> Self {
        Self::PaymentFailed {
            reason: reason.into(),
        }
    }

    pub fn payment_unavailable(reason: impl Into<String>) -> Self {
        Self::PaymentUnavailable {
            reason: reason.into(),
        }
    }

    pub fn version_conflict(subscription_id: SubscriptionId, expected: u64, actual: u64) -> Self {
        Self::VersionConflict {
            subscription_id,
            expected,
            actual,
        }
    }

    pub fn not_found(subscription_id: SubscriptionId) -> Self {
        Self::NotFound { subscription_id }
    }

    pub fn already_subscribed(company_id: CompanyId, existing: SubscriptionId) -> Self {
        Self::AlreadySubscribed {
            company_id,
            existing,
        }
    }

    pub fn invalid_tier_change(from: PlanTier, to: PlanTier, reason: impl Into<String>) -> Self {
        Self::InvalidTierChange {
            from,
            to,
            reason: reason.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        Self::Infrastructure {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            Self::QuotaExceeded { .. } => ErrorCode::QuotaExceeded,
            Self::PaymentFailed { .. } => ErrorCode::PaymentFailed,
            Self::PaymentUnavailable { .. } => ErrorCode::PaymentUnavailable,
            Self::VersionConflict { .. } => ErrorCode::VersionConflict,
            Self::NotFound { .. } => ErrorCode::SubscriptionNotFound,
            Self::AlreadySubscribed { .. } => ErrorCode::AlreadySubscribed,
            Self::InvalidTierChange { .. } => ErrorCode::InvalidTierChange,
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Infrastructure { .. } => ErrorCode::StoreError,
        }
    }

    /// Human-readable description of the rejection.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidTransition {
                current,
                operation,
                allowed,
            } => {
                let allowed = if allowed.is_empty() {
                    "none".to_string()
                } else {
                    allowed
                        .iter()
                        .map(|status| format!("{:?}", status))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                format!(
                    "Cannot {} a subscription in state {:?} (allowed states: {})",
                    operation, current, allowed
                )
            }
            Self::QuotaExceeded {
                feature,
                limit,
                used,
                requested,
            } => format!(
                "Quota exceeded for {}: {} of {} used, {} more requested",
                feature.key(),
                used,
                limit,
                requested
            ),
            Self::PaymentFailed { reason } => format!("Payment failed: {}", reason),
            Self::PaymentUnavailable { reason } => {
                format!("Payment provider unavailable: {}", reason)
            }
            Self::VersionConflict {
                subscription_id,
                expected,
                actual,
            } => format!(
                "Version conflict on subscription {}: expected {}, found {}",
                subscription_id, expected, actual
            ),
            Self::NotFound { subscription_id } => {
                format!("Subscription {} not found", subscription_id)
            }
            Self::AlreadySubscribed {
                company_id,
                existing,
            } => format!(
                "Company {} already has a live subscription {}",
                company_id, existing
            ),
            Self::InvalidTierChange { from, to, reason } => format!(
                "Cannot change plan from {:?} to {:?}: {}",
                from, to, reason
            ),
            Self::Validation(inner) => inner.to_string(),
            Self::Infrastructure { message } => message.clone(),
        }
    }

    /// Whether retrying the same call can succeed without anyone fixing
    /// anything first.
    ///
    /// Only transient faults qualify: a lost optimistic-locking race and
    /// an unreachable payment provider. A declined card or a quota breach
    /// stays failed no matter how often it is retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PaymentUnavailable { .. } | Self::VersionConflict { .. }
        )
    }
}

impl fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SubscriptionError {}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        let base = DomainError::new(err.code(), err.message());
        match err {
            SubscriptionError::QuotaExceeded {
                feature,
                limit,
                used,
                requested,
            } => base
                .with_detail("feature", feature.key())
                .with_detail("limit", limit.to_string())
                .with_detail("used", used.to_string())
                .with_detail("requested", requested.to_string()),
            SubscriptionError::VersionConflict {
                subscription_id,
                expected,
                actual,
            } => base
                .with_detail("subscription_id", subscription_id.to_string())
                .with_detail("expected_version", expected.to_string())
                .with_detail("actual_version", actual.to_string()),
            SubscriptionError::NotFound { subscription_id } => {
                base.with_detail("subscription_id", subscription_id.to_string())
            }
            SubscriptionError::AlreadySubscribed {
                company_id,
                existing,
            } => base
                .with_detail("company_id", company_id.to_string())
                .with_detail("existing_subscription_id", existing.to_string()),
            _ => base,
        }
    }
}
