//! Payment gateway port for charging stored payment methods.
//!
//! The engine never sees card data. It holds an opaque
//! [`PaymentMethodRef`] and asks the gateway to charge it, passing an
//! idempotency key so a retried call can never double-charge.
//!
//! # Design
//!
//! - **Gateway agnostic**: the contract fits any provider
//! - **Idempotent**: the same key always yields the same outcome
//! - **No partial effects**: a charge either clears or fails whole

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Money, PaymentMethodRef, Timestamp};
use crate::domain::subscription::SubscriptionError;

/// Port for collecting a payment.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the payment method for the given amount.
    ///
    /// Implementations must deduplicate on `idempotency_key`: replaying a
    /// key whose charge already cleared returns the original receipt
    /// without charging again.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] carrying whether the failure is worth
    /// retrying (network trouble) or final (a declined card).
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, PaymentError>;
}

/// A request to collect one payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Gateway token for the stored payment method.
    pub payment_method: PaymentMethodRef,

    /// Amount and currency to collect.
    pub amount: Money,

    /// Deduplication key. One key maps to at most one collected charge.
    pub idempotency_key: String,

    /// Statement text, e.g. "TrustRail Premium renewal".
    pub description: String,
}

/// Confirmation of a collected charge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeReceipt {
    /// Gateway's reference for the charge.
    pub reference: String,

    /// Amount actually collected.
    pub amount: Money,

    /// When the gateway confirmed the charge.
    pub charged_at: Timestamp,
}

/// Errors from payment gateway operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    /// Error code for categorization.
    pub code: PaymentErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Whether the same call can be retried.
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a card declined error.
    pub fn card_declined(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::CardDeclined, message)
    }

    /// Create an insufficient funds error.
    pub fn insufficient_funds(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InsufficientFunds, message)
    }

    /// Create a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::RateLimitExceeded, message)
    }

    /// Create a provider-side error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::ProviderError, message)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for SubscriptionError {
    fn from(err: PaymentError) -> Self {
        if err.retryable {
            SubscriptionError::payment_unavailable(err.to_string())
        } else {
            SubscriptionError::payment_failed(err.to_string())
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// Card was declined.
    CardDeclined,

    /// Insufficient funds.
    InsufficientFunds,

    /// Card expired.
    CardExpired,

    /// Invalid card details.
    InvalidCard,

    /// Rate limit exceeded.
    RateLimitExceeded,

    /// Provider API error.
    ProviderError,

    /// Unknown error.
    Unknown,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::CardDeclined => "card_declined",
            PaymentErrorCode::InsufficientFunds => "insufficient_funds",
            PaymentErrorCode::CardExpired => "card_expired",
            PaymentErrorCode::InvalidCard => "invalid_card",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn payment_gateway_is_object_safe() {
        fn _accepts_dyn(_gateway: &dyn PaymentGateway) {}
    }

    #[test]
    fn payment_error_retryable() {
        assert!(PaymentErrorCode::NetworkError.is_retryable());
        assert!(PaymentErrorCode::RateLimitExceeded.is_retryable());

        assert!(!PaymentErrorCode::CardDeclined.is_retryable());
        assert!(!PaymentErrorCode::InsufficientFunds.is_retryable());
    }

    #[test]
    fn payment_error_display() {
        let err = PaymentError::card_declined("Your card was declined");
        assert!(err.to_string().contains("card_declined"));
        assert!(err.to_string().contains("Your card was declined"));
    }

    #[test]
    fn final_failures_convert_to_payment_failed() {
        let err: SubscriptionError = PaymentError::card_declined("Declined").into();
        assert!(matches!(err, SubscriptionError::PaymentFailed { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_failures_convert_to_payment_unavailable() {
        let err: SubscriptionError = PaymentError::network("connection reset").into();
        assert!(matches!(err, SubscriptionError::PaymentUnavailable { .. }));
        assert!(err.is_retryable());
    }
}
