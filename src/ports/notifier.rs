//! SubscriptionNotifier port for publishing subscription facts.
//!
//! Facts are delivered after the state change is durably saved, strictly
//! best-effort: a notification failure is logged and never rolls back or
//! blocks the lifecycle operation that produced it.

use async_trait::async_trait;

use crate::domain::subscription::SubscriptionEvent;

/// A failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError {
    pub message: String,
}

impl NotifyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.message)
    }
}

impl std::error::Error for NotifyError {}

/// Port for delivering subscription facts to downstream consumers.
#[async_trait]
pub trait SubscriptionNotifier: Send + Sync {
    /// Delivers one fact.
    ///
    /// # Errors
    ///
    /// Returns a [`NotifyError`] when delivery failed. Callers log and
    /// move on; the fact describes a change that already happened.
    async fn notify(&self, event: &SubscriptionEvent) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Trait object safety test
    #[test]
    fn notifier_is_object_safe() {
        fn _accepts_dyn(_notifier: &dyn SubscriptionNotifier) {}
    }

    #[test]
    fn notify_error_display_includes_reason() {
        let err = NotifyError::new("webhook endpoint returned 503");
        assert!(err.to_string().contains("503"));
    }
}
