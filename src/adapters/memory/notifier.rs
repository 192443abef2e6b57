//! Recording notifier.
//!
//! Logs every fact through `tracing` and keeps delivered facts in memory
//! for assertions. Failure injection lets tests confirm that lifecycle
//! operations survive a broken notifier.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::subscription::SubscriptionEvent;
use crate::ports::{NotifyError, SubscriptionNotifier};

/// Internal mutable state.
#[derive(Default)]
struct NotifierState {
    delivered: Vec<SubscriptionEvent>,
    failing: bool,
}

/// In-memory implementation of [`SubscriptionNotifier`].
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<NotifierState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every delivery fail (or succeed again with `false`).
    pub fn set_failing(&self, failing: bool) {
        self.inner.lock().unwrap().failing = failing;
    }

    /// All successfully delivered facts, in order.
    pub fn delivered(&self) -> Vec<SubscriptionEvent> {
        self.inner.lock().unwrap().delivered.clone()
    }

    /// Routing keys of delivered facts, in order.
    pub fn delivered_types(&self) -> Vec<&'static str> {
        self.inner
            .lock()
            .unwrap()
            .delivered
            .iter()
            .map(|event| event.event_type())
            .collect()
    }
}

#[async_trait]
impl SubscriptionNotifier for RecordingNotifier {
    async fn notify(&self, event: &SubscriptionEvent) -> Result<(), NotifyError> {
        let mut state = self.inner.lock().unwrap();
        if state.failing {
            return Err(NotifyError::new("notifier configured to fail"));
        }
        debug!(
            event_type = event.event_type(),
            subscription_id = %event.subscription_id(),
            "delivered subscription fact"
        );
        state.delivered.push(event.clone());
        Ok(())
    }
}
