//! Mock payment gateway for testing and local runs.
//!
//! Provides a configurable implementation of `PaymentGateway`. Supports:
//! - Scripted failures, one-shot or persistent
//! - Idempotency-key replay of collected charges
//! - Call tracking
//! - Artificial latency for timeout tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::Timestamp;
use crate::ports::{ChargeReceipt, ChargeRequest, PaymentError, PaymentGateway};

/// Mock payment gateway.
///
/// # Example
///
/// ```ignore
/// let gateway = MockPaymentGateway::new();
///
/// // Script the next outcome
/// gateway.push_error(PaymentError::card_declined("Test decline"));
///
/// // Use in tests
/// let result = gateway.charge(request).await;
/// ```
#[derive(Clone, Default)]
pub struct MockPaymentGateway {
    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<GatewayState>>,
}

/// Internal mutable state.
#[derive(Default)]
struct GatewayState {
    /// Receipts by idempotency key, for replay.
    collected: HashMap<String, ChargeReceipt>,

    /// Errors to return, one per call, before consulting `always_fail`.
    error_queue: VecDeque<PaymentError>,

    /// Error to return on every call once the queue is drained.
    always_fail: Option<PaymentError>,

    /// Artificial latency before answering.
    delay: Option<Duration>,

    /// Every charge request seen, in order.
    call_log: Vec<ChargeRequest>,
}

impl MockPaymentGateway {
    /// Create a gateway that approves everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway that fails every charge with the given error.
    pub fn failing_with(error: PaymentError) -> Self {
        let gateway = Self::new();
        gateway.fail_always(error);
        gateway
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Queue an error for a single upcoming call. Queued errors fire in
    /// order before any persistent failure.
    pub fn push_error(&self, error: PaymentError) {
        self.inner.lock().unwrap().error_queue.push_back(error);
    }

    /// Fail every call with this error once the queue is drained.
    pub fn fail_always(&self, error: PaymentError) {
        self.inner.lock().unwrap().always_fail = Some(error);
    }

    /// Clear all scripted failures.
    pub fn clear_errors(&self) {
        let mut state = self.inner.lock().unwrap();
        state.error_queue.clear();
        state.always_fail = None;
    }

    /// Delay every answer by `duration`, for exercising timeouts.
    pub fn set_delay(&self, duration: Duration) {
        self.inner.lock().unwrap().delay = Some(duration);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// All charge requests seen, including failed and replayed ones.
    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.inner.lock().unwrap().call_log.clone()
    }

    /// Number of charge attempts.
    pub fn request_count(&self) -> usize {
        self.inner.lock().unwrap().call_log.len()
    }

    /// Number of distinct charges actually collected.
    pub fn collected_count(&self) -> usize {
        self.inner.lock().unwrap().collected.len()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, PaymentError> {
        let delay = {
            let mut state = self.inner.lock().unwrap();
            state.call_log.push(request.clone());
            state.delay
        };
        if let Some(duration) = delay {
            tokio::time::sleep(duration).await;
        }

        let mut state = self.inner.lock().unwrap();

        // A key that already cleared replays its original receipt
        if let Some(receipt) = state.collected.get(&request.idempotency_key) {
            return Ok(receipt.clone());
        }

        if let Some(error) = state.error_queue.pop_front() {
            return Err(error);
        }
        if let Some(error) = &state.always_fail {
            return Err(error.clone());
        }

        let receipt = ChargeReceipt {
            reference: format!("ch_{:06}", state.collected.len() + 1),
            amount: request.amount,
            charged_at: Timestamp::now(),
        };
        state
            .collected
            .insert(request.idempotency_key, receipt.clone());
        Ok(receipt)
    }
}
