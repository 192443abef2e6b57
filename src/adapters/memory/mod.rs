//! In-memory adapters.
//!
//! Reference implementations of every port, used for tests and
//! single-process deployments. They honor the same contracts a networked
//! adapter would: version-checked saves, idempotency-key replay, and
//! fact delivery.

mod notifier;
mod payment_gateway;
mod subscription_store;

pub use notifier::RecordingNotifier;
pub use payment_gateway::MockPaymentGateway;
pub use subscription_store::InMemorySubscriptionStore;
