//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionStore` - Version-checked subscription persistence
//!
//! ## Billing Ports
//!
//! - `PaymentGateway` - Idempotent charging of stored payment methods
//!
//! ## Delivery Ports
//!
//! - `SubscriptionNotifier` - Best-effort delivery of subscription facts

mod notifier;
mod payment_gateway;
mod subscription_store;

pub use notifier::{NotifyError, SubscriptionNotifier};
pub use payment_gateway::{
    ChargeReceipt, ChargeRequest, PaymentError, PaymentErrorCode, PaymentGateway,
};
pub use subscription_store::{StoreError, SubscriptionStore};
