//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-memory store, mock gateway, and recording notifier

pub mod memory;

pub use memory::{InMemorySubscriptionStore, MockPaymentGateway, RecordingNotifier};
