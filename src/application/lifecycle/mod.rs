//! Subscription lifecycle engine.
//!
//! Everything that changes a subscription goes through
//! [`SubscriptionLifecycleManager`]: signup, upgrades, downgrades,
//! cancellation, usage consumption, and the time-based transitions the
//! sweeper dispatches. The engine owns per-subscription locking,
//! idempotent charging, version-conflict retries, and fact publication
//! so callers never have to.

mod locks;
mod manager;
mod renewal;

pub use locks::SubscriptionLocks;
pub use manager::{CreateSubscriptionRequest, LifecycleConfig, SubscriptionLifecycleManager};
pub use renewal::RenewalOutcome;
