//! Application layer - lifecycle orchestration and background services.
//!
//! This layer coordinates domain operations across ports. The lifecycle
//! engine serializes writes per subscription and keeps charging, saving,
//! and notification in the right order; the sweeper drives the clock.

pub mod lifecycle;
pub mod sweeper;

pub use lifecycle::{
    CreateSubscriptionRequest, LifecycleConfig, RenewalOutcome, SubscriptionLifecycleManager,
    SubscriptionLocks,
};
pub use sweeper::{RenewalSweeper, RenewalSweeperConfig, SweepReport};
