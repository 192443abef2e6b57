//! Subscription domain: plans, lifecycle state, entitlements, and usage.
//!
//! The [`Subscription`] aggregate owns all state transitions. The static
//! [`EntitlementCatalog`] defines what each tier grants and costs, and the
//! [`schedule`] and [`proration`] modules hold the pure billing math.

mod aggregate;
mod catalog;
mod errors;
mod events;
mod plan;
pub mod proration;
pub mod schedule;
mod status;
mod usage;

pub use aggregate::Subscription;
pub use catalog::{EntitlementCatalog, Feature, PlanDefinition};
pub use errors::SubscriptionError;
pub use events::SubscriptionEvent;
pub use plan::{BillingCycle, PlanTier};
pub use status::SubscriptionStatus;
pub use usage::{FeatureUsage, UsageMeter, UsageStatus};
