//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types
//! that form the vocabulary of the TrustRail billing domain.

mod ids;
mod timestamp;
mod money;
mod state_machine;
mod errors;

pub use ids::{CompanyId, PaymentMethodRef, SubscriptionId};
pub use timestamp::Timestamp;
pub use money::{Currency, Money};
pub use state_machine::StateMachine;
pub use errors::{DomainError, ErrorCode, ValidationError};
