//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, enums, errors)
//! - `subscription` - Plan catalog, subscription aggregate, and billing math

pub mod foundation;
pub mod subscription;
