//! TrustRail Billing - Subscription Lifecycle and Entitlement Engine
//!
//! This crate manages paid plans for the TrustRail review platform:
//! trial signups, calendar-aware renewals, prorated upgrades, boundary
//! downgrades, grace periods, and per-feature usage quotas. All writes
//! go through a version-checked store and an idempotency-keyed payment
//! gateway so retries never double-charge or lose updates.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
