//! Proration math for mid-period plan changes.
//!
//! Adjustments are computed on exact decimals and rounded once, at the
//! end, to two places with midpoints away from zero. The sign carries the
//! direction: positive means the company owes a charge, negative is a
//! credit. Only positive adjustments are ever collected; credits are
//! recorded against the next invoice.

use rust_decimal::Decimal;

use crate::domain::foundation::{Money, Timestamp, ValidationError};

/// Signed price adjustment for switching plans with `remaining_days` left
/// in a `cycle_days`-long period.
///
/// The unused fraction of the old price comes back as credit and the same
/// fraction of the new price is charged, which nets out to
/// `(new - old) * remaining / cycle`.
///
/// # Errors
///
/// Returns a [`ValidationError`] if the prices are in different currencies
/// or `cycle_days` is zero.
pub fn prorated_adjustment(
    old_price: Money,
    new_price: Money,
    cycle_days: u32,
    remaining_days: u32,
) -> Result<Money, ValidationError> {
    if cycle_days == 0 {
        return Err(ValidationError::invalid_format(
            "cycle_days",
            "cycle length must be at least one day",
        ));
    }
    let delta = new_price.checked_sub(&old_price)?;
    // A period cannot have more time remaining than its own length
    let remaining = remaining_days.min(cycle_days);
    let factor = Decimal::from(remaining) / Decimal::from(cycle_days);
    Ok(Money::new(delta.amount() * factor, delta.currency()).rounded())
}

/// Whole days from `from` to `to`, truncated, clamped at zero.
pub fn whole_days_between(from: Timestamp, to: Timestamp) -> u32 {
    let days = to.duration_since(&from).num_days();
    days.clamp(0, i64::from(u32::MAX)) as u32
}
