//! Billing schedule arithmetic.
//!
//! All functions are pure calendar math over [`Timestamp`]. Periods anchor
//! on the previous billing date, never on "now", so a late sweep does not
//! drift the schedule.

use chrono::{DateTime, Months, Utc};

use crate::domain::foundation::Timestamp;

use super::BillingCycle;

/// Next billing date one cycle after `anchor`.
///
/// Month arithmetic clamps to the last day of the target month: a monthly
/// cycle anchored on January 31st bills next on February 29th in a leap
/// year (February 28th otherwise), and an annual cycle anchored on
/// February 29th bills next on February 28th.
pub fn next_billing_date(anchor: Timestamp, cycle: BillingCycle) -> Timestamp {
    let next = anchor
        .as_datetime()
        .checked_add_months(Months::new(cycle.months()))
        // Out of range only near year 262143; saturate rather than panic
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    Timestamp::from_datetime(next)
}

/// When a trial that starts at `started_at` ends.
pub fn trial_end(started_at: Timestamp, trial_days: u32) -> Timestamp {
    started_at.add_days(i64::from(trial_days))
}

/// When the grace period for a charge that failed at `failed_at` ends.
pub fn grace_end(failed_at: Timestamp, grace_window_days: u32) -> Timestamp {
    failed_at.add_days(i64::from(grace_window_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Utc};
    use proptest::prelude::*;

    fn ts(year: i32, month: u32, day: u32) -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap())
    }

    #[test]
    fn monthly_advances_one_month() {
        let next = next_billing_date(ts(2024, 3, 15), BillingCycle::Monthly);
        assert_eq!(next, ts(2024, 4, 15));
    }

    #[test]
    fn monthly_clamps_january_31_to_leap_february_29() {
        let next = next_billing_date(ts(2024, 1, 31), BillingCycle::Monthly);
        assert_eq!(next, ts(2024, 2, 29));
    }

    #[test]
    fn monthly_clamps_january_31_to_february_28_off_leap_years() {
        let next = next_billing_date(ts(2023, 1, 31), BillingCycle::Monthly);
        assert_eq!(next, ts(2023, 2, 28));
    }

    #[test]
    fn monthly_clamps_august_31_to_september_30() {
        let next = next_billing_date(ts(2024, 8, 31), BillingCycle::Monthly);
        assert_eq!(next, ts(2024, 9, 30));
    }

    #[test]
    fn annual_advances_one_year() {
        let next = next_billing_date(ts(2024, 1, 15), BillingCycle::Annual);
        assert_eq!(next, ts(2025, 1, 15));
    }

    #[test]
    fn annual_clamps_leap_day_to_february_28() {
        let next = next_billing_date(ts(2024, 2, 29), BillingCycle::Annual);
        assert_eq!(next, ts(2025, 2, 28));
    }

    #[test]
    fn monthly_preserves_time_of_day() {
        let anchor =
            Timestamp::from_datetime(Utc.with_ymd_and_hms(2024, 5, 10, 13, 45, 30).unwrap());
        let next = next_billing_date(anchor, BillingCycle::Monthly);
        let dt = next.as_datetime();
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (13, 45, 30));
    }

    #[test]
    fn trial_end_adds_days_from_start() {
        assert_eq!(trial_end(ts(2024, 6, 1), 14), ts(2024, 6, 15));
        assert_eq!(trial_end(ts(2024, 6, 1), 0), ts(2024, 6, 1));
    }

    #[test]
    fn trial_end_crosses_month_boundary() {
        assert_eq!(trial_end(ts(2024, 1, 25), 14), ts(2024, 2, 8));
    }

    #[test]
    fn grace_end_adds_window_to_failure_time() {
        assert_eq!(grace_end(ts(2024, 4, 28), 7), ts(2024, 5, 5));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn next_date_is_strictly_after_anchor(
            year in 2000i32..2100,
            month in 1u32..=12,
            day in 1u32..=28,
        ) {
            let anchor = ts(year, month, day);
            prop_assert!(next_billing_date(anchor, BillingCycle::Monthly).is_after(&anchor));
            prop_assert!(next_billing_date(anchor, BillingCycle::Annual).is_after(&anchor));
        }

        #[test]
        fn monthly_never_moves_day_of_month_later(
            year in 2000i32..2100,
            month in 1u32..=12,
            day in 1u32..=31,
        ) {
            // Clamping may pull the day earlier, never push it later
            prop_assume!(Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single().is_some());
            let anchor = ts(year, month, day);
            let next = next_billing_date(anchor, BillingCycle::Monthly);
            prop_assert!(next.as_datetime().day() <= day);
        }

        #[test]
        fn annual_lands_in_same_month(
            year in 2000i32..2100,
            month in 1u32..=12,
            day in 1u32..=28,
        ) {
            let anchor = ts(year, month, day);
            let next = next_billing_date(anchor, BillingCycle::Annual);
            prop_assert_eq!(next.as_datetime().month(), month);
            prop_assert_eq!(next.as_datetime().year(), year + 1);
        }
    }
}
