//! Generators for synthetic time axes and values.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use chrono::{DateTime, Duration, TimeZone, Utc};

/// First day of each month of `year`, at midnight.
pub fn monthly_times(year: i32) -> Vec<DateTime<Utc>> {
    (1..=12)
        .filter_map(|m| Utc.with_ymd_and_hms(year, m, 1, 0, 0, 0).single())
        .collect()
}

/// `days` consecutive days starting on January 1st of `year`.
pub fn daily_times(year: i32, days: usize) -> Vec<DateTime<Utc>> {
    steps_from(year, 1, 1, Duration::days(1), days)
}

/// `hours` consecutive hours starting at `month`/`day` of `year`.
pub fn hourly_times(year: i32, month: u32, day: u32, hours: usize) -> Vec<DateTime<Utc>> {
    steps_from(year, month, day, Duration::hours(1), hours)
}

fn steps_from(year: i32, month: u32, day: u32, step: Duration, n: usize) -> Vec<DateTime<Utc>> {
    let Some(start) = Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single() else {
        return Vec::new();
    };
    (0..n as i32).map(|i| start + step * i).collect()
}

/// `n` copies of `value`.
pub fn constant_values(n: usize, value: f64) -> Vec<f64> {
    vec![value; n]
}

/// `start, start + step, start + 2 * step, ...`
///
/// # Example
///
/// ```
/// use test_utils::ramp_values;
///
/// assert_eq!(ramp_values(3, 1.0, 0.5), vec![1.0, 1.5, 2.0]);
/// ```
pub fn ramp_values(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n).map(|i| start + step * i as f64).collect()
}
