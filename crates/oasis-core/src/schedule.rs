//! Schedule parsing for scheduled actions.
//!
//! A schedule string is either an RFC 3339 timestamp (one-shot) or a
//! cron expression. Five-field cron gets a seconds column prepended for
//! the parser.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use cron::Schedule;

/// Compute the next run after `after` for a schedule string.
///
/// Returns `None` for a one-shot timestamp that is already past, or for
/// an unparsable schedule.
pub fn next_run_after(schedule: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = schedule.trim();

    if let Ok(at) = DateTime::parse_from_rfc3339(schedule) {
        let at = at.with_timezone(&Utc);
        return (at > after).then_some(at);
    }

    let normalized = normalize_cron(schedule);
    let parsed = Schedule::from_str(&normalized).ok()?;
    parsed.after(&after).next()
}

/// Whether a schedule string describes a one-shot absolute time.
pub fn is_one_shot(schedule: &str) -> bool {
    DateTime::parse_from_rfc3339(schedule.trim()).is_ok()
}

/// Validate a schedule string.
pub fn is_valid_schedule(schedule: &str) -> bool {
    let schedule = schedule.trim();
    if DateTime::parse_from_rfc3339(schedule).is_ok() {
        return true;
    }
    Schedule::from_str(&normalize_cron(schedule)).is_ok()
}

/// The `cron` crate wants a seconds field; standard 5-field expressions
/// get `0` prepended.
fn normalize_cron(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_five_field_cron() {
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let next = next_run_after("0 9 * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_cron_rolls_to_next_day() {
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let next = next_run_after("0 9 * * *", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_one_shot_future() {
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let next = next_run_after("2026-06-01T12:00:00Z", after).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_one_shot_past_is_none() {
        let after = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(next_run_after("2025-01-01T00:00:00Z", after).is_none());
    }

    #[test]
    fn test_invalid_schedule() {
        assert!(next_run_after("whenever", Utc::now()).is_none());
        assert!(!is_valid_schedule("whenever"));
        assert!(is_valid_schedule("*/5 * * * *"));
        assert!(is_valid_schedule("2026-06-01T12:00:00Z"));
    }

    #[test]
    fn test_is_one_shot() {
        assert!(is_one_shot("2026-06-01T12:00:00Z"));
        assert!(!is_one_shot("0 9 * * *"));
    }
}
