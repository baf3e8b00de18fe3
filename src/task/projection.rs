//! Time projection for recurring tasks.
//!
//! A recurring task stores its timing as a weekly template: a day of week
//! plus the time of day embedded in `start_time`/`end_time`. These functions
//! map the template onto the concrete week containing a reference date.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use super::DayOfWeek;

/// Project a template timestamp onto the week containing `reference`.
///
/// The signed offset between the template's day of week and the reference
/// date's weekday is added to the reference date (a negative offset shifts
/// backward within the same week), then the template's time of day replaces
/// the time component. A day of week that precedes the reference weekday
/// therefore lands earlier in the *same* calendar week, not in the next one.
///
/// Pure, and idempotent for a fixed reference date.
pub fn project_onto_week(
    template: NaiveDateTime,
    day: DayOfWeek,
    reference: NaiveDate,
) -> NaiveDateTime {
    let offset = day.number_from_sunday() - i64::from(reference.weekday().num_days_from_sunday());
    let date = reference + Duration::days(offset);
    date.and_time(template.time())
}

/// First and last day (inclusive) of the Sunday-based week containing `reference`.
pub fn week_bounds(reference: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = reference - Duration::days(i64::from(reference.weekday().num_days_from_sunday()));
    (start, start + Duration::days(6))
}
