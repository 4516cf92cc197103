//! Calendar helpers shared by the streak engine and weekly counters.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Default offset used to decide which calendar day a post belongs to (JST).
pub const DEFAULT_UTC_OFFSET_SECONDS: i32 = 9 * 3600;

/// Return the first and last instants of the ISO week containing `date`.
///
/// The week runs Monday `00:00:00` through Sunday `23:59:59.999999999`.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use diary_backend::domain::week_range;
///
/// let date = NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date");
/// let (start, end) = week_range(date);
/// assert_eq!(start.to_string(), "2026-01-12 00:00:00");
/// assert_eq!(end.to_string(), "2026-01-18 23:59:59.999999999");
/// ```
#[must_use]
pub fn week_range(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let days_from_monday = i64::from(date.weekday().num_days_from_monday());
    let monday = date - Duration::days(days_from_monday);
    let sunday = monday + Duration::days(6);
    (
        monday.and_time(NaiveTime::default()),
        sunday.and_time(end_of_day()),
    )
}

/// Calendar date of `instant` as observed at `offset`.
#[must_use]
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

fn end_of_day() -> NaiveTime {
    // 23:59:59 plus the largest nanosecond value that is not a leap second.
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or_default()
}
