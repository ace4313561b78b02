//! Weekly weigh-in schedule
//!
//! Weigh-ins happen once a week on Sunday. All calculations use UTC calendar days.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, Utc, Weekday};

/// Check if a timestamp falls on a Sunday
pub fn is_sunday(date: DateTime<Utc>) -> bool {
    date.weekday() == Weekday::Sun
}

/// Midnight of the first Sunday strictly after `from`.
/// A Sunday rolls forward a full week.
pub fn next_sunday(from: DateTime<Utc>) -> DateTime<Utc> {
    let day = from.date_naive();
    let days_until_sunday = match day.weekday().num_days_from_sunday() {
        0 => 7,
        n => 7 - n,
    };

    let sunday = day
        .checked_add_days(Days::new(u64::from(days_until_sunday)))
        .unwrap_or(day);

    start_of_day(sunday)
}

/// Whole days from `now` until the next weigh-in is due (0 if overdue)
pub fn days_until(now: DateTime<Utc>, due: DateTime<Utc>) -> i64 {
    (due.date_naive() - now.date_naive()).num_days().max(0)
}

pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}
