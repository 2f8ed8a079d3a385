//! UTC calendar day bucketing

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Calendar day (UTC) a timestamp falls into.
pub fn day_bucket(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}

/// Midnight UTC at the start of `day`.
pub fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}
