use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Inclusive UTC day window, formatted the way NRQL `SINCE`/`UNTIL` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    /// Window from midnight `days_ago` days before today (UTC) to 23:59:59 today.
    pub fn ending_today(days_ago: u32) -> Self {
        Self::ending_on(Utc::now(), days_ago)
    }

    pub fn ending_on(now: DateTime<Utc>, days_ago: u32) -> Self {
        let today = now.date_naive();
        let first_day = today
            .checked_sub_days(Days::new(u64::from(days_ago)))
            .unwrap_or(NaiveDate::MIN);

        let start = first_day.and_time(NaiveTime::MIN);
        let end = today.and_time(end_of_day());

        Self {
            start: format_timestamp(&start),
            end: format_timestamp(&end),
        }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}
