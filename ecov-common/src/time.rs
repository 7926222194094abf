//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Render an ISO-8601 timestamp with millisecond precision (`2024-05-01T12:00:00.000Z`)
pub fn to_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render the calendar date of a timestamp (`2024-05-01`)
pub fn to_date(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}
