use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp the way every table stores it: RFC 3339, UTC, whole
/// seconds. Fixed width, so string comparison in SQL orders chronologically.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn now() -> String {
    format_timestamp(Utc::now())
}
