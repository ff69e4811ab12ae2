use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};

/// Current wall-clock time as unix seconds.
pub fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Current wall-clock time as unix milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Server-assigned timestamp: RFC 3339 UTC at fixed microsecond precision.
///
/// The fixed width keeps lexicographic ordering identical to chronological
/// ordering, which the event store relies on for recency queries.
pub fn utc_now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Renders the `HH:MM`Z clock used in activity lines. Values that do not
/// parse as RFC 3339 are passed through unchanged.
pub fn clock_hhmm(rfc3339: &str) -> String {
    match DateTime::parse_from_rfc3339(rfc3339) {
        Ok(parsed) => parsed.with_timezone(&Utc).format("%H:%MZ").to_string(),
        Err(_) => rfc3339.to_string(),
    }
}
