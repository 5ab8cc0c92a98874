//! Time helpers for oxrates.

use chrono::{DateTime, TimeZone, Utc};

/// A timestamp (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert whole unix seconds into a timestamp.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn from_unix_seconds(seconds: i64) -> Option<Timestamp> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Add a std duration to a timestamp, saturating instead of overflowing.
pub fn saturating_add(timestamp: Timestamp, duration: std::time::Duration) -> Timestamp {
    chrono::Duration::from_std(duration)
        .ok()
        .and_then(|d| timestamp.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
