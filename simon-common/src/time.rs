//! Timestamp utilities

use chrono::{DateTime, Local};

/// Current Unix timestamp in whole seconds
pub fn epoch_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Render a Unix timestamp as a local date string
///
/// Format matches the dashboard rendering: `%Y-%m-%d %H:%M:%S`.
/// Timestamps outside the representable range fall back to the raw
/// number of seconds.
pub fn format_local_date(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|utc| {
            utc.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| ts.to_string())
}
