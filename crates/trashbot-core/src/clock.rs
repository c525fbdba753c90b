//! Wall-clock timestamps in milliseconds since the Unix epoch.

use chrono::Utc;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
