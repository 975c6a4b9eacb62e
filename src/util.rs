//! Small time helpers shared across the crate.

use chrono::Utc;

/// Current wall-clock time as Unix seconds with microsecond precision.
///
/// Measurement timestamps are stored as `f64` seconds so that sub-second
/// sampling intervals remain visible in persisted results.
pub fn unix_now() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Current wall-clock time as a zero-padded ISO 8601 string.
///
/// The date portion sorts lexicographically, which the result store relies
/// on for inclusive date-range filtering.
pub fn iso_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
