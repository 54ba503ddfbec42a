//! Wall-clock helpers.
//!
//! Turn boundaries and retention windows are computed from a shared
//! wall-clock assumption, so every timestamp in the protocol is
//! milliseconds since the Unix epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time in milliseconds since the Unix
/// epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
