use chrono::{DateTime, DurationRound, TimeDelta, Utc};

/// Returns the current UTC time truncated to whole seconds.
///
/// Session activity timestamps are stored at one-second resolution so that
/// liveness comparisons are stable across round-trips through the store.
pub fn now_utc_seconds() -> DateTime<Utc> {
    truncate_to_seconds(Utc::now())
}

pub fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::seconds(1)).unwrap_or(at)
}
