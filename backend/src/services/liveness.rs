use chrono::{DateTime, Utc};

/// Whether a session last active at `last_active` is still alive at `now`.
///
/// Elapsed time is measured in whole seconds and the threshold is inclusive.
/// A `last_active` in the future (clock skew between writers) counts as alive.
pub fn is_alive(last_active: DateTime<Utc>, now: DateTime<Utc>, threshold_secs: i64) -> bool {
    (now - last_active).num_seconds() <= threshold_secs
}
