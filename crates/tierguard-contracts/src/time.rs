//! Timestamp helpers shared by the stores.

use chrono::{DateTime, Duration, Utc};

/// Return a stamp strictly later than `prev`, preferring `now`.
///
/// Replicas merge by last-write-wins on `updated_at`, so two writes to the
/// same record must never share a stamp even when the clock has not moved.
pub fn advance_stamp(prev: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > prev {
        now
    } else {
        prev + Duration::microseconds(1)
    }
}
