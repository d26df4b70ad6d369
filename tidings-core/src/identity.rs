//! Identity and time types for Tidings records

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
pub type RecordId = Uuid;

/// Monotonically increasing timestamp in microseconds since the Unix epoch.
///
/// A tick is both the logical clock of the notification partition and the
/// sort key of every time-ordered index.
pub type Tick = i64;

/// Number of ticks in one second.
pub const TICKS_PER_SECOND: i64 = 1_000_000;

/// Generate a new UUIDv7 record id.
pub fn new_record_id() -> RecordId {
    Uuid::now_v7()
}

/// Convert a UTC timestamp to a tick.
pub fn tick_from_datetime(at: DateTime<Utc>) -> Tick {
    at.timestamp_micros()
}

/// Convert a tick back to a UTC timestamp.
///
/// Returns `None` for ticks outside chrono's representable range.
pub fn tick_to_datetime(tick: Tick) -> Option<DateTime<Utc>> {
    Utc.timestamp_micros(tick).single()
}

/// Convert whole seconds to ticks, saturating on overflow.
pub fn secs_to_ticks(secs: u64) -> Tick {
    i64::try_from(secs)
        .unwrap_or(i64::MAX)
        .saturating_mul(TICKS_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_datetime_roundtrip() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let tick = tick_from_datetime(at);
        assert_eq!(tick, 1_704_067_200 * TICKS_PER_SECOND);
        assert_eq!(tick_to_datetime(tick), Some(at));
    }

    #[test]
    fn test_secs_to_ticks_saturates() {
        assert_eq!(secs_to_ticks(1800), 1800 * TICKS_PER_SECOND);
        assert_eq!(secs_to_ticks(u64::MAX), i64::MAX);
    }

    #[test]
    fn test_record_ids_are_time_ordered() {
        let a = new_record_id();
        let b = new_record_id();
        assert!(a < b);
        assert_eq!(a.get_version_num(), 7);
    }
}
