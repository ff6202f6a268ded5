use chrono::{NaiveDateTime, Timelike};
use std::time::SystemTime;

/// Wire and on-disk timestamp format, e.g. `2024-Jan-05 13:02:11`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%b-%d %H:%M:%S";

pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), TIMESTAMP_FORMAT).ok()
}

pub fn format_timestamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

/// Filesystem mtime as a second-resolution local timestamp, matching what
/// `format_timestamp` can represent so comparisons round-trip.
pub fn from_system_time(t: SystemTime) -> NaiveDateTime {
    let local: chrono::DateTime<chrono::Local> = t.into();
    let naive = local.naive_local();
    naive.with_nanosecond(0).unwrap_or(naive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_wire_format() {
        let ts = parse_timestamp("2024-Jan-05 13:02:11").unwrap();
        assert_eq!(format_timestamp(ts), "2024-Jan-05 13:02:11");
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("not a date").is_none());
        assert!(parse_timestamp("2024-01-05 13:02:11").is_none());
    }

    #[test]
    fn orders_by_publication() {
        let older = parse_timestamp("2024-Jan-01 00:00:00").unwrap();
        let newer = parse_timestamp("2024-Feb-01 00:00:00").unwrap();
        assert!(newer > older);
    }

    #[test]
    fn system_time_truncates_subseconds() {
        let now = from_system_time(SystemTime::now());
        assert_eq!(now.nanosecond(), 0);
        let reparsed = parse_timestamp(&format_timestamp(now)).unwrap();
        assert_eq!(reparsed, now);
    }
}
