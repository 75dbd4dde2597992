//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Current time as milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert a transport timestamp (nanoseconds since epoch) to a UTC timestamp
pub fn from_unix_nanos(nanos: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_nanos(nanos)
}

/// Convert a UTC timestamp back to nanoseconds since epoch
///
/// Returns `None` outside the range representable in an `i64`
/// (roughly years 1677 through 2262).
pub fn to_unix_nanos(timestamp: &DateTime<Utc>) -> Option<i64> {
    timestamp.timestamp_nanos_opt()
}

/// Parse the `:ts` path segment of an upload (decimal nanoseconds)
pub fn parse_unix_nanos(raw: &str) -> Result<DateTime<Utc>, std::num::ParseIntError> {
    raw.trim().parse::<i64>().map(from_unix_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_now_millis_advances() {
        let t1 = now_millis();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let t2 = now_millis();
        assert!(t2 > t1);
    }

    #[test]
    fn test_nanos_preserve_precision() {
        let nanos = 1_700_000_000_123_456_789i64;
        let ts = from_unix_nanos(nanos);
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 123_456_789);
        assert_eq!(to_unix_nanos(&ts), Some(nanos));
    }

    #[test]
    fn test_parse_unix_nanos() {
        let ts = parse_unix_nanos("1000000000").unwrap();
        assert_eq!(ts.timestamp(), 1);

        assert!(parse_unix_nanos("yesterday").is_err());
        assert!(parse_unix_nanos("").is_err());
    }
}
