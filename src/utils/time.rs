use chrono::{DateTime, Duration, TimeZone};

/// Converts a chrono duration into fractional seconds. Counters are kept in seconds, but
/// millisecond precision is preserved.
pub fn duration_seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.
}

/// Unix timestamp in fractional seconds, the way the collector expects `now`.
pub fn unix_seconds<Tz: TimeZone>(moment: &DateTime<Tz>) -> f64 {
    moment.timestamp_millis() as f64 / 1000.
}

/// Builds a duration from fractional seconds. Used only for display purposes.
pub fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::milliseconds((seconds * 1000.).round() as i64)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{duration_seconds, seconds_to_duration, unix_seconds};

    #[test]
    fn test_duration_seconds_keeps_millis() {
        assert_eq!(duration_seconds(Duration::milliseconds(1500)), 1.5);
        assert_eq!(seconds_to_duration(1.5), Duration::milliseconds(1500));
    }

    #[test]
    fn test_unix_seconds() {
        let moment = Utc.timestamp_millis_opt(1_530_662_400_250).unwrap();
        assert_eq!(unix_seconds(&moment), 1_530_662_400.25);
    }
}
