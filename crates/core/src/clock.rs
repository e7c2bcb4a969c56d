//! Timestamp helpers pinned to the configured UTC offset.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};

/// Format used for the derived `*_formatted` fields and the client date picker.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Produces and formats Unix timestamps in a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct ReviewClock {
    offset: FixedOffset,
}

impl ReviewClock {
    /// Clock for the given offset.
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// The offset every timestamp is interpreted in.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Current time as Unix seconds.
    pub fn now(&self) -> i64 {
        Utc::now().with_timezone(&self.offset).timestamp()
    }

    /// Parse `YYYY-MM-DD` into the timestamp of that day's midnight in the offset.
    pub fn midnight(&self, date: &str) -> Option<i64> {
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).ok()?;
        let midnight = date.and_hms_opt(0, 0, 0)?;
        midnight
            .and_local_timezone(self.offset)
            .single()
            .map(|value| value.timestamp())
    }

    /// Render a timestamp as `YYYY-MM-DD` in the offset.
    pub fn format_date(&self, timestamp: i64) -> Option<String> {
        DateTime::from_timestamp(timestamp, 0).map(|value| {
            value
                .with_timezone(&self.offset)
                .format(DATE_FORMAT)
                .to_string()
        })
    }

    /// Today's date in the offset.
    pub fn today(&self) -> String {
        Utc::now()
            .with_timezone(&self.offset)
            .format(DATE_FORMAT)
            .to_string()
    }
}

/// Calendar year of a timestamp in UTC; zero counts as unset.
pub fn utc_year(timestamp: i64) -> Option<i32> {
    if timestamp == 0 {
        return None;
    }
    DateTime::from_timestamp(timestamp, 0).map(|value| value.year())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock() -> ReviewClock {
        ReviewClock::new(FixedOffset::east_opt(4 * 3600).expect("valid offset"))
    }

    #[test]
    fn midnight_is_in_the_configured_offset() {
        // 2023-05-01T00:00:00+04:00 == 2023-04-30T20:00:00Z
        assert_eq!(clock().midnight("2023-05-01"), Some(1_682_884_800));
        assert_eq!(clock().format_date(1_682_884_800).as_deref(), Some("2023-05-01"));
    }

    #[test]
    fn invalid_dates_are_rejected() {
        assert_eq!(clock().midnight("2023-02-30"), None);
        assert_eq!(clock().midnight("yesterday"), None);
        assert_eq!(clock().midnight(""), None);
    }

    #[test]
    fn years_use_utc() {
        // 2023-12-31T22:00:00Z is already 2024 at +04:00.
        let timestamp = 1_704_060_000;
        assert_eq!(utc_year(timestamp), Some(2023));
        assert_eq!(clock().format_date(timestamp).as_deref(), Some("2024-01-01"));
        assert_eq!(utc_year(0), None);
    }
}
