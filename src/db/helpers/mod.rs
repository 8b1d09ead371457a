use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u8(value: i64, field: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("{field} value {value} does not fit in u8"))
}

/// Fixed-width UTC form so stored timestamps compare correctly as text.
/// Nanoseconds are kept: two fetches within the same second are distinct
/// versions of a forecast hour.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 24, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 24, 10, 0, 0).unwrap();
        assert!(format_datetime(&early) < format_datetime(&late));
        assert_eq!(format_datetime(&early), "2024-01-24T09:00:00.000000000Z");
        assert_eq!(parse_datetime(&format_datetime(&late), "t").unwrap(), late);
    }

    #[test]
    fn sub_second_timestamps_stay_distinct_and_ordered() {
        let first = Utc.with_ymd_and_hms(2024, 1, 24, 9, 0, 0).unwrap()
            + chrono::Duration::milliseconds(120);
        let second = first + chrono::Duration::microseconds(1);
        let whole = Utc.with_ymd_and_hms(2024, 1, 24, 9, 0, 1).unwrap();

        assert!(format_datetime(&first) < format_datetime(&second));
        assert!(format_datetime(&second) < format_datetime(&whole));
        assert_eq!(format_datetime(&first).len(), format_datetime(&whole).len());
        assert_eq!(parse_datetime(&format_datetime(&second), "t").unwrap(), second);
    }
}
