//! Local wall-clock timestamps as persisted by the stores
//!
//! Every timestamp is a naive local time stored as `YYYY-MM-DD HH:MM:SS`.

use chrono::{Datelike, Local, NaiveDateTime, Timelike};

/// Persisted timestamp layout
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time, truncated to whole seconds
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Render a timestamp in the persisted layout
pub fn format(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp from the persisted layout
pub fn parse(s: &str) -> crate::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map_err(|e| crate::Error::parse(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Whether two timestamps fall in the same calendar (year, month)
pub fn is_same_month(a: &NaiveDateTime, b: &NaiveDateTime) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// Serde adapter for `NaiveDateTime` fields stored as `YYYY-MM-DD HH:MM:SS`
pub mod serde_local {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse(s).unwrap()
    }

    #[test]
    fn round_trips_persisted_layout() {
        let t = ts("2025-03-07 09:05:01");
        assert_eq!(format(&t), "2025-03-07 09:05:01");
    }

    #[test]
    fn rejects_iso_layout() {
        assert!(parse("2025-03-07T09:05:01").is_err());
    }

    #[test]
    fn same_month_compares_year_too() {
        assert!(is_same_month(&ts("2025-03-01 00:00:00"), &ts("2025-03-31 23:59:59")));
        assert!(!is_same_month(&ts("2025-02-28 23:59:59"), &ts("2025-03-01 00:00:00")));
        assert!(!is_same_month(&ts("2024-03-15 12:00:00"), &ts("2025-03-15 12:00:00")));
    }

    #[test]
    fn now_has_whole_seconds() {
        assert_eq!(now().nanosecond(), 0);
    }
}
