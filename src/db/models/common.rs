//! Common types and utilities shared across models.

use chrono::NaiveDate;

/// Display format for booking dates in API responses
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Format a calendar date for display (`YYYY/MM/DD`).
pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a calendar date given as `YYYY-MM-DD` or `YYYY/MM/DD`.
pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, DATE_FORMAT))
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD", raw))
}

/// Serde adapter that writes dates as `YYYY/MM/DD` and reads either format.
///
/// Dates carry no time or offset, so a formatted value always parses back to
/// the same calendar day.
pub mod display_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&date.format(super::DATE_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).map_err(de::Error::custom)
    }
}
