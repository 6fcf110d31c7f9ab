//! Common types used across ballpark
//!
//! [`Value`] is the closed set of cell values a snapshot record can carry once
//! coerced, and [`Timestamp`] is the lifecycle timestamp the store keeps per row.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::error::{CommonError, Result};

/// Lifecycle timestamp as stored in `created_dt` / `updated_dt`
pub type Timestamp = DateTime<Utc>;

/// Offset-less layouts the store may hand back for `timestamp` columns.
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Layouts with a short (`+00`) or long (`+00:00`) offset.
const OFFSET_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Parse a timestamp returned by the store.
///
/// Accepts RFC 3339, the Postgres text layout with a short offset, and
/// offset-less timestamps, which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    for format in OFFSET_TIMESTAMP_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(raw, format) {
            return Ok(ts.with_timezone(&Utc));
        }
    }

    for format in NAIVE_TIMESTAMP_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(CommonError::parse(format!("Invalid timestamp: {raw}")))
}

/// Format a timestamp the way it is written to the store
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// A typed cell value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent, empty, or unparseable cell
    #[default]
    Null,
    /// Whole number (truncated from the source text)
    Integer(i64),
    /// Real number
    Real(f64),
    /// Free text, already trimmed
    Text(String),
    /// Store-managed lifecycle timestamp
    Timestamp(Timestamp),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Timestamp(ts) => serializer.serialize_str(&format_timestamp(ts)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Real(r) => write!(f, "{r}"),
            Value::Text(s) => f.write_str(s),
            Value::Timestamp(ts) => f.write_str(&format_timestamp(ts)),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Timestamp> for Value {
    fn from(value: Timestamp) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let ts = parse_timestamp("2024-04-01T09:30:00.123456+00:00").unwrap();
        assert_eq!(ts.timestamp(), 1711963800);
        assert_eq!(ts.timestamp_subsec_micros(), 123456);
    }

    #[test]
    fn test_parse_timestamp_converts_offset_to_utc() {
        let ts = parse_timestamp("2024-04-01T18:30:00+09:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 4, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_short_offset() {
        let ts = parse_timestamp("2024-04-01 09:30:00.5+00").unwrap();
        assert_eq!(ts.timestamp(), 1711963800);
    }

    #[test]
    fn test_parse_timestamp_naive_is_utc() {
        let ts = parse_timestamp("2024-04-01T09:30:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 4, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_value_serializes_to_plain_json() {
        let ts = Utc.with_ymd_and_hms(2024, 4, 1, 9, 30, 0).unwrap();
        let values = vec![
            Value::Null,
            Value::Integer(7),
            Value::Real(0.25),
            Value::from("orcas"),
            Value::from(ts),
        ];

        let json = serde_json::to_value(&values).unwrap();
        assert_eq!(
            json,
            serde_json::json!([null, 7, 0.25, "orcas", "2024-04-01T09:30:00.000000+00:00"])
        );
    }

    #[test]
    fn test_value_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3i64)), Value::Integer(3));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Integer(-2).to_string(), "-2");
        assert_eq!(Value::from("RHP").to_string(), "RHP");
    }
}
