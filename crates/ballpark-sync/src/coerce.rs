//! Raw cell coercion
//!
//! Snapshot cells arrive as text. Each column is classified as plain text,
//! integer, or numeric, and the cell is converted accordingly. Coercion never
//! fails: anything that does not parse becomes [`Value::Null`].

use ballpark_common::Value;
use serde::{Deserialize, Serialize};

/// Placeholders the scrapers emit for "no value" in stat columns.
const NUMERIC_NULL_MARKERS: &[&str] = &["", "-", "."];

/// `2^63`; the first whole number that no longer fits in an `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Column classification used to pick a coercion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    #[default]
    Plain,
    Integer,
    Numeric,
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Plain => write!(f, "plain"),
            ColumnKind::Integer => write!(f, "integer"),
            ColumnKind::Numeric => write!(f, "numeric"),
        }
    }
}

/// Coerce a raw cell into a typed value.
///
/// - `Plain`: trimmed text, null when empty.
/// - `Integer`: parsed as a real, then truncated toward zero (`"5.0"` is `5`).
/// - `Numeric`: parsed as a real.
///
/// For integer and numeric columns `""`, `"-"` and `"."` are null, as is any
/// text that does not parse or parses to a non-finite number.
pub fn coerce(raw: &str, kind: ColumnKind) -> Value {
    let cell = raw.trim();

    match kind {
        ColumnKind::Plain if cell.is_empty() => Value::Null,
        ColumnKind::Plain => Value::Text(cell.to_string()),
        ColumnKind::Integer => parse_integer(cell).map_or(Value::Null, Value::Integer),
        ColumnKind::Numeric => parse_real(cell).map_or(Value::Null, Value::Real),
    }
}

fn parse_real(cell: &str) -> Option<f64> {
    if NUMERIC_NULL_MARKERS.contains(&cell) {
        return None;
    }

    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn parse_integer(cell: &str) -> Option<i64> {
    let truncated = parse_real(cell)?.trunc();

    if truncated < -I64_BOUND || truncated >= I64_BOUND {
        return None;
    }

    Some(truncated as i64)
}
