use std::borrow::Cow;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

/// Formats accepted when a text cell is read as a date or timestamp.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// A single cell of a dataset row.
///
/// Cells read from delimited text stay `String` so pass-through columns are
/// written back byte-for-byte. Only the columns the synthesizer rewrites are
/// interpreted, and only when they are needed (see [`Value::as_f64`] and
/// [`Temporal::from_value`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Float(f64),
    String(Cow<'static, str>),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Build a value from a raw text cell. Empty cells become `Null`.
    pub fn from_cell(cell: &str) -> Self {
        if cell.is_empty() {
            Value::Null
        } else {
            Value::String(Cow::Owned(cell.to_string()))
        }
    }

    /// Convert to a CSV-friendly string.
    pub fn to_csv_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view of the cell. Text cells are parsed on demand.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_csv_string()),
        }
    }
}

/// A parsed date cell that remembers its granularity.
///
/// Shifting a `Date` yields a `Date` and shifting a `Timestamp` yields a
/// `Timestamp`, so synthesized rows keep the same shape as their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Temporal {
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Temporal {
    /// Parse a text cell, trying timestamp formats before date-only formats.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        for fmt in TIMESTAMP_FORMATS {
            if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Temporal::Timestamp(ts));
            }
        }
        for fmt in DATE_FORMATS {
            if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
                return Some(Temporal::Date(d));
            }
        }
        None
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(Temporal::Date(*d)),
            Value::Timestamp(ts) => Some(Temporal::Timestamp(*ts)),
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    pub fn year(&self) -> i32 {
        match self {
            Temporal::Date(d) => d.year(),
            Temporal::Timestamp(ts) => ts.year(),
        }
    }

    /// Midnight-anchored timestamp, used as the sort key.
    pub fn to_datetime(&self) -> NaiveDateTime {
        match self {
            Temporal::Date(d) => d.and_time(chrono::NaiveTime::MIN),
            Temporal::Timestamp(ts) => *ts,
        }
    }

    /// Shift by a whole number of days. `None` on calendar overflow.
    pub fn checked_add_days(&self, days: i64) -> Option<Self> {
        let delta = TimeDelta::try_days(days)?;
        match self {
            Temporal::Date(d) => d.checked_add_signed(delta).map(Temporal::Date),
            Temporal::Timestamp(ts) => ts.checked_add_signed(delta).map(Temporal::Timestamp),
        }
    }

    /// Signed whole-day distance from `earlier` to `self`.
    pub fn days_since(&self, earlier: &Temporal) -> i64 {
        (self.to_datetime() - earlier.to_datetime()).num_days()
    }
}

impl From<Temporal> for Value {
    fn from(t: Temporal) -> Self {
        match t {
            Temporal::Date(d) => Value::Date(d),
            Temporal::Timestamp(ts) => Value::Timestamp(ts),
        }
    }
}
