use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

use super::literal;

/// Format used when a date-time is coerced to a string attribute.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A typed attribute value.
///
/// Attributes are persisted as strings; this is the typed view on either side
/// of the codec boundary. Paths and dates have no variant of their own and are
/// coerced to `Str` on conversion.
#[derive(Debug, Clone)]
pub enum MetadataValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    StrList(Vec<String>),
    FloatList(Vec<f64>),
}

impl MetadataValue {
    /// Returns the type name as a string (for error messages).
    pub fn type_name(&self) -> &'static str {
        match self {
            MetadataValue::Str(_) => "string",
            MetadataValue::Int(_) => "int",
            MetadataValue::Float(_) => "float",
            MetadataValue::Bool(_) => "bool",
            MetadataValue::StrList(_) => "list<string>",
            MetadataValue::FloatList(_) => "list<float>",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view: integers widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(f) => Some(*f),
            MetadataValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            MetadataValue::StrList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_list(&self) -> Option<&[f64]> {
        match self {
            MetadataValue::FloatList(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, MetadataValue::Int(_) | MetadataValue::Float(_))
    }
}

fn same_float(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

/// Value equality as seen through the codec: `NaN` equals `NaN`, and
/// different variants are never equal (`Int(1) != Float(1.0)`).
impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MetadataValue::Str(a), MetadataValue::Str(b)) => a == b,
            (MetadataValue::Int(a), MetadataValue::Int(b)) => a == b,
            (MetadataValue::Float(a), MetadataValue::Float(b)) => same_float(*a, *b),
            (MetadataValue::Bool(a), MetadataValue::Bool(b)) => a == b,
            (MetadataValue::StrList(a), MetadataValue::StrList(b)) => a == b,
            (MetadataValue::FloatList(a), MetadataValue::FloatList(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_float(*x, *y))
            }
            _ => false,
        }
    }
}

/// Writes the literal form without the round-trip check `encode` performs.
impl std::fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&literal::to_literal(self))
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::Str(s)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::Str(s.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Int(i)
    }
}

impl From<i32> for MetadataValue {
    fn from(i: i32) -> Self {
        MetadataValue::Int(i64::from(i))
    }
}

impl From<u32> for MetadataValue {
    fn from(i: u32) -> Self {
        MetadataValue::Int(i64::from(i))
    }
}

impl From<f64> for MetadataValue {
    fn from(f: f64) -> Self {
        MetadataValue::Float(f)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

impl From<Vec<String>> for MetadataValue {
    fn from(v: Vec<String>) -> Self {
        MetadataValue::StrList(v)
    }
}

impl From<Vec<&str>> for MetadataValue {
    fn from(v: Vec<&str>) -> Self {
        MetadataValue::StrList(v.into_iter().map(String::from).collect())
    }
}

impl From<Vec<f64>> for MetadataValue {
    fn from(v: Vec<f64>) -> Self {
        MetadataValue::FloatList(v)
    }
}

impl From<[f64; 3]> for MetadataValue {
    fn from(xyz: [f64; 3]) -> Self {
        MetadataValue::FloatList(xyz.to_vec())
    }
}

impl From<&Path> for MetadataValue {
    fn from(p: &Path) -> Self {
        MetadataValue::Str(p.display().to_string())
    }
}

impl From<PathBuf> for MetadataValue {
    fn from(p: PathBuf) -> Self {
        MetadataValue::from(p.as_path())
    }
}

impl From<NaiveDateTime> for MetadataValue {
    fn from(dt: NaiveDateTime) -> Self {
        MetadataValue::Str(dt.format(DATETIME_FORMAT).to_string())
    }
}

impl From<NaiveDate> for MetadataValue {
    fn from(d: NaiveDate) -> Self {
        MetadataValue::Str(d.format("%Y-%m-%d").to_string())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for MetadataValue {
    fn from(dt: DateTime<Tz>) -> Self {
        MetadataValue::from(dt.naive_local())
    }
}
