use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single record in a table: column name to scalar value.
///
/// Backed by a `BTreeMap` so iteration and the canonical encoding always see
/// columns in sorted order.
pub type Row = BTreeMap<String, Value>;

/// A scalar cell value.
///
/// The JSON encoding is the value itself for null, booleans, numbers and
/// text; dates encode as the tagged object
/// `{"type": "date", "value": "<rfc3339>"}` so they survive a round-trip
/// through formats with no native date type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Rank used when comparing values of different types. Dates share a
    /// rank with numbers and compare by epoch milliseconds.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) | Value::Date(_) => 2,
            Value::Text(_) => 3,
        }
    }
}

/// Total order over values, usable as a sort key for any column.
///
/// Null sorts before everything. Values of different types order by type
/// rank (bool < number < text). Dates are interchangeable with numbers and
/// compare by epoch milliseconds. NaN compares equal to NaN and after every
/// other number.
pub fn compare_values(value: &Value, other: &Value) -> Ordering {
    use Value::*;
    match (value, other) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Bool(a), Bool(b)) => a.cmp(b),
        (Number(a), Number(b)) => a.total_cmp(b),
        (Text(a), Text(b)) => a.cmp(b),
        (Date(a), Date(b)) => a.cmp(b),
        (Number(a), Date(b)) => a.total_cmp(&date_millis(b)),
        (Date(a), Number(b)) => date_millis(a).total_cmp(b),
        _ => value.type_rank().cmp(&other.type_rank()),
    }
}

/// Compare two key tuples element-wise. Shorter tuples sort first.
pub fn compare_lexicographic(values: &[Value], others: &[Value]) -> Ordering {
    match values.len().cmp(&others.len()) {
        Ordering::Equal => {}
        unequal => return unequal,
    }

    for (value, other) in values.iter().zip(others) {
        match compare_values(value, other) {
            Ordering::Equal => {}
            decided => return decided,
        }
    }

    Ordering::Equal
}

fn date_millis(date: &DateTime<Utc>) -> f64 {
    date.timestamp_millis() as f64
}

/// Canonical encoding of a row, used as a dedup key, a grouping key and a
/// data-source parameter key. Deterministic because `Row` iterates columns
/// in sorted order.
pub fn row_key(row: &Row) -> String {
    serde_json::to_string(row).expect("row encoding cannot fail")
}

pub(crate) fn value_key(value: &Value) -> String {
    serde_json::to_string(value).expect("value encoding cannot fail")
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(t) => serializer.serialize_str(t),
            Value::Date(d) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("type", "date")?;
                map.serialize_entry("value", &d.to_rfc3339())?;
                map.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ValueRepr {
    Bool(bool),
    Number(f64),
    Tagged {
        #[serde(rename = "type")]
        kind: String,
        value: String,
    },
    Text(String),
    Null,
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ValueRepr::deserialize(deserializer)? {
            ValueRepr::Null => Ok(Value::Null),
            ValueRepr::Bool(b) => Ok(Value::Bool(b)),
            ValueRepr::Number(n) => Ok(Value::Number(n)),
            ValueRepr::Text(t) => Ok(Value::Text(t)),
            ValueRepr::Tagged { kind, value } if kind == "date" => {
                let date = DateTime::parse_from_rfc3339(&value).map_err(D::Error::custom)?;
                Ok(Value::Date(date.with_timezone(&Utc)))
            }
            ValueRepr::Tagged { kind, .. } => {
                Err(D::Error::custom(format!("unknown tagged value `{kind}`")))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(t: &str) -> Self {
        Value::Text(t.to_string())
    }
}

impl From<String> for Value {
    fn from(t: String) -> Self {
        Value::Text(t)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Build a [`Row`] from `column => value` pairs.
///
/// ```
/// use incview::{row, Value};
///
/// let row = row! { "name" => "Mario", "age" => 32 };
/// assert_eq!(row["age"], Value::Number(32.0));
/// ```
#[macro_export]
macro_rules! row {
    () => { $crate::Row::new() };
    ($($column:expr => $value:expr),+ $(,)?) => {{
        let mut row = $crate::Row::new();
        $( row.insert(($column).to_string(), $crate::Value::from($value)); )+
        row
    }};
}
