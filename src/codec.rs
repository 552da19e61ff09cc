//! Conversion between serde's view of a field and the value bound to, or read
//! from, a column.

use crate::error::{QueryError, Result};
use crate::schema::{Dialect, FieldDescriptor, FieldType};
use chrono::{DateTime, NaiveDateTime, NaiveTime, SecondsFormat, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Separator used when a collection is stored in a single column.
pub const COLLECTION_DELIMITER: char = ',';

/// Fractional digits kept by decimal columns.
pub const DECIMAL_SCALE: u32 = 3;

/// Fractional-second digits a PostgreSQL timestamp keeps.
const POSTGRES_SUBSEC_DIGITS: u16 = 6;

/// Column type of a null, so that typed drivers can bind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Uuid,
    Timestamp,
    Time,
    Bytes,
}

impl From<FieldType> for ValueKind {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Int8
            | FieldType::Int16
            | FieldType::Int32
            | FieldType::Int64
            | FieldType::Enum(_) => ValueKind::Int,
            FieldType::Float => ValueKind::Float,
            FieldType::Decimal => ValueKind::Decimal,
            FieldType::Text => ValueKind::Text,
            FieldType::Bool => ValueKind::Bool,
            FieldType::Timestamp => ValueKind::Timestamp,
            FieldType::Duration => ValueKind::Time,
            FieldType::Uuid => ValueKind::Uuid,
            FieldType::Bytes => ValueKind::Bytes,
        }
    }
}

/// Scalar bound as a query parameter or read from a result column
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null(ValueKind),
    Bool(bool),
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Time(NaiveTime),
    Bytes(Vec<u8>),
    /// Joined into delimited text by [`encode_value`] before binding.
    List(Vec<String>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null(_) => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(n) => write!(f, "{}", n),
            SqlValue::Float(n) => write!(f, "{}", n),
            SqlValue::Decimal(d) => write!(f, "{}", d),
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Uuid(u) => write!(f, "{}", u),
            SqlValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            SqlValue::Time(t) => write!(f, "{}", t),
            SqlValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            SqlValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value.into())
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        SqlValue::Decimal(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<Option<Uuid>> for SqlValue {
    fn from(value: Option<Uuid>) -> Self {
        value.map_or(SqlValue::Null(ValueKind::Uuid), SqlValue::Uuid)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(SqlValue::Null(ValueKind::Text), SqlValue::Text)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(value: NaiveTime) -> Self {
        SqlValue::Time(value)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl From<Vec<String>> for SqlValue {
    fn from(value: Vec<String>) -> Self {
        SqlValue::List(value)
    }
}

/// Untyped encode step applied to every bound value.
pub fn encode_value(value: SqlValue, dialect: Dialect) -> SqlValue {
    match value {
        SqlValue::List(items) => SqlValue::Text(join_collection(&items)),
        SqlValue::Timestamp(t) if t == DateTime::<Utc>::MIN_UTC => {
            SqlValue::Timestamp(dialect.min_timestamp())
        }
        SqlValue::Timestamp(t) if dialect == Dialect::Postgres => {
            SqlValue::Timestamp(t.trunc_subsecs(POSTGRES_SUBSEC_DIGITS))
        }
        other => other,
    }
}

/// Encode the serde form of a field into the value bound for its column.
pub fn encode_field(field: &FieldDescriptor, value: &Value, dialect: Dialect) -> Result<SqlValue> {
    let column = field.name.as_str();
    let mismatch = || {
        QueryError::codec(
            column,
            format!("cannot encode {} as {}", value, field.field_type.name()),
        )
    };

    if value.is_null() {
        return Ok(SqlValue::Null(field.field_type.into()));
    }

    if field.collection {
        return match value {
            Value::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(s.clone()),
                        _ => Err(mismatch()),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(encode_value(SqlValue::List(items), dialect))
            }
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            _ => Err(mismatch()),
        };
    }

    let encoded = match field.field_type {
        FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64 => {
            let n = value.as_i64().ok_or_else(mismatch)?;
            check_width(field, n)?;
            SqlValue::Int(n)
        }
        FieldType::Float => SqlValue::Float(value.as_f64().ok_or_else(mismatch)?),
        FieldType::Decimal => {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err(mismatch()),
            };
            let decimal = parse_decimal(column, &text)?;
            match dialect {
                // Stored as an integer count of thousandths
                Dialect::Sqlite => SqlValue::Int(scale_decimal(column, decimal)?),
                Dialect::Postgres => SqlValue::Decimal(decimal),
            }
        }
        FieldType::Text => SqlValue::Text(value.as_str().ok_or_else(mismatch)?.to_string()),
        FieldType::Bool => SqlValue::Bool(value.as_bool().ok_or_else(mismatch)?),
        FieldType::Timestamp => {
            let text = value.as_str().ok_or_else(mismatch)?;
            SqlValue::Timestamp(parse_timestamp(column, text)?)
        }
        FieldType::Duration => {
            let text = value.as_str().ok_or_else(mismatch)?;
            SqlValue::Time(parse_time(column, text)?)
        }
        FieldType::Uuid => {
            let text = value.as_str().ok_or_else(mismatch)?;
            SqlValue::Uuid(
                Uuid::parse_str(text).map_err(|e| QueryError::codec(column, e.to_string()))?,
            )
        }
        FieldType::Bytes => {
            let items = value.as_array().ok_or_else(mismatch)?;
            let bytes = items
                .iter()
                .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()).ok_or_else(mismatch))
                .collect::<Result<Vec<u8>>>()?;
            SqlValue::Bytes(bytes)
        }
        FieldType::Enum(variants) => match value {
            Value::String(name) => {
                let index = variants
                    .iter()
                    .position(|v| v == name)
                    .ok_or_else(|| QueryError::codec(column, format!("unknown variant {}", name)))?;
                SqlValue::Int(index as i64)
            }
            Value::Number(n) => {
                let index = n.as_u64().filter(|i| (*i as usize) < variants.len());
                SqlValue::Int(index.ok_or_else(mismatch)? as i64)
            }
            _ => return Err(mismatch()),
        },
    };

    Ok(encode_value(encoded, dialect))
}

/// Decode a column value into the serde form expected by the field.
pub fn decode_field(field: &FieldDescriptor, value: &SqlValue) -> Result<Value> {
    let column = field.name.as_str();
    let mismatch = || {
        QueryError::codec(
            column,
            format!("cannot decode {:?} as {}", value, field.field_type.name()),
        )
    };

    if value.is_null() {
        return Ok(zero_value(field));
    }

    if field.collection {
        return match value {
            SqlValue::Text(s) => Ok(Value::Array(
                split_collection(s).into_iter().map(Value::String).collect(),
            )),
            SqlValue::List(items) => Ok(Value::Array(
                items.iter().cloned().map(Value::String).collect(),
            )),
            _ => Err(mismatch()),
        };
    }

    let decoded = match (field.field_type, value) {
        (t, SqlValue::Int(n)) if t.is_integer() => {
            check_width(field, *n)?;
            Value::from(*n)
        }
        (t, SqlValue::Bool(b)) if t.is_integer() => Value::from(i64::from(*b)),
        (t, SqlValue::Text(s)) if t.is_integer() => {
            Value::from(s.trim().parse::<i64>().map_err(|_| mismatch())?)
        }

        (FieldType::Float, SqlValue::Float(n)) => float_value(*n).ok_or_else(mismatch)?,
        (FieldType::Float, SqlValue::Int(n)) => Value::from(*n as f64),
        (FieldType::Float, SqlValue::Decimal(d)) => {
            float_value(d.to_string().parse().map_err(|_| mismatch())?).ok_or_else(mismatch)?
        }

        (FieldType::Decimal, SqlValue::Decimal(d)) => Value::String(d.to_string()),
        // Integer storage is the scaled SQLite form
        (FieldType::Decimal, SqlValue::Int(n)) => {
            Value::String(Decimal::new(*n, DECIMAL_SCALE).to_string())
        }
        // Shortest round-trip form of the float, not its exact binary expansion
        (FieldType::Decimal, SqlValue::Float(n)) => {
            Value::String(parse_decimal(column, &n.to_string())?.to_string())
        }
        (FieldType::Decimal, SqlValue::Text(s)) => {
            Value::String(parse_decimal(column, s)?.to_string())
        }

        (FieldType::Text, SqlValue::Text(s)) => Value::String(s.clone()),
        (FieldType::Text, SqlValue::Bytes(b)) => {
            Value::String(String::from_utf8(b.clone()).map_err(|_| mismatch())?)
        }
        (FieldType::Text, other) => Value::String(other.to_string()),

        (FieldType::Bool, SqlValue::Bool(b)) => Value::Bool(*b),
        (FieldType::Bool, SqlValue::Int(n)) => Value::Bool(*n != 0),
        (FieldType::Bool, SqlValue::Text(s)) => match s.as_str() {
            "1" | "true" | "TRUE" => Value::Bool(true),
            "0" | "false" | "FALSE" => Value::Bool(false),
            _ => return Err(mismatch()),
        },

        (FieldType::Timestamp, SqlValue::Timestamp(t)) => Value::String(format_timestamp(t)),
        (FieldType::Timestamp, SqlValue::Text(s)) => {
            Value::String(format_timestamp(&parse_timestamp(column, s)?))
        }

        (FieldType::Duration, SqlValue::Time(t)) => Value::String(t.to_string()),
        (FieldType::Duration, SqlValue::Text(s)) => Value::String(parse_time(column, s)?.to_string()),

        (FieldType::Uuid, SqlValue::Uuid(u)) => Value::String(u.to_string()),
        (FieldType::Uuid, SqlValue::Bytes(b)) => Value::String(
            Uuid::from_slice(b)
                .map_err(|e| QueryError::codec(column, e.to_string()))?
                .to_string(),
        ),
        (FieldType::Uuid, SqlValue::Text(s)) => Value::String(
            Uuid::parse_str(s)
                .map_err(|e| QueryError::codec(column, e.to_string()))?
                .to_string(),
        ),

        (FieldType::Bytes, SqlValue::Bytes(b)) => {
            Value::Array(b.iter().map(|byte| Value::from(*byte)).collect())
        }
        (FieldType::Bytes, SqlValue::Text(s)) => {
            Value::Array(s.bytes().map(Value::from).collect())
        }

        (FieldType::Enum(variants), SqlValue::Int(n)) => {
            let name = usize::try_from(*n)
                .ok()
                .and_then(|i| variants.get(i))
                .ok_or_else(|| QueryError::codec(column, format!("no variant at index {}", n)))?;
            Value::String(name.to_string())
        }
        (FieldType::Enum(variants), SqlValue::Text(s)) if variants.contains(&s.as_str()) => {
            Value::String(s.clone())
        }

        _ => return Err(mismatch()),
    };

    Ok(decoded)
}

/// Value assigned when the column holds NULL.
fn zero_value(field: &FieldDescriptor) -> Value {
    if field.nullable {
        return Value::Null;
    }
    if field.collection {
        return Value::Array(Vec::new());
    }

    match field.field_type {
        FieldType::Int8 | FieldType::Int16 | FieldType::Int32 | FieldType::Int64 => Value::from(0),
        FieldType::Float => Value::from(0.0),
        FieldType::Decimal => Value::String(Decimal::ZERO.to_string()),
        FieldType::Text => Value::String(String::new()),
        FieldType::Bool => Value::Bool(false),
        FieldType::Timestamp => Value::String(format_timestamp(&DateTime::<Utc>::default())),
        FieldType::Duration => Value::String(NaiveTime::default().to_string()),
        FieldType::Uuid => Value::String(Uuid::nil().to_string()),
        FieldType::Bytes => Value::Array(Vec::new()),
        FieldType::Enum(variants) => variants
            .first()
            .map_or(Value::Null, |v| Value::String(v.to_string())),
    }
}

/// Join items with [`COLLECTION_DELIMITER`].
pub fn join_collection(items: &[String]) -> String {
    let mut delimiter = [0u8; 4];
    items.join(COLLECTION_DELIMITER.encode_utf8(&mut delimiter))
}

/// Split stored text on [`COLLECTION_DELIMITER`], dropping empty segments.
pub fn split_collection(stored: &str) -> Vec<String> {
    stored
        .split(COLLECTION_DELIMITER)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Fixed-width UTC form: sorts lexically and keeps nanoseconds.
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(column: &str, text: &str) -> Result<DateTime<Utc>> {
    // Same parser serde uses, so serialized extremes such as MIN_UTC come back
    if let Ok(t) = text.parse::<DateTime<Utc>>() {
        return Ok(t);
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| QueryError::codec(column, format!("invalid timestamp {}: {}", text, e)))
}

fn parse_time(column: &str, text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .map_err(|e| QueryError::codec(column, format!("invalid time {}: {}", text, e)))
}

fn parse_decimal(column: &str, text: &str) -> Result<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| QueryError::codec(column, format!("invalid decimal {}: {}", text, e)))
}

/// `value` rounded to [`DECIMAL_SCALE`] places as an integer of that unit.
fn scale_decimal(column: &str, value: Decimal) -> Result<i64> {
    let mut scaled = value.round_dp(DECIMAL_SCALE);
    scaled.rescale(DECIMAL_SCALE);
    i64::try_from(scaled.mantissa())
        .map_err(|_| QueryError::codec(column, format!("{} is out of range", value)))
}

fn float_value(n: f64) -> Option<Value> {
    Number::from_f64(n).map(Value::Number)
}

fn check_width(field: &FieldDescriptor, n: i64) -> Result<()> {
    let fits = match field.field_type {
        FieldType::Int8 => i8::try_from(n).is_ok(),
        FieldType::Int16 => i16::try_from(n).is_ok(),
        FieldType::Int32 => i32::try_from(n).is_ok(),
        _ => true,
    };
    if fits {
        Ok(())
    } else {
        Err(QueryError::codec(
            &field.name,
            format!("{} does not fit {}", n, field.field_type.name()),
        ))
    }
}
