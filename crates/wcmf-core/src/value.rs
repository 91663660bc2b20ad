//! Dynamic SQL values.

use crate::error::{Error, TypeError};
use crate::types::SqlType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically-typed SQL value.
///
/// This enum represents every value a persistent attribute can hold and is
/// used for parameter binding, result fetching and attribute storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),

    /// Arbitrary precision decimal (stored as string)
    Decimal(String),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// JSON value
    Json(serde_json::Value),

    /// Array of values, rendered as an `IN (...)` list in criteria
    Array(Vec<Value>),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            Value::Text(s) => match s.as_str() {
                "1" | "true" => Some(true),
                "0" | "false" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            Value::Text(s) | Value::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Decimal(s) | Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Convert a `u64` to `Value`, clamping to `i64::MAX` if it overflows.
    ///
    /// A warning is logged when clamping occurs.
    ///
    /// ```
    /// use wcmf_core::Value;
    ///
    /// assert_eq!(Value::from_u64_clamped(42), Value::BigInt(42));
    /// assert_eq!(Value::from_u64_clamped(u64::MAX), Value::BigInt(i64::MAX));
    /// ```
    #[must_use]
    pub fn from_u64_clamped(v: u64) -> Self {
        if let Ok(signed) = i64::try_from(v) {
            Value::BigInt(signed)
        } else {
            tracing::warn!(
                value = v,
                clamped_to = i64::MAX,
                "u64 value exceeds i64::MAX; clamping to i64::MAX"
            );
            Value::BigInt(i64::MAX)
        }
    }

    /// Convert this value into the representation declared by `sql_type`.
    ///
    /// Drivers return the storage class of a column (SQLite hands back every
    /// integer as `Int`/`BigInt`, booleans as integers, JSON as text); this
    /// brings a loaded value back to the attribute's semantic type. NULL stays
    /// NULL for every type.
    #[allow(clippy::result_large_err, clippy::cast_possible_truncation)]
    pub fn convert_to(self, sql_type: &SqlType) -> crate::Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let mismatch = |value: &Value| {
            Error::Type(TypeError {
                expected: sql_type.type_label(),
                actual: value.type_name().to_string(),
                column: None,
                rust_type: None,
            })
        };
        match sql_type {
            SqlType::Boolean => self.as_bool().map(Value::Bool).ok_or_else(|| mismatch(&self)),
            SqlType::Integer => match self.as_i64() {
                Some(v) => i32::try_from(v)
                    .map(Value::Int)
                    .or(Ok(Value::BigInt(v))),
                None => Err(mismatch(&self)),
            },
            SqlType::BigInt => self.as_i64().map(Value::BigInt).ok_or_else(|| mismatch(&self)),
            SqlType::Double => self.as_f64().map(Value::Double).ok_or_else(|| mismatch(&self)),
            SqlType::Decimal { .. } => match self {
                Value::Decimal(s) | Value::Text(s) => Ok(Value::Decimal(s)),
                Value::Int(v) => Ok(Value::Decimal(v.to_string())),
                Value::BigInt(v) => Ok(Value::Decimal(v.to_string())),
                Value::Double(v) => Ok(Value::Decimal(v.to_string())),
                other => Err(mismatch(&other)),
            },
            SqlType::Char(_)
            | SqlType::VarChar(_)
            | SqlType::Text
            | SqlType::Date
            | SqlType::Time
            | SqlType::DateTime => match self {
                Value::Text(s) | Value::Decimal(s) => Ok(Value::Text(s)),
                Value::Bytes(b) => Ok(Value::Text(String::from_utf8_lossy(&b).into_owned())),
                Value::Json(_) | Value::Array(_) => Err(mismatch(&self)),
                other => Ok(Value::Text(other.to_string())),
            },
            SqlType::Blob => match self {
                Value::Bytes(b) => Ok(Value::Bytes(b)),
                Value::Text(s) => Ok(Value::Bytes(s.into_bytes())),
                other => Err(mismatch(&other)),
            },
            SqlType::Json => match self {
                Value::Json(j) => Ok(Value::Json(j)),
                Value::Text(s) => serde_json::from_str(&s)
                    .map(Value::Json)
                    .map_err(|e| Error::Serde(e.to_string())),
                other => Err(mismatch(&other)),
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(s) | Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "[BLOB: {} bytes]", b.len()),
            Value::Json(j) => write!(f, "{}", j),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

/// Convert a `Vec<String>` into a `Value::Array`.
impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Array(v.into_iter().map(Value::Text).collect())
    }
}

/// Convert a `Vec<i64>` into a `Value::Array`.
impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Array(v.into_iter().map(Value::BigInt).collect())
    }
}

/// Convert a `u64` to `Value`, returning an error if the value exceeds `i64::MAX`.
impl TryFrom<u64> for Value {
    type Error = Error;

    fn try_from(v: u64) -> Result<Self, Self::Error> {
        i64::try_from(v).map(Value::BigInt).map_err(|_| {
            Error::Type(TypeError {
                expected: "u64 <= i64::MAX",
                actual: format!("u64 value {} exceeds i64::MAX ({})", v, i64::MAX),
                column: None,
                rust_type: Some("u64"),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_primitives() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7_i32), Value::Int(7));
        assert_eq!(Value::from(7_i64), Value::BigInt(7));
        assert_eq!(Value::from("x"), Value::Text("x".to_string()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
    }

    #[test]
    fn test_try_from_u64_overflow_error() {
        assert!(Value::try_from(u64::MAX).is_err());
        assert_eq!(Value::try_from(5_u64).unwrap(), Value::BigInt(5));
    }

    #[test]
    fn test_as_i64() {
        assert_eq!(Value::Int(3).as_i64(), Some(3));
        assert_eq!(Value::Text("12".into()).as_i64(), Some(12));
        assert_eq!(Value::Text("abc".into()).as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
    }

    #[test]
    fn test_convert_boolean_from_storage_integer() {
        let v = Value::Int(1).convert_to(&SqlType::Boolean).unwrap();
        assert_eq!(v, Value::Bool(true));
        let v = Value::BigInt(0).convert_to(&SqlType::Boolean).unwrap();
        assert_eq!(v, Value::Bool(false));
    }

    #[test]
    fn test_convert_integer_widths() {
        assert_eq!(
            Value::BigInt(1603).convert_to(&SqlType::Integer).unwrap(),
            Value::Int(1603)
        );
        assert_eq!(
            Value::Int(5).convert_to(&SqlType::BigInt).unwrap(),
            Value::BigInt(5)
        );
        assert_eq!(
            Value::BigInt(i64::MAX).convert_to(&SqlType::Integer).unwrap(),
            Value::BigInt(i64::MAX)
        );
    }

    #[test]
    fn test_convert_json_from_text() {
        let v = Value::Text("{\"a\":1}".into())
            .convert_to(&SqlType::Json)
            .unwrap();
        assert_eq!(v, Value::Json(serde_json::json!({"a": 1})));
    }

    #[test]
    fn test_convert_null_passes_through() {
        assert_eq!(Value::Null.convert_to(&SqlType::Integer).unwrap(), Value::Null);
    }

    #[test]
    fn test_convert_mismatch() {
        let err = Value::Text("abc".into()).convert_to(&SqlType::Integer);
        assert!(matches!(err, Err(Error::Type(_))));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Int(4).to_string(), "4");
        assert_eq!(Value::Text("a".into()).to_string(), "a");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
    }
}
