//! Conversion between application and storage representations.

use std::fmt;
use wcmf_core::{Result, Value};
use wcmf_schema::AttributeDescription;

/// Converts attribute values on their way to and from storage.
///
/// `to_storage` is applied to every non-primary-key value before it is
/// written; `from_storage` to every loaded value after type conversion.
pub trait DataConverter: Send + Sync + fmt::Debug {
    fn to_storage(&self, value: Value, attribute: &AttributeDescription) -> Result<Value>;

    fn from_storage(&self, value: Value, attribute: &AttributeDescription) -> Result<Value>;
}

/// Stores booleans as integers and structured values as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDataConverter;

impl DataConverter for DefaultDataConverter {
    fn to_storage(&self, value: Value, _attribute: &AttributeDescription) -> Result<Value> {
        Ok(match value {
            Value::Bool(b) => Value::Int(i32::from(b)),
            Value::Json(json) => Value::Text(json.to_string()),
            Value::Array(items) => {
                let json: Vec<serde_json::Value> = items.iter().map(to_json).collect();
                Value::Text(serde_json::Value::Array(json).to_string())
            }
            other => other,
        })
    }

    fn from_storage(&self, value: Value, attribute: &AttributeDescription) -> Result<Value> {
        attribute.convert(value)
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(v) => serde_json::Value::from(*v),
        Value::BigInt(v) => serde_json::Value::from(*v),
        Value::Double(v) => serde_json::Value::from(*v),
        Value::Json(j) => j.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        other => serde_json::Value::String(other.to_string()),
    }
}
