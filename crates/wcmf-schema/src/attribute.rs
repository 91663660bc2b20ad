//! Attribute metadata.

use serde::{Deserialize, Serialize};
use wcmf_core::{Result, SqlType, Value};

/// One named value of a persistent type and the column storing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescription {
    pub name: String,
    /// Storage column; defaults to the attribute name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(rename = "type")]
    pub sql_type: SqlType,
    /// Value applied when an object is created
    #[serde(default, with = "json_default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_primary_key: bool,
    /// Derived attributes are computed by the application and never stored
    #[serde(default)]
    pub is_derived: bool,
}

impl AttributeDescription {
    /// Create a stored attribute named `name`.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            column: None,
            sql_type,
            default_value: None,
            tags: Vec::new(),
            is_primary_key: false,
            is_derived: false,
        }
    }

    /// Create a primary key attribute of type BIGINT.
    pub fn primary_key(name: impl Into<String>) -> Self {
        let mut attr = Self::new(name, SqlType::BigInt);
        attr.is_primary_key = true;
        attr
    }

    /// Store in `column` instead of a column named like the attribute.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn derived(mut self) -> Self {
        self.is_derived = true;
        self
    }

    /// The storage column.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Convert a stored or caller supplied value to this attribute's type.
    #[allow(clippy::result_large_err)]
    pub fn convert(&self, value: Value) -> Result<Value> {
        value.convert_to(&self.sql_type).map_err(|e| match e {
            wcmf_core::Error::Type(mut te) => {
                te.column = Some(self.column_name().to_string());
                wcmf_core::Error::Type(te)
            }
            other => other,
        })
    }
}

/// Attribute defaults are written as plain JSON (`"draft"`, `0`, `true`).
mod json_default {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use wcmf_core::Value;

    pub fn serialize<S: Serializer>(value: &Option<Value>, serializer: S) -> Result<S::Ok, S::Error> {
        value.as_ref().map(to_json).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
        let json = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(json.map(from_json))
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

    fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::BigInt(i),
                None => Value::Double(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}
