//! SQL type definitions and mapping.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Semantic attribute types known to the mapper.
///
/// Serialized as the SQL type name (`"VARCHAR(255)"`, `"DECIMAL(10, 2)"`,
/// `"TEXT"`), which is also how attribute descriptors spell it in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SqlType {
    Boolean,
    Integer,
    BigInt,
    Double,

    // Fixed precision
    Decimal { precision: u8, scale: u8 },

    // String types
    Char(u32),
    VarChar(u32),
    Text,

    Blob,

    // Date/time types, stored as ISO-8601 text
    Date,
    Time,
    DateTime,

    Json,
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Char(len) => format!("CHAR({})", len),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Json => "JSON".to_string(),
        }
    }

    /// Static label used in type errors.
    pub const fn type_label(&self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Double => "DOUBLE",
            SqlType::Decimal { .. } => "DECIMAL",
            SqlType::Char(_) => "CHAR",
            SqlType::VarChar(_) => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Blob => "BLOB",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::DateTime => "DATETIME",
            SqlType::Json => "JSON",
        }
    }

    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::Integer | SqlType::BigInt | SqlType::Double | SqlType::Decimal { .. }
        )
    }

    /// Check if this type is an integer type.
    pub const fn is_integer(&self) -> bool {
        matches!(self, SqlType::Integer | SqlType::BigInt)
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::Char(_) | SqlType::VarChar(_) | SqlType::Text)
    }

    /// Check if this type is a date/time type.
    pub const fn is_temporal(&self) -> bool {
        matches!(self, SqlType::Date | SqlType::Time | SqlType::DateTime)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_name())
    }
}

fn parse_len(args: &str, name: &str) -> Result<u32, Error> {
    args.trim()
        .parse()
        .map_err(|_| Error::Serde(format!("invalid length '{}' for {}", args, name)))
}

impl FromStr for SqlType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let (name, args) = match upper.find('(') {
            Some(open) if upper.ends_with(')') => (
                upper[..open].trim().to_string(),
                Some(upper[open + 1..upper.len() - 1].to_string()),
            ),
            _ => (upper.clone(), None),
        };
        let ty = match (name.as_str(), args) {
            ("BOOLEAN" | "BOOL", None) => SqlType::Boolean,
            ("INTEGER" | "INT", None) => SqlType::Integer,
            ("BIGINT", None) => SqlType::BigInt,
            ("DOUBLE" | "DOUBLE PRECISION" | "FLOAT" | "REAL", None) => SqlType::Double,
            ("DECIMAL" | "NUMERIC", None) => SqlType::Decimal {
                precision: 10,
                scale: 0,
            },
            ("DECIMAL" | "NUMERIC", Some(args)) => {
                let mut parts = args.split(',').map(str::trim);
                let precision = parts
                    .next()
                    .and_then(|p| p.parse().ok())
                    .ok_or_else(|| Error::Serde(format!("invalid decimal type '{}'", s)))?;
                let scale = match parts.next() {
                    Some(p) => p
                        .parse()
                        .map_err(|_| Error::Serde(format!("invalid decimal type '{}'", s)))?,
                    None => 0,
                };
                SqlType::Decimal { precision, scale }
            }
            ("CHAR", Some(args)) => SqlType::Char(parse_len(&args, "CHAR")?),
            ("VARCHAR", Some(args)) => SqlType::VarChar(parse_len(&args, "VARCHAR")?),
            ("VARCHAR", None) => SqlType::VarChar(255),
            ("TEXT" | "STRING", None) => SqlType::Text,
            ("BLOB" | "BINARY", None) => SqlType::Blob,
            ("DATE", None) => SqlType::Date,
            ("TIME", None) => SqlType::Time,
            ("DATETIME" | "TIMESTAMP", None) => SqlType::DateTime,
            ("JSON", None) => SqlType::Json,
            _ => return Err(Error::Serde(format!("unknown SQL type '{}'", s))),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for SqlType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SqlType> for String {
    fn from(value: SqlType) -> Self {
        value.sql_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_type_names() {
        assert_eq!("varchar(255)".parse::<SqlType>().unwrap(), SqlType::VarChar(255));
        assert_eq!("INT".parse::<SqlType>().unwrap(), SqlType::Integer);
        assert_eq!(
            "DECIMAL(10, 2)".parse::<SqlType>().unwrap(),
            SqlType::Decimal {
                precision: 10,
                scale: 2
            }
        );
        assert!("GEOMETRY".parse::<SqlType>().is_err());
        assert!("CHAR(x)".parse::<SqlType>().is_err());
    }

    #[test]
    fn serde_uses_sql_names() {
        let ty: SqlType = serde_json::from_str("\"TEXT\"").unwrap();
        assert_eq!(ty, SqlType::Text);
        assert_eq!(
            serde_json::to_string(&SqlType::VarChar(32)).unwrap(),
            "\"VARCHAR(32)\""
        );
    }

    #[test]
    fn classification() {
        assert!(SqlType::BigInt.is_integer());
        assert!(SqlType::Double.is_numeric());
        assert!(SqlType::Char(2).is_text());
        assert!(SqlType::Date.is_temporal());
        assert!(!SqlType::Json.is_text());
    }
}
