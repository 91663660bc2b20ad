//! Object identifiers.
//!
//! An [`ObjectId`] is a type name plus the ordered primary key values of one
//! object. Objects that were created but not yet inserted carry a dummy id
//! whose key values are `wcmf`-prefixed placeholders.

use regex::Regex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use wcmf_core::{Error, Result, Value};

const DUMMY_PREFIX: &str = "wcmf";

static DUMMY_COUNTER: AtomicU64 = AtomicU64::new(0);

fn oid_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_.]*)((?::[^:]+)+)$").unwrap_or_else(|e| {
            unreachable!("object id pattern is valid: {e}")
        })
    })
}

fn dummy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^wcmf[0-9a-f]{16}$")
            .unwrap_or_else(|e| unreachable!("dummy id pattern is valid: {e}"))
    })
}

/// Whether `value` is a placeholder key of a dummy id.
pub fn is_dummy_value(value: &Value) -> bool {
    matches!(value, Value::Text(s) if dummy_pattern().is_match(s))
}

/// Identifier of a persistent object.
#[derive(Debug, Clone)]
pub struct ObjectId {
    type_name: String,
    ids: Vec<Value>,
}

impl ObjectId {
    /// Create an object id. Integer key values are normalized to `BigInt`
    /// so ids built from rows, strings and literals compare equal.
    pub fn new(type_name: impl Into<String>, ids: Vec<Value>) -> Self {
        let ids = ids
            .into_iter()
            .map(|v| match v {
                Value::Int(i) => Value::BigInt(i64::from(i)),
                other => other,
            })
            .collect();
        Self {
            type_name: type_name.into(),
            ids,
        }
    }

    /// Create an id for an object that has not been inserted yet.
    pub fn dummy(type_name: impl Into<String>, pk_count: usize) -> Self {
        let ids = (0..pk_count.max(1))
            .map(|_| {
                let n = DUMMY_COUNTER.fetch_add(1, Ordering::Relaxed);
                Value::Text(format!("{}{:016x}", DUMMY_PREFIX, n))
            })
            .collect();
        Self {
            type_name: type_name.into(),
            ids,
        }
    }

    /// Parse `Type:1` or `Type:1:2`. Segments that look like integers
    /// become integer key values.
    pub fn parse(s: &str) -> Result<Self> {
        let captures = oid_pattern()
            .captures(s)
            .ok_or_else(|| Error::illegal_argument(format!("invalid object id '{}'", s)))?;
        let type_name = captures.get(1).map_or("", |m| m.as_str());
        let ids = captures
            .get(2)
            .map_or("", |m| m.as_str())
            .split(':')
            .skip(1)
            .map(|segment| match segment.parse::<i64>() {
                Ok(i) => Value::BigInt(i),
                Err(_) => Value::Text(segment.to_string()),
            })
            .collect();
        Ok(Self::new(type_name, ids))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Primary key values in declaration order.
    pub fn ids(&self) -> &[Value] {
        &self.ids
    }

    /// The first primary key value.
    pub fn first_id(&self) -> &Value {
        self.ids.first().unwrap_or(&Value::Null)
    }

    /// Whether this id belongs to an object that was never inserted.
    pub fn is_dummy(&self) -> bool {
        self.ids.iter().any(is_dummy_value)
    }

    /// Same key values under another type name.
    pub fn with_type(&self, type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ids: self.ids.clone(),
        }
    }
}

impl PartialEq for ObjectId {
    fn eq(&self, other: &Self) -> bool {
        self.type_name == other.type_name && self.ids == other.ids
    }
}

impl Eq for ObjectId {}

impl Hash for ObjectId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.hash(state);
        self.ids.len().hash(state);
        for id in &self.ids {
            id.type_name().hash(state);
            id.to_string().hash(state);
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name)?;
        for id in &self.ids {
            write!(f, ":{}", id)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
