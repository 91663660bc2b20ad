//! ORDER BY clause.

use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};
use wcmf_core::{Error, Result};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

/// One sort key, naming an attribute rather than a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub attribute: String,
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Create an ascending order by clause.
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order by clause.
    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            direction: OrderDirection::Desc,
        }
    }

    /// Parse `"title"`, `"title ASC"` or `"title DESC"`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let attribute = parts
            .next()
            .ok_or_else(|| Error::illegal_argument("empty order by definition"))?;
        let direction = match parts.next().map(str::to_ascii_uppercase).as_deref() {
            None | Some("ASC") => OrderDirection::Asc,
            Some("DESC") => OrderDirection::Desc,
            Some(other) => {
                return Err(Error::illegal_argument(format!(
                    "invalid sort direction '{}' in '{}'",
                    other, s
                )));
            }
        };
        if parts.next().is_some() {
            return Err(Error::illegal_argument(format!(
                "invalid order by definition '{}'",
                s
            )));
        }
        Ok(Self {
            attribute: attribute.to_string(),
            direction,
        })
    }

    /// Parse a comma separated list such as `"sortkey DESC, title"`.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Generate SQL for this ORDER BY key once the attribute is resolved.
    pub fn to_sql(&self, dialect: Dialect, table: &str, column: &str) -> String {
        let mut sql = dialect.qualified(table, column);
        sql.push_str(match self.direction {
            OrderDirection::Asc => " ASC",
            OrderDirection::Desc => " DESC",
        });
        sql
    }
}
