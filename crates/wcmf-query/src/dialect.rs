//! SQL dialects: identifier quoting, placeholders, literals and the few
//! statements whose syntax differs between engines.

use wcmf_core::{DbType, Value, quote_ident, quote_ident_mysql};

/// SQL dialect for generating database-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// SQLite dialect (uses ?1, ?2 placeholders)
    #[default]
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    Postgres,
}

/// How a dialect advances a single-row sequence table and reads the value
/// it had before the advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceAdvance {
    /// One statement that updates and returns the previous value.
    Returning(String),
    /// An update that records the value in the session's last-insert-id,
    /// followed by a select reading it back.
    LastInsertId { update: String, select: String },
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => quote_ident(name),
            Dialect::Mysql => quote_ident_mysql(name),
        }
    }

    /// Quote `table.column`.
    pub fn qualified(self, table: &str, column: &str) -> String {
        format!(
            "{}.{}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Render a value as an inline SQL literal.
    ///
    /// Arrays render as a parenthesized list for use after `IN`.
    pub fn quote_literal(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match self {
                Dialect::Postgres => if *b { "TRUE" } else { "FALSE" }.to_string(),
                Dialect::Sqlite | Dialect::Mysql => if *b { "1" } else { "0" }.to_string(),
            },
            Value::Int(v) => v.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Decimal(s) => self.quote_string(s),
            Value::Text(s) => self.quote_string(s),
            Value::Json(j) => self.quote_string(&j.to_string()),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                match self {
                    Dialect::Postgres => format!("'\\x{}'", hex),
                    Dialect::Sqlite | Dialect::Mysql => format!("X'{}'", hex),
                }
            }
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.quote_literal(v)).collect();
                format!("({})", parts.join(", "))
            }
        }
    }

    fn quote_string(self, s: &str) -> String {
        let escaped = s.replace('\'', "''");
        match self {
            Dialect::Mysql => format!("'{}'", escaped.replace('\\', "\\\\")),
            Dialect::Sqlite | Dialect::Postgres => format!("'{}'", escaped),
        }
    }

    /// Render ` LIMIT n OFFSET m`; empty if neither is set.
    pub fn limit_clause(self, limit: Option<u64>, offset: Option<u64>) -> String {
        match (limit, offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                format!(" LIMIT {} OFFSET {}", limit, offset)
            }
            (Some(limit), _) => format!(" LIMIT {}", limit),
            (None, Some(offset)) if offset > 0 => match self {
                Dialect::Mysql => format!(" LIMIT 18446744073709551615 OFFSET {}", offset),
                Dialect::Sqlite => format!(" LIMIT -1 OFFSET {}", offset),
                Dialect::Postgres => format!(" OFFSET {}", offset),
            },
            _ => String::new(),
        }
    }

    /// Statement reading the current value of a sequence table.
    pub fn sequence_select(self, table: &str, column: &str) -> String {
        format!(
            "SELECT {} FROM {}",
            self.quote_identifier(column),
            self.quote_identifier(table)
        )
    }

    /// Statement inserting the seed row of a sequence table.
    pub fn sequence_seed(self, table: &str, column: &str, seed: i64) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_identifier(table),
            self.quote_identifier(column),
            seed
        )
    }

    /// Statements atomically advancing a sequence table by one.
    pub fn sequence_advance(self, table: &str, column: &str) -> SequenceAdvance {
        let t = self.quote_identifier(table);
        let c = self.quote_identifier(column);
        match self {
            Dialect::Mysql => SequenceAdvance::LastInsertId {
                update: format!("UPDATE {t} SET {c} = LAST_INSERT_ID({c} + 1)"),
                select: "SELECT LAST_INSERT_ID() - 1".to_string(),
            },
            Dialect::Sqlite | Dialect::Postgres => {
                SequenceAdvance::Returning(format!("UPDATE {t} SET {c} = {c} + 1 RETURNING {c} - 1"))
            }
        }
    }
}

impl From<DbType> for Dialect {
    fn from(db_type: DbType) -> Self {
        match db_type {
            DbType::Sqlite => Dialect::Sqlite,
            DbType::Mysql => Dialect::Mysql,
            DbType::Postgres => Dialect::Postgres,
        }
    }
}
