//! Statement builders for INSERT, UPDATE and DELETE.
//!
//! Every builder targets one physical table and matches rows by column
//! equality, which is all the mapper needs for primary key and foreign key
//! addressed writes.

use crate::dialect::Dialect;
use wcmf_core::Value;

fn push_where(
    dialect: Dialect,
    sql: &mut String,
    params: &mut Vec<Value>,
    conditions: &[(String, Value)],
) {
    if conditions.is_empty() {
        return;
    }
    let parts: Vec<String> = conditions
        .iter()
        .map(|(column, value)| {
            let column = dialect.quote_identifier(column);
            if value.is_null() {
                format!("{} IS NULL", column)
            } else {
                params.push(value.clone());
                format!("{} = {}", column, dialect.placeholder(params.len()))
            }
        })
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&parts.join(" AND "));
}

/// INSERT statement builder.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: String,
    values: Vec<(String, Value)>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Add a column value.
    pub fn value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.values.push((column.into(), value));
        self
    }

    /// Build the INSERT SQL and parameters.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let columns: Vec<String> = self
            .values
            .iter()
            .map(|(c, _)| dialect.quote_identifier(c))
            .collect();
        let placeholders: Vec<String> = (1..=self.values.len())
            .map(|i| dialect.placeholder(i))
            .collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            dialect.quote_identifier(&self.table),
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, self.values.iter().map(|(_, v)| v.clone()).collect())
    }
}

/// UPDATE statement builder.
#[derive(Debug, Clone)]
pub struct UpdateStatement {
    table: String,
    set: Vec<(String, Value)>,
    conditions: Vec<(String, Value)>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Set a column.
    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        self.set.push((column.into(), value));
        self
    }

    /// Match rows where `column` equals `value`.
    pub fn filter_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.conditions.push((column.into(), value));
        self
    }

    /// Whether there is anything to update.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Build the UPDATE SQL and parameters.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::with_capacity(self.set.len() + self.conditions.len());
        let mut set_clauses = Vec::with_capacity(self.set.len());
        for (column, value) in &self.set {
            params.push(value.clone());
            set_clauses.push(format!(
                "{} = {}",
                dialect.quote_identifier(column),
                dialect.placeholder(params.len())
            ));
        }
        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(&self.table),
            set_clauses.join(", ")
        );
        push_where(dialect, &mut sql, &mut params, &self.conditions);
        (sql, params)
    }
}

/// DELETE statement builder.
#[derive(Debug, Clone)]
pub struct DeleteStatement {
    table: String,
    conditions: Vec<(String, Value)>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: Vec::new(),
        }
    }

    /// Match rows where `column` equals `value`.
    pub fn filter_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.conditions.push((column.into(), value));
        self
    }

    /// Build the DELETE SQL and parameters.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(&self.table));
        let mut params = Vec::new();
        push_where(dialect, &mut sql, &mut params, &self.conditions);
        (sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_sqlite() {
        let (sql, params) = InsertStatement::new("wcmf_book")
            .value("id", Value::BigInt(1))
            .value("title", Value::from("Hamlet"))
            .build(Dialect::Sqlite);
        assert_eq!(
            sql,
            "INSERT INTO \"wcmf_book\" (\"id\", \"title\") VALUES (?1, ?2)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn update_numbers_where_after_set() {
        let (sql, params) = UpdateStatement::new("chapter")
            .set("fk_book_id", Value::Null)
            .filter_eq("id", Value::BigInt(9))
            .build(Dialect::Postgres);
        assert_eq!(
            sql,
            "UPDATE \"chapter\" SET \"fk_book_id\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(params, vec![Value::Null, Value::BigInt(9)]);
    }

    #[test]
    fn delete_mysql_composite_key() {
        let (sql, params) = DeleteStatement::new("book_author")
            .filter_eq("fk_book_id", Value::BigInt(1))
            .filter_eq("fk_author_id", Value::BigInt(2))
            .build(Dialect::Mysql);
        assert_eq!(
            sql,
            "DELETE FROM `book_author` WHERE `fk_book_id` = ? AND `fk_author_id` = ?"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn null_condition_renders_is_null() {
        let (sql, params) = DeleteStatement::new("t")
            .filter_eq("a", Value::Null)
            .build(Dialect::Sqlite);
        assert_eq!(sql, "DELETE FROM \"t\" WHERE \"a\" IS NULL");
        assert!(params.is_empty());
    }
}
