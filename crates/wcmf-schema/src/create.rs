//! CREATE TABLE statement builder.

use crate::persistent_type::PersistentType;
use wcmf_core::SqlType;
use wcmf_query::Dialect;

/// Builder for the CREATE TABLE statement of one persistent type.
#[derive(Debug)]
pub struct CreateTable<'a> {
    ty: &'a PersistentType,
    prefix: String,
    if_not_exists: bool,
}

impl<'a> CreateTable<'a> {
    pub fn new(ty: &'a PersistentType) -> Self {
        Self {
            ty,
            prefix: String::new(),
            if_not_exists: false,
        }
    }

    /// Table prefix from the connection parameters.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Add IF NOT EXISTS clause.
    pub fn if_not_exists(mut self) -> Self {
        self.if_not_exists = true;
        self
    }

    /// Build the CREATE TABLE SQL.
    pub fn build(&self, dialect: Dialect) -> String {
        let mut sql = String::from("CREATE TABLE ");
        if self.if_not_exists {
            sql.push_str("IF NOT EXISTS ");
        }
        sql.push_str(&dialect.quote_identifier(&self.ty.table_name(&self.prefix)));
        sql.push_str(" (\n  ");

        let mut parts: Vec<String> = self
            .ty
            .stored_attributes()
            .map(|attr| {
                let mut def = format!(
                    "{} {}",
                    dialect.quote_identifier(attr.column_name()),
                    column_type(dialect, &attr.sql_type)
                );
                if attr.is_primary_key {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();

        let pk: Vec<String> = self
            .ty
            .pk_attributes()
            .map(|a| dialect.quote_identifier(a.column_name()))
            .collect();
        if !pk.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }

        sql.push_str(&parts.join(",\n  "));
        sql.push_str("\n)");
        sql
    }
}

/// CREATE TABLE statement of a single-column sequence table.
pub fn create_sequence_table(dialect: Dialect, table: &str, column: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({} {} NOT NULL)",
        dialect.quote_identifier(table),
        dialect.quote_identifier(column),
        column_type(dialect, &SqlType::BigInt)
    )
}

/// Column type for `sql_type` in `dialect`.
pub fn column_type(dialect: Dialect, sql_type: &SqlType) -> String {
    match dialect {
        Dialect::Sqlite => match sql_type {
            SqlType::Boolean | SqlType::Integer | SqlType::BigInt => "INTEGER".to_string(),
            SqlType::Double => "REAL".to_string(),
            SqlType::Decimal { .. } => "NUMERIC".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            _ => "TEXT".to_string(),
        },
        Dialect::Mysql => match sql_type {
            SqlType::Boolean => "TINYINT(1)".to_string(),
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Blob => "LONGBLOB".to_string(),
            SqlType::Text => "LONGTEXT".to_string(),
            other => other.sql_name(),
        },
        Dialect::Postgres => match sql_type {
            SqlType::Blob => "BYTEA".to_string(),
            SqlType::DateTime => "TIMESTAMP".to_string(),
            SqlType::Json => "JSONB".to_string(),
            other => other.sql_name(),
        },
    }
}
