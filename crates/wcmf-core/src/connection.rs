//! Database connection traits and connection parameters.
//!
//! - [`Connection`] - synchronous trait for executing statements and
//!   controlling transactions on one physical database handle
//! - [`Driver`] - factory that opens a [`Connection`] for [`ConnectionParams`]
//! - [`ConnectionParams`] - the configured target database, including the
//!   table prefix applied to every mapped table

use crate::error::{ConnectionError, ConnectionErrorKind, Error, Result};
use crate::row::Row;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[default]
    Sqlite,
    Mysql,
    Postgres,
}

impl DbType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DbType::Sqlite => "sqlite",
            DbType::Mysql => "mysql",
            DbType::Postgres => "postgres",
        }
    }

    /// Whether this engine works on a local file and needs no host or user.
    pub const fn is_embedded(&self) -> bool {
        matches!(self, DbType::Sqlite)
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DbType::Sqlite),
            "mysql" | "mariadb" => Ok(DbType::Mysql),
            "postgres" | "postgresql" | "pgsql" => Ok(DbType::Postgres),
            other => Err(Error::config(format!("unknown database type '{}'", other))),
        }
    }
}

/// Connection parameters of one target database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionParams {
    /// Database engine
    pub db_type: DbType,
    /// Hostname (unused for SQLite)
    pub host: Option<String>,
    /// Optional port
    pub port: Option<u16>,
    /// Username
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
    /// Database name, or file path for SQLite (`:memory:` for in-memory)
    pub db_name: String,
    /// Prefix prepended to every table name
    pub table_prefix: String,
}

impl ConnectionParams {
    /// Create parameters for the given engine.
    pub fn new(db_type: DbType) -> Self {
        Self {
            db_type,
            ..Self::default()
        }
    }

    /// Parameters for an in-memory SQLite database.
    pub fn sqlite_memory() -> Self {
        Self::new(DbType::Sqlite).db_name(":memory:")
    }

    /// Set the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database name.
    pub fn db_name(mut self, db_name: impl Into<String>) -> Self {
        self.db_name = db_name.into();
        self
    }

    /// Set the table prefix.
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Key under which connections to the same database are shared.
    ///
    /// Composed of db type, host, user, password and database name.
    pub fn signature(&self) -> String {
        self.compose_signature(self.password.as_deref().unwrap_or(""))
    }

    /// The signature with the password masked, for logging.
    pub fn masked_signature(&self) -> String {
        let mask = if self.password.as_deref().is_some_and(|p| !p.is_empty()) {
            "***"
        } else {
            ""
        };
        self.compose_signature(mask)
    }

    fn compose_signature(&self, password: &str) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.db_type,
            self.host.as_deref().unwrap_or(""),
            self.user.as_deref().unwrap_or(""),
            password,
            self.db_name
        )
    }

    /// Check that all parameters the engine needs are present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.db_name.is_empty() {
            missing.push("db_name");
        }
        if !self.db_type.is_embedded() {
            if self.host.as_deref().is_none_or(str::is_empty) {
                missing.push("host");
            }
            if self.user.as_deref().is_none_or(str::is_empty) {
                missing.push("user");
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Incomplete,
                message: format!(
                    "incomplete connection parameters for {}: missing {}",
                    self.db_type,
                    missing.join(", ")
                ),
                source: None,
            }))
        }
    }
}

/// A synchronous database connection.
///
/// One instance wraps one physical handle. Implementations serialize access
/// internally, so the trait takes `&self` and connections are shared through
/// `Arc<dyn Connection>`.
pub trait Connection: Send + Sync {
    /// The engine behind this connection.
    fn db_type(&self) -> DbType;

    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Begin a transaction.
    fn begin(&self) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<()>;
}

/// Opens connections for one database engine.
pub trait Driver: Send + Sync {
    /// The engine this driver connects to.
    fn db_type(&self) -> DbType;

    /// Open a new connection.
    fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>>;
}
