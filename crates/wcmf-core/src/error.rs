//! Error types for wCMF persistence operations.

use std::fmt;

/// Message handed to callers when a driver error is converted at the point of
/// execution. The original error is logged and kept as `source`.
pub const PERSISTENCE_ERROR_MESSAGE: &str =
    "Error executing database statement. See log file for details.";

/// The primary error type for all wCMF operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect, disconnect)
    Connection(ConnectionError),
    /// Query execution errors raised by a driver
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Malformed or unsupported caller input
    IllegalArgument(String),
    /// Driver failure surfaced through a mapper
    Persistence(PersistenceError),
    /// Configuration errors
    Config(ConfigError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection parameters are incomplete
    Incomplete,
    /// No driver registered for the database type
    UnsupportedDriver,
    /// Connection lost during operation
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Database is locked or busy
    Busy,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Begin failed
    Begin,
    /// Commit failed
    Commit,
    /// Rollback failed
    Rollback,
}

/// A driver error converted at the mapper boundary.
///
/// `Display` renders only the generic message; the statement and the driver
/// error stay available for inspection.
#[derive(Debug)]
pub struct PersistenceError {
    pub message: String,
    pub sql: Option<String>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl PersistenceError {
    /// Wrap a driver error raised while executing `sql`.
    pub fn from_driver(sql: Option<&str>, err: Error) -> Self {
        Self {
            message: PERSISTENCE_ERROR_MESSAGE.to_string(),
            sql: sql.map(str::to_string),
            source: Some(Box::new(err)),
        }
    }

    /// Create a persistence error with a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql: None,
            source: None,
        }
    }
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

impl Error {
    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::Connection(c) => matches!(
                c.kind,
                ConnectionErrorKind::Connect | ConnectionErrorKind::Disconnected
            ),
            _ => false,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            Error::Persistence(p) => p.sql.as_deref(),
            _ => None,
        }
    }

    /// Shorthand for an [`Error::IllegalArgument`].
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Error::IllegalArgument(message.into())
    }

    /// Shorthand for an [`Error::Config`] without a source.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(message))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::IllegalArgument(msg) => write!(f, "Illegal argument: {}", msg),
            Error::Persistence(e) => write!(f, "{}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Persistence(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<PersistenceError> for Error {
    fn from(err: PersistenceError) -> Self {
        Error::Persistence(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for wCMF operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_error_hides_driver_message() {
        let driver = Error::Query(QueryError {
            kind: QueryErrorKind::Syntax,
            sql: Some("SELEC 1".to_string()),
            message: "near \"SELEC\": syntax error".to_string(),
            source: None,
        });
        let err = Error::Persistence(PersistenceError::from_driver(Some("SELEC 1"), driver));

        assert_eq!(err.to_string(), PERSISTENCE_ERROR_MESSAGE);
        assert_eq!(err.sql(), Some("SELEC 1"));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("syntax error"));
    }

    #[test]
    fn connection_flags() {
        let lost = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message: "lost connection".to_string(),
            source: None,
        });
        assert!(lost.is_connection_error());

        let incomplete = Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Incomplete,
            message: "missing host".to_string(),
            source: None,
        });
        assert!(!incomplete.is_connection_error());
    }

    #[test]
    fn display_variants() {
        assert_eq!(
            Error::illegal_argument("bad depth").to_string(),
            "Illegal argument: bad depth"
        );
        assert_eq!(
            Error::config("no sequence").to_string(),
            "Configuration error: no sequence"
        );
        let type_err = Error::Type(TypeError {
            expected: "INTEGER",
            actual: "TEXT".to_string(),
            column: Some("year".to_string()),
            rust_type: None,
        });
        assert_eq!(
            type_err.to_string(),
            "Type error in column 'year': expected INTEGER, found TEXT"
        );
    }
}
