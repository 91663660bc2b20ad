//! Core types and traits for the wCMF persistence layer.
//!
//! This crate provides the foundational abstractions every other crate builds on:
//!
//! - [`Value`] for dynamically-typed SQL values
//! - [`Row`] for query results with name-based access
//! - [`SqlType`] for the semantic type of a persistent attribute
//! - [`Connection`] and [`Driver`] for synchronous database access
//! - [`Error`] covering driver failures and the mapper error taxonomy

pub mod connection;
pub mod error;
pub mod identifiers;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{Connection, ConnectionParams, DbType, Driver};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, PERSISTENCE_ERROR_MESSAGE,
    PersistenceError, QueryError, QueryErrorKind, Result, TransactionError, TransactionErrorKind,
    TypeError,
};
pub use identifiers::{is_simple_identifier, quote_ident, quote_ident_mysql, to_storage_name};
pub use row::{ColumnInfo, FromValue, Row};
pub use types::SqlType;
pub use value::Value;
