//! [`Driver`] entry point used by the connection registry.

use crate::connection::{SqliteConfig, SqliteConnection};
use std::sync::Arc;
use wcmf_core::error::{ConnectionError, ConnectionErrorKind};
use wcmf_core::{Connection, ConnectionParams, DbType, Driver, Error, Result};

/// Opens [`SqliteConnection`]s. `db_name` is the database file path, or
/// `:memory:`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn db_type(&self) -> DbType {
        DbType::Sqlite
    }

    fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Connection>> {
        if params.db_type != DbType::Sqlite {
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::UnsupportedDriver,
                message: format!("sqlite driver cannot open {} connections", params.db_type),
                source: None,
            }));
        }
        params.validate()?;
        let conn = SqliteConnection::open(&SqliteConfig::file(params.db_name.clone()))?;
        Ok(Arc::new(conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connects_to_memory_database() {
        let conn = SqliteDriver.connect(&ConnectionParams::sqlite_memory()).unwrap();
        assert_eq!(conn.db_type(), DbType::Sqlite);
        assert_eq!(conn.query("SELECT 1 AS one", &[]).unwrap().len(), 1);
    }

    #[test]
    fn rejects_other_engines() {
        let params = ConnectionParams::new(DbType::Mysql)
            .host("localhost")
            .user("root")
            .db_name("cms");
        let err = SqliteDriver.connect(&params).err().expect("expected connect to fail");
        assert!(matches!(
            err,
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::UnsupportedDriver,
                ..
            })
        ));
    }

    #[test]
    fn rejects_empty_path() {
        let params = ConnectionParams::new(DbType::Sqlite);
        assert!(SqliteDriver.connect(&params).is_err());
    }
}
