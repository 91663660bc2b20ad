//! Connection registry.
//!
//! Mappers that talk to the same database share one connection and one
//! transaction flag. Both are keyed by the connection signature
//! (`db_type:host:user:password:db_name`), so begin/commit/rollback issued by
//! several mappers inside one logical transaction reach the database once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use wcmf_core::error::{ConnectionError, ConnectionErrorKind, PersistenceError};
use wcmf_core::{Connection, ConnectionParams, DbType, Driver, Error, Result};

/// Wrap an error raised by the driver into the generic persistence error,
/// logging the original together with the statement.
pub(crate) fn persistence_error(sql: Option<&str>, err: Error) -> Error {
    if matches!(err, Error::Persistence(_)) {
        return err;
    }
    tracing::error!(sql = sql.unwrap_or(""), error = %err, "database error");
    Error::Persistence(PersistenceError::from_driver(sql, err))
}

/// A connection shared by every mapper with the same signature.
pub struct SharedConnection {
    signature: String,
    connection: Arc<dyn Connection>,
    in_transaction: AtomicBool,
}

impl std::fmt::Debug for SharedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedConnection")
            .field("signature", &self.signature)
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}

impl SharedConnection {
    /// The signature with the password masked.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction.load(Ordering::SeqCst)
    }

    /// Begin a transaction unless one is already active.
    pub fn begin(&self) -> Result<()> {
        if self.in_transaction.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = self.connection.begin() {
            self.in_transaction.store(false, Ordering::SeqCst);
            return Err(persistence_error(Some("BEGIN"), e));
        }
        tracing::info!(signature = %self.signature, "transaction started");
        Ok(())
    }

    /// Commit the active transaction; a no-op without one.
    ///
    /// The transaction stays active when COMMIT fails, so a following
    /// [`rollback`](Self::rollback) still reaches the database.
    pub fn commit(&self) -> Result<()> {
        if !self.in_transaction() {
            return Ok(());
        }
        self.connection
            .commit()
            .map_err(|e| persistence_error(Some("COMMIT"), e))?;
        self.in_transaction.store(false, Ordering::SeqCst);
        tracing::info!(signature = %self.signature, "transaction committed");
        Ok(())
    }

    /// Roll back the active transaction; a no-op without one.
    ///
    /// The transaction counts as closed afterwards even if ROLLBACK fails.
    pub fn rollback(&self) -> Result<()> {
        if !self.in_transaction.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.connection
            .rollback()
            .map_err(|e| persistence_error(Some("ROLLBACK"), e))?;
        tracing::info!(signature = %self.signature, "transaction rolled back");
        Ok(())
    }
}

/// Opens connections through registered drivers and shares them by
/// signature.
#[derive(Default)]
pub struct ConnectionRegistry {
    drivers: HashMap<DbType, Arc<dyn Driver>>,
    connections: Mutex<HashMap<String, Arc<SharedConnection>>>,
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("connections", &self.open_connections())
            .finish()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the driver used for its database type.
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.register_driver(driver);
        self
    }

    pub fn register_driver(&mut self, driver: Arc<dyn Driver>) {
        self.drivers.insert(driver.db_type(), driver);
    }

    fn connections(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<SharedConnection>>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of open connections.
    pub fn open_connections(&self) -> usize {
        self.connections().len()
    }

    /// Return the connection for `params`, opening it on first use.
    ///
    /// Incomplete parameters and driver failures surface as
    /// [`Error::Persistence`].
    pub fn connect(&self, params: &ConnectionParams) -> Result<Arc<SharedConnection>> {
        let signature = params.signature();
        let mut connections = self.connections();
        if let Some(shared) = connections.get(&signature) {
            return Ok(Arc::clone(shared));
        }

        params.validate().map_err(|e| persistence_error(None, e))?;
        let driver = self.drivers.get(&params.db_type).ok_or_else(|| {
            persistence_error(
                None,
                Error::Connection(ConnectionError {
                    kind: ConnectionErrorKind::UnsupportedDriver,
                    message: format!("no driver registered for {}", params.db_type),
                    source: None,
                }),
            )
        })?;
        let connection = driver
            .connect(params)
            .map_err(|e| persistence_error(None, e))?;

        let shared = Arc::new(SharedConnection {
            signature: params.masked_signature(),
            connection,
            in_transaction: AtomicBool::new(false),
        });
        tracing::info!(signature = %shared.signature, "connection opened");
        connections.insert(signature, Arc::clone(&shared));
        Ok(shared)
    }

    pub fn begin_transaction(&self, params: &ConnectionParams) -> Result<()> {
        self.connect(params)?.begin()
    }

    pub fn commit_transaction(&self, params: &ConnectionParams) -> Result<()> {
        self.connect(params)?.commit()
    }

    pub fn rollback_transaction(&self, params: &ConnectionParams) -> Result<()> {
        self.connect(params)?.rollback()
    }

    /// Whether a transaction is active on the connection for `params`.
    pub fn in_transaction(&self, params: &ConnectionParams) -> bool {
        self.connections()
            .get(&params.signature())
            .is_some_and(|shared| shared.in_transaction())
    }

    /// Drop the connection for `params`.
    pub fn close(&self, params: &ConnectionParams) {
        if self.connections().remove(&params.signature()).is_some() {
            tracing::info!(signature = %params.masked_signature(), "connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingConnection, RecordingDriver};
    use wcmf_core::PERSISTENCE_ERROR_MESSAGE;

    fn registry() -> (ConnectionRegistry, Arc<RecordingDriver>) {
        let driver = Arc::new(RecordingDriver::new(RecordingConnection::new()));
        let registry = ConnectionRegistry::new().with_driver(driver.clone());
        (registry, driver)
    }

    #[test]
    fn connections_are_shared_by_signature() {
        let (registry, driver) = registry();
        let params = ConnectionParams::sqlite_memory();
        let a = registry.connect(&params).unwrap();
        let b = registry.connect(&params.clone().table_prefix("wcmf_")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(driver.connects(), 1);

        registry
            .connect(&ConnectionParams::new(DbType::Sqlite).db_name("other.db"))
            .unwrap();
        assert_eq!(registry.open_connections(), 2);
    }

    #[test]
    fn begin_and_commit_are_idempotent() {
        let (registry, driver) = registry();
        let params = ConnectionParams::sqlite_memory();

        registry.commit_transaction(&params).unwrap();
        registry.begin_transaction(&params).unwrap();
        registry.begin_transaction(&params).unwrap();
        assert!(registry.in_transaction(&params));
        registry.commit_transaction(&params).unwrap();
        registry.commit_transaction(&params).unwrap();
        registry.rollback_transaction(&params).unwrap();

        let log = driver.connection().statements();
        assert_eq!(log, vec!["BEGIN".to_string(), "COMMIT".to_string()]);
        assert!(!registry.in_transaction(&params));
    }

    #[test]
    fn incomplete_parameters_fail_with_generic_message() {
        let (registry, _) = registry();
        let err = registry
            .connect(&ConnectionParams::new(DbType::Sqlite))
            .unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert_eq!(err.to_string(), PERSISTENCE_ERROR_MESSAGE);
    }

    #[test]
    fn missing_driver() {
        let (registry, _) = registry();
        let params = ConnectionParams::new(DbType::Postgres)
            .host("db")
            .user("wcmf")
            .db_name("cms");
        assert!(matches!(registry.connect(&params), Err(Error::Persistence(_))));
    }
}
