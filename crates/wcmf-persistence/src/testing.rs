//! Connection doubles for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wcmf_core::{Connection, ConnectionParams, DbType, Driver, Result, Row, Value};

/// Records every statement and forwards it to an optional inner
/// connection. Without one, queries return no rows and statements affect
/// no rows.
pub(crate) struct RecordingConnection {
    inner: Option<Arc<dyn Connection>>,
    log: Mutex<Vec<String>>,
}

impl RecordingConnection {
    pub(crate) fn new() -> Self {
        Self {
            inner: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Record statements executed on an in-memory SQLite database.
    pub(crate) fn sqlite() -> Self {
        let inner = wcmf_sqlite::SqliteDriver
            .connect(&ConnectionParams::sqlite_memory())
            .unwrap();
        Self {
            inner: Some(inner),
            log: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, sql: &str) {
        self.log.lock().unwrap().push(sql.to_string());
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.log.lock().unwrap().clear();
    }

    /// Statements starting with `prefix`.
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|sql| sql.starts_with(prefix))
            .count()
    }
}

impl Connection for RecordingConnection {
    fn db_type(&self) -> DbType {
        DbType::Sqlite
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.record(sql);
        match &self.inner {
            Some(inner) => inner.query(sql, params),
            None => Ok(Vec::new()),
        }
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql);
        match &self.inner {
            Some(inner) => inner.execute(sql, params),
            None => Ok(0),
        }
    }

    fn begin(&self) -> Result<()> {
        self.record("BEGIN");
        self.inner.as_ref().map_or(Ok(()), |inner| inner.begin())
    }

    fn commit(&self) -> Result<()> {
        self.record("COMMIT");
        self.inner.as_ref().map_or(Ok(()), |inner| inner.commit())
    }

    fn rollback(&self) -> Result<()> {
        self.record("ROLLBACK");
        self.inner.as_ref().map_or(Ok(()), |inner| inner.rollback())
    }
}

/// Hands out one shared [`RecordingConnection`] and counts connects.
pub(crate) struct RecordingDriver {
    connection: Arc<RecordingConnection>,
    connects: AtomicUsize,
}

impl RecordingDriver {
    pub(crate) fn new(connection: RecordingConnection) -> Self {
        Self {
            connection: Arc::new(connection),
            connects: AtomicUsize::new(0),
        }
    }

    pub(crate) fn connection(&self) -> &Arc<RecordingConnection> {
        &self.connection
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Driver for RecordingDriver {
    fn db_type(&self) -> DbType {
        DbType::Sqlite
    }

    fn connect(&self, _params: &ConnectionParams) -> Result<Arc<dyn Connection>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let connection: Arc<dyn Connection> = self.connection.clone();
        Ok(connection)
    }
}
