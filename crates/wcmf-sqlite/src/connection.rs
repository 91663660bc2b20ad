//! SQLite connection implementation.
//!
//! [`SqliteConnection`] wraps one `sqlite3` handle behind a mutex and
//! implements the synchronous [`Connection`] trait of wcmf-core.

// FFI code has to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::types;
use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use wcmf_core::error::{
    ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind, TransactionError,
    TransactionErrorKind,
};
use wcmf_core::{ColumnInfo, Connection, DbType, Error, Result, Row, Value};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for an in-memory database.
    pub path: String,
    /// Open flags
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Interpret the path as a URI.
    pub uri: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
}

impl OpenFlags {
    /// Flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Flags for read-write access, creating the database if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;
        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::file(":memory:")
    }
}

impl SqliteConfig {
    /// Config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }

    /// Config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
}

impl SqliteInner {
    /// SQLite leaves autocommit mode while a transaction is open, including
    /// one whose COMMIT failed.
    fn in_transaction(&self) -> bool {
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_get_autocommit(self.db) == 0 }
    }
}

// SAFETY: the handle is only used while holding the connection mutex
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str())
            .map_err(|_| connect_error("Invalid path: contains null byte".to_string()))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: valid pointers, return code is checked
        let rc = unsafe {
            ffi::sqlite3_open_v2(
                c_path.as_ptr(),
                &mut db,
                config.flags.to_sqlite_flags(),
                ptr::null(),
            )
        };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is a handle returned by sqlite3_open_v2
                unsafe {
                    let msg = error_message(db);
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            };
            tracing::warn!(path = %config.path, error = %msg, "sqlite open failed");
            return Err(connect_error(format!("Failed to open database: {}", msg)));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(
                    db,
                    c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX),
                );
            }
        }

        tracing::debug!(path = %config.path, "sqlite connection opened");
        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// The database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.lock().in_transaction()
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_transaction(&self, sql: &str, open: bool, kind: TransactionErrorKind) -> Result<()> {
        let inner = self.lock();
        if inner.in_transaction() == open {
            let message = if open {
                "Already in a transaction"
            } else {
                "Not in a transaction"
            };
            return Err(Error::Transaction(TransactionError {
                kind,
                message: message.to_string(),
            }));
        }
        exec(inner.db, sql)?;
        tracing::debug!(path = %self.path, statement = sql, "sqlite transaction");
        Ok(())
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !inner.db.is_null() {
            // SAFETY: db is valid and no statement outlives a call
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
            inner.db = ptr::null_mut();
        }
    }
}

impl Connection for SqliteConnection {
    fn db_type(&self) -> DbType {
        DbType::Sqlite
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::trace!(sql, params = params.len(), "sqlite query");
        let inner = self.lock();
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind(params)?;

        let col_count = stmt.column_count();
        let names = (0..col_count)
            // SAFETY: stmt is valid, index is in range
            .map(|i| unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{}", i)))
            .collect();
        let columns = Arc::new(ColumnInfo::new(names));

        let mut rows = Vec::new();
        while stmt.step()? {
            let values = (0..col_count)
                // SAFETY: stmt just returned SQLITE_ROW
                .map(|i| unsafe { types::read_column(stmt.raw, i) })
                .collect();
            rows.push(Row::with_columns(Arc::clone(&columns), values));
        }
        Ok(rows)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::trace!(sql, params = params.len(), "sqlite execute");
        let inner = self.lock();
        run(inner.db, sql, params)
    }

    fn begin(&self) -> Result<()> {
        self.set_transaction("BEGIN", true, TransactionErrorKind::Begin)
    }

    fn commit(&self) -> Result<()> {
        self.set_transaction("COMMIT", false, TransactionErrorKind::Commit)
    }

    fn rollback(&self) -> Result<()> {
        self.set_transaction("ROLLBACK", false, TransactionErrorKind::Rollback)
    }
}

/// A prepared statement, finalized on drop.
struct Statement {
    db: *mut ffi::sqlite3,
    raw: *mut ffi::sqlite3_stmt,
    sql: String,
}

impl Statement {
    fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<Self> {
        let c_sql = CString::new(sql).map_err(|_| {
            query_error(
                QueryErrorKind::Syntax,
                sql,
                "SQL contains null byte".to_string(),
            )
        })?;
        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: all pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut raw,
                ptr::null_mut(),
            )
        };
        if rc != ffi::SQLITE_OK {
            return Err(last_error(db, sql));
        }
        Ok(Self {
            db,
            raw,
            sql: sql.to_string(),
        })
    }

    fn bind(&self, params: &[Value]) -> Result<()> {
        // SAFETY: raw is valid
        let expected = unsafe { ffi::sqlite3_bind_parameter_count(self.raw) };
        if usize::try_from(expected).unwrap_or(0) != params.len() {
            return Err(query_error(
                QueryErrorKind::Database,
                &self.sql,
                format!("expected {} parameters, got {}", expected, params.len()),
            ));
        }
        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1).unwrap_or(c_int::MAX);
            // SAFETY: raw is valid, index is 1-based and in range
            let rc = unsafe { types::bind_value(self.raw, index, param) };
            if rc != ffi::SQLITE_OK {
                let err = last_error(self.db, &self.sql);
                return Err(query_error(
                    QueryErrorKind::Database,
                    &self.sql,
                    format!("Failed to bind parameter {}: {}", i + 1, err),
                ));
            }
        }
        Ok(())
    }

    fn column_count(&self) -> c_int {
        // SAFETY: raw is valid
        unsafe { ffi::sqlite3_column_count(self.raw) }
    }

    /// Advance to the next row. Returns false once the statement is done.
    fn step(&self) -> Result<bool> {
        // SAFETY: raw is valid
        match unsafe { ffi::sqlite3_step(self.raw) } {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            _ => Err(last_error(self.db, &self.sql)),
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: raw was returned by sqlite3_prepare_v2 and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}

fn run(db: *mut ffi::sqlite3, sql: &str, params: &[Value]) -> Result<u64> {
    let stmt = Statement::prepare(db, sql)?;
    stmt.bind(params)?;
    while stmt.step()? {}
    drop(stmt);
    // SAFETY: db is valid
    let changes = unsafe { ffi::sqlite3_changes(db) };
    Ok(u64::try_from(changes).unwrap_or(0))
}

fn exec(db: *mut ffi::sqlite3, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql).map_err(|_| {
        query_error(
            QueryErrorKind::Syntax,
            sql,
            "SQL contains null byte".to_string(),
        )
    })?;
    let mut errmsg: *mut c_char = ptr::null_mut();
    // SAFETY: all pointers are valid
    let rc = unsafe {
        ffi::sqlite3_exec(
            db,
            c_sql.as_ptr(),
            ptr::null_mut(),
            ptr::null_mut(),
            &mut errmsg,
        )
    };
    if rc == ffi::SQLITE_OK {
        return Ok(());
    }
    let msg = if errmsg.is_null() {
        ffi::error_string(rc).to_string()
    } else {
        // SAFETY: errmsg was allocated by SQLite and is freed once
        unsafe {
            let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
            ffi::sqlite3_free(errmsg.cast());
            msg
        }
    };
    Err(query_error(error_kind(rc, &msg), sql, msg))
}

/// # Safety
/// `db` must be a valid handle.
unsafe fn error_message(db: *mut ffi::sqlite3) -> String {
    // SAFETY: upheld by the caller
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)).to_string_lossy().into_owned() }
}

fn last_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (code, msg) = unsafe { (ffi::sqlite3_errcode(db), error_message(db)) };
    query_error(error_kind(code, &msg), sql, msg)
}

fn query_error(kind: QueryErrorKind, sql: &str, message: String) -> Error {
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message,
        source: None,
    })
}

fn connect_error(message: String) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Connect,
        message,
        source: None,
    })
}

fn error_kind(code: c_int, message: &str) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND | ffi::SQLITE_CANTOPEN => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_ERROR if message.contains("syntax error") => QueryErrorKind::Syntax,
        ffi::SQLITE_ERROR if message.starts_with("no such") => QueryErrorKind::NotFound,
        _ => QueryErrorKind::Database,
    }
}
