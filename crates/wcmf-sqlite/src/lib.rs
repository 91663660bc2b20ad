//! SQLite driver for wCMF.
//!
//! `wcmf-sqlite` is the **embedded database driver**. It implements the
//! synchronous [`wcmf_core::Connection`] trait directly over the SQLite C
//! API and registers with the persistence layer through [`SqliteDriver`].
//!
//! # Role In The Architecture
//!
//! - **Driver**: [`SqliteDriver`] turns [`wcmf_core::ConnectionParams`] into
//!   a shared connection for the connection registry.
//! - **Connection**: [`SqliteConnection`] runs statements with `?N`
//!   placeholders, reports affected rows and tracks the transaction state.
//! - **Values**: bound and read values map onto SQLite's storage classes;
//!   integers are read back as 64-bit values.
//!
//! # Example
//!
//! ```rust,ignore
//! use wcmf_core::{Connection, ConnectionParams, Driver};
//! use wcmf_sqlite::SqliteDriver;
//!
//! let conn = SqliteDriver.connect(&ConnectionParams::sqlite_memory())?;
//! conn.execute("CREATE TABLE book (id INTEGER PRIMARY KEY, title TEXT)", &[])?;
//! let rows = conn.query("SELECT * FROM book", &[])?;
//! ```

#![allow(unsafe_code)]

// Link the bundled libsqlite3 that backs the declarations in `ffi`.
use libsqlite3_sys as _;

pub mod connection;
pub mod driver;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};
pub use driver::SqliteDriver;

/// The SQLite library version, e.g. "3.45.0".
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// The SQLite library version as a number, e.g. 3045000.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
