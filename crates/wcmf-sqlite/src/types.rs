//! Value binding and reading between wCMF and SQLite.
//!
//! SQLite has five storage classes (INTEGER, REAL, TEXT, BLOB, NULL). Bound
//! values are mapped onto them as follows:
//! - booleans and integers bind as INTEGER
//! - decimals bind as TEXT to keep their precision
//! - JSON documents and arrays bind as JSON TEXT
//!
//! Read integers always come back as [`Value::BigInt`].

use crate::ffi;
use std::ffi::{CStr, c_int};
use wcmf_core::Value;

/// Bind `value` to the 1-based parameter `index` of `stmt`.
///
/// # Safety
/// - `stmt` must be a valid, non-null prepared statement handle
/// - `index` must be a valid 1-based parameter index
pub unsafe fn bind_value(stmt: *mut ffi::sqlite3_stmt, index: c_int, value: &Value) -> c_int {
    // SAFETY: upheld by the caller
    unsafe {
        match value {
            Value::Null => ffi::sqlite3_bind_null(stmt, index),
            Value::Bool(b) => ffi::sqlite3_bind_int64(stmt, index, i64::from(*b)),
            Value::Int(v) => ffi::sqlite3_bind_int64(stmt, index, i64::from(*v)),
            Value::BigInt(v) => ffi::sqlite3_bind_int64(stmt, index, *v),
            Value::Double(v) => ffi::sqlite3_bind_double(stmt, index, *v),
            Value::Decimal(s) | Value::Text(s) => bind_text(stmt, index, s),
            Value::Bytes(b) => ffi::sqlite3_bind_blob(
                stmt,
                index,
                b.as_ptr().cast(),
                b.len() as c_int,
                ffi::SQLITE_TRANSIENT,
            ),
            Value::Json(json) => bind_text(stmt, index, &json.to_string()),
            Value::Array(items) => {
                let json = serde_json::Value::Array(items.iter().map(value_to_json).collect());
                bind_text(stmt, index, &json.to_string())
            }
        }
    }
}

unsafe fn bind_text(stmt: *mut ffi::sqlite3_stmt, index: c_int, text: &str) -> c_int {
    // SAFETY: SQLITE_TRANSIENT makes SQLite copy the buffer before returning
    unsafe {
        ffi::sqlite3_bind_text(
            stmt,
            index,
            text.as_ptr().cast(),
            text.len() as c_int,
            ffi::SQLITE_TRANSIENT,
        )
    }
}

/// Read column `index` of the current row.
///
/// # Safety
/// - `stmt` must be a valid prepared statement that has just returned SQLITE_ROW
/// - `index` must be a valid 0-based column index
pub unsafe fn read_column(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Value {
    // SAFETY: upheld by the caller
    unsafe {
        match ffi::sqlite3_column_type(stmt, index) {
            ffi::SQLITE_INTEGER => Value::BigInt(ffi::sqlite3_column_int64(stmt, index)),
            ffi::SQLITE_FLOAT => Value::Double(ffi::sqlite3_column_double(stmt, index)),
            ffi::SQLITE_TEXT => {
                let ptr = ffi::sqlite3_column_text(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() {
                    Value::Null
                } else {
                    let slice = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
                    Value::Text(String::from_utf8_lossy(slice).into_owned())
                }
            }
            ffi::SQLITE_BLOB => {
                let ptr = ffi::sqlite3_column_blob(stmt, index);
                let len = ffi::sqlite3_column_bytes(stmt, index);
                if ptr.is_null() || len == 0 {
                    Value::Bytes(Vec::new())
                } else {
                    let slice = std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize);
                    Value::Bytes(slice.to_vec())
                }
            }
            _ => Value::Null,
        }
    }
}

/// Name of result column `index`.
///
/// # Safety
/// - `stmt` must be a valid prepared statement
/// - `index` must be a valid 0-based column index
pub unsafe fn column_name(stmt: *mut ffi::sqlite3_stmt, index: c_int) -> Option<String> {
    // SAFETY: upheld by the caller; SQLite owns the returned string
    unsafe {
        let ptr = ffi::sqlite3_column_name(stmt, index);
        if ptr.is_null() {
            None
        } else {
            CStr::from_ptr(ptr).to_str().ok().map(String::from)
        }
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(v) => serde_json::Value::from(*v),
        Value::BigInt(v) => serde_json::Value::from(*v),
        Value::Double(v) => serde_json::Value::from(*v),
        Value::Decimal(s) | Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::Array(b.iter().map(|x| (*x).into()).collect()),
        Value::Json(j) => j.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
    }
}
