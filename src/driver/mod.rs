//! The minimal driver surface the engine core rides on.
//!
//! Wire protocols are out of scope: a driver is an opaque collaborator
//! exposing connect/execute/query/transaction primitives. The crate ships
//! one real driver (SQLite via rusqlite, see [`sqlite`]); host applications
//! register factories for the network engines through the dialect registry.
//!
//! Everything is synchronous and blocking. A connection is owned by exactly
//! one thread at a time; `Send` lets the pool move it between checkouts but
//! nothing here is `Sync`.

pub mod sqlite;

pub use sqlite::{SqliteConnection, SqliteDriverFactory};

use std::time::Duration;

use thiserror::Error;

use crate::connection::ConnectionStringBuilder;
use crate::dialect::DatabaseType;

/// Errors surfaced by driver implementations.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("sqlite driver error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection is {0:?}, expected Open")]
    NotOpen(ConnectionState),

    #[error("the {database} driver cannot {operation}")]
    NotSupported {
        database: DatabaseType,
        operation: String,
    },

    #[error("error executing {sql:?}: {message}")]
    Execution { sql: String, message: String },

    #[error("no driver connection available: {0}")]
    Unavailable(String),
}

impl DriverError {
    pub fn not_supported(database: DatabaseType, operation: impl Into<String>) -> Self {
        Self::NotSupported {
            database,
            operation: operation.into(),
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Observable lifecycle of a driver session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Open,
    Broken,
}

/// An owned result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable rendering; `Null` is the empty string.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

pub type Row = Vec<Value>;

/// A fully materialized query result.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// First cell of the first row, if any.
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// All values of one column.
    pub fn column_values(&self, name: &str) -> Vec<&Value> {
        match self.column_index(name) {
            Some(index) => self.rows.iter().filter_map(|row| row.get(index)).collect(),
            None => Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A live driver session.
///
/// Transactions are session-scoped: `begin` puts the session in a
/// transaction that a later `commit` or `rollback` ends. `in_transaction`
/// is best-effort (exact for drivers that track autocommit, like SQLite).
pub trait DriverConnection: Send {
    fn database_type(&self) -> DatabaseType;

    fn state(&self) -> ConnectionState;

    /// Run a statement (or statement batch), returning affected rows.
    fn execute(&mut self, sql: &str) -> DriverResult<u64>;

    /// Run a query and materialize every row.
    fn query(&mut self, sql: &str) -> DriverResult<ResultSet>;

    fn begin(&mut self) -> DriverResult<()>;

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    /// Whether a transaction is open on the session.
    fn in_transaction(&self) -> bool;

    /// Rebind the session to another database (`USE`), where the engine
    /// permits it.
    fn change_database(&mut self, database: &str) -> DriverResult<()>;

    /// Command timeout applied to subsequent statements.
    fn set_timeout(&mut self, timeout: Duration);

    /// Mark the session closed. The underlying handle releases when the
    /// connection is dropped.
    fn close(&mut self) -> DriverResult<()>;
}

/// Opens driver connections for one engine.
pub trait DriverFactory: Send + Sync + std::fmt::Debug {
    fn database_type(&self) -> DatabaseType;

    fn open(&self, builder: &ConnectionStringBuilder) -> DriverResult<Box<dyn DriverConnection>>;
}
