//! The in-process SQLite driver, backed by rusqlite.
//!
//! SQLite is the one engine whose "server" lives in this process, so the
//! crate can ship a complete driver for it. The connection reports
//! transactions exactly (`is_autocommit`), which makes it the reference
//! backend for pool and transaction tests.

use std::time::Duration;

use crate::connection::ConnectionStringBuilder;
use crate::dialect::DatabaseType;

use super::{
    ConnectionState, DriverConnection, DriverError, DriverFactory, DriverResult, ResultSet, Row,
    Value,
};

/// A live rusqlite session.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
    state: ConnectionState,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a database file, or an in-memory database for `:memory:` or an
    /// empty path.
    pub fn open(path: &str) -> DriverResult<Self> {
        let conn = if path.is_empty() || path == ":memory:" {
            rusqlite::Connection::open_in_memory()?
        } else {
            rusqlite::Connection::open(path)?
        };
        Ok(Self {
            conn,
            state: ConnectionState::Open,
            path: path.to_string(),
        })
    }

    fn ensure_open(&self) -> DriverResult<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            other => Err(DriverError::NotOpen(other)),
        }
    }

    fn wrap_execution(sql: &str, err: rusqlite::Error) -> DriverError {
        DriverError::Execution {
            sql: sql.to_string(),
            message: err.to_string(),
        }
    }
}

impl DriverConnection for SqliteConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn execute(&mut self, sql: &str) -> DriverResult<u64> {
        self.ensure_open()?;
        self.conn
            .execute_batch(sql)
            .map_err(|e| Self::wrap_execution(sql, e))?;
        Ok(self.conn.changes())
    }

    fn query(&mut self, sql: &str) -> DriverResult<ResultSet> {
        self.ensure_open()?;
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Self::wrap_execution(sql, e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let column_count = columns.len();

        let mut out: Vec<Row> = Vec::new();
        let mut rows = stmt.query([]).map_err(|e| Self::wrap_execution(sql, e))?;
        while let Some(row) = rows.next().map_err(|e| Self::wrap_execution(sql, e))? {
            let mut cells = Vec::with_capacity(column_count);
            for i in 0..column_count {
                let cell = match row.get_ref(i).map_err(|e| Self::wrap_execution(sql, e))? {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                    rusqlite::types::ValueRef::Real(v) => Value::Float(v),
                    rusqlite::types::ValueRef::Text(v) => {
                        Value::Text(String::from_utf8_lossy(v).into_owned())
                    }
                    rusqlite::types::ValueRef::Blob(v) => Value::Bytes(v.to_vec()),
                };
                cells.push(cell);
            }
            out.push(cells);
        }
        Ok(ResultSet { columns, rows: out })
    }

    fn begin(&mut self) -> DriverResult<()> {
        self.execute("BEGIN").map(|_| ())
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.execute("COMMIT").map(|_| ())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.execute("ROLLBACK").map(|_| ())
    }

    fn in_transaction(&self) -> bool {
        self.state == ConnectionState::Open && !self.conn.is_autocommit()
    }

    fn change_database(&mut self, _database: &str) -> DriverResult<()> {
        Err(DriverError::not_supported(
            DatabaseType::Sqlite,
            "switch databases on an open session",
        ))
    }

    fn set_timeout(&mut self, timeout: Duration) {
        let _ = self.conn.busy_timeout(timeout);
    }

    fn close(&mut self) -> DriverResult<()> {
        self.state = ConnectionState::Closed;
        Ok(())
    }
}

/// Opens [`SqliteConnection`]s from a builder's `Data Source`.
#[derive(Debug, Default)]
pub struct SqliteDriverFactory;

impl DriverFactory for SqliteDriverFactory {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn open(&self, builder: &ConnectionStringBuilder) -> DriverResult<Box<dyn DriverConnection>> {
        let path = builder.database().unwrap_or_default();
        Ok(Box::new(SqliteConnection::open(&path)?))
    }
}
