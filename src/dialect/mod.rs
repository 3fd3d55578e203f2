//! Engine identities and the dialect capability bundle.
//!
//! A [`Dialect`] packages everything that differs per engine: the type
//! translator, the syntax helper, pooling behavior, liveness probes and
//! version queries. Callers never branch on engine identity themselves; they
//! fetch the dialect from the [`registry`] by [`DatabaseType`] and go through
//! its capabilities.
//!
//! Engine quirks surfaced at this level:
//!
//! - MsSql and MySql reuse one session per server by switching the current
//!   database; PostgreSql cannot (`USE` does not exist), Oracle leans on the
//!   driver's own pool
//! - The liveness probe is `SELECT 1` everywhere except Oracle, which has no
//!   `FROM`-less SELECT (`SELECT 1 FROM DUAL`)
//! - Only MsSql can report a dangling transaction (`@@TRANCOUNT`)
//! - Oracle historically benefits from retrying connection opens; that is a
//!   policy hook here, not a contract

mod mssql;
mod mysql;
mod oracle;
mod postgres;
pub mod registry;
mod sqlite;

pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgreSqlDialect;
pub use sqlite::SqliteDialect;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::syntax::SyntaxHelper;
use crate::types::TypeTranslator;

/// The closed set of supported engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseType {
    MsSql,
    MySql,
    PostgreSql,
    Oracle,
    Sqlite,
}

impl DatabaseType {
    pub fn all() -> [DatabaseType; 5] {
        [
            DatabaseType::MsSql,
            DatabaseType::MySql,
            DatabaseType::PostgreSql,
            DatabaseType::Oracle,
            DatabaseType::Sqlite,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::MsSql => "mssql",
            DatabaseType::MySql => "mysql",
            DatabaseType::PostgreSql => "postgresql",
            DatabaseType::Oracle => "oracle",
            DatabaseType::Sqlite => "sqlite",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mssql" | "sqlserver" | "sql_server" | "microsoftsqlserver" => {
                Some(DatabaseType::MsSql)
            }
            "mysql" | "mariadb" => Some(DatabaseType::MySql),
            "postgresql" | "postgres" | "pg" => Some(DatabaseType::PostgreSql),
            "oracle" => Some(DatabaseType::Oracle),
            "sqlite" | "sqlite3" => Some(DatabaseType::Sqlite),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the connection pool keys and reuses sessions for an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStrategy {
    /// One session per server, reused across databases by switching the
    /// current database. The pool key strips the database field and the
    /// initial bind is to the named system database.
    ServerLevel { system_database: &'static str },
    /// One session per (server, database); the session cannot switch.
    DatabaseLevel,
    /// No thread-local pooling; the driver's native pool is trusted and
    /// connections close on dispose.
    NoPooling,
}

/// Optional retry policy for connection opens and DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

/// The per-engine capability bundle.
pub trait Dialect: Send + Sync + std::fmt::Debug {
    fn database_type(&self) -> DatabaseType;

    /// Dialect name for display and logging.
    fn name(&self) -> &'static str {
        self.database_type().as_str()
    }

    fn type_translator(&self) -> &TypeTranslator;

    fn syntax_helper(&self) -> &SyntaxHelper;

    fn pool_strategy(&self) -> PoolStrategy;

    /// Cheap query proving the session is alive.
    fn alive_probe_sql(&self) -> &'static str {
        "SELECT 1"
    }

    /// Query returning a nonzero count when a transaction was left open on
    /// the session. `None` where the engine cannot report it.
    fn dangling_transaction_probe_sql(&self) -> Option<&'static str> {
        None
    }

    /// Query returning the server version string.
    fn server_version_sql(&self) -> &'static str;

    /// Optional retry-with-backoff policy for opens and DDL.
    fn retry_policy(&self) -> Option<RetryPolicy> {
        None
    }
}
