//! Discovery of servers, databases, tables, columns and relationships.
//!
//! The object chain mirrors how callers think:
//!
//! ```text
//! DiscoveredServer ── expect_database ──> DiscoveredDatabase
//!                                            │ expect_table / discover_tables
//!                                            ▼
//!                                        DiscoveredTable ── discover_columns ──> DiscoveredColumn
//!                                            │ discover_relationships
//!                                            ▼
//!                                        DiscoveredRelationship
//! ```
//!
//! Objects are cheap descriptions; nothing talks to the engine until an
//! operation is called, and existence is never assumed (`exists()` is a
//! targeted query). Metadata reads go through `information_schema` on
//! MsSql/MySql/PostgreSql, the `all_*` views on Oracle, and
//! `sqlite_master` plus PRAGMAs on Sqlite.
//!
//! Engine-impossible operations are typed errors, not emulations: Sqlite
//! cannot drop a column or add a primary key after the fact, Oracle treats
//! databases as users, PostgreSql cannot hop databases on one session.

mod database;
mod relationship;
mod server;
mod table;

pub use database::DiscoveredDatabase;
pub use relationship::{relationship_topological_sort, DiscoveredRelationship};
pub use server::DiscoveredServer;
pub use table::{DiscoveredColumn, DiscoveredTable, TableKind};

use thiserror::Error;

use crate::connection::ConnectionError;
use crate::dialect::registry::RegistryError;
use crate::dialect::DatabaseType;
use crate::syntax::SyntaxError;
use crate::types::TypeMapError;

/// Errors from discovery and DDL operations.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    TypeMap(#[from] TypeMapError),

    /// A DDL statement failed at the engine; carries the offending SQL.
    #[error("DDL failed, offending sql was {sql:?}")]
    AlterFailed {
        sql: String,
        #[source]
        source: ConnectionError,
    },

    /// The operation is well-defined but this engine cannot do it.
    #[error("{operation} is not supported on {database}")]
    NotSupported {
        operation: String,
        database: DatabaseType,
    },

    /// Foreign keys form a cycle, so no drop order exists.
    #[error("tables cannot be ordered for dropping; foreign keys form a cycle involving {0:?}")]
    CircularDependency(String),

    #[error("expected a scalar result from {sql:?}")]
    EmptyResult { sql: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    pub(crate) fn not_supported(operation: impl Into<String>, database: DatabaseType) -> Self {
        Self::NotSupported {
            operation: operation.into(),
            database,
        }
    }

    pub(crate) fn alter_failed(sql: impl Into<String>, source: ConnectionError) -> Self {
        Self::AlterFailed {
            sql: sql.into(),
            source,
        }
    }
}
