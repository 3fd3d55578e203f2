//! # omnisql
//!
//! A cross-DBMS schema and metadata engine with dialect-aware SQL
//! synthesis. One API discovers, creates, mutates and moves database
//! objects across Microsoft SQL Server, MySQL, PostgreSQL, Oracle and
//! SQLite, while still producing the vendor-specific SQL each engine
//! requires. Not an ORM and not a query builder: the hard parts are type
//! translation, connection management, and dialect-specific synthesis.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │   DiscoveredServer / Database / Table / Column          │
//! │   (discovery: metadata reads, DDL, bulk entry points)   │
//! └─────────────────────────────────────────────────────────┘
//!          │                         │
//!          ▼ [connection]            ▼ [dialect capabilities]
//! ┌──────────────────────┐  ┌───────────────────────────────┐
//! │ pool / managed conn  │  │ TypeTranslator │ SyntaxHelper │
//! │ / transactions       │  │ AggregateBuilder │ builders   │
//! └──────────────────────┘  └───────────────────────────────┘
//!          │                         │
//!          ▼ [driver]                ▼ [registry]
//! ┌──────────────────────┐  ┌───────────────────────────────┐
//! │ minimal driver trait │  │ process-wide dialect registry │
//! │ (rusqlite built in)  │  │ (explicitly initialized)      │
//! └──────────────────────┘  └───────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use omnisql::prelude::*;
//!
//! omnisql::dialect::registry::initialize();
//!
//! let server = DiscoveredServer::new(
//!     ConnectionStringBuilder::new(DatabaseType::Sqlite).with_database("./data.db"),
//! );
//! let database = server.expect_database("./data.db");
//! for table in database.discover_tables(false, None).unwrap() {
//!     for column in table.discover_columns().unwrap() {
//!         println!("{}.{} {}", table.name(), column.name, column.data_type);
//!     }
//! }
//! ```
//!
//! Engine semantics that cannot be bridged stay visible: Oracle databases
//! are users, SQLite has no MD5, PostgreSQL sessions cannot change
//! database. Those surface as typed errors rather than silent emulation.

pub mod aggregate;
pub mod bulk;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod discovery;
pub mod driver;
pub mod scripting;
pub mod syntax;
pub mod types;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::aggregate::{
        AggregateBuilder, AggregateLine, AggregateSql, AxisIncrement, LineRole, PivotTopX,
        QueryAxis, QueryComponent,
    };
    pub use crate::config::Settings;
    pub use crate::connection::{
        ConnectionStringBuilder, ManagedConnection, ManagedTransaction, TransactionState,
    };
    pub use crate::dialect::{DatabaseType, Dialect};
    pub use crate::discovery::{
        DiscoveredColumn, DiscoveredDatabase, DiscoveredRelationship, DiscoveredServer,
        DiscoveredTable, TableKind,
    };
    pub use crate::scripting::{ColumnDataType, ColumnDefinition, TableScriptOptions};
    pub use crate::types::{DecimalSize, Guesser, TypeRequest, ValueKind};
}

// Also export the workhorses at crate root for convenience
pub use dialect::DatabaseType;
pub use discovery::{DiscoveredDatabase, DiscoveredServer, DiscoveredTable};
pub use types::{TypeRequest, ValueKind};
