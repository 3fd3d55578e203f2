//! The server object: the entry point of the discovery chain.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connection::{pool, ConnectionStringBuilder, ManagedConnection, ManagedTransaction};
use crate::dialect::{registry, DatabaseType, Dialect};

use super::{DiscoveredDatabase, DiscoveryError};

/// A database server (or, for Sqlite, the process itself) reachable through
/// a connection-string builder. Cheap to create; outlives any connection.
#[derive(Debug, Clone)]
pub struct DiscoveredServer {
    builder: ConnectionStringBuilder,
}

impl DiscoveredServer {
    pub fn new(builder: ConnectionStringBuilder) -> Self {
        Self { builder }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.builder.database_type()
    }

    pub fn builder(&self) -> &ConnectionStringBuilder {
        &self.builder
    }

    pub fn dialect(&self) -> Result<Arc<dyn Dialect>, DiscoveryError> {
        Ok(registry::get(self.database_type())?)
    }

    /// A database that may or may not exist on this server.
    pub fn expect_database(&self, name: impl Into<String>) -> DiscoveredDatabase {
        DiscoveredDatabase::new(self.clone(), name)
    }

    /// Acquire a connection: through the supplied transaction when given,
    /// otherwise via the pool.
    pub fn get_managed_connection(
        &self,
        transaction: Option<&ManagedTransaction>,
    ) -> Result<ManagedConnection, DiscoveryError> {
        Ok(pool::acquire(&self.builder, transaction)?)
    }

    /// Open a fresh non-pooled connection and begin a transaction on it.
    /// The transaction owns the session until commit or rollback.
    pub fn begin_new_transacted_connection(&self) -> Result<ManagedTransaction, DiscoveryError> {
        let factory = registry::driver(self.database_type())?;
        let connection = factory
            .open(&self.builder)
            .map_err(crate::connection::ConnectionError::from)?;
        Ok(ManagedTransaction::begin(connection)?)
    }

    /// Names of the databases on the server (Oracle: the users; Sqlite: the
    /// schemas attached to the session).
    pub fn list_databases(&self) -> Result<Vec<String>, DiscoveryError> {
        let sql = match self.database_type() {
            DatabaseType::MsSql => "SELECT name FROM sys.databases",
            DatabaseType::MySql => "SHOW DATABASES",
            DatabaseType::PostgreSql => {
                "SELECT datname FROM pg_database WHERE datistemplate = false"
            }
            DatabaseType::Oracle => "SELECT username FROM all_users",
            DatabaseType::Sqlite => "PRAGMA database_list",
        };
        let mut connection = self.get_managed_connection(None)?;
        let result = connection.query(sql)?;

        let index = match self.database_type() {
            DatabaseType::Sqlite => result.column_index("name").unwrap_or(1),
            _ => 0,
        };
        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter(|v| !v.is_null())
            .map(|v| v.to_display_string())
            .collect())
    }

    /// Whether the server answers its liveness probe within the timeout.
    /// Returns the failure alongside, for callers that want to report it.
    pub fn responds_within_time(&self, timeout: Duration) -> (bool, Option<DiscoveryError>) {
        let started = Instant::now();
        let attempt = (|| -> Result<(), DiscoveryError> {
            let dialect = self.dialect()?;
            let mut connection = self.get_managed_connection(None)?;
            connection.set_timeout(timeout);
            connection.query(dialect.alive_probe_sql())?;
            Ok(())
        })();
        match attempt {
            Ok(()) if started.elapsed() <= timeout => (true, None),
            Ok(()) => (false, None),
            Err(e) => (false, Some(e)),
        }
    }

    /// The engine version string, if the server reports one.
    pub fn get_version(&self) -> Result<Option<String>, DiscoveryError> {
        let dialect = self.dialect()?;
        let mut connection = self.get_managed_connection(None)?;
        let result = connection.query(dialect.server_version_sql())?;
        Ok(result
            .scalar()
            .filter(|v| !v.is_null())
            .map(|v| v.to_display_string()))
    }
}
