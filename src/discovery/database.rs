//! The database object.
//!
//! A database is a name on a server that may or may not exist yet. On
//! Oracle a "database" is a user/schema, so create and drop go through
//! `CREATE USER`/`DROP USER`. On Sqlite a database is a file, so existence
//! is a filesystem question and create is just opening the file.

use std::path::Path;

use crate::config;
use crate::connection::{pool, ManagedConnection, ManagedTransaction};
use crate::dialect::{registry, DatabaseType};
use crate::scripting::{create_table_sql, ColumnDefinition};

use super::{DiscoveredServer, DiscoveredTable, DiscoveryError, TableKind};

/// A named database on a server.
#[derive(Debug, Clone)]
pub struct DiscoveredDatabase {
    server: DiscoveredServer,
    name: String,
}

impl DiscoveredDatabase {
    pub(crate) fn new(server: DiscoveredServer, name: impl Into<String>) -> Self {
        Self {
            server,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server(&self) -> &DiscoveredServer {
        &self.server
    }

    pub fn database_type(&self) -> DatabaseType {
        self.server.database_type()
    }

    /// A connection bound to this database (switched or keyed per the
    /// dialect's pool strategy).
    pub fn get_managed_connection(
        &self,
        transaction: Option<&ManagedTransaction>,
    ) -> Result<ManagedConnection, DiscoveryError> {
        let builder = self.server.builder().clone().with_database(&self.name);
        Ok(pool::acquire(&builder, transaction)?)
    }

    /// Targeted existence check; never assumes.
    pub fn exists(&self) -> Result<bool, DiscoveryError> {
        let database = self.database_type();
        if database == DatabaseType::Sqlite {
            return Ok(self.name == ":memory:" || Path::new(&self.name).exists());
        }
        let dialect = registry::get(database)?;
        let syntax = dialect.syntax_helper();
        let literal = syntax.quote_string(&self.name);
        let sql = match database {
            DatabaseType::MsSql => {
                format!("SELECT 1 FROM sys.databases WHERE name = {}", literal)
            }
            DatabaseType::MySql => format!(
                "SELECT 1 FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = {}",
                literal
            ),
            DatabaseType::PostgreSql => {
                format!("SELECT 1 FROM pg_database WHERE datname = {}", literal)
            }
            DatabaseType::Oracle => format!(
                "SELECT 1 FROM all_users WHERE username = UPPER({})",
                literal
            ),
            DatabaseType::Sqlite => unreachable!("handled above"),
        };
        let mut connection = self.server.get_managed_connection(None)?;
        Ok(!connection.query(&sql)?.is_empty())
    }

    /// Create the database, with the configured (longer) timeout.
    pub fn create(&self) -> Result<(), DiscoveryError> {
        let database = self.database_type();
        if database == DatabaseType::Sqlite {
            // opening the file creates it
            let factory = registry::driver(database)?;
            let builder = self.server.builder().clone().with_database(&self.name);
            let mut connection = factory
                .open(&builder)
                .map_err(crate::connection::ConnectionError::from)?;
            let _ = connection.close();
            return Ok(());
        }
        let dialect = registry::get(database)?;
        let wrapped = dialect.syntax_helper().ensure_wrapped(&self.name);
        let sql = match database {
            // an Oracle database is a user; give it a basic working grant
            DatabaseType::Oracle => format!(
                "CREATE USER {0} IDENTIFIED BY {0} QUOTA UNLIMITED ON USERS",
                wrapped
            ),
            _ => format!("CREATE DATABASE {}", wrapped),
        };
        let mut connection = self.server.get_managed_connection(None)?;
        connection.set_timeout(config::Settings::global().create_database_timeout);
        connection
            .execute(&sql)
            .map_err(|e| DiscoveryError::alter_failed(sql.clone(), e))?;
        Ok(())
    }

    /// Drop the database (Oracle: the user and everything it owns).
    pub fn drop(&self) -> Result<(), DiscoveryError> {
        let database = self.database_type();
        if database == DatabaseType::Sqlite {
            if self.name != ":memory:" {
                std::fs::remove_file(&self.name)?;
            }
            return Ok(());
        }
        let dialect = registry::get(database)?;
        let wrapped = dialect.syntax_helper().ensure_wrapped(&self.name);
        let sql = match database {
            DatabaseType::Oracle => format!("DROP USER {} CASCADE", wrapped),
            _ => format!("DROP DATABASE {}", wrapped),
        };
        let mut connection = self.server.get_managed_connection(None)?;
        connection
            .execute(&sql)
            .map_err(|e| DiscoveryError::alter_failed(sql.clone(), e))?;
        Ok(())
    }

    /// A table that may or may not exist in this database.
    pub fn expect_table(
        &self,
        name: impl Into<String>,
        schema: Option<&str>,
    ) -> DiscoveredTable {
        DiscoveredTable::new(
            self.clone(),
            name,
            schema.map(|s| s.to_string()),
            TableKind::BaseTable,
        )
    }

    /// Create a table from column definitions and return its object.
    pub fn create_table(
        &self,
        name: &str,
        columns: &[ColumnDefinition],
    ) -> Result<DiscoveredTable, DiscoveryError> {
        let sql = create_table_sql(self.database_type(), &self.name, None, name, columns)?;
        let mut connection = self.get_managed_connection(None)?;
        connection
            .execute(&sql)
            .map_err(|e| DiscoveryError::alter_failed(sql.clone(), e))?;
        Ok(self.expect_table(name, None))
    }

    /// Enumerate the tables (and optionally views) in this database.
    pub fn discover_tables(
        &self,
        include_views: bool,
        transaction: Option<&ManagedTransaction>,
    ) -> Result<Vec<DiscoveredTable>, DiscoveryError> {
        let database = self.database_type();
        let dialect = registry::get(database)?;
        let syntax = dialect.syntax_helper();
        let literal = syntax.quote_string(&self.name);

        // every query yields (name, schema-or-null, is-view)
        let sql = match database {
            DatabaseType::MsSql => format!(
                "SELECT TABLE_NAME, TABLE_SCHEMA, TABLE_TYPE FROM {}.INFORMATION_SCHEMA.TABLES",
                syntax.ensure_wrapped(&self.name)
            ),
            DatabaseType::MySql => format!(
                "SELECT TABLE_NAME, NULL, TABLE_TYPE FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = {}",
                literal
            ),
            DatabaseType::PostgreSql => "SELECT table_name, table_schema, table_type \
                 FROM information_schema.tables \
                 WHERE table_schema NOT IN ('pg_catalog', 'information_schema')"
                .to_string(),
            DatabaseType::Oracle => format!(
                "SELECT table_name, NULL, 'BASE TABLE' FROM all_tables WHERE owner = UPPER({0}) \
                 UNION ALL \
                 SELECT view_name, NULL, 'VIEW' FROM all_views WHERE owner = UPPER({0})",
                literal
            ),
            DatabaseType::Sqlite => "SELECT name, NULL, CASE type WHEN 'view' THEN 'VIEW' ELSE 'BASE TABLE' END \
                 FROM sqlite_master WHERE type IN ('table', 'view') \
                 AND name NOT LIKE 'sqlite_%'"
                .to_string(),
        };

        let mut connection = self.get_managed_connection(transaction)?;
        let result = connection.query(&sql)?;

        let mut tables = Vec::new();
        for row in &result.rows {
            let name = match row.first() {
                Some(v) if !v.is_null() => v.to_display_string(),
                _ => continue,
            };
            let schema = row
                .get(1)
                .filter(|v| !v.is_null())
                .map(|v| v.to_display_string());
            let is_view = row
                .get(2)
                .map(|v| v.to_display_string().eq_ignore_ascii_case("VIEW"))
                .unwrap_or(false);
            if is_view && !include_views {
                continue;
            }
            tables.push(DiscoveredTable::new(
                self.clone(),
                name,
                schema,
                if is_view {
                    TableKind::View
                } else {
                    TableKind::BaseTable
                },
            ));
        }
        Ok(tables)
    }
}
