//! Connection string assembly.
//!
//! Every engine spells its keywords differently (`Data Source` vs `Server`
//! vs `Host`, `Initial Catalog` vs `Database`); callers set canonical fields
//! on the builder and never concatenate strings themselves. Process-wide
//! enforced keywords (see [`crate::config`]) are merged in at render time in
//! priority order.
//!
//! Oracle has no database keyword: its "database" is the owning user/schema
//! and is carried on the builder for qualification only. For Sqlite the
//! `Data Source` is the database file, so server and database collapse.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config;
use crate::dialect::DatabaseType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Server,
    Database,
    Username,
    Password,
    Timeout,
}

fn key_name(database_type: DatabaseType, field: Field) -> Option<&'static str> {
    match (database_type, field) {
        (DatabaseType::MsSql, Field::Server) => Some("Data Source"),
        (DatabaseType::MsSql, Field::Database) => Some("Initial Catalog"),
        (DatabaseType::MsSql, Field::Username) => Some("User ID"),
        (DatabaseType::MsSql, Field::Password) => Some("Password"),
        (DatabaseType::MsSql, Field::Timeout) => Some("Connect Timeout"),

        (DatabaseType::MySql, Field::Server) => Some("Server"),
        (DatabaseType::MySql, Field::Database) => Some("Database"),
        (DatabaseType::MySql, Field::Username) => Some("Uid"),
        (DatabaseType::MySql, Field::Password) => Some("Pwd"),
        (DatabaseType::MySql, Field::Timeout) => Some("Connection Timeout"),

        (DatabaseType::PostgreSql, Field::Server) => Some("Host"),
        (DatabaseType::PostgreSql, Field::Database) => Some("Database"),
        (DatabaseType::PostgreSql, Field::Username) => Some("Username"),
        (DatabaseType::PostgreSql, Field::Password) => Some("Password"),
        (DatabaseType::PostgreSql, Field::Timeout) => Some("Timeout"),

        (DatabaseType::Oracle, Field::Server) => Some("Data Source"),
        // Oracle databases are users; there is no database keyword
        (DatabaseType::Oracle, Field::Database) => None,
        (DatabaseType::Oracle, Field::Username) => Some("User Id"),
        (DatabaseType::Oracle, Field::Password) => Some("Password"),
        (DatabaseType::Oracle, Field::Timeout) => Some("Connection Timeout"),

        // Sqlite's database file is the data source
        (DatabaseType::Sqlite, Field::Server) => None,
        (DatabaseType::Sqlite, Field::Database) => Some("Data Source"),
        (DatabaseType::Sqlite, Field::Username) => None,
        (DatabaseType::Sqlite, Field::Password) => Some("Password"),
        (DatabaseType::Sqlite, Field::Timeout) => None,
    }
}

/// Builds connection strings with the dialect's keyword names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStringBuilder {
    database_type: DatabaseType,
    server: Option<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
    extras: BTreeMap<String, String>,
}

impl ConnectionStringBuilder {
    pub fn new(database_type: DatabaseType) -> Self {
        Self {
            database_type,
            server: None,
            database: None,
            username: None,
            password: None,
            timeout: None,
            extras: BTreeMap::new(),
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    pub fn server(&self) -> Option<String> {
        self.server.clone()
    }

    pub fn database(&self) -> Option<String> {
        self.database.clone()
    }

    pub fn username(&self) -> Option<String> {
        self.username.clone()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn without_database(mut self) -> Self {
        self.database = None;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set an engine-specific keyword verbatim (SSL mode, charset, ...).
    pub fn with_keyword(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Render the connection string, merging in the process-wide enforced
    /// keywords for this engine (higher priority overwrites).
    pub fn connection_string(&self) -> String {
        let mut parts: Vec<(String, String)> = Vec::new();

        let mut push = |key: Option<&'static str>, value: Option<String>| {
            if let (Some(key), Some(value)) = (key, value) {
                parts.push((key.to_string(), value));
            }
        };
        push(key_name(self.database_type, Field::Server), self.server.clone());
        push(
            key_name(self.database_type, Field::Database),
            self.database.clone(),
        );
        push(
            key_name(self.database_type, Field::Username),
            self.username.clone(),
        );
        push(
            key_name(self.database_type, Field::Password),
            self.password.clone(),
        );
        push(
            key_name(self.database_type, Field::Timeout),
            self.timeout.map(|t| t.as_secs().to_string()),
        );

        for (key, value) in &self.extras {
            upsert(&mut parts, key, value);
        }
        for keyword in config::Settings::global().enforced_keywords(self.database_type) {
            upsert(&mut parts, &keyword.key, &keyword.value);
        }

        parts
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// The pool key for server-level pooling: the connection string with the
    /// database field stripped.
    pub fn connection_string_without_database(&self) -> String {
        self.clone().without_database().connection_string()
    }
}

fn upsert(parts: &mut Vec<(String, String)>, key: &str, value: &str) {
    match parts.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
        Some(slot) => slot.1 = value.to_string(),
        None => parts.push((key.to_string(), value.to_string())),
    }
}

impl std::fmt::Display for ConnectionStringBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.connection_string())
    }
}
