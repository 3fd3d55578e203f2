//! SQLite dialect.
//!
//! Sqlite particulars:
//! - Column types are affinities; everything stringy is `TEXT`, dates are
//!   ISO 8601 text and read back as strings
//! - A database is a file, so "databases" pool at the database level
//! - No MD5, no cross-database qualification

use super::{Dialect, DatabaseType, PoolStrategy};
use crate::syntax::SyntaxHelper;
use crate::types::TypeTranslator;

#[derive(Debug)]
pub struct SqliteDialect {
    translator: TypeTranslator,
    syntax: SyntaxHelper,
}

impl SqliteDialect {
    pub fn new() -> Self {
        Self {
            translator: TypeTranslator::new(DatabaseType::Sqlite),
            syntax: SyntaxHelper::new(DatabaseType::Sqlite),
        }
    }
}

impl Default for SqliteDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for SqliteDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn type_translator(&self) -> &TypeTranslator {
        &self.translator
    }

    fn syntax_helper(&self) -> &SyntaxHelper {
        &self.syntax
    }

    fn pool_strategy(&self) -> PoolStrategy {
        PoolStrategy::DatabaseLevel
    }

    fn server_version_sql(&self) -> &'static str {
        "SELECT sqlite_version()"
    }
}
