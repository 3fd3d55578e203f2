//! PostgreSQL dialect.
//!
//! PostgreSql particulars:
//! - ANSI double-quote identifier quoting
//! - No `USE`: a session is bound to its database for life, so pooling is
//!   per (server, database)
//! - `character varying` is the canonical bounded string; `text` unbounded

use super::{Dialect, DatabaseType, PoolStrategy};
use crate::syntax::SyntaxHelper;
use crate::types::TypeTranslator;

#[derive(Debug)]
pub struct PostgreSqlDialect {
    translator: TypeTranslator,
    syntax: SyntaxHelper,
}

impl PostgreSqlDialect {
    pub fn new() -> Self {
        Self {
            translator: TypeTranslator::new(DatabaseType::PostgreSql),
            syntax: SyntaxHelper::new(DatabaseType::PostgreSql),
        }
    }
}

impl Default for PostgreSqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for PostgreSqlDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::PostgreSql
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
        "SHOW server_version"
    }
}
