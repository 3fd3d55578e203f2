//! Microsoft SQL Server dialect.
//!
//! MsSql particulars:
//! - Square bracket identifier quoting (`[name]`)
//! - `nvarchar`/`varchar` split for unicode, `(max)` past 4000/8000 chars
//! - One session per server, switched between databases with `USE`
//! - `@@TRANCOUNT` reports transactions left open on a session
//! - Initial pool bind is to `master`

use super::{Dialect, DatabaseType, PoolStrategy};
use crate::syntax::SyntaxHelper;
use crate::types::TypeTranslator;

#[derive(Debug)]
pub struct MsSqlDialect {
    translator: TypeTranslator,
    syntax: SyntaxHelper,
}

impl MsSqlDialect {
    pub fn new() -> Self {
        Self {
            translator: TypeTranslator::new(DatabaseType::MsSql),
            syntax: SyntaxHelper::new(DatabaseType::MsSql),
        }
    }
}

impl Default for MsSqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for MsSqlDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MsSql
    }

    fn type_translator(&self) -> &TypeTranslator {
        &self.translator
    }

    fn syntax_helper(&self) -> &SyntaxHelper {
        &self.syntax
    }

    fn pool_strategy(&self) -> PoolStrategy {
        PoolStrategy::ServerLevel {
            system_database: "master",
        }
    }

    fn dangling_transaction_probe_sql(&self) -> Option<&'static str> {
        Some("SELECT @@TRANCOUNT")
    }

    fn server_version_sql(&self) -> &'static str {
        "SELECT SERVERPROPERTY('ProductVersion')"
    }
}
