//! MySQL dialect.
//!
//! MySql particulars:
//! - Backtick identifier quoting (`` `name` ``)
//! - Unicode rides on the column charset, so `nvarchar` requests still spell
//!   `varchar`
//! - `tinyint(1)` means boolean
//! - One session per server, switched between schemas with the driver's
//!   change-database call; initial pool bind is to `mysql`

use super::{Dialect, DatabaseType, PoolStrategy};
use crate::syntax::SyntaxHelper;
use crate::types::TypeTranslator;

#[derive(Debug)]
pub struct MySqlDialect {
    translator: TypeTranslator,
    syntax: SyntaxHelper,
}

impl MySqlDialect {
    pub fn new() -> Self {
        Self {
            translator: TypeTranslator::new(DatabaseType::MySql),
            syntax: SyntaxHelper::new(DatabaseType::MySql),
        }
    }
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for MySqlDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn type_translator(&self) -> &TypeTranslator {
        &self.translator
    }

    fn syntax_helper(&self) -> &SyntaxHelper {
        &self.syntax
    }

    fn pool_strategy(&self) -> PoolStrategy {
        PoolStrategy::ServerLevel {
            system_database: "mysql",
        }
    }

    fn server_version_sql(&self) -> &'static str {
        "SELECT VERSION()"
    }
}
