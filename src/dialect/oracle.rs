//! Oracle dialect.
//!
//! Oracle particulars:
//! - A "database" is really a user/schema; unquoted identifiers uppercase
//! - Every number is `NUMBER(p,s)`; `INT`, `SMALLINT` and `DECIMAL` are
//!   rewritten to `NUMBER(38)` by the engine
//! - No `FROM`-less SELECT; probes go through `DUAL`
//! - No thread-local pooling: the driver's native pool is good and cheap,
//!   so connections close on dispose and return to it
//! - Connection opens are flaky enough under load that a retry policy is
//!   offered (callers may ignore it)

use std::time::Duration;

use super::{Dialect, DatabaseType, PoolStrategy, RetryPolicy};
use crate::syntax::SyntaxHelper;
use crate::types::TypeTranslator;

#[derive(Debug)]
pub struct OracleDialect {
    translator: TypeTranslator,
    syntax: SyntaxHelper,
}

impl OracleDialect {
    pub fn new() -> Self {
        Self {
            translator: TypeTranslator::new(DatabaseType::Oracle),
            syntax: SyntaxHelper::new(DatabaseType::Oracle),
        }
    }
}

impl Default for OracleDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialect for OracleDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Oracle
    }

    fn type_translator(&self) -> &TypeTranslator {
        &self.translator
    }

    fn syntax_helper(&self) -> &SyntaxHelper {
        &self.syntax
    }

    fn pool_strategy(&self) -> PoolStrategy {
        PoolStrategy::NoPooling
    }

    fn alive_probe_sql(&self) -> &'static str {
        "SELECT 1 FROM DUAL"
    }

    fn server_version_sql(&self) -> &'static str {
        "SELECT banner FROM v$version WHERE banner LIKE 'Oracle%'"
    }

    fn retry_policy(&self) -> Option<RetryPolicy> {
        Some(RetryPolicy {
            max_attempts: 4,
            backoff: Duration::from_millis(250),
        })
    }
}
