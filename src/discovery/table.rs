//! The table object: existence, DDL mutation, and column discovery.

use crate::bulk::BulkCopy;
use crate::connection::ManagedConnection;
use crate::dialect::{registry, DatabaseType};
use crate::driver::Row;
use crate::scripting::{self, TableScriptOptions};
use crate::syntax::SyntaxHelper;
use crate::types::TypeRequest;

use super::relationship::discover_relationships_for;
use super::{DiscoveredDatabase, DiscoveredRelationship, DiscoveryError};

/// What kind of relation a table object refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    BaseTable,
    View,
    TableValuedFunction,
}

/// A discovered (or expected) column.
///
/// `data_type` is the engine's concrete spelling, parseable back through the
/// dialect's type translator. Auto-increment implies non-null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredColumn {
    pub name: String,
    pub data_type: String,
    pub allow_nulls: bool,
    pub is_auto_increment: bool,
    pub is_primary_key: bool,
    pub collation: Option<String>,
}

impl DiscoveredColumn {
    /// The logical request behind this column's spelling, per the dialect's
    /// translator.
    pub fn type_request(&self, database: DatabaseType) -> Option<TypeRequest> {
        registry::get(database)
            .ok()?
            .type_translator()
            .type_request_for(&self.data_type)
    }
}

/// A table, view or table-valued function in a database.
#[derive(Debug, Clone)]
pub struct DiscoveredTable {
    database: DiscoveredDatabase,
    name: String,
    schema: Option<String>,
    kind: TableKind,
}

impl DiscoveredTable {
    pub(crate) fn new(
        database: DiscoveredDatabase,
        name: impl Into<String>,
        schema: Option<String>,
        kind: TableKind,
    ) -> Self {
        Self {
            database,
            name: name.into(),
            schema,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn database(&self) -> &DiscoveredDatabase {
        &self.database
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database.database_type()
    }

    fn syntax(&self) -> Result<SyntaxHelper, DiscoveryError> {
        Ok(registry::get(self.database_type())?.syntax_helper().clone())
    }

    /// The fully wrapped, fully qualified name DML should use.
    pub fn fully_qualified_name(&self) -> Result<String, DiscoveryError> {
        let syntax = self.syntax()?;
        Ok(syntax.ensure_fully_qualified(
            self.database.name(),
            self.schema.as_deref(),
            &self.name,
            None,
        ))
    }

    fn connection(&self) -> Result<ManagedConnection, DiscoveryError> {
        self.database.get_managed_connection(None)
    }

    fn execute_ddl(&self, sql: String) -> Result<(), DiscoveryError> {
        let mut connection = self.connection()?;
        connection
            .execute(&sql)
            .map_err(|e| DiscoveryError::alter_failed(sql.clone(), e))?;
        Ok(())
    }

    // =========================================================================
    // Existence and size
    // =========================================================================

    pub fn exists(&self) -> Result<bool, DiscoveryError> {
        let database = self.database_type();
        let syntax = self.syntax()?;
        let name_literal = syntax.quote_string(&self.name);
        let db_literal = syntax.quote_string(self.database.name());
        let sql = match database {
            DatabaseType::MsSql => format!(
                "SELECT 1 FROM {}.INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = {} AND TABLE_SCHEMA = {}",
                syntax.ensure_wrapped(self.database.name()),
                name_literal,
                syntax.quote_string(self.schema.as_deref().unwrap_or("dbo"))
            ),
            DatabaseType::MySql => format!(
                "SELECT 1 FROM information_schema.TABLES WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {}",
                db_literal, name_literal
            ),
            DatabaseType::PostgreSql => format!(
                "SELECT 1 FROM information_schema.tables WHERE table_schema = {} AND table_name = {}",
                syntax.quote_string(self.schema.as_deref().unwrap_or("public")),
                name_literal
            ),
            DatabaseType::Oracle => format!(
                "SELECT 1 FROM all_tables WHERE owner = UPPER({0}) AND table_name = UPPER({1}) \
                 UNION ALL \
                 SELECT 1 FROM all_views WHERE owner = UPPER({0}) AND view_name = UPPER({1})",
                db_literal, name_literal
            ),
            DatabaseType::Sqlite => format!(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = {}",
                name_literal
            ),
        };
        let mut connection = self.connection()?;
        Ok(!connection.query(&sql)?.is_empty())
    }

    pub fn get_row_count(&self) -> Result<u64, DiscoveryError> {
        let sql = format!("SELECT count(*) FROM {}", self.fully_qualified_name()?);
        let mut connection = self.connection()?;
        let result = connection.query(&sql)?;
        result
            .scalar()
            .and_then(|v| v.as_i64())
            .map(|n| n.max(0) as u64)
            .ok_or(DiscoveryError::EmptyResult { sql })
    }

    pub fn is_empty(&self) -> Result<bool, DiscoveryError> {
        Ok(self.get_row_count()? == 0)
    }

    pub fn has_primary_key(&self) -> Result<bool, DiscoveryError> {
        Ok(self
            .discover_columns()?
            .iter()
            .any(|c| c.is_primary_key))
    }

    // =========================================================================
    // DDL
    // =========================================================================

    pub fn drop(&self) -> Result<(), DiscoveryError> {
        let keyword = match self.kind {
            TableKind::View => "VIEW",
            _ => "TABLE",
        };
        self.execute_ddl(format!("DROP {} {}", keyword, self.fully_qualified_name()?))
    }

    pub fn truncate(&self) -> Result<(), DiscoveryError> {
        let fqn = self.fully_qualified_name()?;
        let sql = match self.database_type() {
            DatabaseType::Sqlite => format!("DELETE FROM {}", fqn),
            _ => format!("TRUNCATE TABLE {}", fqn),
        };
        self.execute_ddl(sql)
    }

    pub fn add_column(
        &self,
        name: &str,
        data_type: &TypeRequest,
        allow_nulls: bool,
    ) -> Result<(), DiscoveryError> {
        let database = self.database_type();
        let dialect = registry::get(database)?;
        let syntax = dialect.syntax_helper();
        let spelling = dialect.type_translator().sql_type_for(data_type)?;
        let nullability = if allow_nulls { "NULL" } else { "NOT NULL" };
        let fqn = self.fully_qualified_name()?;
        let wrapped = syntax.ensure_wrapped(name);
        let sql = match database {
            DatabaseType::MsSql => {
                format!("ALTER TABLE {} ADD {} {} {}", fqn, wrapped, spelling, nullability)
            }
            DatabaseType::Oracle => {
                format!("ALTER TABLE {} ADD ({} {} {})", fqn, wrapped, spelling, nullability)
            }
            _ => format!(
                "ALTER TABLE {} ADD COLUMN {} {} {}",
                fqn, wrapped, spelling, nullability
            ),
        };
        self.execute_ddl(sql)
    }

    pub fn drop_column(&self, column: &str) -> Result<(), DiscoveryError> {
        let database = self.database_type();
        if database == DatabaseType::Sqlite {
            return Err(DiscoveryError::not_supported("ALTER TABLE DROP COLUMN", database));
        }
        let syntax = self.syntax()?;
        self.execute_ddl(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.fully_qualified_name()?,
            syntax.ensure_wrapped(column)
        ))
    }

    pub fn create_index(
        &self,
        name: &str,
        columns: &[&str],
        unique: bool,
    ) -> Result<(), DiscoveryError> {
        let syntax = self.syntax()?;
        let cols: Vec<String> = columns.iter().map(|c| syntax.ensure_wrapped(c)).collect();
        self.execute_ddl(format!(
            "CREATE {}INDEX {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            syntax.ensure_wrapped(name),
            self.fully_qualified_name()?,
            cols.join(", ")
        ))
    }

    pub fn drop_index(&self, name: &str) -> Result<(), DiscoveryError> {
        let syntax = self.syntax()?;
        let wrapped = syntax.ensure_wrapped(name);
        let sql = match self.database_type() {
            DatabaseType::MsSql => {
                format!("DROP INDEX {} ON {}", wrapped, self.fully_qualified_name()?)
            }
            DatabaseType::MySql => format!(
                "ALTER TABLE {} DROP INDEX {}",
                self.fully_qualified_name()?,
                wrapped
            ),
            _ => format!("DROP INDEX {}", wrapped),
        };
        self.execute_ddl(sql)
    }

    pub fn create_primary_key(&self, columns: &[&str]) -> Result<(), DiscoveryError> {
        let database = self.database_type();
        if database == DatabaseType::Sqlite {
            return Err(DiscoveryError::not_supported(
                "adding a primary key to an existing table",
                database,
            ));
        }
        let syntax = self.syntax()?;
        let cols: Vec<String> = columns.iter().map(|c| syntax.ensure_wrapped(c)).collect();
        let fqn = self.fully_qualified_name()?;
        let sql = match database {
            DatabaseType::MySql => {
                format!("ALTER TABLE {} ADD PRIMARY KEY ({})", fqn, cols.join(", "))
            }
            _ => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
                fqn,
                syntax.ensure_wrapped(&format!("PK_{}", self.name)),
                cols.join(", ")
            ),
        };
        self.execute_ddl(sql)
    }

    /// Add a foreign key from this table to `other`. `column_pairs` are
    /// (column here, referenced column on `other`).
    pub fn add_foreign_key(
        &self,
        column_pairs: &[(String, String)],
        other: &DiscoveredTable,
        cascade_delete: bool,
    ) -> Result<(), DiscoveryError> {
        let database = self.database_type();
        if database == DatabaseType::Sqlite {
            return Err(DiscoveryError::not_supported(
                "adding a foreign key to an existing table",
                database,
            ));
        }
        let syntax = self.syntax()?;
        let locals: Vec<String> = column_pairs
            .iter()
            .map(|(local, _)| syntax.ensure_wrapped(local))
            .collect();
        let foreigns: Vec<String> = column_pairs
            .iter()
            .map(|(_, foreign)| syntax.ensure_wrapped(foreign))
            .collect();
        let constraint = syntax.ensure_wrapped(&format!("FK_{}_{}", self.name, other.name()));
        let mut sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.fully_qualified_name()?,
            constraint,
            locals.join(", "),
            other.fully_qualified_name()?,
            foreigns.join(", ")
        );
        if cascade_delete {
            sql.push_str(" ON DELETE CASCADE");
        }
        self.execute_ddl(sql)
    }

    // =========================================================================
    // Discovery
    // =========================================================================

    pub fn discover_columns(&self) -> Result<Vec<DiscoveredColumn>, DiscoveryError> {
        match self.database_type() {
            DatabaseType::MsSql => self.discover_columns_mssql(),
            DatabaseType::MySql => self.discover_columns_mysql(),
            DatabaseType::PostgreSql => self.discover_columns_postgres(),
            DatabaseType::Oracle => self.discover_columns_oracle(),
            DatabaseType::Sqlite => self.discover_columns_sqlite(),
        }
    }

    /// Relationships in which this table is the primary-key side.
    pub fn discover_relationships(&self) -> Result<Vec<DiscoveredRelationship>, DiscoveryError> {
        discover_relationships_for(self)
    }

    /// Start a validated batch insert into this table.
    pub fn begin_bulk_insert(&self) -> Result<BulkCopy, DiscoveryError> {
        BulkCopy::new(self)
    }

    /// CREATE TABLE DDL reproducing this table, optionally retargeted to
    /// another dialect with type translation.
    pub fn script_table_creation(
        &self,
        options: &TableScriptOptions,
    ) -> Result<String, DiscoveryError> {
        scripting::script_table_creation(self, options)
    }

    fn discover_columns_mssql(&self) -> Result<Vec<DiscoveredColumn>, DiscoveryError> {
        let syntax = self.syntax()?;
        let db = syntax.ensure_wrapped(self.database.name());
        let schema = self.schema.as_deref().unwrap_or("dbo");
        let name_literal = syntax.quote_string(&self.name);
        let schema_literal = syntax.quote_string(schema);
        let object_literal = syntax.quote_string(&format!("{}.{}", schema, self.name));

        let sql = format!(
            "SELECT c.COLUMN_NAME, c.DATA_TYPE, c.CHARACTER_MAXIMUM_LENGTH, \
             c.NUMERIC_PRECISION, c.NUMERIC_SCALE, c.IS_NULLABLE, c.COLLATION_NAME, \
             COLUMNPROPERTY(OBJECT_ID({object_literal}), c.COLUMN_NAME, 'IsIdentity') \
             FROM {db}.INFORMATION_SCHEMA.COLUMNS c \
             WHERE c.TABLE_NAME = {name_literal} AND c.TABLE_SCHEMA = {schema_literal} \
             ORDER BY c.ORDINAL_POSITION"
        );
        let pk_sql = format!(
            "SELECT kcu.COLUMN_NAME \
             FROM {db}.INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
             JOIN {db}.INFORMATION_SCHEMA.KEY_COLUMN_USAGE kcu \
             ON kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
             WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY' \
             AND tc.TABLE_NAME = {name_literal} AND tc.TABLE_SCHEMA = {schema_literal}"
        );

        let mut connection = self.connection()?;
        let pk_columns: Vec<String> = connection
            .query(&pk_sql)?
            .rows
            .iter()
            .filter_map(|r| cell_text(r, 0))
            .collect();

        let result = connection.query(&sql)?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| {
                let name = cell_text(row, 0)?;
                let spelling = assemble_spelling(
                    &cell_text(row, 1)?,
                    cell_i64(row, 2),
                    cell_i64(row, 3),
                    cell_i64(row, 4),
                );
                Some(DiscoveredColumn {
                    is_primary_key: pk_columns.iter().any(|p| p.eq_ignore_ascii_case(&name)),
                    allow_nulls: cell_text(row, 5)
                        .map(|v| v.eq_ignore_ascii_case("YES"))
                        .unwrap_or(true),
                    collation: cell_text(row, 6),
                    is_auto_increment: cell_i64(row, 7) == Some(1),
                    name,
                    data_type: spelling,
                })
            })
            .collect())
    }

    fn discover_columns_mysql(&self) -> Result<Vec<DiscoveredColumn>, DiscoveryError> {
        let syntax = self.syntax()?;
        let sql = format!(
            "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_KEY, EXTRA, COLLATION_NAME \
             FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} \
             ORDER BY ORDINAL_POSITION",
            syntax.quote_string(self.database.name()),
            syntax.quote_string(&self.name)
        );
        let mut connection = self.connection()?;
        let result = connection.query(&sql)?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| {
                Some(DiscoveredColumn {
                    name: cell_text(row, 0)?,
                    // COLUMN_TYPE already carries the full spelling, e.g. varchar(10)
                    data_type: cell_text(row, 1)?,
                    allow_nulls: cell_text(row, 2)
                        .map(|v| v.eq_ignore_ascii_case("YES"))
                        .unwrap_or(true),
                    is_primary_key: cell_text(row, 3)
                        .map(|v| v.eq_ignore_ascii_case("PRI"))
                        .unwrap_or(false),
                    is_auto_increment: cell_text(row, 4)
                        .map(|v| v.to_lowercase().contains("auto_increment"))
                        .unwrap_or(false),
                    collation: cell_text(row, 5),
                })
            })
            .collect())
    }

    fn discover_columns_postgres(&self) -> Result<Vec<DiscoveredColumn>, DiscoveryError> {
        let syntax = self.syntax()?;
        let schema = self.schema.as_deref().unwrap_or("public");
        let name_literal = syntax.quote_string(&self.name);
        let schema_literal = syntax.quote_string(schema);

        let sql = format!(
            "SELECT column_name, data_type, character_maximum_length, numeric_precision, \
             numeric_scale, is_nullable, collation_name, column_default, is_identity \
             FROM information_schema.columns \
             WHERE table_schema = {schema_literal} AND table_name = {name_literal} \
             ORDER BY ordinal_position"
        );
        let pk_sql = format!(
            "SELECT kcu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
             ON kcu.constraint_name = tc.constraint_name \
             WHERE tc.constraint_type = 'PRIMARY KEY' \
             AND tc.table_schema = {schema_literal} AND tc.table_name = {name_literal}"
        );

        let mut connection = self.connection()?;
        let pk_columns: Vec<String> = connection
            .query(&pk_sql)?
            .rows
            .iter()
            .filter_map(|r| cell_text(r, 0))
            .collect();

        let result = connection.query(&sql)?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| {
                let name = cell_text(row, 0)?;
                let spelling = assemble_spelling(
                    &cell_text(row, 1)?,
                    cell_i64(row, 2),
                    cell_i64(row, 3),
                    cell_i64(row, 4),
                );
                let default_is_sequence = cell_text(row, 7)
                    .map(|d| d.starts_with("nextval"))
                    .unwrap_or(false);
                Some(DiscoveredColumn {
                    is_primary_key: pk_columns.contains(&name),
                    allow_nulls: cell_text(row, 5)
                        .map(|v| v.eq_ignore_ascii_case("YES"))
                        .unwrap_or(true),
                    collation: cell_text(row, 6),
                    is_auto_increment: default_is_sequence
                        || cell_text(row, 8)
                            .map(|v| v.eq_ignore_ascii_case("YES"))
                            .unwrap_or(false),
                    name,
                    data_type: spelling,
                })
            })
            .collect())
    }

    fn discover_columns_oracle(&self) -> Result<Vec<DiscoveredColumn>, DiscoveryError> {
        let syntax = self.syntax()?;
        let owner_literal = syntax.quote_string(self.database.name());
        let name_literal = syntax.quote_string(&self.name);

        let sql = format!(
            "SELECT column_name, data_type, char_length, data_precision, data_scale, \
             nullable, identity_column \
             FROM all_tab_columns \
             WHERE owner = UPPER({owner_literal}) AND table_name = UPPER({name_literal}) \
             ORDER BY column_id"
        );
        let pk_sql = format!(
            "SELECT acc.column_name \
             FROM all_constraints ac \
             JOIN all_cons_columns acc ON acc.constraint_name = ac.constraint_name \
             AND acc.owner = ac.owner \
             WHERE ac.constraint_type = 'P' \
             AND ac.owner = UPPER({owner_literal}) AND ac.table_name = UPPER({name_literal})"
        );

        let mut connection = self.connection()?;
        let pk_columns: Vec<String> = connection
            .query(&pk_sql)?
            .rows
            .iter()
            .filter_map(|r| cell_text(r, 0))
            .collect();

        let result = connection.query(&sql)?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| {
                let name = cell_text(row, 0)?;
                let spelling = assemble_spelling(
                    &cell_text(row, 1)?,
                    cell_i64(row, 2),
                    cell_i64(row, 3),
                    cell_i64(row, 4),
                );
                Some(DiscoveredColumn {
                    is_primary_key: pk_columns.contains(&name),
                    allow_nulls: cell_text(row, 5)
                        .map(|v| v.eq_ignore_ascii_case("Y"))
                        .unwrap_or(true),
                    collation: None,
                    is_auto_increment: cell_text(row, 6)
                        .map(|v| v.eq_ignore_ascii_case("YES"))
                        .unwrap_or(false),
                    name,
                    data_type: spelling,
                })
            })
            .collect())
    }

    fn discover_columns_sqlite(&self) -> Result<Vec<DiscoveredColumn>, DiscoveryError> {
        let syntax = self.syntax()?;
        let mut connection = self.connection()?;

        // AUTOINCREMENT only shows in the original CREATE TABLE text
        let ddl_sql = format!(
            "SELECT sql FROM sqlite_master WHERE name = {}",
            syntax.quote_string(&self.name)
        );
        let table_ddl = connection
            .query(&ddl_sql)?
            .scalar()
            .map(|v| v.to_display_string().to_uppercase())
            .unwrap_or_default();
        let has_autoincrement = table_ddl.contains("AUTOINCREMENT");

        let sql = format!("PRAGMA table_info({})", syntax.ensure_wrapped(&self.name));
        let result = connection.query(&sql)?;
        let name_idx = result.column_index("name").unwrap_or(1);
        let type_idx = result.column_index("type").unwrap_or(2);
        let notnull_idx = result.column_index("notnull").unwrap_or(3);
        let pk_idx = result.column_index("pk").unwrap_or(5);

        Ok(result
            .rows
            .iter()
            .filter_map(|row| {
                let name = cell_text(row, name_idx)?;
                let data_type = cell_text(row, type_idx).unwrap_or_else(|| "TEXT".into());
                let is_primary_key = cell_i64(row, pk_idx).unwrap_or(0) > 0;
                Some(DiscoveredColumn {
                    allow_nulls: cell_i64(row, notnull_idx).unwrap_or(0) == 0 && !is_primary_key,
                    is_auto_increment: is_primary_key
                        && has_autoincrement
                        && data_type.eq_ignore_ascii_case("INTEGER"),
                    is_primary_key,
                    collation: None,
                    name,
                    data_type,
                })
            })
            .collect())
    }
}

fn cell_text(row: &Row, index: usize) -> Option<String> {
    row.get(index)
        .filter(|v| !v.is_null())
        .map(|v| v.to_display_string())
}

fn cell_i64(row: &Row, index: usize) -> Option<i64> {
    row.get(index).and_then(|v| v.as_i64())
}

/// Rebuild the concrete spelling from the parts metadata views report
/// separately: `varchar` + 10 becomes `varchar(10)`, `-1` means `(max)`,
/// decimals get `(precision,scale)`.
fn assemble_spelling(
    data_type: &str,
    char_length: Option<i64>,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    let lower = data_type.to_lowercase();
    let char_family = lower.contains("char") || lower == "binary" || lower == "varbinary";
    if char_family {
        return match char_length {
            Some(-1) => format!("{}(max)", data_type),
            Some(n) if n > 0 => format!("{}({})", data_type, n),
            _ => data_type.to_string(),
        };
    }
    let decimal_family = matches!(lower.as_str(), "decimal" | "numeric" | "number" | "dec");
    if decimal_family {
        if let Some(p) = precision {
            return format!("{}({},{})", data_type, p, scale.unwrap_or(0));
        }
    }
    data_type.to_string()
}
