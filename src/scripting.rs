//! DDL scripting and the cross-dialect UPDATE-from-JOIN helper.
//!
//! `create_table_sql` turns column definitions into a CREATE TABLE for any
//! dialect; `script_table_creation` reproduces an existing table's DDL,
//! optionally retargeted at another engine with every column type run
//! through the type translators. Identity spellings differ everywhere:
//!
//! - MsSql: `IDENTITY(1,1)`
//! - MySql: `AUTO_INCREMENT`
//! - PostgreSql: `GENERATED ALWAYS AS IDENTITY`
//! - Oracle: `GENERATED BY DEFAULT AS IDENTITY`
//! - Sqlite: the column must be spelled `INTEGER PRIMARY KEY AUTOINCREMENT`

use crate::dialect::{registry, DatabaseType};
use crate::discovery::{DiscoveredTable, DiscoveryError};
use crate::types::TypeRequest;

/// The type a column definition asks for: a logical request (translated per
/// dialect) or a literal spelling used verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDataType {
    Request(TypeRequest),
    Spelling(String),
}

impl From<TypeRequest> for ColumnDataType {
    fn from(request: TypeRequest) -> Self {
        ColumnDataType::Request(request)
    }
}

/// One column of a table being created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: ColumnDataType,
    pub allow_nulls: bool,
    pub is_primary_key: bool,
    pub is_auto_increment: bool,
    pub collation: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<ColumnDataType>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            allow_nulls: true,
            is_primary_key: false,
            is_auto_increment: false,
            collation: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.allow_nulls = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.allow_nulls = false;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        // auto-increment implies non-null
        self.allow_nulls = false;
        self
    }

    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }
}

/// CREATE TABLE DDL for the given dialect.
pub fn create_table_sql(
    database_type: DatabaseType,
    database: &str,
    schema: Option<&str>,
    table: &str,
    columns: &[ColumnDefinition],
) -> Result<String, DiscoveryError> {
    let dialect = registry::get(database_type)?;
    let syntax = dialect.syntax_helper();
    let translator = dialect.type_translator();
    let fqn = syntax.ensure_fully_qualified(database, schema, table, None);

    let mut lines: Vec<String> = Vec::with_capacity(columns.len() + 1);
    let mut pk_columns: Vec<String> = Vec::new();

    for column in columns {
        let wrapped = syntax.ensure_wrapped(&column.name);

        // Sqlite's rowid alias is the whole identity mechanism
        if database_type == DatabaseType::Sqlite && column.is_auto_increment {
            lines.push(format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", wrapped));
            continue;
        }

        let spelling = match &column.data_type {
            ColumnDataType::Request(request) => translator.sql_type_for(request)?,
            ColumnDataType::Spelling(spelling) => spelling.clone(),
        };
        let mut line = format!("{} {}", wrapped, spelling);
        if let Some(collation) = &column.collation {
            line.push_str(&format!(" COLLATE {}", collation));
        }
        if column.is_auto_increment {
            let identity = match database_type {
                DatabaseType::MsSql => "IDENTITY(1,1)",
                DatabaseType::MySql => "AUTO_INCREMENT",
                DatabaseType::PostgreSql => "GENERATED ALWAYS AS IDENTITY",
                DatabaseType::Oracle => "GENERATED BY DEFAULT AS IDENTITY",
                DatabaseType::Sqlite => unreachable!("handled above"),
            };
            line.push(' ');
            line.push_str(identity);
        }
        line.push_str(if column.allow_nulls && !column.is_primary_key {
            " NULL"
        } else {
            " NOT NULL"
        });
        lines.push(line);

        if column.is_primary_key {
            pk_columns.push(wrapped);
        }
    }

    if !pk_columns.is_empty() {
        let constraint = match database_type {
            DatabaseType::MySql | DatabaseType::Sqlite => {
                format!("PRIMARY KEY ({})", pk_columns.join(", "))
            }
            _ => format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                syntax.ensure_wrapped(&format!("PK_{}", table)),
                pk_columns.join(", ")
            ),
        };
        lines.push(constraint);
    }

    Ok(format!("CREATE TABLE {} (\n{}\n)", fqn, lines.join(",\n")))
}

/// Where a scripted table should be created.
#[derive(Debug, Clone)]
pub struct TargetTable {
    pub database_type: DatabaseType,
    pub database: String,
    pub schema: Option<String>,
    pub table: String,
}

impl TargetTable {
    pub fn from_table(table: &DiscoveredTable) -> Self {
        Self {
            database_type: table.database_type(),
            database: table.database().name().to_string(),
            schema: table.schema().map(|s| s.to_string()),
            table: table.name().to_string(),
        }
    }
}

/// Options for [`script_table_creation`].
#[derive(Debug, Clone, Default)]
pub struct TableScriptOptions {
    pub drop_primary_keys: bool,
    pub drop_nullability: bool,
    pub convert_identity_to_int: bool,
    /// Script for another table (possibly on another engine) instead of
    /// recreating in place.
    pub target: Option<TargetTable>,
}

/// Reproduce a table's CREATE TABLE, optionally retargeted to another
/// dialect. Retargeting round-trips every column spelling through the type
/// translators, so a MsSql `datetime2` scripts as a MySql `datetime`.
pub fn script_table_creation(
    table: &DiscoveredTable,
    options: &TableScriptOptions,
) -> Result<String, DiscoveryError> {
    let source_type = table.database_type();
    let source_translator = registry::get(source_type)?;
    let source_translator = source_translator.type_translator();

    let target = options
        .target
        .clone()
        .unwrap_or_else(|| TargetTable::from_table(table));
    let target_dialect = registry::get(target.database_type)?;
    let target_translator = target_dialect.type_translator();

    let mut definitions = Vec::new();
    for column in table.discover_columns()? {
        let mut auto_increment = column.is_auto_increment;
        let data_type = if options.convert_identity_to_int && auto_increment {
            auto_increment = false;
            ColumnDataType::Spelling(
                target_translator.sql_type_for(&TypeRequest::new(crate::types::ValueKind::Int32))?,
            )
        } else if target.database_type != source_type {
            ColumnDataType::Spelling(
                source_translator.translate(&column.data_type, target_translator)?,
            )
        } else {
            ColumnDataType::Spelling(column.data_type.clone())
        };

        definitions.push(ColumnDefinition {
            name: column.name.clone(),
            data_type,
            allow_nulls: column.allow_nulls || options.drop_nullability,
            is_primary_key: column.is_primary_key && !options.drop_primary_keys,
            is_auto_increment: auto_increment,
            // collations are engine-specific; they never survive retargeting
            collation: column
                .collation
                .filter(|_| target.database_type == source_type),
        })
    }

    create_table_sql(
        target.database_type,
        &target.database,
        target.schema.as_deref(),
        &target.table,
        &definitions,
    )
}

/// Cross-dialect UPDATE of `table1` from a join against `table2`.
///
/// Predicates and set clauses refer to the tables as `t1` and `t2`. Engines
/// disagree on everything here: MsSql updates the alias FROM a join, MySql
/// updates the join itself, PostgreSql and Sqlite take a FROM clause with
/// the join condition in WHERE, and Oracle has no UPDATE-from at all so a
/// MERGE is used.
pub fn update_from_join_sql(
    database_type: DatabaseType,
    table1: &str,
    table2: &str,
    set_clauses: &[String],
    join_predicates: &[String],
    where_predicates: &[String],
) -> Result<String, DiscoveryError> {
    if set_clauses.is_empty() {
        return Err(DiscoveryError::EmptyResult {
            sql: "UPDATE with no SET clauses".into(),
        });
    }
    let sets = set_clauses.join(",\n");
    let joins = join_predicates.join("\nAND ");
    let wheres = where_predicates.join("\nAND ");

    let sql = match database_type {
        DatabaseType::MsSql => {
            let mut sql = format!(
                "UPDATE t1\nSET\n{sets}\nFROM {table1} t1\nJOIN {table2} t2 ON {joins}"
            );
            if !wheres.is_empty() {
                sql.push_str(&format!("\nWHERE {wheres}"));
            }
            sql
        }
        DatabaseType::MySql => {
            let mut sql =
                format!("UPDATE {table1} t1\nJOIN {table2} t2 ON {joins}\nSET\n{sets}");
            if !wheres.is_empty() {
                sql.push_str(&format!("\nWHERE {wheres}"));
            }
            sql
        }
        DatabaseType::PostgreSql | DatabaseType::Sqlite => {
            let mut predicates = join_predicates.to_vec();
            predicates.extend(where_predicates.iter().cloned());
            format!(
                "UPDATE {table1} AS t1\nSET\n{sets}\nFROM {table2} AS t2\nWHERE {}",
                predicates.join("\nAND ")
            )
        }
        DatabaseType::Oracle => {
            let mut sql = format!(
                "MERGE INTO {table1} t1\nUSING {table2} t2\nON ({joins})\n\
                 WHEN MATCHED THEN UPDATE SET\n{sets}"
            );
            if !wheres.is_empty() {
                sql.push_str(&format!("\nWHERE {wheres}"));
            }
            sql
        }
    };
    Ok(sql)
}
