//! Bulk ingest: validate everything, then insert, never the other way
//! around.
//!
//! [`BulkCopy`] takes a [`TableData`] batch and runs three passes before any
//! SQL executes:
//!
//! 1. column mapping — every input column must match a destination column
//!    by name (unless unmatched inputs are tolerated)
//! 2. string-to-hard-type conversion — string sources destined for dates,
//!    times, numbers, booleans or GUIDs are parsed up front (date ordering
//!    sniffed from the data, see [`DateFormatDecider`]), replacing the
//!    column in place so ordinals and primary-key membership survive
//! 3. validation — width, precision/scale, integer range and nullability
//!    checks against rules precomputed from the destination columns
//!
//! Any failure aborts the whole batch with a row-indexed error; no partial
//! insert occurs.

mod convert;
mod validate;

pub use convert::DateFormatDecider;

use thiserror::Error;

use crate::connection::{ConnectionError, ManagedConnection};
use crate::dialect::{registry, DatabaseType};
use crate::discovery::{DiscoveredColumn, DiscoveredTable, DiscoveryError};
use crate::driver::{Row, Value};
use crate::syntax::SyntaxHelper;
use crate::types::{TypeMapError, TypeRequest, ValueKind};

/// Errors from the bulk-ingest pipeline.
#[derive(Debug, Error)]
pub enum BulkError {
    /// An input column matched nothing on the destination.
    #[error("input column {0:?} has no matching destination column")]
    ColumnMapping(String),

    /// A row failed a precomputed constraint. Row indices are 1-based.
    #[error("row {row}: value {value:?} in column {column:?} {problem}")]
    Validation {
        row: usize,
        column: String,
        value: String,
        problem: String,
    },

    /// A string value would not parse as the destination's hard type.
    #[error("row {row}: could not parse {value:?} in column {column:?} as {kind}")]
    Parse {
        row: usize,
        column: String,
        value: String,
        kind: ValueKind,
    },

    #[error("row has {got} cells but the table has {expected} columns")]
    RowArity { expected: usize, got: usize },

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    TypeMap(#[from] TypeMapError),
}

/// One column of an in-memory batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataColumn {
    pub name: String,
    pub kind: ValueKind,
    pub is_primary_key: bool,
}

/// An in-memory tabular batch headed for a table.
#[derive(Debug, Clone, Default)]
pub struct TableData {
    columns: Vec<DataColumn>,
    rows: Vec<Row>,
}

impl TableData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column; returns its ordinal.
    pub fn add_column(&mut self, name: impl Into<String>, kind: ValueKind) -> usize {
        self.columns.push(DataColumn {
            name: name.into(),
            kind,
            is_primary_key: false,
        });
        self.columns.len() - 1
    }

    pub fn columns(&self) -> &[DataColumn] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn add_row(&mut self, row: Row) -> Result<(), BulkError> {
        if row.len() != self.columns.len() {
            return Err(BulkError::RowArity {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn set_kind(&mut self, ordinal: usize, kind: ValueKind) {
        if let Some(column) = self.columns.get_mut(ordinal) {
            column.kind = kind;
        }
    }

    pub(crate) fn cell_mut(&mut self, row: usize, ordinal: usize) -> Option<&mut Value> {
        self.rows.get_mut(row).and_then(|r| r.get_mut(ordinal))
    }
}

/// A source column resolved against its destination.
struct MappedColumn {
    source_ordinal: usize,
    destination: DiscoveredColumn,
    request: TypeRequest,
}

/// Batch inserter for one destination table.
pub struct BulkCopy {
    connection: ManagedConnection,
    table_fqn: String,
    destination_columns: Vec<DiscoveredColumn>,
    database_type: DatabaseType,
    /// Tolerate input columns with no destination counterpart.
    pub allow_unmatched_input_columns: bool,
    batch_size: usize,
}

impl BulkCopy {
    pub(crate) const DEFAULT_BATCH_SIZE: usize = 500;

    /// Prepare a bulk insert into `table`, discovering its columns once.
    pub fn new(table: &DiscoveredTable) -> Result<Self, DiscoveryError> {
        // discover before checking out the connection, so the discovery
        // queries can reuse the same pooled session
        let destination_columns = table.discover_columns()?;
        Ok(Self {
            table_fqn: table.fully_qualified_name()?,
            connection: table.database().get_managed_connection(None)?,
            destination_columns,
            database_type: table.database_type(),
            allow_unmatched_input_columns: false,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn syntax(&self) -> Result<SyntaxHelper, BulkError> {
        Ok(registry::get(self.database_type)
            .map_err(DiscoveryError::from)?
            .syntax_helper()
            .clone())
    }

    fn map_columns(&self, data: &TableData) -> Result<Vec<MappedColumn>, BulkError> {
        let translator = registry::get(self.database_type).map_err(DiscoveryError::from)?;
        let translator = translator.type_translator();

        let mut mapped = Vec::new();
        for (ordinal, column) in data.columns().iter().enumerate() {
            let destination = self
                .destination_columns
                .iter()
                .find(|d| d.name.eq_ignore_ascii_case(&column.name));
            match destination {
                Some(destination) => {
                    let request = translator
                        .type_request_for(&destination.data_type)
                        .unwrap_or_else(|| TypeRequest::new(ValueKind::Text));
                    mapped.push(MappedColumn {
                        source_ordinal: ordinal,
                        destination: destination.clone(),
                        request,
                    });
                }
                None if self.allow_unmatched_input_columns => {}
                None => return Err(BulkError::ColumnMapping(column.name.clone())),
            }
        }
        Ok(mapped)
    }

    /// Validate the whole batch, then insert it. Returns the row count.
    pub fn upload(&mut self, data: &mut TableData) -> Result<usize, BulkError> {
        let mapped = self.map_columns(data)?;

        convert::convert_string_columns(data, &mapped)?;
        let rules = validate::build_rules(data, &mapped);
        validate::validate_rows(data, &rules)?;

        if data.rows().is_empty() {
            return Ok(0);
        }
        self.insert(data, &mapped)?;
        Ok(data.row_count())
    }

    fn insert(&mut self, data: &TableData, mapped: &[MappedColumn]) -> Result<(), BulkError> {
        let syntax = self.syntax()?;
        let column_list: Vec<String> = mapped
            .iter()
            .map(|m| syntax.ensure_wrapped(&m.destination.name))
            .collect();

        for batch in data.rows().chunks(self.batch_size) {
            let mut tuples = Vec::with_capacity(batch.len());
            for row in batch {
                let rendered: Vec<String> = mapped
                    .iter()
                    .map(|m| {
                        render_literal(
                            &row[m.source_ordinal],
                            m.request.kind,
                            self.database_type,
                            &syntax,
                        )
                    })
                    .collect();
                tuples.push(format!("({})", rendered.join(", ")));
            }
            let sql = format!(
                "INSERT INTO {} ({}) VALUES\n{}",
                self.table_fqn,
                column_list.join(", "),
                tuples.join(",\n")
            );
            self.connection.execute(&sql)?;
        }
        Ok(())
    }

    /// Release the connection back to the pool.
    pub fn dispose(self) {}
}

/// Render a cell as a SQL literal for the destination kind.
fn render_literal(
    value: &Value,
    kind: ValueKind,
    database: DatabaseType,
    syntax: &SyntaxHelper,
) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::Bool(b) => {
            let rendered = match (database, *b) {
                (DatabaseType::PostgreSql, true) => "TRUE",
                (DatabaseType::PostgreSql, false) => "FALSE",
                (_, true) => "1",
                (_, false) => "0",
            };
            rendered.into()
        }
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bytes(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            match database {
                DatabaseType::Sqlite => format!("X'{}'", hex),
                DatabaseType::PostgreSql => format!("'\\x{}'", hex),
                DatabaseType::Oracle => format!("HEXTORAW('{}')", hex),
                _ => format!("0x{}", hex),
            }
        }
        Value::Text(s) => {
            // Oracle date columns refuse bare ISO literals
            if database == DatabaseType::Oracle && kind == ValueKind::DateTime {
                return format!(
                    "TO_TIMESTAMP({}, 'YYYY-MM-DD HH24:MI:SS')",
                    syntax.quote_string(s)
                );
            }
            if database == DatabaseType::Oracle && kind == ValueKind::Date {
                return format!("TO_DATE({}, 'YYYY-MM-DD')", syntax.quote_string(s));
            }
            let quoted = syntax.quote_string(s);
            if database == DatabaseType::MsSql && !s.is_ascii() {
                format!("N{}", quoted)
            } else {
                quoted
            }
        }
    }
}
