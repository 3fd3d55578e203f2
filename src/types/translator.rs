//! Bidirectional mapping between [`TypeRequest`]s and engine SQL type
//! spellings.
//!
//! Engine differences handled here:
//!
//! - Bounded vs unbounded strings: `varchar(N)` flips to `varchar(max)` /
//!   `longtext` / `text` / `CLOB` past a per-engine width threshold
//! - Unicode strings: `nvarchar` (MsSql), `nvarchar2` (Oracle); MySql and
//!   PostgreSql carry unicode in the charset, Sqlite in the TEXT affinity
//! - Oracle spells every integer as `NUMBER(n)` and coerces `INT`,
//!   `SMALLINT` and `DECIMAL` to `NUMBER(38)` internally
//! - Sqlite columns are affinities, not types; everything stringy is `TEXT`
//!
//! The reverse mapping is a per-engine table of case-insensitive anchored
//! recognizer rules, matched in declaration order. Display widths on integer
//! spellings (`int(11)`, `NUMBER` display forms) are stripped; widths are
//! honored only on char-family and decimal spellings.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

use super::{DecimalSize, Guesser, TypeRequest, ValueKind, UNBOUNDED};
use crate::dialect::DatabaseType;

/// Errors from the type translation engine.
#[derive(Debug, Error)]
pub enum TypeMapError {
    /// No SQL spelling exists on this engine for the requested logical type.
    #[error("no {database} type mapping exists for logical type {kind}")]
    NotMapped {
        database: DatabaseType,
        kind: ValueKind,
    },

    /// The engine spelling did not match any recognizer rule.
    #[error("could not parse {spelling:?} as a {database} type")]
    Unparseable {
        database: DatabaseType,
        spelling: String,
    },
}

/// What a recognizer rule yields when it matches.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    /// A fixed kind; any parenthesized argument is a display width and is
    /// dropped.
    Kind(ValueKind),
    /// Char-family spelling; a `(N)` argument is the width, `(max)` is
    /// unbounded.
    String { unicode: bool },
    /// Spelling that is always unbounded (`text`, `ntext`, `CLOB`).
    UnboundedString { unicode: bool },
    /// Decimal spelling; `(p,s)` is precision/scale.
    Decimal,
    /// Oracle `NUMBER`: precision/scale decide between bool, the integer
    /// family, and decimal.
    OracleNumber,
}

#[derive(Debug)]
struct TypeRule {
    pattern: Regex,
    outcome: Outcome,
}

fn rule(pattern: &str, outcome: Outcome) -> TypeRule {
    let pattern = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("recognizer patterns are static and valid");
    TypeRule { pattern, outcome }
}

/// Parenthesized argument list on a type spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeArgs {
    None,
    Max,
    One(u32),
    Two(u32, u32),
}

static ARGS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(r"\(\s*(max|\d+)\s*(?:,\s*(\d+)\s*)?\)")
        .case_insensitive(true)
        .build()
        .expect("argument pattern is static and valid")
});

fn parse_args(spelling: &str) -> TypeArgs {
    let Some(caps) = ARGS_PATTERN.captures(spelling) else {
        return TypeArgs::None;
    };
    let first = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    if first.eq_ignore_ascii_case("max") {
        return TypeArgs::Max;
    }
    let Ok(first) = first.parse::<u32>() else {
        return TypeArgs::None;
    };
    match caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok()) {
        Some(second) => TypeArgs::Two(first, second),
        None => TypeArgs::One(first),
    }
}

/// Per-engine type translator.
///
/// One instance per dialect, built by the dialect's constructor and reached
/// through the registry. Holds the bounded-string crossover thresholds, the
/// default width applied when a text request carries none, and the
/// recognizer rule table for the reverse mapping.
#[derive(Debug)]
pub struct TypeTranslator {
    database: DatabaseType,
    max_ascii_width: usize,
    max_unicode_width: usize,
    default_string_width: usize,
    rules: Vec<TypeRule>,
}

impl TypeTranslator {
    pub fn new(database: DatabaseType) -> Self {
        let (max_ascii_width, max_unicode_width) = match database {
            DatabaseType::MsSql => (8000, 4000),
            DatabaseType::MySql => (65535, 65535),
            DatabaseType::PostgreSql => (10_485_760, 10_485_760),
            DatabaseType::Oracle => (4000, 4000),
            DatabaseType::Sqlite => (UNBOUNDED, UNBOUNDED),
        };
        Self {
            database,
            max_ascii_width,
            max_unicode_width,
            default_string_width: 100,
            rules: rules_for(database),
        }
    }

    pub fn with_default_string_width(mut self, width: usize) -> Self {
        self.default_string_width = width;
        self
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database
    }

    /// The bounded-string width beyond which the unbounded spelling is used.
    pub fn max_string_width(&self, unicode: bool) -> usize {
        if unicode {
            self.max_unicode_width
        } else {
            self.max_ascii_width
        }
    }

    pub fn default_string_width(&self) -> usize {
        self.default_string_width
    }

    /// The concrete SQL type spelling for a request.
    pub fn sql_type_for(&self, request: &TypeRequest) -> Result<String, TypeMapError> {
        let db = self.database;
        let spelling = match request.kind {
            ValueKind::Text => self.string_spelling(request),
            ValueKind::Decimal => self.decimal_spelling(request),
            ValueKind::Bool => match db {
                DatabaseType::MsSql | DatabaseType::MySql => "bit".into(),
                DatabaseType::PostgreSql => "boolean".into(),
                DatabaseType::Oracle => "number(1)".into(),
                DatabaseType::Sqlite => "BOOLEAN".into(),
            },
            ValueKind::Byte => match db {
                DatabaseType::MsSql | DatabaseType::MySql => "tinyint".into(),
                DatabaseType::PostgreSql => "smallint".into(),
                DatabaseType::Oracle => "number(3)".into(),
                DatabaseType::Sqlite => "INTEGER".into(),
            },
            ValueKind::Int16 => match db {
                DatabaseType::Oracle => "number(5)".into(),
                DatabaseType::Sqlite => "INTEGER".into(),
                _ => "smallint".into(),
            },
            ValueKind::Int32 => match db {
                DatabaseType::Oracle => "number(10)".into(),
                DatabaseType::Sqlite => "INTEGER".into(),
                _ => "int".into(),
            },
            ValueKind::Int64 => match db {
                DatabaseType::Oracle => "number(19)".into(),
                DatabaseType::Sqlite => "INTEGER".into(),
                _ => "bigint".into(),
            },
            ValueKind::Float32 => match db {
                DatabaseType::MsSql | DatabaseType::PostgreSql => "real".into(),
                DatabaseType::MySql => "float".into(),
                DatabaseType::Oracle => "binary_float".into(),
                DatabaseType::Sqlite => "REAL".into(),
            },
            ValueKind::Float64 => match db {
                DatabaseType::MsSql => "float".into(),
                DatabaseType::MySql => "double".into(),
                DatabaseType::PostgreSql => "double precision".into(),
                DatabaseType::Oracle => "binary_double".into(),
                DatabaseType::Sqlite => "REAL".into(),
            },
            ValueKind::DateTime => match db {
                DatabaseType::MsSql => "datetime2".into(),
                DatabaseType::MySql => "datetime".into(),
                DatabaseType::PostgreSql => "timestamp".into(),
                DatabaseType::Oracle => "DATE".into(),
                DatabaseType::Sqlite => "TEXT".into(),
            },
            ValueKind::Date => match db {
                DatabaseType::Sqlite => "TEXT".into(),
                _ => "date".into(),
            },
            ValueKind::Time | ValueKind::Duration => match db {
                DatabaseType::Oracle => "TIMESTAMP".into(),
                DatabaseType::Sqlite => "TEXT".into(),
                _ => "time".into(),
            },
            ValueKind::Bytes => match db {
                DatabaseType::MsSql => "varbinary(max)".into(),
                DatabaseType::MySql => "longblob".into(),
                DatabaseType::PostgreSql => "bytea".into(),
                DatabaseType::Oracle => "blob".into(),
                DatabaseType::Sqlite => "BLOB".into(),
            },
            ValueKind::Uuid => match db {
                DatabaseType::MsSql => "uniqueidentifier".into(),
                DatabaseType::MySql => "char(36)".into(),
                DatabaseType::PostgreSql => "uuid".into(),
                DatabaseType::Oracle => "raw(16)".into(),
                DatabaseType::Sqlite => "TEXT".into(),
            },
        };
        Ok(spelling)
    }

    fn string_spelling(&self, request: &TypeRequest) -> String {
        if self.database == DatabaseType::Sqlite {
            return "TEXT".into();
        }
        let width = if request.is_unbounded() {
            UNBOUNDED
        } else {
            request.width.unwrap_or(self.default_string_width)
        };
        let bounded = width <= self.max_string_width(request.unicode);
        match (self.database, request.unicode, bounded) {
            (DatabaseType::MsSql, true, true) => format!("nvarchar({})", width),
            (DatabaseType::MsSql, true, false) => "nvarchar(max)".into(),
            (DatabaseType::MsSql, false, true) => format!("varchar({})", width),
            (DatabaseType::MsSql, false, false) => "varchar(max)".into(),
            // MySql carries unicode in the column charset, not the spelling
            (DatabaseType::MySql, _, true) => format!("varchar({})", width),
            (DatabaseType::MySql, _, false) => "longtext".into(),
            (DatabaseType::PostgreSql, _, true) => format!("character varying({})", width),
            (DatabaseType::PostgreSql, _, false) => "text".into(),
            (DatabaseType::Oracle, true, true) => format!("nvarchar2({})", width),
            (DatabaseType::Oracle, true, false) => "NCLOB".into(),
            (DatabaseType::Oracle, false, true) => format!("varchar2({})", width),
            (DatabaseType::Oracle, false, false) => "CLOB".into(),
            (DatabaseType::Sqlite, _, _) => "TEXT".into(),
        }
    }

    fn decimal_spelling(&self, request: &TypeRequest) -> String {
        let base = match self.database {
            DatabaseType::Oracle => "NUMBER",
            DatabaseType::Sqlite => return "NUMERIC".into(),
            _ => "decimal",
        };
        match request.decimal_size {
            Some(size) if !size.is_empty() => {
                format!("{}({},{})", base, size.precision(), size.scale())
            }
            _ => base.into(),
        }
    }

    /// Parse an engine spelling back into a request.
    ///
    /// Returns `None` when no recognizer matches; callers treat that as an
    /// unsupported engine type.
    pub fn type_request_for(&self, spelling: &str) -> Option<TypeRequest> {
        let spelling = spelling.trim();
        if spelling.is_empty() {
            return None;
        }
        let args = parse_args(spelling);
        let matched = self.rules.iter().find(|r| r.pattern.is_match(spelling))?;
        Some(self.request_from(matched.outcome, args))
    }

    fn request_from(&self, outcome: Outcome, args: TypeArgs) -> TypeRequest {
        match outcome {
            Outcome::Kind(kind) => TypeRequest::new(kind),
            Outcome::String { unicode } => {
                let mut request = TypeRequest::new(ValueKind::Text);
                request.unicode = unicode;
                match args {
                    TypeArgs::One(n) => {
                        request.width = Some(n as usize);
                        request.explicit_width = true;
                    }
                    TypeArgs::Max => {
                        request.width = Some(UNBOUNDED);
                        request.explicit_width = true;
                    }
                    _ => {}
                }
                request
            }
            Outcome::UnboundedString { unicode } => {
                let mut request = TypeRequest::new(ValueKind::Text);
                request.unicode = unicode;
                request.width = Some(UNBOUNDED);
                request.explicit_width = true;
                request
            }
            Outcome::Decimal => {
                let mut request = TypeRequest::new(ValueKind::Decimal);
                request.decimal_size = match args {
                    TypeArgs::Two(p, s) => Some(DecimalSize::from_precision_scale(p, s)),
                    TypeArgs::One(p) => Some(DecimalSize::from_precision_scale(p, 0)),
                    _ => None,
                };
                request
            }
            Outcome::OracleNumber => oracle_number_request(args),
        }
    }

    /// Translate a spelling from this engine into `destination`'s spelling,
    /// preserving the logical request.
    pub fn translate(
        &self,
        spelling: &str,
        destination: &TypeTranslator,
    ) -> Result<String, TypeMapError> {
        let request = self
            .type_request_for(spelling)
            .ok_or_else(|| TypeMapError::Unparseable {
                database: self.database,
                spelling: spelling.to_string(),
            })?;
        destination.sql_type_for(&request)
    }

    /// A progressive-widening inferrer seeded with a column's current type.
    ///
    /// Feeding it string values yields the narrowest request that still
    /// losslessly holds everything seen. Unparseable spellings seed as an
    /// empty text request.
    pub fn guesser_for(&self, spelling: &str) -> Guesser {
        match self.type_request_for(spelling) {
            Some(request) => Guesser::from_request(request),
            None => Guesser::new(),
        }
    }
}

/// `NUMBER(p,s)` dispatch: scale picks decimal; precision picks the integer
/// family. Asking for `int` and reading back `number(10)` round-trips;
/// `number(38)` (what Oracle rewrites `INT` and `DECIMAL` to) reads back as
/// decimal.
fn oracle_number_request(args: TypeArgs) -> TypeRequest {
    let (precision, scale) = match args {
        TypeArgs::Two(p, s) => (p, s),
        TypeArgs::One(p) => (p, 0),
        _ => {
            return TypeRequest::new(ValueKind::Decimal);
        }
    };
    if scale > 0 {
        return TypeRequest::decimal(DecimalSize::from_precision_scale(precision, scale));
    }
    match precision {
        1 => TypeRequest::new(ValueKind::Bool),
        2..=3 => TypeRequest::new(ValueKind::Byte),
        4..=5 => TypeRequest::new(ValueKind::Int16),
        6..=10 => TypeRequest::new(ValueKind::Int32),
        11..=19 => TypeRequest::new(ValueKind::Int64),
        _ => TypeRequest::decimal(DecimalSize::from_precision_scale(precision, 0)),
    }
}

fn rules_for(database: DatabaseType) -> Vec<TypeRule> {
    use Outcome::*;
    use ValueKind::*;
    match database {
        DatabaseType::MsSql => vec![
            rule(r"^nvarchar", String { unicode: true }),
            rule(r"^nchar", String { unicode: true }),
            rule(r"^ntext", UnboundedString { unicode: true }),
            rule(r"^varchar", String { unicode: false }),
            rule(r"^char", String { unicode: false }),
            rule(r"^text", UnboundedString { unicode: false }),
            rule(r"^bit", Kind(Bool)),
            rule(r"^tinyint", Kind(Byte)),
            rule(r"^smallint", Kind(Int16)),
            rule(r"^bigint", Kind(Int64)),
            rule(r"^(int|integer)", Kind(Int32)),
            rule(r"^(decimal|numeric|money|smallmoney)", Outcome::Decimal),
            rule(r"^real", Kind(Float32)),
            rule(r"^float", Kind(Float64)),
            rule(
                r"^(datetime2|datetimeoffset|smalldatetime|datetime)",
                Kind(DateTime),
            ),
            // rowversion is the old "timestamp", an opaque byte counter
            rule(r"^(timestamp|rowversion)", Kind(Bytes)),
            rule(r"^time", Kind(Time)),
            rule(r"^date", Kind(Date)),
            rule(r"^(varbinary|binary|image)", Kind(Bytes)),
            rule(r"^uniqueidentifier", Kind(Uuid)),
        ],
        DatabaseType::MySql => vec![
            rule(r"^tinyint\s*\(\s*1\s*\)", Kind(Bool)),
            rule(r"^(bool|boolean|bit)", Kind(Bool)),
            rule(r"^tinyint", Kind(Byte)),
            rule(r"^smallint", Kind(Int16)),
            rule(r"^mediumint", Kind(Int32)),
            rule(r"^bigint", Kind(Int64)),
            rule(r"^(int|integer)", Kind(Int32)),
            rule(r"^year", Kind(Int16)),
            rule(r"^(decimal|numeric|dec|fixed)", Outcome::Decimal),
            rule(r"^float", Kind(Float32)),
            rule(r"^(double|real)", Kind(Float64)),
            rule(r"^(datetime|timestamp)", Kind(DateTime)),
            rule(r"^time", Kind(Time)),
            rule(r"^date", Kind(Date)),
            rule(r"^(nvarchar|nchar)", String { unicode: true }),
            rule(r"^(varchar|char)", String { unicode: false }),
            rule(
                r"^(tinytext|mediumtext|longtext|text)",
                UnboundedString { unicode: false },
            ),
            rule(
                r"^(tinyblob|mediumblob|longblob|blob|varbinary|binary)",
                Kind(Bytes),
            ),
            rule(r"^(enum|set)", String { unicode: false }),
        ],
        DatabaseType::PostgreSql => vec![
            rule(r"^(character varying|varchar)", String { unicode: false }),
            rule(r"^(character|char|bpchar)", String { unicode: false }),
            rule(r"^text", UnboundedString { unicode: false }),
            rule(r"^(bool|boolean)", Kind(Bool)),
            rule(r"^smallserial", Kind(Int16)),
            rule(r"^bigserial", Kind(Int64)),
            rule(r"^serial", Kind(Int32)),
            rule(r"^(smallint|int2)", Kind(Int16)),
            rule(r"^(bigint|int8)", Kind(Int64)),
            rule(r"^(integer|int4|int)", Kind(Int32)),
            rule(r"^(numeric|decimal)", Outcome::Decimal),
            rule(r"^(real|float4)", Kind(Float32)),
            rule(r"^(double precision|float8|float)", Kind(Float64)),
            rule(r"^timestamp", Kind(DateTime)),
            rule(r"^(timetz|time)", Kind(Time)),
            rule(r"^date", Kind(Date)),
            rule(r"^interval", Kind(Duration)),
            rule(r"^bytea", Kind(Bytes)),
            rule(r"^uuid", Kind(Uuid)),
        ],
        DatabaseType::Oracle => vec![
            rule(r"^nvarchar2?", String { unicode: true }),
            rule(r"^nchar", String { unicode: true }),
            rule(r"^nclob", UnboundedString { unicode: true }),
            rule(r"^varchar2?", String { unicode: false }),
            rule(r"^char(acter)?", String { unicode: false }),
            rule(r"^clob", UnboundedString { unicode: false }),
            rule(r"^long raw", Kind(Bytes)),
            rule(r"^long", UnboundedString { unicode: false }),
            rule(r"^number", OracleNumber),
            rule(r"^(integer|int)", Kind(Int32)),
            rule(r"^smallint", Kind(Int16)),
            rule(r"^(decimal|numeric)", Outcome::Decimal),
            rule(r"^binary_float", Kind(Float32)),
            rule(r"^(binary_double|float|real)", Kind(Float64)),
            // Oracle DATE carries a time of day; TIMESTAMP is its richer form
            rule(r"^timestamp", Kind(DateTime)),
            rule(r"^date", Kind(DateTime)),
            rule(r"^raw\s*\(\s*16\s*\)", Kind(Uuid)),
            rule(r"^raw", Kind(Bytes)),
            rule(r"^(blob|bfile)", Kind(Bytes)),
        ],
        DatabaseType::Sqlite => vec![
            rule(r"^(bool|boolean)", Kind(Bool)),
            rule(r"^tinyint", Kind(Byte)),
            rule(r"^smallint", Kind(Int16)),
            rule(r"^bigint", Kind(Int64)),
            rule(r"^(int|integer|mediumint)", Kind(Int32)),
            rule(r"^(numeric|decimal)", Outcome::Decimal),
            rule(r"^(real|double|float)", Kind(Float64)),
            rule(r"^(datetime|timestamp)", Kind(DateTime)),
            rule(r"^time", Kind(Time)),
            rule(r"^date", Kind(Date)),
            rule(r"^(nvarchar|nchar)", String { unicode: true }),
            rule(r"^(varchar|char)", String { unicode: false }),
            rule(r"^(text|clob)", UnboundedString { unicode: false }),
            rule(r"^blob", Kind(Bytes)),
        ],
    }
}
