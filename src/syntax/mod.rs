//! Identifier wrapping, name validation and qualified-name assembly.
//!
//! Engine differences handled here:
//!
//! - Quote characters: `[name]` (MsSql), `` `name` `` (MySql), `"name"`
//!   (PostgreSql, Oracle, Sqlite)
//! - Oracle uppercases unquoted identifiers, so runtime names come back
//!   uppercased
//! - MySql doubles an internal backtick when wrapping; unwrapping reverses it
//! - Sqlite has no database-level qualification; qualified names are
//!   `table.column` only
//! - Scalar function spellings (`LEN` vs `LENGTH`, `GETDATE()` vs `NOW()`)
//!
//! Names are always wrapped before reaching SQL, so [`validate_name`] checks
//! only blankness and length; special characters are allowed.
//!
//! [`validate_name`]: SyntaxHelper::validate_name

use thiserror::Error;

use crate::dialect::DatabaseType;

/// Errors raised by identifier handling.
#[derive(Debug, Error)]
pub enum SyntaxError {
    /// An identifier is null, blank, or longer than the engine permits.
    #[error("bad runtime name {name:?}: {reason}")]
    RuntimeName { name: String, reason: String },

    /// The operation is well-defined but this engine cannot express it.
    #[error("{0}")]
    NotSupported(String),
}

/// The closed set of scalar functions with per-engine spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    /// String length.
    Len,
    /// Current date and time.
    GetDate,
    /// Absolute value.
    Abs,
}

/// Per-engine identifier and spelling rules.
#[derive(Debug, Clone)]
pub struct SyntaxHelper {
    database: DatabaseType,
    open_qualifier: char,
    close_qualifier: char,
    alias_prefix: &'static str,
    supports_database_qualification: bool,
    uppercase_runtime_names: bool,
    max_name_length: usize,
    default_schema: Option<&'static str>,
}

impl SyntaxHelper {
    pub fn new(database: DatabaseType) -> Self {
        match database {
            DatabaseType::MsSql => Self {
                database,
                open_qualifier: '[',
                close_qualifier: ']',
                alias_prefix: " AS ",
                supports_database_qualification: true,
                uppercase_runtime_names: false,
                max_name_length: 128,
                default_schema: Some("dbo"),
            },
            DatabaseType::MySql => Self {
                database,
                open_qualifier: '`',
                close_qualifier: '`',
                alias_prefix: " AS ",
                supports_database_qualification: true,
                uppercase_runtime_names: false,
                max_name_length: 64,
                default_schema: None,
            },
            DatabaseType::PostgreSql => Self {
                database,
                open_qualifier: '"',
                close_qualifier: '"',
                alias_prefix: " AS ",
                supports_database_qualification: true,
                uppercase_runtime_names: false,
                max_name_length: 63,
                default_schema: Some("public"),
            },
            DatabaseType::Oracle => Self {
                database,
                open_qualifier: '"',
                close_qualifier: '"',
                alias_prefix: " AS ",
                supports_database_qualification: true,
                uppercase_runtime_names: true,
                max_name_length: 30,
                default_schema: None,
            },
            DatabaseType::Sqlite => Self {
                database,
                open_qualifier: '"',
                close_qualifier: '"',
                alias_prefix: " AS ",
                supports_database_qualification: false,
                uppercase_runtime_names: false,
                max_name_length: 128,
                default_schema: None,
            },
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database
    }

    pub fn open_qualifier(&self) -> char {
        self.open_qualifier
    }

    pub fn close_qualifier(&self) -> char {
        self.close_qualifier
    }

    /// The token separating an expression from its alias, spaces included.
    pub fn alias_prefix(&self) -> &'static str {
        self.alias_prefix
    }

    pub fn default_schema(&self) -> Option<&'static str> {
        self.default_schema
    }

    pub fn supports_database_qualification(&self) -> bool {
        self.supports_database_qualification
    }

    /// Wrap an identifier in the engine's quote characters, doubling any
    /// internal close-qualifier.
    pub fn wrap(&self, identifier: &str) -> String {
        if self.is_wrapped(identifier) {
            return identifier.to_string();
        }
        let escaped = identifier.replace(
            self.close_qualifier,
            &format!("{0}{0}", self.close_qualifier),
        );
        format!("{}{}{}", self.open_qualifier, escaped, self.close_qualifier)
    }

    /// Idempotent wrapping: already-wrapped identifiers pass through.
    pub fn ensure_wrapped(&self, identifier: &str) -> String {
        self.wrap(identifier)
    }

    fn is_wrapped(&self, identifier: &str) -> bool {
        identifier.len() >= 2
            && identifier.starts_with(self.open_qualifier)
            && identifier.ends_with(self.close_qualifier)
    }

    /// The bare identifier: the last qualification segment, unwrapped, with
    /// doubled qualifiers folded back. Dots inside a wrapped segment are
    /// preserved. Oracle results are uppercased, matching what the engine
    /// does to unquoted names.
    pub fn runtime_name(&self, name: &str) -> Result<String, SyntaxError> {
        let segment = self.last_segment(name);
        let bare = self.unwrap_segment(segment);
        if bare.trim().is_empty() {
            return Err(SyntaxError::RuntimeName {
                name: name.to_string(),
                reason: "identifier is blank".into(),
            });
        }
        Ok(if self.uppercase_runtime_names {
            bare.to_uppercase()
        } else {
            bare
        })
    }

    fn last_segment<'a>(&self, name: &'a str) -> &'a str {
        let mut inside = false;
        let mut start = 0usize;
        let mut chars = name.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            if inside {
                if c == self.close_qualifier {
                    // a doubled close-qualifier is an escape, not a close
                    if chars.peek().map(|&(_, n)| n) == Some(self.close_qualifier) {
                        chars.next();
                    } else {
                        inside = false;
                    }
                }
            } else if c == self.open_qualifier {
                inside = true;
            } else if c == '.' {
                start = i + 1;
            }
        }
        &name[start..]
    }

    fn unwrap_segment(&self, segment: &str) -> String {
        if !self.is_wrapped(segment) {
            return segment.to_string();
        }
        let inner = &segment[self.open_qualifier.len_utf8()..segment.len() - self.close_qualifier.len_utf8()];
        inner.replace(
            &format!("{0}{0}", self.close_qualifier),
            &self.close_qualifier.to_string(),
        )
    }

    /// Assemble a fully qualified, fully wrapped name.
    ///
    /// Sqlite never qualifies past the table. MsSql and PostgreSql include
    /// the schema (defaulted when not supplied); MySql and Oracle qualify as
    /// `database.table` (for Oracle the "database" is the owning user).
    pub fn ensure_fully_qualified(
        &self,
        database: &str,
        schema: Option<&str>,
        table: &str,
        column: Option<&str>,
    ) -> String {
        let mut segments: Vec<String> = Vec::with_capacity(4);
        if self.supports_database_qualification {
            segments.push(self.ensure_wrapped(database));
            // only engines with a schema tier qualify one; MySql's schema IS
            // the database and Oracle's database IS the owning user
            if self.default_schema.is_some() {
                let schema = schema
                    .filter(|s| !s.trim().is_empty())
                    .or(self.default_schema)
                    .unwrap_or_default();
                segments.push(self.ensure_wrapped(schema));
            }
        }
        segments.push(self.ensure_wrapped(table));
        if let Some(column) = column {
            segments.push(self.ensure_wrapped(column));
        }
        segments.join(".")
    }

    /// Length and blankness check only; anything else is fair game because
    /// names are always wrapped.
    pub fn validate_name(&self, name: &str) -> Result<(), SyntaxError> {
        if name.trim().is_empty() {
            return Err(SyntaxError::RuntimeName {
                name: name.to_string(),
                reason: "identifier is blank".into(),
            });
        }
        let length = name.chars().count();
        if length > self.max_name_length {
            return Err(SyntaxError::RuntimeName {
                name: name.to_string(),
                reason: format!(
                    "identifier is {} characters, the {} limit is {}",
                    length, self.database, self.max_name_length
                ),
            });
        }
        Ok(())
    }

    /// Split `expr AS alias` into the expression and the alias, honoring the
    /// engine's alias token case-insensitively and ignoring anything inside
    /// parentheses, string literals or wrapped identifiers.
    pub fn split_line<'a>(&self, line: &'a str) -> (&'a str, Option<&'a str>) {
        let prefix = self.alias_prefix;
        let bytes = line.as_bytes();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut in_identifier = false;
        let mut found: Option<usize> = None;

        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i] as char;
            if in_string {
                if c == '\'' {
                    in_string = false;
                }
            } else if in_identifier {
                if c == self.close_qualifier {
                    in_identifier = false;
                }
            } else {
                match c {
                    '\'' => in_string = true,
                    '(' => depth += 1,
                    ')' => depth = depth.saturating_sub(1),
                    c if c == self.open_qualifier => in_identifier = true,
                    _ => {
                        if depth == 0
                            && i + prefix.len() <= line.len()
                            && line.is_char_boundary(i)
                            && line.is_char_boundary(i + prefix.len())
                            && line[i..i + prefix.len()].eq_ignore_ascii_case(prefix)
                        {
                            found = Some(i);
                        }
                    }
                }
            }
            i += 1;
        }

        match found {
            Some(i) => (
                line[..i].trim_end(),
                Some(line[i + prefix.len()..].trim()).filter(|a| !a.is_empty()),
            ),
            None => (line, None),
        }
    }

    /// The engine spelling of a scalar function name.
    pub fn scalar_function_sql(&self, function: ScalarFunction) -> &'static str {
        match function {
            ScalarFunction::Len => match self.database {
                DatabaseType::MsSql => "LEN",
                _ => "LENGTH",
            },
            ScalarFunction::GetDate => match self.database {
                DatabaseType::MsSql => "GETDATE()",
                DatabaseType::MySql => "NOW()",
                DatabaseType::Oracle => "SYSDATE",
                DatabaseType::PostgreSql | DatabaseType::Sqlite => "CURRENT_TIMESTAMP",
            },
            ScalarFunction::Abs => "ABS",
        }
    }

    /// The expression computing the MD5 hex digest of `expr`.
    pub fn how_do_we_achieve_md5(&self, expr: &str) -> Result<String, SyntaxError> {
        match self.database {
            DatabaseType::MsSql => Ok(format!(
                "CONVERT(VARCHAR(32), HASHBYTES('MD5', {}), 2)",
                expr
            )),
            DatabaseType::MySql | DatabaseType::PostgreSql => Ok(format!("md5({})", expr)),
            DatabaseType::Oracle => Ok(format!("STANDARD_HASH({}, 'MD5')", expr)),
            DatabaseType::Sqlite => Err(SyntaxError::NotSupported(
                "SQLite does not have a built-in MD5 function".into(),
            )),
        }
    }

    /// Quote a string literal, doubling embedded quotes.
    pub fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}
