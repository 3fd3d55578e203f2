//! Process-wide configuration knobs.
//!
//! Settings can be mutated programmatically or loaded from a TOML file with
//! `${VAR}` environment expansion:
//!
//! ```toml
//! create_database_timeout_seconds = 30
//! probe_timeout_seconds = 5
//! default_string_width = 100
//!
//! [[enforced_keywords.mysql]]
//! key = "AllowUserVariables"
//! value = "True"
//! priority = 1
//!
//! [[enforced_keywords.mssql]]
//! key = "TrustServerCertificate"
//! value = "${TRUST_SERVER_CERT}"
//! priority = 2
//! ```
//!
//! Enforced keywords are merged into every connection string the matching
//! dialect builds; on key collision the higher priority wins.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::dialect::DatabaseType;

/// Errors loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("unknown engine name in enforced_keywords: {0}")]
    UnknownEngine(String),
}

/// A keyword forced into every connection string a dialect builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcedKeyword {
    pub key: String,
    pub value: String,
    /// Higher priority wins on key collision.
    #[serde(default)]
    pub priority: u8,
}

/// The process-wide knob set.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Command timeout for CREATE DATABASE.
    pub create_database_timeout: Duration,
    /// Short timeout for pool-validation probes.
    pub probe_timeout: Duration,
    /// String width applied when a text request carries none.
    pub default_string_width: usize,
    enforced: HashMap<DatabaseType, Vec<EnforcedKeyword>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            create_database_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            default_string_width: 100,
            enforced: HashMap::new(),
        }
    }
}

static GLOBAL: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

impl Settings {
    /// A copy of the current process-wide settings.
    pub fn global() -> Settings {
        GLOBAL
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the process-wide settings.
    pub fn apply(self) {
        *GLOBAL
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = self;
    }

    /// Mutate the process-wide settings in place.
    pub fn update(f: impl FnOnce(&mut Settings)) {
        let mut guard = GLOBAL
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *guard);
    }

    /// The enforced keywords for an engine, lowest priority first so that
    /// applying them in order makes the highest priority win.
    pub fn enforced_keywords(&self, database_type: DatabaseType) -> Vec<EnforcedKeyword> {
        let mut keywords = self
            .enforced
            .get(&database_type)
            .cloned()
            .unwrap_or_default();
        keywords.sort_by_key(|k| k.priority);
        keywords
    }

    /// Add an enforced keyword for an engine.
    pub fn enforce_keyword(
        &mut self,
        database_type: DatabaseType,
        key: impl Into<String>,
        value: impl Into<String>,
        priority: u8,
    ) {
        self.enforced
            .entry(database_type)
            .or_default()
            .push(EnforcedKeyword {
                key: key.into(),
                value: value.into(),
                priority,
            });
    }

    /// Load settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Settings, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse settings from TOML with `${VAR}` environment expansion.
    pub fn from_toml_str(raw: &str) -> Result<Settings, SettingsError> {
        let expanded = expand_env_vars(raw)?;
        let file: SettingsFile = toml::from_str(&expanded)?;

        let mut settings = Settings::default();
        if let Some(secs) = file.create_database_timeout_seconds {
            settings.create_database_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.probe_timeout_seconds {
            settings.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(width) = file.default_string_width {
            settings.default_string_width = width;
        }
        for (engine, keywords) in file.enforced_keywords {
            let database_type = DatabaseType::parse(&engine)
                .ok_or_else(|| SettingsError::UnknownEngine(engine.clone()))?;
            settings.enforced.insert(database_type, keywords);
        }
        Ok(settings)
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    create_database_timeout_seconds: Option<u64>,
    probe_timeout_seconds: Option<u64>,
    default_string_width: Option<usize>,
    #[serde(default)]
    enforced_keywords: HashMap<String, Vec<EnforcedKeyword>>,
}

/// Expand `${VAR}` references against the process environment.
fn expand_env_vars(raw: &str) -> Result<String, SettingsError> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &after[..end];
        let value =
            env::var(name).map_err(|_| SettingsError::MissingEnvVar(name.to_string()))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
