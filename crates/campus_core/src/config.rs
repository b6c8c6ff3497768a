//! Core runtime configuration.
//!
//! Values come from defaults, then an optional JSON file, then `CAMPUS_*`
//! environment variables; later sources win.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{
    default_log_level, init_logging, normalize_level, normalize_log_dir, LoggingError,
};
use crate::tenant::ScopePolicy;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const ENV_LOG_LEVEL: &str = "CAMPUS_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CAMPUS_LOG_DIR";
pub const ENV_DB_PATH: &str = "CAMPUS_DB_PATH";
pub const ENV_TENANT_DEBUG: &str = "CAMPUS_TENANT_DEBUG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` disables file logs.
    pub log_dir: Option<PathBuf>,
    /// SQLite file; `None` means in-memory.
    pub db_path: Option<PathBuf>,
    /// Reject tenant reassignment on update instead of logging it.
    pub tenant_debug: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_path: None,
            tenant_debug: cfg!(debug_assertions),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidValue {
        key: &'static str,
        value: String,
    },
    Logging(LoggingError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
            Self::Logging(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl From<LoggingError> for ConfigError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl CoreConfig {
    /// Parses a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up by variable name.
    ///
    /// `lookup` is `std::env::var(..).ok()` in production.
    pub fn with_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.log_dir = non_blank(dir).map(PathBuf::from);
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.db_path = non_blank(path).map(PathBuf::from);
        }
        if let Some(flag) = lookup(ENV_TENANT_DEBUG) {
            self.tenant_debug = parse_bool(ENV_TENANT_DEBUG, &flag)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks and normalizes the log settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level)?;
        if let Some(dir) = &self.log_dir {
            let text = dir.to_str().ok_or_else(|| ConfigError::InvalidValue {
                key: "log_dir",
                value: dir.display().to_string(),
            })?;
            normalize_log_dir(text)?;
        }
        Ok(())
    }

    /// Tenant policy derived from `tenant_debug`.
    pub fn scope_policy(&self) -> ScopePolicy {
        ScopePolicy {
            debug: self.tenant_debug,
        }
    }

    /// Opens `db_path`, or an in-memory database when unset.
    pub fn open_database(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }

    /// Starts file logging when `log_dir` is set; returns whether it did.
    pub fn start_logging(&self) -> Result<bool, ConfigError> {
        let Some(dir) = &self.log_dir else {
            return Ok(false);
        };
        let dir = dir.to_str().ok_or_else(|| ConfigError::InvalidValue {
            key: "log_dir",
            value: dir.display().to_string(),
        })?;
        init_logging(&self.log_level, dir)?;
        Ok(true)
    }
}

/// Reads `path` as JSON config, then applies process environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<CoreConfig, ConfigError> {
    let base = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            CoreConfig::from_json_str(&json)?
        }
        None => CoreConfig::default(),
    };
    base.with_env_overrides(|key| std::env::var(key).ok())
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}
