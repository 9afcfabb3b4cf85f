//! Runtime configuration for embedders of the core.
//!
//! # Responsibility
//! - Describe where the database lives and how long writers wait for locks.
//! - Carry logging settings for [`crate::logging::init_logging`].
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - Environment variables override only the fields they name.

use crate::db::{open_db_in_memory, open_db_with_timeout, DbResult, DEFAULT_BUSY_TIMEOUT};
use rusqlite::Connection;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DATABASE_PATH: &str = "GRANT_REVIEW_DB";
pub const ENV_BUSY_TIMEOUT_MS: &str = "GRANT_REVIEW_BUSY_TIMEOUT_MS";
pub const ENV_LOG_LEVEL: &str = "GRANT_REVIEW_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "GRANT_REVIEW_LOG_DIR";

const DEFAULT_MAX_LOG_FILE_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_LOG_FILES: usize = 5;

#[derive(Debug)]
pub enum ConfigError {
    /// JSON document could not be parsed.
    Parse(serde_json::Error),
    /// A field or environment variable holds an unusable value.
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::InvalidValue { key, value } => write!(f, "invalid value `{value}` for {key}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// trace | debug | info | warn | error
    pub level: String,
    /// Absolute directory for rotating log files; `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
    pub max_file_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            max_file_bytes: DEFAULT_MAX_LOG_FILE_BYTES,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite file; `None` opens an in-memory database.
    pub database_path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    pub logging: LoggingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            logging: LoggingConfig::default(),
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the `GRANT_REVIEW_*` process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = non_blank(lookup(ENV_DATABASE_PATH)) {
            config.database_path = Some(PathBuf::from(path));
        }
        if let Some(value) = non_blank(lookup(ENV_BUSY_TIMEOUT_MS)) {
            config.busy_timeout_ms =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_BUSY_TIMEOUT_MS,
                        value: value.clone(),
                    })?;
        }
        if let Some(level) = non_blank(lookup(ENV_LOG_LEVEL)) {
            config.logging.level = level;
        }
        if let Some(dir) = non_blank(lookup(ENV_LOG_DIR)) {
            config.logging.log_dir = Some(PathBuf::from(dir));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Opens and migrates the configured database.
    pub fn open_database(&self) -> DbResult<Connection> {
        match &self.database_path {
            Some(path) => open_db_with_timeout(path, self.busy_timeout()),
            None => open_db_in_memory(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "busy_timeout_ms",
                value: "0".to_string(),
            });
        }
        if self.logging.max_files == 0 {
            return Err(ConfigError::InvalidValue {
                key: "logging.max_files",
                value: "0".to_string(),
            });
        }
        if self.logging.max_file_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "logging.max_file_bytes",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|item| !item.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, ENV_BUSY_TIMEOUT_MS, ENV_DATABASE_PATH, ENV_LOG_LEVEL};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
        assert!(config.database_path.is_none());
    }

    #[test]
    fn json_overrides_nested_logging_fields() {
        let config = CoreConfig::from_json_str(
            r#"{"database_path":"/tmp/grants.sqlite3","logging":{"level":"warn","max_files":2}}"#,
        )
        .unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/grants.sqlite3")));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.max_files, 2);
    }

    #[test]
    fn unknown_fields_and_zero_timeout_are_rejected() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"databse_path":"x"}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"busy_timeout_ms":0}"#),
            Err(ConfigError::InvalidValue { key: "busy_timeout_ms", .. })
        ));
    }

    #[test]
    fn environment_overrides_only_named_fields() {
        let vars = HashMap::from([
            (ENV_DATABASE_PATH, "/var/lib/grants.sqlite3"),
            (ENV_BUSY_TIMEOUT_MS, "250"),
            (ENV_LOG_LEVEL, " "),
        ]);
        let config =
            CoreConfig::from_lookup(|key| vars.get(key).map(|value| value.to_string())).unwrap();

        assert_eq!(
            config.database_path,
            Some(PathBuf::from("/var/lib/grants.sqlite3"))
        );
        assert_eq!(config.busy_timeout(), Duration::from_millis(250));
        assert_eq!(config.logging.level, crate::logging::default_log_level());
    }

    #[test]
    fn environment_rejects_non_numeric_timeout() {
        let err = CoreConfig::from_lookup(|key| {
            (key == ENV_BUSY_TIMEOUT_MS).then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains(ENV_BUSY_TIMEOUT_MS));
    }

    #[test]
    fn in_memory_database_opens_migrated() {
        let conn = CoreConfig::default().open_database().unwrap();
        crate::db::migrations::ensure_connection_ready(&conn).unwrap();
    }
}
