// crates/sqlcell-config/src/config.rs
// ============================================================================
// Module: sqlcell Configuration
// Description: Loading and validation of sqlcell.toml.
// Purpose: Provide fail-closed config parsing with hard size and path limits.
// Dependencies: serde, sqlcell-core, thiserror, toml
// ============================================================================

//! ## Overview
//! The config file has three sections: `[database]` (a
//! [`DatabaseConfig`]), `[backup]` (a [`BackupPolicy`]), and `[logging]`.
//! Every section is optional. The file path comes from the caller, then the
//! `SQLCELL_CONFIG` environment variable, then `sqlcell.toml` in the working
//! directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use sqlcell_core::BackupPolicy;
use sqlcell_core::DatabaseConfig;
use sqlcell_core::SqlcellError;
use sqlcell_core::validate_path_limits;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "sqlcell.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "SQLCELL_CONFIG";
/// Default database path when the `[database]` section is absent.
const DEFAULT_DATABASE_PATH: &str = "sqlcell.db";
/// Maximum configuration file size in bytes.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level sqlcell configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqlcellConfig {
    /// Database handle settings.
    #[serde(default = "default_database")]
    pub database: DatabaseConfig,
    /// Online backup pacing.
    #[serde(default)]
    pub backup: BackupPolicy,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SqlcellConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            backup: BackupPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl SqlcellConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = config_path(path)?;
        let content = read_config_text(&path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("database: {err}")))?;
        self.backup.validate().map_err(|err| ConfigError::Invalid(format!("backup: {err}")))?;
        Ok(())
    }
}

/// Returns the database section used when none is configured.
fn default_database() -> DatabaseConfig {
    DatabaseConfig::new(DEFAULT_DATABASE_PATH)
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Log output settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct LoggingConfig {
    /// Minimum level emitted when `RUST_LOG` is unset.
    #[serde(default)]
    pub level: LogLevel,
}

/// Minimum log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Everything, including per-step detail.
    Trace,
    /// Connection and stream lifecycle events.
    Debug,
    /// Completed operations.
    #[default]
    Info,
    /// Retries and recoverable failures.
    Warn,
    /// Failures only.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Picks the config file: the caller's path, then `SQLCELL_CONFIG`, then
/// [`DEFAULT_CONFIG_NAME`]. The chosen path must respect the path limits.
fn config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => env::var_os(CONFIG_ENV_VAR)
            .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_NAME), PathBuf::from),
    };
    validate_path_limits("config path", &path).map_err(invalid)?;
    Ok(path)
}

/// Reads at most one byte past the size limit and decodes the text.
fn read_config_text(path: &Path) -> Result<String, ConfigError> {
    let file = File::open(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    let limit = u64::try_from(MAX_CONFIG_FILE_SIZE).unwrap_or(u64::MAX).saturating_add(1);
    let mut bytes = Vec::new();
    file.take(limit).read_to_end(&mut bytes).map_err(|err| ConfigError::Io(err.to_string()))?;
    if bytes.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
    }
    String::from_utf8(bytes)
        .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))
}

/// Carries a core validation message over as a config error.
fn invalid(error: SqlcellError) -> ConfigError {
    match error {
        SqlcellError::Invalid(message) => ConfigError::Invalid(message),
        other => ConfigError::Invalid(other.to_string()),
    }
}
