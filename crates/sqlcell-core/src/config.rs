// crates/sqlcell-core/src/config.rs
// ============================================================================
// Module: sqlcell Connection Config
// Description: Connection and backup settings with validation.
// Purpose: Describe how a handle opens its sessions and paces backups.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`DatabaseConfig`] is consumed on every `connect`, so a reconnect applies
//! the same pragmas, busy timeout, and SQL functions as the first session.
//! [`BackupPolicy`] paces the online backup loop and bounds its busy retries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::SqlcellError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Path that selects a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default pages copied per backup step.
const DEFAULT_PAGES_PER_STEP: i32 = 64;
/// Default consecutive busy steps tolerated before a backup fails.
const DEFAULT_MAX_BUSY_RETRIES: u32 = 8;
/// Default first backoff after a busy step (ms).
const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;
/// Default backoff ceiling (ms).
const DEFAULT_MAX_BACKOFF_MS: u64 = 2_000;

// ============================================================================
// SECTION: Pragmas
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    /// Rollback journal deleted at commit.
    #[default]
    Delete,
    /// Rollback journal truncated at commit.
    Truncate,
    /// Rollback journal header zeroed at commit.
    Persist,
    /// Rollback journal kept in memory.
    Memory,
    /// Write-ahead log.
    Wal,
    /// No rollback journal.
    Off,
}

impl JournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Truncate => "truncate",
            Self::Persist => "persist",
            Self::Memory => "memory",
            Self::Wal => "wal",
            Self::Off => "off",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// No fsync.
    Off,
    /// Fsync at critical moments only.
    Normal,
    /// Fsync on every commit.
    #[default]
    Full,
    /// Full plus directory sync.
    Extra,
}

impl SyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Normal => "normal",
            Self::Full => "full",
            Self::Extra => "extra",
        }
    }
}

// ============================================================================
// SECTION: Database Config
// ============================================================================

/// Configuration for a database handle.
///
/// # Invariants
/// - `path` is a file path or [`MEMORY_PATH`].
/// - `busy_timeout_ms` is interpreted as milliseconds.
/// - `cache_size` follows `PRAGMA cache_size` (negative values are KiB).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Registers the md5/sha* SQL functions on connect.
    #[serde(default)]
    pub hash_functions: bool,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: JournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SyncMode,
    /// Optional page cache size.
    #[serde(default)]
    pub cache_size: Option<i64>,
    /// Enforces foreign key constraints.
    #[serde(default)]
    pub foreign_keys: bool,
}

impl DatabaseConfig {
    /// Returns a config for `path` with default settings.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            hash_functions: false,
            journal_mode: JournalMode::default(),
            sync_mode: SyncMode::default(),
            cache_size: None,
            foreign_keys: false,
        }
    }

    /// Returns a config for a private in-memory database.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MEMORY_PATH)
    }

    /// Returns true when the config targets an in-memory database.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.path.as_os_str() == MEMORY_PATH
    }

    /// Returns the configured busy timeout.
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Validates the config.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Invalid`] when the path breaks length limits or
    /// names a directory.
    pub fn validate(&self) -> Result<(), SqlcellError> {
        if self.is_memory() {
            return Ok(());
        }
        validate_database_path(&self.path)
    }
}

/// Returns the default busy timeout for connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Backup Policy
// ============================================================================

/// Pacing and retry policy for online backups.
///
/// # Invariants
/// - `pages_per_step` is positive, or `-1` to copy everything in one step.
/// - Backoff doubles after each consecutive busy step, capped at
///   `max_backoff_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackupPolicy {
    /// Pages copied per step.
    #[serde(default = "default_pages_per_step")]
    pub pages_per_step: i32,
    /// Consecutive busy steps tolerated before failing.
    #[serde(default = "default_max_busy_retries")]
    pub max_busy_retries: u32,
    /// First backoff after a busy step (ms).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Backoff ceiling (ms).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Optional wall-clock limit for the whole backup (ms).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            pages_per_step: DEFAULT_PAGES_PER_STEP,
            max_busy_retries: DEFAULT_MAX_BUSY_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
            timeout_ms: None,
        }
    }
}

impl BackupPolicy {
    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Invalid`] when the step size or backoff bounds
    /// are unusable.
    pub fn validate(&self) -> Result<(), SqlcellError> {
        if self.pages_per_step == 0 || self.pages_per_step < -1 {
            return Err(SqlcellError::Invalid(
                "backup pages_per_step must be positive or -1".to_string(),
            ));
        }
        if self.max_backoff_ms < self.retry_backoff_ms {
            return Err(SqlcellError::Invalid(
                "backup max_backoff_ms must not be below retry_backoff_ms".to_string(),
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(SqlcellError::Invalid(
                "backup timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the backoff before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let millis = self.retry_backoff_ms.saturating_mul(1_u64 << shift).min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    /// Returns the wall-clock limit, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Returns the default pages per backup step.
const fn default_pages_per_step() -> i32 {
    DEFAULT_PAGES_PER_STEP
}

/// Returns the default busy retry budget.
const fn default_max_busy_retries() -> u32 {
    DEFAULT_MAX_BUSY_RETRIES
}

/// Returns the default first backoff.
const fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

/// Returns the default backoff ceiling.
const fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Checks `path` against the total and per-component length limits.
///
/// `label` names the path in the error message, e.g. `"config path"`.
///
/// # Errors
///
/// Returns [`SqlcellError::Invalid`] when either limit is exceeded.
pub fn validate_path_limits(label: &str, path: &Path) -> Result<(), SqlcellError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqlcellError::Invalid(format!("{label} exceeds length limit")));
    }
    if path.components().any(|component| component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH)
    {
        return Err(SqlcellError::Invalid(format!("{label} contains an overlong component")));
    }
    Ok(())
}

/// Validates a database file path.
fn validate_database_path(path: &Path) -> Result<(), SqlcellError> {
    if path.as_os_str().is_empty() {
        return Err(SqlcellError::Invalid("database path must not be empty".to_string()));
    }
    validate_path_limits("database path", path)?;
    if path.is_dir() {
        return Err(SqlcellError::Invalid(
            "database path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}
