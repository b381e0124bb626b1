// crates/sqlcell-core/src/database.rs
// ============================================================================
// Module: sqlcell Database Handle
// Description: Logical connection handle that survives session recreation.
// Purpose: Own the engine session, apply config, and re-attach hooks.
// Dependencies: rusqlite, tracing
// ============================================================================

//! ## Overview
//! A [`Database`] is the logical handle. It owns at most one live engine
//! session and a [`HookRegistry`]. Closing drops the session but keeps the
//! registry; [`Database::connect`] opens a fresh session, applies pragmas and
//! SQL functions, and re-installs every registered callback as its last step.
//!
//! Handles are `Send` but not `Sync`: callers serialize access themselves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::Cell;
use std::path::Path;

use rusqlite::Batch;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tracing::debug;
use tracing::warn;

use crate::config::DatabaseConfig;
use crate::error::EngineCode;
use crate::error::Result;
use crate::error::SqlcellError;
use crate::functions::register_hash_functions;
use crate::hooks::CommitDecision;
use crate::hooks::Hook;
use crate::hooks::HookRegistry;
use crate::hooks::HookSlot;
use crate::hooks::UpdateEvent;

// ============================================================================
// SECTION: Query Results
// ============================================================================

/// Fully materialized result of one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result column names, in select order.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when the statement produced no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the values of column `index` across all rows.
    #[must_use]
    pub fn column(&self, index: usize) -> Vec<Value> {
        self.rows.iter().filter_map(|row| row.get(index).cloned()).collect()
    }
}

// ============================================================================
// SECTION: Database
// ============================================================================

/// Logical database handle.
///
/// # Invariants
/// - `session` is `None` exactly when the handle is closed.
/// - Every live session carries the callbacks currently in `hooks`.
pub struct Database {
    /// Connection configuration, re-applied on every connect.
    config: DatabaseConfig,
    /// Live engine session.
    session: Option<Connection>,
    /// Callbacks owned by the logical handle.
    hooks: HookRegistry,
    /// Open `atomic` scopes on the current session.
    pub(crate) atomic_depth: Cell<usize>,
}

impl Database {
    /// Creates a closed handle after validating `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Invalid`] when the config is invalid.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: None,
            hooks: HookRegistry::new(),
            atomic_depth: Cell::new(0),
        })
    }

    /// Creates a handle and connects it.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError`] when validation or the engine open fails.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        let mut database = Self::new(config)?;
        database.connect()?;
        Ok(database)
    }

    /// Opens a file database with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError`] when the path is invalid or cannot be opened.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(DatabaseConfig::new(path.as_ref()))
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError`] when the engine cannot open the session.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(DatabaseConfig::in_memory())
    }

    /// Returns true when no session is open.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.session.is_none()
    }

    /// Opens a new engine session and re-installs registered callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when a session is already open and
    /// [`SqlcellError::Operational`] when the engine rejects the open.
    pub fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(SqlcellError::Interface("connection already open".to_string()));
        }
        if !self.config.is_memory() {
            ensure_parent_dir(&self.config.path)?;
        }
        let connection = open_session(&self.config)?;
        self.hooks.install_all(&connection);
        self.atomic_depth.set(0);
        self.session = Some(connection);
        debug!(path = %self.config.path.display(), "database connected");
        Ok(())
    }

    /// Closes the engine session. Returns false when already closed.
    ///
    /// An explicit transaction still open at close is rolled back by the
    /// engine without invoking the rollback callback.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Operational`] when the engine refuses to close;
    /// the session stays open in that case.
    pub fn close(&mut self) -> Result<bool> {
        let Some(connection) = self.session.take() else {
            return Ok(false);
        };
        if let Err((connection, err)) = connection.close() {
            warn!(error = %err, "database close failed");
            self.session = Some(connection);
            return Err(err.into());
        }
        self.atomic_depth.set(0);
        debug!(path = %self.config.path.display(), "database closed");
        Ok(true)
    }

    /// Returns the live session.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the handle is closed.
    pub fn connection(&self) -> Result<&Connection> {
        self.session.as_ref().ok_or_else(closed_error)
    }

    /// Returns the live session mutably.
    pub(crate) fn connection_mut(&mut self) -> Result<&mut Connection> {
        self.session.as_mut().ok_or_else(closed_error)
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    /// Executes one statement with positional parameters and collects its rows.
    ///
    /// SQL that is empty or only comments yields an empty result.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Operational`] with [`EngineCode::Misuse`] when
    /// `sql` holds more than one statement (nothing runs in that case), and
    /// [`SqlcellError`] when the handle is closed or the engine fails.
    pub fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let connection = self.connection()?;
        let mut batch = Batch::new(connection, sql);
        let Some(mut statement) = batch.next()? else {
            return Ok(QueryResult::default());
        };
        if !matches!(batch.next(), Ok(None)) {
            return Err(SqlcellError::operational(
                EngineCode::Misuse,
                "multiple statements provided; use execute_batch for scripts",
            ));
        }
        let columns: Vec<String> =
            statement.column_names().into_iter().map(str::to_string).collect();
        let width = columns.len();
        let mut rows = statement.query(params_from_iter(params.iter()))?;
        let mut collected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for index in 0 .. width {
                values.push(row.get::<_, Value>(index)?);
            }
            collected.push(values);
        }
        Ok(QueryResult {
            columns,
            rows: collected,
        })
    }

    /// Executes a script of statements without parameters.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError`] when the handle is closed or the engine fails.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.connection()?.execute_batch(sql)?;
        Ok(())
    }

    /// Returns the rowid of the most recent successful insert.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the handle is closed.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        Ok(self.connection()?.last_insert_rowid())
    }

    /// Returns the rows changed by the most recent statement.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the handle is closed.
    pub fn changes(&self) -> Result<u64> {
        Ok(self.connection()?.changes())
    }

    // ------------------------------------------------------------------------
    // Notification registry
    // ------------------------------------------------------------------------

    /// Registers `hook`, installing it on the live session if connected, and
    /// returns the callback it replaced.
    pub fn register_hook(&mut self, hook: Hook) -> Option<Hook> {
        let slot = hook.slot();
        let previous = self.hooks.register(hook);
        if let Some(connection) = self.session.as_ref() {
            self.hooks.install(connection, slot);
        }
        previous
    }

    /// Clears `slot` on the registry and the live session.
    pub fn remove_hook(&mut self, slot: HookSlot) -> Option<Hook> {
        let previous = self.hooks.remove(slot);
        if let Some(connection) = self.session.as_ref() {
            self.hooks.install(connection, slot);
        }
        previous
    }

    /// Registers a commit callback; [`CommitDecision::Veto`] forces a rollback.
    pub fn on_commit<F>(&mut self, callback: F) -> Option<Hook>
    where
        F: FnMut() -> CommitDecision + Send + 'static,
    {
        self.register_hook(Hook::commit(callback))
    }

    /// Registers a rollback callback.
    pub fn on_rollback<F>(&mut self, callback: F) -> Option<Hook>
    where
        F: FnMut() + Send + 'static,
    {
        self.register_hook(Hook::rollback(callback))
    }

    /// Registers a row-update callback.
    pub fn on_update<F>(&mut self, callback: F) -> Option<Hook>
    where
        F: FnMut(&UpdateEvent) + Send + 'static,
    {
        self.register_hook(Hook::update(callback))
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "database close on drop failed");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Error returned for operations on a closed handle.
fn closed_error() -> SqlcellError {
    SqlcellError::Interface("database is closed".to_string())
}

/// Ensures the parent directory for a database file exists.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqlcellError::Io(err.to_string()))
}

/// Opens an engine session and applies the configured settings.
fn open_session(config: &DatabaseConfig) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = if config.is_memory() {
        Connection::open_in_memory()?
    } else {
        Connection::open_with_flags(&config.path, flags)?
    };
    apply_pragmas(&connection, config)?;
    if config.hash_functions {
        register_hash_functions(&connection)?;
    }
    Ok(connection)
}

/// Applies pragmas and the busy timeout.
fn apply_pragmas(connection: &Connection, config: &DatabaseConfig) -> Result<()> {
    connection.busy_timeout(config.busy_timeout())?;
    if !config.is_memory() {
        let mode: String = connection.pragma_update_and_check(
            None,
            "journal_mode",
            config.journal_mode.pragma_value(),
            |row| row.get(0),
        )?;
        debug!(journal_mode = %mode, "journal mode applied");
    }
    connection.pragma_update(None, "synchronous", config.sync_mode.pragma_value())?;
    connection.pragma_update(None, "foreign_keys", config.foreign_keys)?;
    if let Some(cache_size) = config.cache_size {
        connection.pragma_update(None, "cache_size", cache_size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value;

    use super::QueryResult;

    #[test]
    fn query_result_column_projection() {
        let result = QueryResult {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![
                vec![Value::Integer(1), Value::Text("x".to_string())],
                vec![Value::Integer(2), Value::Text("y".to_string())],
            ],
        };
        assert_eq!(result.len(), 2);
        assert_eq!(result.column(1), vec![Value::Text("x".to_string()), Value::Text("y".to_string())]);
    }
}
