// crates/sqlcell-core/src/hooks.rs
// ============================================================================
// Module: sqlcell Notification Registry
// Description: Commit, rollback, and row-update callbacks for one handle.
// Purpose: Hold callbacks on the logical handle and install them per session.
// Dependencies: rusqlite, tracing
// ============================================================================

//! ## Overview
//! A [`HookRegistry`] has three slots. Registering into a slot replaces and
//! returns the previous callback. Callbacks are reference counted so the
//! handle can install the same callback into every session it opens; the
//! engine invokes them synchronously on the thread running the statement.
//!
//! Callbacks are `Send + 'static` and cannot borrow the handle that fires
//! them. Starting a transaction on the same connection from inside a
//! callback is unsupported.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use rusqlite::Connection;
use rusqlite::hooks::Action;
use tracing::debug;

// ============================================================================
// SECTION: Events
// ============================================================================

/// Outcome returned by a commit callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitDecision {
    /// Let the commit proceed.
    #[default]
    Proceed,
    /// Turn the commit into a rollback.
    Veto,
}

/// Kind of row change reported to update callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl UpdateKind {
    /// Returns the SQL verb for the change.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Maps an engine action code; unknown actions map to `None`.
    const fn from_action(action: Action) -> Option<Self> {
        match action {
            Action::SQLITE_INSERT => Some(Self::Insert),
            Action::SQLITE_UPDATE => Some(Self::Update),
            Action::SQLITE_DELETE => Some(Self::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEvent {
    /// Change kind.
    pub kind: UpdateKind,
    /// Schema name (`main`, `temp`, or an attached name).
    pub database: String,
    /// Table name.
    pub table: String,
    /// Row identifier of the affected row.
    pub rowid: i64,
}

// ============================================================================
// SECTION: Callbacks
// ============================================================================

/// Shared commit callback.
pub type CommitCallback = Arc<Mutex<dyn FnMut() -> CommitDecision + Send>>;
/// Shared rollback callback.
pub type RollbackCallback = Arc<Mutex<dyn FnMut() + Send>>;
/// Shared row-update callback.
pub type UpdateCallback = Arc<Mutex<dyn FnMut(&UpdateEvent) + Send>>;

/// Registry slot selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSlot {
    /// Commit slot.
    Commit,
    /// Rollback slot.
    Rollback,
    /// Row-update slot.
    Update,
}

/// A callback bound to its slot.
#[derive(Clone)]
pub enum Hook {
    /// Commit callback.
    Commit(CommitCallback),
    /// Rollback callback.
    Rollback(RollbackCallback),
    /// Row-update callback.
    Update(UpdateCallback),
}

impl Hook {
    /// Wraps a commit callback.
    pub fn commit<F>(callback: F) -> Self
    where
        F: FnMut() -> CommitDecision + Send + 'static,
    {
        Self::Commit(Arc::new(Mutex::new(callback)))
    }

    /// Wraps a rollback callback.
    pub fn rollback<F>(callback: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::Rollback(Arc::new(Mutex::new(callback)))
    }

    /// Wraps a row-update callback.
    pub fn update<F>(callback: F) -> Self
    where
        F: FnMut(&UpdateEvent) + Send + 'static,
    {
        Self::Update(Arc::new(Mutex::new(callback)))
    }

    /// Returns the slot the callback occupies.
    #[must_use]
    pub const fn slot(&self) -> HookSlot {
        match self {
            Self::Commit(_) => HookSlot::Commit,
            Self::Rollback(_) => HookSlot::Rollback,
            Self::Update(_) => HookSlot::Update,
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.slot()).finish()
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Per-handle callback registry.
///
/// # Invariants
/// - Each slot holds at most one callback.
#[derive(Clone, Default)]
pub struct HookRegistry {
    /// Commit slot.
    commit: Option<CommitCallback>,
    /// Rollback slot.
    rollback: Option<RollbackCallback>,
    /// Row-update slot.
    update: Option<UpdateCallback>,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `hook` in its slot and returns the callback it replaced.
    pub fn register(&mut self, hook: Hook) -> Option<Hook> {
        match hook {
            Hook::Commit(callback) => self.commit.replace(callback).map(Hook::Commit),
            Hook::Rollback(callback) => self.rollback.replace(callback).map(Hook::Rollback),
            Hook::Update(callback) => self.update.replace(callback).map(Hook::Update),
        }
    }

    /// Empties `slot` and returns the callback it held.
    pub fn remove(&mut self, slot: HookSlot) -> Option<Hook> {
        match slot {
            HookSlot::Commit => self.commit.take().map(Hook::Commit),
            HookSlot::Rollback => self.rollback.take().map(Hook::Rollback),
            HookSlot::Update => self.update.take().map(Hook::Update),
        }
    }

    /// Returns true when `slot` holds a callback.
    #[must_use]
    pub const fn is_registered(&self, slot: HookSlot) -> bool {
        match slot {
            HookSlot::Commit => self.commit.is_some(),
            HookSlot::Rollback => self.rollback.is_some(),
            HookSlot::Update => self.update.is_some(),
        }
    }

    /// Installs every slot on a session; empty slots clear the engine hook.
    pub(crate) fn install_all(&self, connection: &Connection) {
        self.install(connection, HookSlot::Commit);
        self.install(connection, HookSlot::Rollback);
        self.install(connection, HookSlot::Update);
    }

    /// Installs one slot on a session.
    pub(crate) fn install(&self, connection: &Connection, slot: HookSlot) {
        match slot {
            HookSlot::Commit => install_commit(connection, self.commit.as_ref()),
            HookSlot::Rollback => install_rollback(connection, self.rollback.as_ref()),
            HookSlot::Update => install_update(connection, self.update.as_ref()),
        }
        debug!(slot = ?slot, registered = self.is_registered(slot), "installed hook slot");
    }
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("commit", &self.commit.is_some())
            .field("rollback", &self.rollback.is_some())
            .field("update", &self.update.is_some())
            .finish()
    }
}

// ============================================================================
// SECTION: Engine Installation
// ============================================================================

/// Installs or clears the engine commit hook.
fn install_commit(connection: &Connection, callback: Option<&CommitCallback>) {
    let Some(callback) = callback else {
        connection.commit_hook(None::<fn() -> bool>);
        return;
    };
    let callback = Arc::clone(callback);
    connection.commit_hook(Some(move || {
        let mut guard = callback.lock().unwrap_or_else(PoisonError::into_inner);
        let hook = &mut *guard;
        hook() == CommitDecision::Veto
    }));
}

/// Installs or clears the engine rollback hook.
fn install_rollback(connection: &Connection, callback: Option<&RollbackCallback>) {
    let Some(callback) = callback else {
        connection.rollback_hook(None::<fn()>);
        return;
    };
    let callback = Arc::clone(callback);
    connection.rollback_hook(Some(move || {
        let mut guard = callback.lock().unwrap_or_else(PoisonError::into_inner);
        let hook = &mut *guard;
        hook();
    }));
}

/// Installs or clears the engine row-update hook.
fn install_update(connection: &Connection, callback: Option<&UpdateCallback>) {
    let Some(callback) = callback else {
        connection.update_hook(None::<fn(Action, &str, &str, i64)>);
        return;
    };
    let callback = Arc::clone(callback);
    connection.update_hook(Some(move |action: Action, database: &str, table: &str, rowid: i64| {
        let Some(kind) = UpdateKind::from_action(action) else {
            return;
        };
        let event = UpdateEvent {
            kind,
            database: database.to_string(),
            table: table.to_string(),
            rowid,
        };
        let mut guard = callback.lock().unwrap_or_else(PoisonError::into_inner);
        let hook = &mut *guard;
        hook(&event);
    }));
}
