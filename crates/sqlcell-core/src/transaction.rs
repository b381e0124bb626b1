// crates/sqlcell-core/src/transaction.rs
// ============================================================================
// Module: sqlcell Transaction Controller
// Description: Explicit BEGIN/COMMIT/ROLLBACK and scoped atomic blocks.
// Purpose: Drive the engine transaction state on a database handle.
// Dependencies: rusqlite, tracing
// ============================================================================

//! ## Overview
//! Commit and rollback callbacks are installed on the engine session, so the
//! same hook point fires for implicit (autocommit) statements and for
//! explicit transactions. This module only moves the engine between states:
//! a vetoed commit surfaces as the engine's constraint error after the
//! engine has rolled back and fired the rollback callback.
//!
//! [`Database::atomic`] nests: the outermost scope uses `BEGIN`, inner scopes
//! use savepoints, so an inner failure only undoes the inner block.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::Cell;

use tracing::debug;
use tracing::warn;

use crate::database::Database;
use crate::error::EngineCode;
use crate::error::Result;
use crate::error::SqlcellError;

// ============================================================================
// SECTION: Transaction State
// ============================================================================

/// Engine transaction state as seen by the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Every statement commits on its own.
    Autocommit,
    /// An explicit transaction is open.
    Explicit,
}

impl Database {
    /// Returns the current transaction state.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the handle is closed.
    pub fn transaction_state(&self) -> Result<TransactionState> {
        if self.connection()?.is_autocommit() {
            Ok(TransactionState::Autocommit)
        } else {
            Ok(TransactionState::Explicit)
        }
    }

    /// Returns true when no explicit transaction is active.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the handle is closed.
    pub fn autocommit(&self) -> Result<bool> {
        Ok(self.transaction_state()? == TransactionState::Autocommit)
    }

    /// Returns true when an explicit transaction is active.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the handle is closed.
    pub fn in_transaction(&self) -> Result<bool> {
        Ok(self.transaction_state()? == TransactionState::Explicit)
    }

    // ------------------------------------------------------------------------
    // Explicit control
    // ------------------------------------------------------------------------

    /// Starts an explicit transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Operational`] when a transaction is already
    /// active or the engine rejects `BEGIN`.
    pub fn begin(&self) -> Result<()> {
        if self.in_transaction()? {
            return Err(SqlcellError::operational(
                EngineCode::Misuse,
                "cannot start a transaction within a transaction",
            ));
        }
        self.connection()?.execute_batch("BEGIN")?;
        debug!("transaction started");
        Ok(())
    }

    /// Commits the explicit transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Operational`] when no transaction is active,
    /// when the commit callback vetoes (code [`EngineCode::Constraint`]), or
    /// when the engine fails to commit.
    pub fn commit(&self) -> Result<()> {
        self.connection()?.execute_batch("COMMIT").map_err(|err| {
            let err = SqlcellError::from(err);
            debug!(error = %err, "commit failed");
            err
        })?;
        debug!("transaction committed");
        Ok(())
    }

    /// Rolls back the explicit transaction.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Operational`] when no transaction is active or
    /// the engine fails to roll back.
    pub fn rollback(&self) -> Result<()> {
        self.connection()?.execute_batch("ROLLBACK")?;
        debug!("transaction rolled back");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Scoped blocks
    // ------------------------------------------------------------------------

    /// Runs `body` atomically: commits when it returns `Ok`, undoes its
    /// changes when it returns `Err`. Nested calls use savepoints.
    ///
    /// # Errors
    ///
    /// Returns the error from `body`, or [`SqlcellError`] when the engine
    /// cannot open or close the scope.
    pub fn atomic<T, F>(&self, body: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let depth = self.atomic_depth.get();
        let savepoint = format!("sqlcell_sp_{depth}");
        let outermost = depth == 0 && self.autocommit()?;
        if outermost {
            self.begin()?;
        } else {
            self.execute_batch(&format!("SAVEPOINT {savepoint}"))?;
        }
        self.atomic_depth.set(depth + 1);
        let outcome = {
            let _restore = DepthGuard {
                depth: &self.atomic_depth,
                saved: depth,
            };
            body(self)
        };

        match outcome {
            Ok(value) => {
                if outermost {
                    if let Err(err) = self.commit() {
                        if self.in_transaction().unwrap_or(false)
                            && let Err(undo_err) = self.rollback()
                        {
                            warn!(error = %undo_err, "rollback after failed commit failed");
                        }
                        return Err(err);
                    }
                } else {
                    self.execute_batch(&format!("RELEASE {savepoint}"))?;
                }
                Ok(value)
            }
            Err(err) => {
                let undo = if outermost {
                    self.rollback()
                } else {
                    self.execute_batch(&format!("ROLLBACK TO {savepoint}"))
                        .and_then(|()| self.execute_batch(&format!("RELEASE {savepoint}")))
                };
                if let Err(undo_err) = undo {
                    warn!(error = %undo_err, "atomic scope rollback failed");
                }
                Err(err)
            }
        }
    }
}

// ============================================================================
// SECTION: Scope Depth
// ============================================================================

/// Puts the `atomic` depth back when a scope body returns or unwinds.
struct DepthGuard<'a> {
    /// Depth counter on the handle.
    depth: &'a Cell<usize>,
    /// Depth outside the scope.
    saved: usize,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.saved);
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use std::panic::AssertUnwindSafe;
    use std::panic::catch_unwind;

    use crate::database::Database;
    use crate::error::Result;

    #[test]
    fn panicking_body_restores_scope_depth() {
        let db = Database::open_in_memory().unwrap();
        db.execute("CREATE TABLE notes (body TEXT)", &[]).unwrap();

        let unwound = catch_unwind(AssertUnwindSafe(|| {
            db.atomic(|db| -> Result<()> {
                db.atomic(|_| -> Result<()> { panic!("scope body failed") })
            })
        }));
        assert!(unwound.is_err());
        assert_eq!(db.atomic_depth.get(), 0);

        db.rollback().unwrap();
        db.atomic(|db| {
            assert_eq!(db.atomic_depth.get(), 1);
            db.execute("INSERT INTO notes (body) VALUES ('kept')", &[])?;
            Ok(())
        })
        .unwrap();
        assert!(db.autocommit().unwrap());
        assert_eq!(db.execute("SELECT body FROM notes", &[]).unwrap().len(), 1);
    }
}
