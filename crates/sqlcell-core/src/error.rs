// crates/sqlcell-core/src/error.rs
// ============================================================================
// Module: sqlcell Errors
// Description: Error taxonomy shared by handles, hooks, backups, and BLOBs.
// Purpose: Keep engine error kinds intact and separate local misuse errors.
// Dependencies: rusqlite, thiserror
// ============================================================================

//! ## Overview
//! Errors fall into three families. [`SqlcellError::Operational`] carries a
//! failure reported by the engine, tagged with an [`EngineCode`] so callers
//! can tell busy contention from a missing row. [`SqlcellError::Interface`]
//! reports misuse of a closed handle or stream. [`SqlcellError::Range`]
//! reports a BLOB seek or write outside the cell; it is raised before any
//! state changes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rusqlite::ErrorCode;
use thiserror::Error;

// ============================================================================
// SECTION: Engine Codes
// ============================================================================

/// Coarse classification of engine-reported failures.
///
/// # Invariants
/// - Variants are stable labels; they never change meaning between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCode {
    /// A resource was held by another connection.
    Busy,
    /// A table or database lock could not be taken.
    Locked,
    /// The target is read-only.
    ReadOnly,
    /// A constraint failed, including a vetoed commit.
    Constraint,
    /// A table, column, or row does not exist.
    NotFound,
    /// The operation was aborted, e.g. an expired BLOB handle.
    Abort,
    /// The operation was interrupted before completion.
    Interrupted,
    /// The engine API was used out of sequence.
    Misuse,
    /// Any other engine failure.
    Other,
}

impl EngineCode {
    /// Returns a stable label for the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::Locked => "locked",
            Self::ReadOnly => "read_only",
            Self::Constraint => "constraint",
            Self::NotFound => "not_found",
            Self::Abort => "abort",
            Self::Interrupted => "interrupted",
            Self::Misuse => "misuse",
            Self::Other => "other",
        }
    }

    /// Maps a native `SQLite` result code onto an engine code.
    const fn from_sqlite(code: ErrorCode) -> Self {
        match code {
            ErrorCode::DatabaseBusy => Self::Busy,
            ErrorCode::DatabaseLocked => Self::Locked,
            ErrorCode::ReadOnly => Self::ReadOnly,
            ErrorCode::ConstraintViolation => Self::Constraint,
            ErrorCode::NotFound => Self::NotFound,
            ErrorCode::OperationAborted => Self::Abort,
            ErrorCode::OperationInterrupted => Self::Interrupted,
            ErrorCode::ApiMisuse => Self::Misuse,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for EngineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by sqlcell handles, backups, and BLOB streams.
///
/// # Invariants
/// - Error messages never embed BLOB payload bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqlcellError {
    /// Engine-level failure with its kind preserved.
    #[error("operational error ({code}): {message}")]
    Operational {
        /// Engine error classification.
        code: EngineCode,
        /// Engine-provided message.
        message: String,
    },
    /// Misuse of a closed handle or stream.
    #[error("interface error: {0}")]
    Interface(String),
    /// Offset or length outside a BLOB's byte range.
    #[error("value out of range: {0}")]
    Range(String),
    /// Filesystem failure outside the engine.
    #[error("io error: {0}")]
    Io(String),
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl SqlcellError {
    /// Builds an operational error from a code and message.
    pub(crate) fn operational(code: EngineCode, message: impl Into<String>) -> Self {
        Self::Operational {
            code,
            message: message.into(),
        }
    }

    /// Returns the engine code for operational errors.
    #[must_use]
    pub const fn engine_code(&self) -> Option<EngineCode> {
        match self {
            Self::Operational {
                code, ..
            } => Some(*code),
            _ => None,
        }
    }

    /// Returns true when the failure is busy/locked contention worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.engine_code(), Some(EngineCode::Busy | EngineCode::Locked))
    }
}

impl From<rusqlite::Error> for SqlcellError {
    fn from(error: rusqlite::Error) -> Self {
        let message = error.to_string();
        let code = match error.sqlite_error_code() {
            Some(code) => EngineCode::from_sqlite(code),
            None => EngineCode::Other,
        };
        let code = if code == EngineCode::Other { classify_message(&message) } else { code };
        Self::Operational {
            code,
            message,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T, E = SqlcellError> = std::result::Result<T, E>;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Classifies generic engine error text that carries no specific result code.
fn classify_message(message: &str) -> EngineCode {
    let lower = message.to_ascii_lowercase();
    if lower.contains("no such") {
        EngineCode::NotFound
    } else if lower.contains("busy") {
        EngineCode::Busy
    } else if lower.contains("locked") {
        EngineCode::Locked
    } else {
        EngineCode::Other
    }
}
