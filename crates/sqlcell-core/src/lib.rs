// crates/sqlcell-core/src/lib.rs
// ============================================================================
// Module: sqlcell Core Library
// Description: Embedded SQLite handle with hooks, backups, and BLOB streams.
// Purpose: Expose the database handle and its supporting types.
// Dependencies: md-5, rusqlite, serde, sha1, sha2, thiserror, tracing
// ============================================================================

//! ## Overview
//! sqlcell wraps an embedded `SQLite` engine behind a logical [`Database`]
//! handle that can close and reconnect without losing its registered
//! callbacks. On top of the handle it offers explicit and scoped
//! transactions, an online [`BackupJob`], and seekable [`BlobStream`]s.
//! Invariants:
//! - A reconnected session carries every callback registered on the handle.
//! - BLOB writes and seeks never move a cursor outside `[0, len]`.
//! - A backup reports success only after the engine reports completion.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod backup;
pub mod blob;
pub mod config;
pub mod database;
pub mod error;
mod functions;
pub mod hashing;
pub mod hooks;
pub mod transaction;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use backup::BackupJob;
pub use backup::BackupProgress;
pub use backup::BackupStatus;
pub use blob::BlobStream;
pub use config::BackupPolicy;
pub use config::DatabaseConfig;
pub use config::JournalMode;
pub use config::MEMORY_PATH;
pub use config::SyncMode;
pub use config::validate_path_limits;
pub use database::Database;
pub use database::QueryResult;
pub use error::EngineCode;
pub use error::Result;
pub use error::SqlcellError;
pub use hashing::HashAlgorithm;
pub use hashing::hex_digest;
pub use hashing::hex_encode;
pub use hooks::CommitDecision;
pub use hooks::Hook;
pub use hooks::HookRegistry;
pub use hooks::HookSlot;
pub use hooks::UpdateEvent;
pub use hooks::UpdateKind;
pub use rusqlite::types::Value;
pub use transaction::TransactionState;
