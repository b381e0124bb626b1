// crates/sqlcell-core/src/functions.rs
// ============================================================================
// Module: sqlcell SQL Functions
// Description: Scalar digest functions registered on each new session.
// Purpose: Make md5/sha* callable from SQL text when enabled in config.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! Each digest takes one argument. Text and BLOB values are hashed over their
//! bytes, numbers over their SQL text rendering, and `NULL` yields `NULL`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use rusqlite::functions::Context;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use tracing::debug;

use crate::error::Result;
use crate::hashing::HashAlgorithm;
use crate::hashing::hex_digest;

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers every digest function on the connection.
pub(crate) fn register_hash_functions(connection: &Connection) -> Result<()> {
    for algorithm in HashAlgorithm::ALL {
        connection.create_scalar_function(
            algorithm.sql_name(),
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            move |ctx| Ok(digest_argument(ctx, algorithm)),
        )?;
    }
    debug!(count = HashAlgorithm::ALL.len(), "registered hash functions");
    Ok(())
}

/// Hashes the first function argument.
fn digest_argument(ctx: &Context<'_>, algorithm: HashAlgorithm) -> Option<String> {
    match ctx.get_raw(0) {
        ValueRef::Null => None,
        ValueRef::Integer(value) => Some(hex_digest(algorithm, value.to_string().as_bytes())),
        ValueRef::Real(value) => Some(hex_digest(algorithm, value.to_string().as_bytes())),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => Some(hex_digest(algorithm, bytes)),
    }
}
