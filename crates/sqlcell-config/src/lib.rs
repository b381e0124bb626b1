// crates/sqlcell-config/src/lib.rs
// ============================================================================
// Module: sqlcell Config Library
// Description: Canonical sqlcell.toml model and loader.
// Purpose: Single source of truth for file-based sqlcell settings.
// Dependencies: serde, sqlcell-core, toml
// ============================================================================

//! ## Overview
//! `sqlcell-config` loads `sqlcell.toml` into a [`SqlcellConfig`] with strict
//! size and path limits and validates it before returning. Missing sections
//! fall back to defaults; malformed or invalid values fail the load.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::DEFAULT_CONFIG_NAME;
pub use config::LogLevel;
pub use config::LoggingConfig;
pub use config::SqlcellConfig;
