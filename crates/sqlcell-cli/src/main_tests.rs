// crates/sqlcell-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Helpers Tests
// Description: Unit tests for argument parsing, value rendering, and commands.
// Purpose: Ensure CLI helpers bind parameters and route database settings.
// Dependencies: sqlcell-cli main helpers
// ============================================================================

//! ## Overview
//! Validates clap parsing, `--param` binding, JSON rendering of SQL values,
//! `--db` overrides, bounded input reads, and the blob/backup commands
//! against temporary databases.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use sqlcell_config::SqlcellConfig;
use sqlcell_core::Database;
use sqlcell_core::Value;
use tempfile::TempDir;

use super::BackupCommand;
use super::BlobCommand;
use super::BlobTarget;
use super::BlobWriteCommand;
use super::Cli;
use super::CliError;
use super::Commands;
use super::DatabaseArgs;
use super::LoadedConfig;
use super::command_backup;
use super::command_blob_write;
use super::database_config;
use super::parse_param;
use super::read_bytes_with_limit;
use super::value_to_json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn defaults() -> LoadedConfig {
    LoadedConfig {
        settings: SqlcellConfig::default(),
        from_file: false,
    }
}

fn db_args(path: &Path) -> DatabaseArgs {
    DatabaseArgs {
        db: Some(path.to_path_buf()),
    }
}

fn blob_database(path: &Path, size: i64) -> i64 {
    let db = Database::open_path(path).unwrap();
    db.execute("CREATE TABLE register (id INTEGER PRIMARY KEY, data BLOB NOT NULL)", &[]).unwrap();
    db.execute("INSERT INTO register (data) VALUES (zeroblob(?))", &[Value::Integer(size)])
        .unwrap();
    db.last_insert_rowid().unwrap()
}

fn write_target(path: &Path, rowid: i64, offset: u64, input: PathBuf) -> BlobWriteCommand {
    BlobWriteCommand {
        target: BlobTarget {
            database: db_args(path),
            table: "register".to_string(),
            column: "data".to_string(),
            rowid,
            offset,
        },
        input,
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn exec_arguments_parse_with_repeated_params() {
    let cli = Cli::try_parse_from([
        "sqlcell",
        "exec",
        "--db",
        "data.db",
        "--hash-functions",
        "SELECT ?, ?",
        "--param",
        "1",
        "--param",
        "huey",
    ])
    .unwrap();
    let Commands::Exec(command) = cli.command else {
        panic!("expected exec command");
    };
    assert_eq!(command.database.db, Some(PathBuf::from("data.db")));
    assert!(command.hash_functions);
    assert_eq!(command.sql, "SELECT ?, ?");
    assert_eq!(command.params, vec!["1".to_string(), "huey".to_string()]);
}

#[test]
fn blob_read_arguments_parse_with_global_config() {
    let cli = Cli::try_parse_from([
        "sqlcell",
        "blob",
        "read",
        "--table",
        "register",
        "--column",
        "data",
        "--rowid",
        "7",
        "--offset",
        "4",
        "--length",
        "2",
        "--config",
        "sqlcell.toml",
    ])
    .unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("sqlcell.toml")));
    let Commands::Blob {
        command: BlobCommand::Read(command),
    } = cli.command
    else {
        panic!("expected blob read command");
    };
    assert_eq!(command.target.rowid, 7);
    assert_eq!(command.target.offset, 4);
    assert_eq!(command.length, Some(2));
    assert!(command.target.database.db.is_none());
}

#[test]
fn blob_write_requires_input() {
    let result = Cli::try_parse_from([
        "sqlcell", "blob", "write", "--table", "t", "--column", "c", "--rowid", "1",
    ]);
    assert!(result.is_err());
}

// ============================================================================
// SECTION: Values
// ============================================================================

#[test]
fn params_bind_numbers_null_and_text() {
    assert_eq!(parse_param("42"), Value::Integer(42));
    assert_eq!(parse_param("-1.5"), Value::Real(-1.5));
    assert_eq!(parse_param("NULL"), Value::Null);
    assert_eq!(parse_param("inf"), Value::Text("inf".to_string()));
    assert_eq!(parse_param("zaizee"), Value::Text("zaizee".to_string()));
}

#[test]
fn values_render_as_json() {
    assert_eq!(value_to_json(&Value::Null), json!(null));
    assert_eq!(value_to_json(&Value::Integer(7)), json!(7));
    assert_eq!(value_to_json(&Value::Real(0.5)), json!(0.5));
    assert_eq!(value_to_json(&Value::Text("huey".to_string())), json!("huey"));
    assert_eq!(value_to_json(&Value::Blob(vec![0x00, 0xff])), json!("x'00ff'"));
}

// ============================================================================
// SECTION: Database Settings
// ============================================================================

#[test]
fn db_flag_overrides_configured_path() {
    let mut loaded = defaults();
    loaded.from_file = true;
    loaded.settings.database.busy_timeout_ms = 250;
    let config = database_config(&loaded, &db_args(Path::new("override.db"))).unwrap();
    assert_eq!(config.path, PathBuf::from("override.db"));
    assert_eq!(config.busy_timeout_ms, 250);

    let config = database_config(
        &loaded,
        &DatabaseArgs {
            db: None,
        },
    )
    .unwrap();
    assert_eq!(config.path, loaded.settings.database.path);
}

#[test]
fn missing_database_without_config_is_usage_error() {
    let result = database_config(
        &defaults(),
        &DatabaseArgs {
            db: None,
        },
    );
    assert!(matches!(result, Err(CliError::Usage(_))));
}

// ============================================================================
// SECTION: Commands
// ============================================================================

#[test]
fn bounded_read_rejects_oversized_input() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("input.bin");
    fs::write(&path, b"12345").unwrap();
    assert_eq!(read_bytes_with_limit(&path, 5).unwrap(), b"12345");
    assert!(matches!(read_bytes_with_limit(&path, 4), Err(CliError::Input { .. })));
}

#[test]
fn blob_write_command_updates_the_cell() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cells.db");
    let rowid = blob_database(&db_path, 8);
    let input = dir.path().join("input.bin");
    fs::write(&input, b"huey").unwrap();

    command_blob_write(&write_target(&db_path, rowid, 2, input), &defaults()).unwrap();

    let db = Database::open_path(&db_path).unwrap();
    let rows = db.execute("SELECT data FROM register", &[]).unwrap();
    assert_eq!(rows.rows, vec![vec![Value::Blob(b"\0\0huey\0\0".to_vec())]]);
}

#[test]
fn blob_write_command_rejects_overflow() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cells.db");
    let rowid = blob_database(&db_path, 4);
    let input = dir.path().join("input.bin");
    fs::write(&input, b"huey").unwrap();

    let result = command_blob_write(&write_target(&db_path, rowid, 1, input), &defaults());
    assert!(matches!(result, Err(CliError::Database(_))));
}

#[test]
fn backup_command_writes_target_file() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("source.db");
    blob_database(&db_path, 16);
    let target = dir.path().join("copy.db");

    let command = BackupCommand {
        database: db_args(&db_path),
        to: target.clone(),
    };
    command_backup(&command, &defaults()).unwrap();

    let copy = Database::open_path(&target).unwrap();
    let rows = copy.execute("SELECT length(data) FROM register", &[]).unwrap();
    assert_eq!(rows.rows, vec![vec![Value::Integer(16)]]);
}
