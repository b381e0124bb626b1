// crates/sqlcell-cli/src/main.rs
// ============================================================================
// Module: sqlcell CLI Entry Point
// Description: Command dispatcher for SQL execution, backups, and BLOB I/O.
// Purpose: Drive a sqlcell database from the shell with JSON output.
// Dependencies: clap, serde, serde_json, sqlcell-config, sqlcell-core,
//               thiserror, tracing, tracing-subscriber
// ============================================================================

//! ## Overview
//! The `sqlcell` binary opens one database per invocation. Settings come from
//! `sqlcell.toml` when present (see [`sqlcell_config::SqlcellConfig`]) and
//! `--db` overrides the configured path. Row and summary output goes to
//! stdout as JSON lines; logs and errors go to stderr.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs::File;
use std::io::Read;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use serde_json::Value as JsonValue;
use serde_json::json;
use sqlcell_config::CONFIG_ENV_VAR;
use sqlcell_config::ConfigError;
use sqlcell_config::DEFAULT_CONFIG_NAME;
use sqlcell_config::SqlcellConfig;
use sqlcell_core::BackupProgress;
use sqlcell_core::Database;
use sqlcell_core::DatabaseConfig;
use sqlcell_core::SqlcellError;
use sqlcell_core::Value;
use sqlcell_core::hex_encode;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "sqlcell", version, disable_help_subcommand = true)]
struct Cli {
    /// Path to sqlcell.toml (overrides `SQLCELL_CONFIG`).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute one SQL statement and print each row as a JSON array.
    ///
    /// SQL holding more than one statement is rejected.
    Exec(ExecCommand),
    /// Copy a database into a new file with the online backup engine.
    Backup(BackupCommand),
    /// Incremental I/O on a single BLOB cell.
    Blob {
        /// Selected blob subcommand.
        #[command(subcommand)]
        command: BlobCommand,
    },
}

/// Database selection shared by every command.
#[derive(Args, Debug)]
struct DatabaseArgs {
    /// Database file (overrides `[database].path`).
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,
}

/// Arguments for `exec`.
#[derive(Args, Debug)]
struct ExecCommand {
    /// Database selection.
    #[command(flatten)]
    database: DatabaseArgs,
    /// Register the md5/sha* SQL functions for this statement.
    #[arg(long = "hash-functions", action = ArgAction::SetTrue)]
    hash_functions: bool,
    /// SQL statement to execute.
    #[arg(value_name = "SQL")]
    sql: String,
    /// Positional parameter; numbers bind as numbers and `null` as NULL.
    #[arg(long = "param", value_name = "VALUE")]
    params: Vec<String>,
}

/// Arguments for `backup`.
#[derive(Args, Debug)]
struct BackupCommand {
    /// Source database selection.
    #[command(flatten)]
    database: DatabaseArgs,
    /// Destination database file.
    #[arg(long, value_name = "PATH")]
    to: PathBuf,
}

/// BLOB subcommands.
#[derive(Subcommand, Debug)]
enum BlobCommand {
    /// Write cell bytes to stdout.
    Read(BlobReadCommand),
    /// Overwrite cell bytes from a file.
    Write(BlobWriteCommand),
}

/// Cell address shared by BLOB subcommands.
#[derive(Args, Debug)]
struct BlobTarget {
    /// Database selection.
    #[command(flatten)]
    database: DatabaseArgs,
    /// Table holding the cell.
    #[arg(long, value_name = "TABLE")]
    table: String,
    /// Column holding the cell.
    #[arg(long, value_name = "COLUMN")]
    column: String,
    /// Row identifier of the cell.
    #[arg(long, value_name = "ROWID")]
    rowid: i64,
    /// Byte offset to start at.
    #[arg(long, value_name = "BYTES", default_value_t = 0)]
    offset: u64,
}

/// Arguments for `blob read`.
#[derive(Args, Debug)]
struct BlobReadCommand {
    /// Cell address.
    #[command(flatten)]
    target: BlobTarget,
    /// Maximum bytes to read (defaults to the rest of the cell).
    #[arg(long, value_name = "BYTES")]
    length: Option<usize>,
}

/// Arguments for `blob write`.
#[derive(Args, Debug)]
struct BlobWriteCommand {
    /// Cell address.
    #[command(flatten)]
    target: BlobTarget,
    /// File whose bytes are written into the cell.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures, rendered to stderr.
#[derive(Debug, Error)]
enum CliError {
    /// Config file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Database operation failed.
    #[error(transparent)]
    Database(#[from] SqlcellError),
    /// Arguments were insufficient or inconsistent.
    #[error("{0}")]
    Usage(String),
    /// An input file could not be read.
    #[error("failed to read {path}: {error}")]
    Input {
        /// Input path.
        path: String,
        /// Failure description.
        error: String,
    },
    /// Output could not be written.
    #[error("failed to write {stream}: {error}")]
    Output {
        /// Stream label.
        stream: &'static str,
        /// Failure description.
        error: String,
    },
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let loaded = load_config(cli.config.as_deref())?;
    init_logging(&loaded.settings);
    match cli.command {
        Commands::Exec(command) => command_exec(&command, &loaded),
        Commands::Backup(command) => command_backup(&command, &loaded),
        Commands::Blob {
            command,
        } => match command {
            BlobCommand::Read(command) => command_blob_read(&command, &loaded),
            BlobCommand::Write(command) => command_blob_write(&command, &loaded),
        },
    }
}

// ============================================================================
// SECTION: Config and Logging
// ============================================================================

/// Settings resolved for one invocation.
#[derive(Debug)]
struct LoadedConfig {
    /// Effective settings.
    settings: SqlcellConfig,
    /// True when the settings came from a config file.
    from_file: bool,
}

/// Loads `sqlcell.toml` when one is named or present; defaults otherwise.
fn load_config(path: Option<&Path>) -> CliResult<LoadedConfig> {
    let named = path.is_some() || env::var_os(CONFIG_ENV_VAR).is_some();
    if !named && !Path::new(DEFAULT_CONFIG_NAME).is_file() {
        return Ok(LoadedConfig {
            settings: SqlcellConfig::default(),
            from_file: false,
        });
    }
    let settings = SqlcellConfig::load(path)?;
    Ok(LoadedConfig {
        settings,
        from_file: true,
    })
}

/// Returns the database settings with the `--db` override applied.
fn database_config(loaded: &LoadedConfig, args: &DatabaseArgs) -> CliResult<DatabaseConfig> {
    let mut config = loaded.settings.database.clone();
    match (&args.db, loaded.from_file) {
        (Some(path), _) => config.path.clone_from(path),
        (None, true) => {}
        (None, false) => {
            return Err(CliError::Usage(
                "no database given: pass --db or set [database].path in sqlcell.toml".to_string(),
            ));
        }
    }
    Ok(config)
}

/// Installs the stderr log subscriber; `RUST_LOG` wins over the config level.
fn init_logging(settings: &SqlcellConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.as_str()));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        debug!("log subscriber already installed");
    }
}

// ============================================================================
// SECTION: Exec Command
// ============================================================================

/// Executes the `exec` command.
fn command_exec(command: &ExecCommand, loaded: &LoadedConfig) -> CliResult<ExitCode> {
    let mut config = database_config(loaded, &command.database)?;
    config.hash_functions |= command.hash_functions;
    let params: Vec<Value> = command.params.iter().map(String::as_str).map(parse_param).collect();
    let db = Database::open(config)?;
    let result = db.execute(&command.sql, &params)?;
    for row in &result.rows {
        let line = JsonValue::Array(row.iter().map(value_to_json).collect());
        write_stdout_line(&line.to_string())?;
    }
    debug!(rows = result.len(), "statement executed");
    Ok(ExitCode::SUCCESS)
}

/// Parses a `--param` value into an SQL value.
fn parse_param(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return Value::Integer(integer);
    }
    match raw.parse::<f64>() {
        Ok(real) if real.is_finite() => Value::Real(real),
        _ => Value::Text(raw.to_string()),
    }
}

/// Renders an SQL value as JSON; BLOBs become `x'..'` hex literals.
fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(integer) => JsonValue::from(*integer),
        Value::Real(real) => {
            serde_json::Number::from_f64(*real).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::Text(text) => JsonValue::String(text.clone()),
        Value::Blob(bytes) => JsonValue::String(format!("x'{}'", hex_encode(bytes))),
    }
}

// ============================================================================
// SECTION: Backup Command
// ============================================================================

/// JSON summary printed after a backup.
#[derive(Debug, Serialize)]
struct BackupSummary {
    /// Source database path.
    source: String,
    /// Destination database path.
    target: String,
    /// Final progress counters.
    #[serde(flatten)]
    progress: BackupProgress,
}

/// Executes the `backup` command.
fn command_backup(command: &BackupCommand, loaded: &LoadedConfig) -> CliResult<ExitCode> {
    let config = database_config(loaded, &command.database)?;
    let source_path = config.path.display().to_string();
    let source = Database::open(config)?;
    let progress = source.backup_to_file_with(&command.to, loaded.settings.backup.clone())?;
    let summary = BackupSummary {
        source: source_path,
        target: command.to.display().to_string(),
        progress,
    };
    let line = serde_json::to_string(&summary).map_err(|err| CliError::Output {
        stream: "stdout",
        error: err.to_string(),
    })?;
    write_stdout_line(&line)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Blob Commands
// ============================================================================

/// Executes the `blob read` command.
fn command_blob_read(command: &BlobReadCommand, loaded: &LoadedConfig) -> CliResult<ExitCode> {
    let target = &command.target;
    let db = Database::open(database_config(loaded, &target.database)?)?;
    let mut blob = db.blob_open(&target.table, &target.column, target.rowid, true)?;
    blob.seek(SeekFrom::Start(target.offset))?;
    let bytes = blob.read(command.length)?;
    blob.close()?;
    write_stdout_bytes(&bytes)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `blob write` command.
fn command_blob_write(command: &BlobWriteCommand, loaded: &LoadedConfig) -> CliResult<ExitCode> {
    let target = &command.target;
    let db = Database::open(database_config(loaded, &target.database)?)?;
    let mut blob = db.blob_open(&target.table, &target.column, target.rowid, false)?;
    blob.seek(SeekFrom::Start(target.offset))?;
    let bytes = read_bytes_with_limit(&command.input, blob.len()?)?;
    blob.write(&bytes)?;
    blob.close()?;
    let summary = json!({
        "table": target.table,
        "column": target.column,
        "rowid": target.rowid,
        "offset": target.offset,
        "bytes_written": bytes.len(),
    });
    write_stdout_line(&summary.to_string())?;
    Ok(ExitCode::SUCCESS)
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> CliResult<Vec<u8>> {
    let input_error = |error: String| CliError::Input {
        path: path.display().to_string(),
        error,
    };
    let file = File::open(path).map_err(|err| input_error(err.to_string()))?;
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    let mut limited = file.take(limit.saturating_add(1));
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(|err| input_error(err.to_string()))?;
    if bytes.len() > max_bytes {
        return Err(input_error(format!("input exceeds the {max_bytes} byte cell")));
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| output_error("stdout", &err))
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout
        .write_all(bytes)
        .and_then(|()| stdout.flush())
        .map_err(|err| output_error("stdout", &err))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Builds an output error for a stream.
fn output_error(stream: &'static str, error: &std::io::Error) -> CliError {
    CliError::Output {
        stream,
        error: error.to_string(),
    }
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
