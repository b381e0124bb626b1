// crates/sqlcell-core/tests/blob_stream.rs
// ============================================================================
// Module: BLOB Stream Tests
// Description: Cursor, bounds, and lifecycle behavior of incremental BLOB I/O.
// Purpose: Validate reads, writes, seeks, reopen, and closed-stream errors.
// ============================================================================

//! ## Overview
//! Integration tests for [`sqlcell_core::BlobStream`]:
//! - Writes and seeks outside the cell are rejected without moving the cursor
//! - Reads past the end are truncated
//! - `reopen` rebinds to another row and resets the cursor
//! - Closed and read-only streams reject writes with the right error family
//! - Random operation sequences keep the cursor inside `[0, len]`

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use proptest::prelude::*;
use sqlcell_core::Database;
use sqlcell_core::EngineCode;
use sqlcell_core::SqlcellError;
use sqlcell_core::Value;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn blob_database() -> Database {
    let db = Database::open_in_memory().unwrap();
    db.execute("CREATE TABLE register (id INTEGER NOT NULL PRIMARY KEY, data BLOB NOT NULL)", &[])
        .unwrap();
    db
}

fn create_blob_row(db: &Database, size: i64) -> i64 {
    db.execute("INSERT INTO register (data) VALUES (zeroblob(?))", &[Value::Integer(size)])
        .unwrap();
    db.last_insert_rowid().unwrap()
}

// ============================================================================
// SECTION: Cursor Behavior
// ============================================================================

#[test]
fn write_seek_read_and_reopen() {
    let db = blob_database();
    let rowid1024 = create_blob_row(&db, 1024);
    let rowid16 = create_blob_row(&db, 16);

    let mut blob = db.blob_open("register", "data", rowid1024, false).unwrap();
    assert_eq!(blob.len().unwrap(), 1024);
    assert_eq!(blob.tell().unwrap(), 0);

    blob.write(&[b'x'; 1022]).unwrap();
    blob.write(b"zz").unwrap();
    assert_eq!(blob.seek(SeekFrom::Start(1020)).unwrap(), 1020);
    assert_eq!(blob.tell().unwrap(), 1020);

    assert_eq!(blob.read(Some(3)).unwrap(), b"xxz");
    assert_eq!(blob.read(None).unwrap(), b"z");
    assert!(blob.read(None).unwrap().is_empty());

    assert_eq!(blob.seek(SeekFrom::End(-10)).unwrap(), 1014);
    assert_eq!(blob.read(None).unwrap(), b"xxxxxxxxzz");

    blob.reopen(rowid16).unwrap();
    assert_eq!(blob.tell().unwrap(), 0);
    assert_eq!(blob.len().unwrap(), 16);
    assert_eq!(blob.rowid(), rowid16);

    blob.write(&[b'x'; 15]).unwrap();
    assert_eq!(blob.tell().unwrap(), 15);
}

#[test]
fn overflowing_writes_and_seeks_leave_the_stream_unchanged() {
    let db = blob_database();
    let rowid = create_blob_row(&db, 16);
    let mut blob = db.blob_open("register", "data", rowid, false).unwrap();

    assert!(matches!(blob.seek(SeekFrom::Start(17)), Err(SqlcellError::Range(_))));
    assert_eq!(blob.tell().unwrap(), 0);
    assert!(matches!(blob.write(&[b'x'; 17]), Err(SqlcellError::Range(_))));
    assert_eq!(blob.tell().unwrap(), 0);
    assert_eq!(blob.read(None).unwrap(), vec![0_u8; 16]);

    blob.seek(SeekFrom::Start(0)).unwrap();
    blob.write(&[b'x'; 16]).unwrap();
    assert_eq!(blob.tell().unwrap(), 16);
    blob.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(blob.read(Some(17)).unwrap(), vec![b'x'; 16]);
    blob.close().unwrap();
}

#[test]
fn writes_are_visible_through_sql() {
    let db = blob_database();
    let rowid = create_blob_row(&db, 4);
    let mut blob = db.blob_open("register", "data", rowid, false).unwrap();
    blob.write(b"huey").unwrap();
    blob.close().unwrap();

    let rows = db.execute("SELECT data FROM register WHERE id = ?", &[Value::Integer(rowid)]).unwrap();
    assert_eq!(rows.rows, vec![vec![Value::Blob(b"huey".to_vec())]]);
}

#[test]
fn std_io_traits_compose_with_copy() {
    let db = blob_database();
    let source_row = create_blob_row(&db, 8);
    let target_row = create_blob_row(&db, 8);

    let mut source = db.blob_open("register", "data", source_row, false).unwrap();
    Write::write_all(&mut source, b"mickey!!").unwrap();
    Seek::rewind(&mut source).unwrap();

    let mut target = db.blob_open("register", "data", target_row, false).unwrap();
    let copied = std::io::copy(&mut source, &mut target).unwrap();
    assert_eq!(copied, 8);

    Seek::seek(&mut target, SeekFrom::Start(0)).unwrap();
    let mut out = Vec::new();
    Read::read_to_end(&mut target, &mut out).unwrap();
    assert_eq!(out, b"mickey!!");

    let err = Write::write(&mut target, b"x").unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

// ============================================================================
// SECTION: Errors
// ============================================================================

#[test]
fn opening_missing_targets_is_operational() {
    let db = blob_database();
    let rowid = create_blob_row(&db, 4);

    for (table, column, row) in
        [("register", "data", rowid + 1), ("register", "missing", rowid), ("missing", "data", rowid)]
    {
        let err = db.blob_open(table, column, row, false).err().unwrap();
        assert!(matches!(err, SqlcellError::Operational { .. }), "{table}.{column}@{row}: {err}");
    }
}

#[test]
fn closed_stream_rejects_every_operation() {
    let db = blob_database();
    let rowid = create_blob_row(&db, 4);
    let mut blob = db.blob_open("register", "data", rowid, false).unwrap();
    assert_eq!(blob.len().unwrap(), 4);
    blob.close().unwrap();
    assert!(blob.is_closed());

    assert!(matches!(blob.len(), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.read(None), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.write(b"foo"), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.seek(SeekFrom::Start(0)), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.tell(), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.reopen(rowid), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.close(), Err(SqlcellError::Interface(_))));
}

#[test]
fn failed_reopen_closes_the_stream() {
    let db = blob_database();
    let rowid = create_blob_row(&db, 8);
    let mut blob = db.blob_open("register", "data", rowid, false).unwrap();
    blob.seek(SeekFrom::Start(3)).unwrap();

    let err = blob.reopen(rowid + 99).unwrap_err();
    assert_eq!(err.engine_code(), Some(EngineCode::NotFound));
    assert!(blob.is_closed());

    assert!(matches!(blob.len(), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.tell(), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.read(Some(2)), Err(SqlcellError::Interface(_))));
    assert!(matches!(blob.reopen(rowid), Err(SqlcellError::Interface(_))));

    let mut fresh = db.blob_open("register", "data", rowid, true).unwrap();
    assert_eq!(fresh.read(None).unwrap(), vec![0_u8; 8]);
}

#[test]
fn read_only_stream_rejects_writes() {
    let db = blob_database();
    let rowid = create_blob_row(&db, 4);
    let mut blob = db.blob_open("register", "data", rowid, false).unwrap();
    blob.write(b"huey").unwrap();
    blob.seek(SeekFrom::Start(0)).unwrap();
    assert_eq!(blob.read(None).unwrap(), b"huey");
    blob.close().unwrap();

    let mut blob = db.blob_open("register", "data", rowid, true).unwrap();
    assert!(blob.is_read_only());
    assert_eq!(blob.read(None).unwrap(), b"huey");
    blob.seek(SeekFrom::Start(0)).unwrap();
    let err = blob.write(b"meow").unwrap_err();
    assert_eq!(err.engine_code(), Some(EngineCode::ReadOnly));
    assert_eq!(blob.read(None).unwrap(), b"huey");
}

#[test]
fn deleted_row_aborts_the_stream() {
    let db = blob_database();
    let rowid = create_blob_row(&db, 4);
    let mut blob = db.blob_open("register", "data", rowid, false).unwrap();
    db.execute("DELETE FROM register WHERE id = ?", &[Value::Integer(rowid)]).unwrap();

    let err = blob.read(Some(1)).unwrap_err();
    assert_eq!(err.engine_code(), Some(EngineCode::Abort));
}

// ============================================================================
// SECTION: Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Read(usize),
    Write(usize),
    Seek(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0_usize .. 80).prop_map(Op::Read),
        (0_usize .. 80).prop_map(Op::Write),
        (-80_i64 .. 80).prop_map(Op::Seek),
    ]
}

proptest! {
    #[test]
    fn cursor_stays_within_bounds(ops in prop::collection::vec(op_strategy(), 1 .. 24)) {
        let db = blob_database();
        let rowid = create_blob_row(&db, 64);
        let mut blob = db.blob_open("register", "data", rowid, false).unwrap();
        for op in ops {
            let before = blob.tell().unwrap();
            match op {
                Op::Read(n) => {
                    let bytes = blob.read(Some(n)).unwrap();
                    prop_assert_eq!(bytes.len(), n.min(64 - before));
                    prop_assert_eq!(blob.tell().unwrap(), before + bytes.len());
                }
                Op::Write(n) => {
                    let result = blob.write(&vec![b'w'; n]);
                    if before + n <= 64 {
                        prop_assert!(result.is_ok());
                        prop_assert_eq!(blob.tell().unwrap(), before + n);
                    } else {
                        prop_assert!(matches!(result, Err(SqlcellError::Range(_))));
                        prop_assert_eq!(blob.tell().unwrap(), before);
                    }
                }
                Op::Seek(delta) => {
                    let result = blob.seek(SeekFrom::Current(delta));
                    let target = i64::try_from(before).unwrap() + delta;
                    if (0 ..= 64).contains(&target) {
                        prop_assert_eq!(result.unwrap(), usize::try_from(target).unwrap());
                    } else {
                        prop_assert!(matches!(result, Err(SqlcellError::Range(_))));
                        prop_assert_eq!(blob.tell().unwrap(), before);
                    }
                }
            }
            prop_assert!(blob.tell().unwrap() <= blob.len().unwrap());
        }
    }
}
