// crates/sqlcell-core/src/blob.rs
// ============================================================================
// Module: sqlcell BLOB Streams
// Description: Seekable fixed-length I/O bound to one stored BLOB cell.
// Purpose: Read and write large values in place without loading them whole.
// Dependencies: rusqlite, tracing
// ============================================================================

//! ## Overview
//! A [`BlobStream`] addresses one cell by (table, column, rowid) and keeps a
//! cursor in `[0, len]`. The length is fixed when the stream opens; the
//! engine never grows a cell through this path.
//!
//! Writes and seeks past the end are rejected with [`SqlcellError::Range`]
//! and leave the cursor untouched. Reads past the end are truncated to the
//! bytes that remain. After [`BlobStream::close`] every call fails with
//! [`SqlcellError::Interface`].
//!
//! The stream borrows its [`Database`], so the handle cannot be closed while
//! a stream is open. A row deleted underneath an open stream is noticed on
//! the next engine call, which fails with [`EngineCode::Abort`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::io::SeekFrom;

use rusqlite::DatabaseName;
use rusqlite::blob::Blob;
use tracing::debug;

use crate::database::Database;
use crate::error::EngineCode;
use crate::error::Result;
use crate::error::SqlcellError;

// ============================================================================
// SECTION: Blob Stream
// ============================================================================

/// Random-access stream over one BLOB cell.
///
/// # Invariants
/// - `offset <= length` at all times.
/// - `blob` is `None` exactly when the stream is closed.
pub struct BlobStream<'db> {
    /// Engine BLOB handle.
    blob: Option<Blob<'db>>,
    /// Bound table name.
    table: String,
    /// Bound column name.
    column: String,
    /// Bound row identifier.
    rowid: i64,
    /// Cell length in bytes, fixed while bound to a row.
    length: usize,
    /// Cursor position.
    offset: usize,
    /// Rejects writes when true.
    read_only: bool,
}

impl<'db> BlobStream<'db> {
    /// Opens a stream on `table.column` at `rowid`.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Operational`] with [`EngineCode::NotFound`]
    /// when the table, column, or row is missing, and
    /// [`SqlcellError::Interface`] when the handle is closed.
    pub fn open(
        database: &'db Database,
        table: &str,
        column: &str,
        rowid: i64,
        read_only: bool,
    ) -> Result<Self> {
        let connection = database.connection()?;
        let blob = connection.blob_open(DatabaseName::Main, table, column, rowid, read_only)?;
        let length = blob.len();
        debug!(table, column, rowid, length, read_only, "blob opened");
        Ok(Self {
            blob: Some(blob),
            table: table.to_string(),
            column: column.to_string(),
            rowid,
            length,
            offset: 0,
            read_only,
        })
    }

    /// Returns the engine handle or an interface error once closed.
    fn handle(&self) -> Result<&Blob<'db>> {
        self.blob.as_ref().ok_or_else(closed_error)
    }

    /// Returns the cell length in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the stream is closed.
    pub fn len(&self) -> Result<usize> {
        self.handle()?;
        Ok(self.length)
    }

    /// Returns true when the cell holds zero bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the stream is closed.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the cursor position.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when the stream is closed.
    pub fn tell(&self) -> Result<usize> {
        self.handle()?;
        Ok(self.offset)
    }

    /// Returns true once [`BlobStream::close`] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.blob.is_none()
    }

    /// Returns true when the stream rejects writes.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the bound row identifier.
    #[must_use]
    pub const fn rowid(&self) -> i64 {
        self.rowid
    }

    // ------------------------------------------------------------------------
    // I/O
    // ------------------------------------------------------------------------

    /// Reads up to `limit` bytes (all remaining bytes when `None`) and
    /// advances the cursor by the number of bytes returned.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when closed and
    /// [`SqlcellError::Operational`] when the engine read fails.
    pub fn read(&mut self, limit: Option<usize>) -> Result<Vec<u8>> {
        let blob = self.handle()?;
        let remaining = self.length - self.offset;
        let count = limit.map_or(remaining, |limit| limit.min(remaining));
        let mut buffer = vec![0_u8; count];
        if count > 0 {
            blob.read_at_exact(&mut buffer, self.offset)?;
        }
        self.offset += count;
        Ok(buffer)
    }

    /// Writes all of `data` at the cursor and advances past it.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when closed,
    /// [`SqlcellError::Operational`] with [`EngineCode::ReadOnly`] on a
    /// read-only stream, and [`SqlcellError::Range`] when `data` would run
    /// past the end of the cell. The stream is unchanged on error.
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        let offset = self.offset;
        let length = self.length;
        let read_only = self.read_only;
        let blob = self.blob.as_mut().ok_or_else(closed_error)?;
        if read_only {
            return Err(SqlcellError::operational(
                EngineCode::ReadOnly,
                "attempt to write a readonly blob",
            ));
        }
        let end = offset
            .checked_add(data.len())
            .filter(|end| *end <= length)
            .ok_or_else(|| {
                SqlcellError::Range(format!(
                    "write of {} bytes at offset {offset} exceeds blob length {length}",
                    data.len()
                ))
            })?;
        if !data.is_empty() {
            blob.write_at(data, offset)?;
        }
        self.offset = end;
        Ok(())
    }

    /// Moves the cursor and returns the new position.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when closed and
    /// [`SqlcellError::Range`] when the target falls outside `[0, len]`.
    pub fn seek(&mut self, position: SeekFrom) -> Result<usize> {
        self.handle()?;
        let target = resolve_seek(position, self.offset, self.length)?;
        self.offset = target;
        Ok(target)
    }

    /// Rebinds the stream to `rowid` in the same table and column, resetting
    /// the cursor and refreshing the length.
    ///
    /// A failed rebind leaves the engine handle aborted, so the stream closes
    /// and later calls fail with [`SqlcellError::Interface`].
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when closed and
    /// [`SqlcellError::Operational`] when the row is missing.
    pub fn reopen(&mut self, rowid: i64) -> Result<()> {
        let blob = self.blob.as_mut().ok_or_else(closed_error)?;
        if let Err(err) = blob.reopen(rowid) {
            self.blob = None;
            self.offset = 0;
            self.length = 0;
            debug!(table = %self.table, column = %self.column, rowid, "blob reopen failed, stream closed");
            return Err(err.into());
        }
        self.length = blob.len();
        self.rowid = rowid;
        self.offset = 0;
        debug!(table = %self.table, column = %self.column, rowid, length = self.length, "blob reopened");
        Ok(())
    }

    /// Releases the engine handle. Later calls fail with an interface error.
    ///
    /// # Errors
    ///
    /// Returns [`SqlcellError::Interface`] when already closed and
    /// [`SqlcellError::Operational`] when the engine reports a close failure.
    pub fn close(&mut self) -> Result<()> {
        let blob = self.blob.take().ok_or_else(closed_error)?;
        blob.close()?;
        debug!(table = %self.table, column = %self.column, rowid = self.rowid, "blob closed");
        Ok(())
    }
}

impl Database {
    /// Opens a [`BlobStream`] on `table.column` at `rowid`.
    ///
    /// # Errors
    ///
    /// See [`BlobStream::open`].
    pub fn blob_open(
        &self,
        table: &str,
        column: &str,
        rowid: i64,
        read_only: bool,
    ) -> Result<BlobStream<'_>> {
        BlobStream::open(self, table, column, rowid, read_only)
    }
}

// ============================================================================
// SECTION: std::io Adapters
// ============================================================================

impl io::Read for BlobStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = Self::read(self, Some(buf.len())).map_err(to_io_error)?;
        buf[.. bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }
}

impl io::Write for BlobStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Self::write(self, buf).map_err(to_io_error)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for BlobStream<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let position = Self::seek(self, pos).map_err(to_io_error)?;
        u64::try_from(position).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Error returned for operations on a closed stream.
fn closed_error() -> SqlcellError {
    SqlcellError::Interface("blob stream is closed".to_string())
}

/// Maps stream errors onto `std::io` error kinds.
fn to_io_error(error: SqlcellError) -> io::Error {
    let kind = match &error {
        SqlcellError::Range(_) => io::ErrorKind::InvalidInput,
        SqlcellError::Interface(_) => io::ErrorKind::NotConnected,
        SqlcellError::Operational {
            code: EngineCode::ReadOnly,
            ..
        } => io::ErrorKind::PermissionDenied,
        _ => return io::Error::other(error),
    };
    io::Error::new(kind, error)
}

/// Resolves a seek target against the cursor and length.
fn resolve_seek(position: SeekFrom, offset: usize, length: usize) -> Result<usize> {
    let (base, delta) = match position {
        SeekFrom::Start(start) => (0_i128, i128::from(start)),
        SeekFrom::Current(delta) => (to_i128(offset), i128::from(delta)),
        SeekFrom::End(delta) => (to_i128(length), i128::from(delta)),
    };
    let target = base + delta;
    if target < 0 || target > to_i128(length) {
        return Err(SqlcellError::Range(format!(
            "seek target {target} outside blob range [0, {length}]"
        )));
    }
    usize::try_from(target).map_err(|err| SqlcellError::Range(err.to_string()))
}

/// Widens a cursor value for signed seek arithmetic.
fn to_i128(value: usize) -> i128 {
    i128::try_from(value).unwrap_or(i128::MAX)
}
