//! # Log Module
//!
//! Implements the **append-only, line-delimited** log that is the ground
//! truth for every key this engine holds. This is not a write-ahead log
//! paired with a separate in-memory structure that is later flushed — the
//! log file *is* the data; the in-memory [`crate::index`] is only a cache
//! of byte offsets derived from it.
//!
//! ## On-disk layout
//!
//! ```text
//! key SP value LF
//! key SP value LF
//! ...
//! ```
//!
//! `SP` is the single byte `0x20`, `LF` is `0x0A`. Keys may not contain
//! `SP` or `LF`; values may not contain `LF`. A record's offset is the byte
//! position of its first byte; the offset of the following record is the
//! position immediately after the preceding record's `LF`.
//!
//! ## Concurrency model
//!
//! Unlike [`crate::engine`]'s teacher-grade write-ahead log, `Log` does
//! **not** synchronize itself internally — the engine's log-lock is the
//! single critical section covering both the file and the in-memory index
//! (see spec §5), so adding a second lock here would only invite deadlocks
//! or redundant contention. Callers are expected to hold the engine's
//! log-lock for the duration of any [`Log`] operation.
//!
//! ## Guarantees
//!
//! - **Durability:** every [`Log::append`] is followed by `flush()` and
//!   `sync_data()`.
//! - **Crash recovery:** [`Log::scan`] replays the file from offset 0 and
//!   is used by [`crate::index::Index::rebuild`] to reconstruct the index.
//! - **Rewrite safety:** [`Log::rewrite`] builds a scratch file alongside
//!   the live log and atomically renames it into place, rather than
//!   truncating and copying back into a long-lived handle (see DESIGN.md,
//!   Q3).

#[cfg(test)]
mod tests;

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace, warn};

/// The byte that separates a record's key from its value.
pub const SEP: u8 = b' ';
/// The byte that terminates every record.
pub const LF: u8 = b'\n';

/// Errors returned by log operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LogError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key contains the record separator (`0x20`) or a newline.
    #[error("key contains an illegal byte (space or newline)")]
    InvalidKey,

    /// The value contains a newline.
    #[error("value contains a newline")]
    InvalidValue,

    /// The encoded `key SP value LF` record would exceed the configured
    /// maximum record length.
    #[error("record exceeds maximum length ({0} bytes)")]
    RecordTooLarge(usize),

    /// A record was expected at a given offset but what was read there did
    /// not parse as `key SP value`, or parsed with an unexpected key.
    #[error("corrupt record at offset {0}")]
    Corruption(u64),
}

/// A single parsed log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Parses one log line (without its trailing `LF`) into a [`Record`].
///
/// Returns `None` if the line contains no separator — such lines are
/// skipped during recovery per spec §4.2 rather than treated as fatal.
pub fn parse_record(line: &[u8]) -> Option<Record> {
    let sep_pos = line.iter().position(|&b| b == SEP)?;
    let key = line[..sep_pos].to_vec();
    let value = line[sep_pos + 1..].to_vec();
    Some(Record { key, value })
}

/// Validates that `key`/`value` are legal record contents and returns the
/// encoded `key SP value LF` line.
fn encode_record(key: &[u8], value: &[u8], max_record_len: usize) -> Result<Vec<u8>, LogError> {
    if key.iter().any(|&b| b == SEP || b == LF) {
        return Err(LogError::InvalidKey);
    }
    if value.iter().any(|&b| b == LF) {
        return Err(LogError::InvalidValue);
    }

    let mut line = Vec::with_capacity(key.len() + value.len() + 2);
    line.extend_from_slice(key);
    line.push(SEP);
    line.extend_from_slice(value);
    line.push(LF);

    if line.len() > max_record_len {
        return Err(LogError::RecordTooLarge(line.len()));
    }

    Ok(line)
}

/// Handle to the on-disk log file.
///
/// Holds no internal lock — see the module-level concurrency note.
#[derive(Debug)]
pub struct Log {
    file: File,
    path: PathBuf,
    max_record_len: usize,
}

impl Log {
    /// Opens (creating if absent) the log file at `path`.
    pub fn open(path: impl AsRef<Path>, max_record_len: usize) -> Result<Self, LogError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        debug!(path = %path.display(), "log opened");

        Ok(Self {
            file,
            path,
            max_record_len,
        })
    }

    /// Appends `key SP value LF` to the end of the log, flushing and
    /// syncing before returning.
    ///
    /// Returns the byte offset at which the new record begins.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<u64, LogError> {
        let line = encode_record(key, value, self.max_record_len)?;

        let offset = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&line)?;
        self.file.flush()?;
        self.file.sync_data()?;

        trace!(offset, len = line.len(), "record appended");
        Ok(offset)
    }

    /// Reads and parses the record starting at `offset`.
    ///
    /// Returns [`LogError::Corruption`] if no separator is found in the
    /// line, mirroring the "skip unparsable lines" rule applied elsewhere
    /// to recovery — here the caller holds an index entry that promised a
    /// valid record, so an unparsable line is corruption rather than a
    /// line to be silently skipped.
    pub fn read_at(&mut self, offset: u64) -> Result<Record, LogError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut reader = BufReader::new(&mut self.file);

        let mut line = Vec::with_capacity(128);
        let read = reader.read_until(LF, &mut line)?;
        if read == 0 || line.len() > self.max_record_len {
            return Err(LogError::Corruption(offset));
        }
        strip_trailing_lf(&mut line);

        parse_record(&line).ok_or(LogError::Corruption(offset))
    }

    /// Returns an iterator over every record in the log, in file order,
    /// starting from offset 0. Used by recovery and by the background
    /// tasks' rewrite scans.
    pub fn scan(&mut self) -> Result<LogScan<'_>, LogError> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(LogScan {
            reader: BufReader::new(&mut self.file),
            offset: 0,
            max_record_len: self.max_record_len,
        })
    }

    /// Current length of the log file in bytes.
    pub fn len(&self) -> Result<u64, LogError> {
        Ok(self.file.metadata()?.len())
    }

    /// Rewrites the log so that it contains exactly the given records, in
    /// order, and returns the byte offset each one was written at (same
    /// order as input).
    ///
    /// Builds a scratch file in the same directory as the live log and
    /// atomically renames it into place (see DESIGN.md, Q3), then reopens
    /// the file handle at the (unchanged) path.
    pub fn rewrite<'a, I>(&mut self, records: I) -> Result<Vec<u64>, LogError>
    where
        I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
    {
        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let scratch_path = dir.join(format!(
            ".{}.tmp",
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("log")
        ));

        let mut offsets = Vec::new();
        {
            let mut scratch = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&scratch_path)?;

            let mut tail: u64 = 0;
            for (key, value) in records {
                let line = encode_record(key, value, self.max_record_len)?;
                scratch.write_all(&line)?;
                offsets.push(tail);
                tail += line.len() as u64;
            }
            scratch.flush()?;
            scratch.sync_all()?;
        }

        fs::rename(&scratch_path, &self.path)?;

        self.file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;

        debug!(path = %self.path.display(), records = offsets.len(), "log rewritten");
        Ok(offsets)
    }
}

impl Drop for Log {
    fn drop(&mut self) {
        if let Err(e) = self.file.sync_data() {
            warn!(path = %self.path.display(), error = %e, "log sync failed on drop");
        }
    }
}

/// Streaming iterator over `(offset, Record)` pairs produced by
/// [`Log::scan`]. Lines with no separator are skipped (spec §4.2 step 3);
/// lines that exceed the configured maximum length are skipped and logged
/// as corruption (spec §9, Q4).
pub struct LogScan<'a> {
    reader: BufReader<&'a mut File>,
    offset: u64,
    max_record_len: usize,
}

impl<'a> Iterator for LogScan<'a> {
    type Item = io::Result<(u64, Record)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let start = self.offset;
            let mut line = Vec::with_capacity(128);
            let read = match self.reader.read_until(LF, &mut line) {
                Ok(n) => n,
                Err(e) => return Some(Err(e)),
            };

            if read == 0 {
                return None;
            }
            self.offset += read as u64;

            // Oversized lines are undefined behavior per spec §9 (Q4); we
            // skip them and keep scanning rather than fail recovery outright.
            if line.len() > self.max_record_len {
                warn!(offset = start, len = line.len(), "skipped oversized log line");
                continue;
            }

            strip_trailing_lf(&mut line);

            match parse_record(&line) {
                Some(record) => return Some(Ok((start, record))),
                None => continue,
            }
        }
    }
}

fn strip_trailing_lf(line: &mut Vec<u8>) {
    if line.last() == Some(&LF) {
        line.pop();
    }
}
