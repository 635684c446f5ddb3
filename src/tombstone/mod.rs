//! # Tombstone Module
//!
//! The durable work queue for DELETE. Every `DELETE(key)` appends `key LF`
//! to this file before the key is dropped from the index (spec §4.5); the
//! deletion task later drains the file and physically removes the
//! matching records from the log (spec §4.7).
//!
//! Like [`crate::log::Log`], this type holds no internal lock — the
//! engine's tombstone-lock is the single critical section covering both
//! the file handle and its contents (spec §5).

#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::log::LF;

/// Errors returned by tombstone-log operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TombstoneError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key contains a newline and cannot be journaled as a tombstone.
    #[error("key contains a newline")]
    InvalidKey,
}

/// Handle to the on-disk tombstone file.
#[derive(Debug)]
pub struct TombstoneLog {
    file: File,
    path: PathBuf,
}

impl TombstoneLog {
    /// Opens (creating if absent) the tombstone file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TombstoneError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        debug!(path = %path.display(), "tombstone log opened");
        Ok(Self { file, path })
    }

    /// Appends `key LF`, flushing and syncing before returning.
    pub fn append(&mut self, key: &[u8]) -> Result<(), TombstoneError> {
        if key.contains(&LF) {
            return Err(TombstoneError::InvalidKey);
        }

        self.file.write_all(key)?;
        self.file.write_all(&[LF])?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Reads up to `max` tombstone keys from the start of the file.
    ///
    /// Stage A of the deletion task (spec §4.7): this is the entire
    /// critical section that needs the tombstone-lock. The drained batch
    /// is removed from the file; any tombstones beyond `max` are written
    /// back so a later cycle picks them up, rather than being dropped —
    /// see DESIGN.md (bounded drain must loop to empty across cycles, not
    /// discard the overflow the way the original single-shot drain did).
    pub fn drain(&mut self, max: usize) -> Result<Vec<Vec<u8>>, TombstoneError> {
        self.file.seek(SeekFrom::Start(0))?;

        let mut all_keys = Vec::new();
        {
            let mut reader = BufReader::new(&mut self.file);
            let mut line = Vec::new();
            loop {
                line.clear();
                let read = reader.read_until(LF, &mut line)?;
                if read == 0 {
                    break;
                }
                if line.last() == Some(&LF) {
                    line.pop();
                }
                if line.is_empty() {
                    continue;
                }
                all_keys.push(line.clone());
            }
        }

        let remainder = if all_keys.len() > max {
            all_keys.split_off(max)
        } else {
            Vec::new()
        };
        let drained = all_keys;

        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        for key in &remainder {
            self.file.write_all(key)?;
            self.file.write_all(&[LF])?;
        }
        self.file.flush()?;
        self.file.sync_data()?;

        if !drained.is_empty() {
            debug!(count = drained.len(), remaining = remainder.len(), "tombstones drained");
        }
        Ok(drained)
    }

    pub fn len(&self) -> Result<u64, TombstoneError> {
        Ok(self.file.metadata()?.len())
    }
}

impl Drop for TombstoneLog {
    fn drop(&mut self) {
        if let Err(e) = self.file.sync_data() {
            warn!(path = %self.path.display(), error = %e, "tombstone log sync failed on drop");
        }
    }
}
