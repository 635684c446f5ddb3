//! # Storage Engine
//!
//! This module implements a **synchronous**, **crash-safe** key-value
//! engine backed by a single append-only log and a lazily-applied
//! tombstone journal.
//!
//! ## Design Overview
//!
//! - **Log** ([`crate::log::Log`]) — the ground truth. One `key SP value
//!   LF` record per write; a key's live value is whichever occurrence the
//!   index currently points at.
//! - **Index** ([`crate::index::Index`]) — in-memory `key → offset`
//!   cache, rebuilt by scanning the log on [`Engine::open`].
//! - **Tombstone log** ([`crate::tombstone::TombstoneLog`]) — a durable
//!   queue of pending deletes, drained by the deletion task.
//!
//! Two background threads run for the lifetime of the engine:
//! [`compaction`] rewrites the log so each live key has exactly one
//! record, and [`deletion`] drains the tombstone queue and erases the
//! matching records from the log. Both cooperate with [`Engine::close`]
//! via a shared cancellation flag rather than running forever.
//!
//! ## Concurrency Model
//!
//! Two non-nested `Mutex`es guard disjoint state (spec §5):
//!
//! - the **log-lock** (`log_state`) covers the log file *and* the index
//!   together, since every rewrite must update both atomically (I5);
//! - the **tombstone-lock** (`tombstones`) covers only the tombstone
//!   file.
//!
//! `DELETE` acquires them sequentially — tombstone-lock, release,
//! log-lock — so no operation ever holds both at once, preventing
//! deadlock by construction.

pub mod compaction;
pub mod deletion;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::index::Index;
use crate::log::{Log, LogError};
use crate::tombstone::{TombstoneError, TombstoneLog};

/// Default log file name, relative to the engine's data directory.
pub const DEFAULT_LOG_FILE: &str = "data.txt";
/// Default tombstone file name, relative to the engine's data directory.
pub const DEFAULT_TOMBSTONE_FILE: &str = "delete.txt";

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested key was not present.
    #[error("key not found")]
    NotFound,

    /// The key contains the record separator or a newline.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] InvalidKeyError),

    /// Error originating from the log subsystem.
    #[error("log error: {0}")]
    Log(#[from] LogError),

    /// Error originating from the tombstone subsystem.
    #[error("tombstone error: {0}")]
    Tombstone(#[from] TombstoneError),

    /// Underlying I/O error not already wrapped by a subsystem error (e.g.
    /// creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal invariant violation (poisoned lock, unexpected state).
    #[error("internal error: {0}")]
    Internal(String),
}

/// The key supplied to [`Engine::set`] or [`Engine::delete`] was invalid.
#[derive(Debug, Error)]
#[error("key contains an illegal byte (space or newline)")]
pub struct InvalidKeyError;

/// Configuration for an [`Engine`] instance.
///
/// Controls file names within the data directory, background task
/// scheduling, and the record-length/tombstone-drain bounds named in
/// spec §6. Passed to [`Engine::open`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// File name for the log, relative to the engine's data directory.
    pub log_file_name: String,

    /// File name for the tombstone journal, relative to the data directory.
    pub tombstone_file_name: String,

    /// How often the compaction task wakes up to rewrite the log.
    pub compaction_interval: Duration,

    /// How often the deletion task wakes up to drain tombstones.
    pub deletion_interval: Duration,

    /// Maximum number of tombstones drained in a single deletion-task cycle.
    pub max_tombstones_per_cycle: usize,

    /// Maximum encoded record length (`key SP value LF`), in bytes.
    pub max_record_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_file_name: DEFAULT_LOG_FILE.to_string(),
            tombstone_file_name: DEFAULT_TOMBSTONE_FILE.to_string(),
            compaction_interval: Duration::from_secs(5),
            deletion_interval: Duration::from_secs(5),
            max_tombstones_per_cycle: 1024,
            max_record_len: 1024,
        }
    }
}

/// Snapshot of engine statistics returned by [`Engine::stats`].
#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    /// Number of live keys currently tracked by the index.
    pub live_keys: usize,
    /// Current size of the log file, in bytes.
    pub log_size_bytes: u64,
    /// Current size of the tombstone file, in bytes.
    pub tombstone_size_bytes: u64,
}

/// State protected by the log-lock: the log file and the index that is
/// derived from it. They are always mutated together (spec I5).
pub(crate) struct LogState {
    pub(crate) log: Log,
    pub(crate) index: Index,
}

/// Shared state behind every [`Engine`] handle and both background tasks.
pub(crate) struct EngineInner {
    pub(crate) log_state: Mutex<LogState>,
    pub(crate) tombstones: Mutex<TombstoneLog>,
    pub(crate) config: EngineConfig,
    pub(crate) shutdown: Arc<(Mutex<bool>, Condvar)>,
}

struct BackgroundHandles {
    compaction: JoinHandle<()>,
    deletion: JoinHandle<()>,
}

/// The main storage engine handle.
///
/// Cheaply cloneable — clones share the same underlying locks, files, and
/// background tasks via an internal `Arc`.
pub struct Engine {
    inner: Arc<EngineInner>,
    handles: Arc<Mutex<Option<BackgroundHandles>>>,
}

impl Clone for Engine {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            handles: Arc::clone(&self.handles),
        }
    }
}

impl Engine {
    /// Opens (or creates) an engine rooted at the given data directory.
    ///
    /// Creates the directory and both files if absent. On an existing
    /// directory, the index is rebuilt by scanning the log from offset 0
    /// (spec §4.2) — pending tombstones are **not** replayed into the
    /// index (DESIGN.md, Q1). Both background tasks are spawned before
    /// this call returns.
    pub fn open(data_dir: impl AsRef<Path>, config: EngineConfig) -> Result<Self, EngineError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let log_path = data_dir.join(&config.log_file_name);
        let tombstone_path = data_dir.join(&config.tombstone_file_name);

        let mut log = Log::open(&log_path, config.max_record_len)?;
        let index = Index::rebuild(&mut log)?;
        let tombstones = TombstoneLog::open(&tombstone_path)?;

        info!(
            path = %log_path.display(),
            live_keys = index.len(),
            "engine opened"
        );

        let inner = Arc::new(EngineInner {
            log_state: Mutex::new(LogState { log, index }),
            tombstones: Mutex::new(tombstones),
            config,
            shutdown: Arc::new((Mutex::new(false), Condvar::new())),
        });

        let compaction_handle = compaction::spawn(Arc::clone(&inner));
        let deletion_handle = deletion::spawn(Arc::clone(&inner));

        Ok(Self {
            inner,
            handles: Arc::new(Mutex::new(Some(BackgroundHandles {
                compaction: compaction_handle,
                deletion: deletion_handle,
            }))),
        })
    }

    /// Insert or overwrite a key-value pair (spec §4.3).
    ///
    /// Fails with [`EngineError::InvalidKey`] if `key` contains the record
    /// separator (`0x20`) or a newline; the log is left unmodified in
    /// that case (P6).
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        if key.iter().any(|&b| b == crate::log::SEP || b == crate::log::LF) {
            return Err(InvalidKeyError.into());
        }

        let mut state = self.lock_log_state()?;
        let offset = state.log.append(key, value)?;
        state.index.insert(key.to_vec(), offset);
        Ok(())
    }

    /// Look up a key (spec §4.4).
    ///
    /// Returns `Ok(None)` if the key is absent or has been deleted.
    /// Holding the log-lock across index lookup *and* the file read
    /// ensures concurrent compaction or deletion cannot invalidate the
    /// offset mid-read.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, EngineError> {
        let mut state = self.lock_log_state()?;
        let Some(offset) = state.index.get(key) else {
            return Ok(None);
        };
        let record = state.log.read_at(offset)?;
        Ok(Some(record.value))
    }

    /// Delete a key (spec §4.5).
    ///
    /// Two-phase: first append a tombstone (tombstone-lock), then remove
    /// the index entry (log-lock). The log itself is untouched until the
    /// next deletion-task cycle. Locks are acquired sequentially, never
    /// nested (spec §5).
    pub fn delete(&self, key: &[u8]) -> Result<(), EngineError> {
        if key.contains(&crate::log::LF) {
            return Err(InvalidKeyError.into());
        }

        {
            let mut tombstones = self.lock_tombstones()?;
            tombstones.append(key)?;
        }

        let mut state = self.lock_log_state()?;
        state.index.remove(key);
        Ok(())
    }

    /// Returns a snapshot of engine statistics.
    pub fn stats(&self) -> Result<EngineStats, EngineError> {
        let state = self.lock_log_state()?;
        let log_size_bytes = state.log.len()?;
        let live_keys = state.index.len();
        drop(state);

        let tombstones = self.lock_tombstones()?;
        let tombstone_size_bytes = tombstones.len()?;

        Ok(EngineStats {
            live_keys,
            log_size_bytes,
            tombstone_size_bytes,
        })
    }

    /// Forces one round of compaction outside the background task's
    /// timer. Exposed for tests and for callers that want a
    /// deterministic compaction point (spec §4.6).
    pub fn compact_now(&self) -> Result<(), EngineError> {
        compaction::run_cycle(&self.inner)
    }

    /// Forces one round of the deletion task outside its timer. Exposed
    /// for tests and for callers that want deletions applied
    /// deterministically (spec §4.7).
    pub fn run_deletion_now(&self) -> Result<(), EngineError> {
        deletion::run_cycle(&self.inner)
    }

    /// Gracefully shuts the engine down.
    ///
    /// Signals both background tasks via the shared cancellation flag,
    /// wakes them immediately (rather than waiting out their timer), and
    /// joins both threads before returning. Safe to call more than once;
    /// subsequent calls are no-ops.
    pub fn close(&self) -> Result<(), EngineError> {
        let handles = {
            let mut guard = self
                .handles
                .lock()
                .map_err(|_| EngineError::Internal("handles mutex poisoned".into()))?;
            guard.take()
        };

        let Some(handles) = handles else {
            return Ok(());
        };

        {
            let (lock, cvar) = &*self.inner.shutdown;
            let mut flag = lock
                .lock()
                .map_err(|_| EngineError::Internal("shutdown mutex poisoned".into()))?;
            *flag = true;
            cvar.notify_all();
        }

        if handles.compaction.join().is_err() {
            warn!("compaction task panicked during shutdown");
        }
        if handles.deletion.join().is_err() {
            warn!("deletion task panicked during shutdown");
        }

        debug!("engine closed");
        Ok(())
    }

    fn lock_log_state(&self) -> Result<std::sync::MutexGuard<'_, LogState>, EngineError> {
        self.inner
            .log_state
            .lock()
            .map_err(|_| EngineError::Internal("log-lock poisoned".into()))
    }

    fn lock_tombstones(&self) -> Result<std::sync::MutexGuard<'_, TombstoneLog>, EngineError> {
        self.inner
            .tombstones
            .lock()
            .map_err(|_| EngineError::Internal("tombstone-lock poisoned".into()))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Only the last handle (refcount 1 before this drop) owns the
        // background threads; clones simply release their Arc.
        if Arc::strong_count(&self.inner) == 1
            && let Ok(mut guard) = self.handles.lock()
            && let Some(handles) = guard.take()
        {
            let (lock, cvar) = &*self.inner.shutdown;
            if let Ok(mut flag) = lock.lock() {
                *flag = true;
                cvar.notify_all();
            }
            let _ = handles.compaction.join();
            let _ = handles.deletion.join();
        }
    }
}

/// Blocks the calling background task for up to `interval`, returning
/// `true` if shutdown was requested (either before or during the wait).
pub(crate) fn wait_or_shutdown(shutdown: &Arc<(Mutex<bool>, Condvar)>, interval: Duration) -> bool {
    let (lock, cvar) = &**shutdown;
    let guard = match lock.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    if *guard {
        return true;
    }
    let (guard, _) = match cvar.wait_timeout(guard, interval) {
        Ok(r) => r,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard
}

/// Rebuilds a fresh `key -> offset` map from a list of `(key, value)`
/// pairs written in order, given the offsets [`crate::log::Log::rewrite`]
/// reports for each. Shared by both background tasks.
pub(crate) fn offsets_to_map(keys: Vec<Vec<u8>>, offsets: Vec<u64>) -> HashMap<Vec<u8>, u64> {
    keys.into_iter().zip(offsets).collect()
}
