//! Background compaction task (spec §4.6).
//!
//! Rewrites the log so that each live key — as tracked by the index —
//! appears exactly once, holding the log-lock for the entire rewrite so
//! that concurrent `set`/`get`/`delete` index mutations are serialized
//! with it (I5). Runs every [`EngineConfig::compaction_interval`] on its
//! own thread until [`Engine::close`](super::Engine::close) signals
//! shutdown.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{EngineError, EngineInner, offsets_to_map, wait_or_shutdown};

/// Spawns the compaction thread. Returns immediately; the thread runs
/// until the engine's shared shutdown flag is set.
pub(crate) fn spawn(inner: Arc<EngineInner>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        loop {
            let interval = inner.config.compaction_interval;
            if wait_or_shutdown(&inner.shutdown, interval) {
                break;
            }
            if let Err(e) = run_cycle(&inner) {
                warn!(error = %e, "compaction cycle failed");
            }
        }
    })
}

/// Runs one round of compaction.
///
/// For every key in the index, seeks the log to its recorded offset,
/// reads the record, and writes it to a scratch file at the scratch
/// file's current tail — then swaps the scratch file into place and
/// re-points every surviving index entry at its new offset, all within a
/// single critical section (I5).
///
/// If reading a record at a recorded offset fails, that entry is skipped
/// (spec §4.6 "Failure") — it becomes orphaned in the index until the
/// next restart reseeds from the log, or until a subsequent `set`
/// overwrites it. This is reported via `tracing::warn!`, never surfaced
/// to the caller.
pub(crate) fn run_cycle(inner: &EngineInner) -> Result<(), EngineError> {
    let mut state = inner
        .log_state
        .lock()
        .map_err(|_| EngineError::Internal("log-lock poisoned".into()))?;

    let entries: Vec<(Vec<u8>, u64)> = state
        .index
        .iter()
        .map(|(k, &o)| (k.clone(), o))
        .collect();

    let mut keys = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());
    // Orphaned entries keep their stale (pre-rewrite) offset rather than
    // being dropped from the index outright, per spec §4.6 "Failure".
    let mut orphaned: Vec<(Vec<u8>, u64)> = Vec::new();

    for (key, offset) in entries {
        match state.log.read_at(offset) {
            Ok(record) => {
                keys.push(key);
                values.push(record.value);
            }
            Err(e) => {
                warn!(
                    key = %String::from_utf8_lossy(&key),
                    offset,
                    error = %e,
                    "compaction: orphaning index entry, record unreadable at recorded offset"
                );
                orphaned.push((key, offset));
            }
        }
    }

    let pairs: Vec<(&[u8], &[u8])> = keys
        .iter()
        .map(Vec::as_slice)
        .zip(values.iter().map(Vec::as_slice))
        .collect();
    let new_offsets = state.log.rewrite(pairs)?;

    let mut new_index = offsets_to_map(keys, new_offsets);
    let skipped = orphaned.len();
    for (key, offset) in orphaned {
        new_index.insert(key, offset);
    }
    let live_keys = new_index.len();
    state.index.replace_all(new_index);

    debug!(live_keys, skipped, "compaction cycle complete");
    Ok(())
}
