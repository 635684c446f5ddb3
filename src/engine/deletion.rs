//! Background deletion task (spec §4.7).
//!
//! Two-stage critical section that minimizes lock coupling:
//!
//! - **Stage A** drains pending tombstones, holding only the
//!   tombstone-lock.
//! - **Stage B** rewrites the log to drop the records they name, holding
//!   only the log-lock.
//!
//! Runs every [`EngineConfig::deletion_interval`](super::EngineConfig)
//! on its own thread until [`Engine::close`](super::Engine::close)
//! signals shutdown.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{EngineError, EngineInner, wait_or_shutdown};

/// Spawns the deletion thread. Returns immediately; the thread runs until
/// the engine's shared shutdown flag is set.
pub(crate) fn spawn(inner: Arc<EngineInner>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        loop {
            let interval = inner.config.deletion_interval;
            if wait_or_shutdown(&inner.shutdown, interval) {
                break;
            }
            if let Err(e) = run_cycle(&inner) {
                warn!(error = %e, "deletion cycle failed");
            }
        }
    })
}

/// Runs one round of the deletion task.
pub(crate) fn run_cycle(inner: &EngineInner) -> Result<(), EngineError> {
    let drained = drain_tombstones(inner)?;
    if drained.is_empty() {
        return Ok(());
    }
    rewrite_without(inner, drained)
}

/// Stage A: drain up to `max_tombstones_per_cycle` tombstones, holding
/// only the tombstone-lock. If more than the batch limit are pending, the
/// remainder stays queued for the next cycle (spec §9 re-architecture
/// guidance: "preserve the bound but loop until empty across cycles").
fn drain_tombstones(inner: &EngineInner) -> Result<Vec<Vec<u8>>, EngineError> {
    let mut tombstones = inner
        .tombstones
        .lock()
        .map_err(|_| EngineError::Internal("tombstone-lock poisoned".into()))?;
    Ok(tombstones.drain(inner.config.max_tombstones_per_cycle)?)
}

/// Stage B: rewrite the log, dropping every occurrence of a tombstoned
/// key — except one subtlety (DESIGN.md, Q2): if a `set(K, _)` raced with
/// `delete(K)` and landed *after* the tombstone was queued but *before*
/// this stage runs, the index now points at a fresh record for `K`. That
/// occurrence is kept rather than erased, so a late `set` is never
/// silently undone by a tombstone drained before it happened.
fn rewrite_without(inner: &EngineInner, drained: Vec<Vec<u8>>) -> Result<(), EngineError> {
    let drained_set: HashSet<Vec<u8>> = drained.into_iter().collect();

    let mut state = inner
        .log_state
        .lock()
        .map_err(|_| EngineError::Internal("log-lock poisoned".into()))?;

    let mut scan_records = Vec::new();
    {
        let scan = state.log.scan()?;
        for entry in scan {
            let (offset, record) = entry?;
            scan_records.push((offset, record));
        }
    }

    let mut kept_keys = Vec::with_capacity(scan_records.len());
    let mut kept_values = Vec::with_capacity(scan_records.len());
    let mut erased = 0usize;

    for (offset, record) in scan_records {
        if drained_set.contains(&record.key) {
            let still_live = state.index.get(&record.key) == Some(offset);
            if !still_live {
                erased += 1;
                continue;
            }
        }
        kept_keys.push(record.key);
        kept_values.push(record.value);
    }

    let pairs: Vec<(&[u8], &[u8])> = kept_keys
        .iter()
        .map(Vec::as_slice)
        .zip(kept_values.iter().map(Vec::as_slice))
        .collect();
    let new_offsets = state.log.rewrite(pairs)?;

    // Update offsets for keys the index already tracks as live — never
    // re-add a key the index doesn't currently hold (spec §4.7 Stage B
    // step 4; a key can appear in `kept_keys` without being live, e.g. a
    // stale duplicate occurrence of an overwritten key that compaction
    // hasn't collapsed yet).
    for (key, offset) in kept_keys.into_iter().zip(new_offsets) {
        if state.index.contains(&key) {
            state.index.insert(key, offset);
        }
    }
    let live_keys = state.index.len();

    debug!(erased, live_keys, "deletion cycle complete");
    Ok(())
}
