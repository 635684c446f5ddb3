//! # Index Module
//!
//! The in-memory mapping from a live key to the byte offset of its most
//! recent record in the current log file (spec §3, invariant I1/I2).
//!
//! Kept as its own small module — rather than inlined as a bare
//! `HashMap` field on the engine — so recovery (`rebuild`) and the two
//! background tasks' "does this occurrence match the live index" checks
//! have one obvious place to live and to test in isolation.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use crate::log::{Log, LogError};

/// Key → offset map. Unique keys; iteration order is irrelevant (spec §3).
#[derive(Debug, Default)]
pub struct Index {
    offsets: HashMap<Vec<u8>, u64>,
}

impl Index {
    pub fn new() -> Self {
        Self {
            offsets: HashMap::new(),
        }
    }

    /// Rebuilds an index by scanning `log` from offset 0.
    ///
    /// Later records overwrite earlier ones for the same key (I2). This is
    /// the sole recovery mechanism — pending tombstones are **not**
    /// replayed here (spec §4.2, DESIGN.md Q1).
    pub fn rebuild(log: &mut Log) -> Result<Self, LogError> {
        let mut index = Self::new();
        for entry in log.scan()? {
            let (offset, record) = entry?;
            index.offsets.insert(record.key, offset);
        }
        Ok(index)
    }

    pub fn get(&self, key: &[u8]) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    pub fn insert(&mut self, key: Vec<u8>, offset: u64) {
        self.offsets.insert(key, offset);
    }

    /// Removes `key`, returning `true` if it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.offsets.remove(key).is_some()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.offsets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Iterates over `(key, offset)` pairs. Order is unspecified (spec §3).
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &u64)> {
        self.offsets.iter()
    }

    /// Replaces the whole map wholesale — used by the compaction and
    /// deletion tasks once they have computed a fresh set of offsets for
    /// the rewritten log (spec I5: offsets are rewritten wholesale).
    pub fn replace_all(&mut self, new_offsets: HashMap<Vec<u8>, u64>) {
        self.offsets = new_offsets;
    }
}
