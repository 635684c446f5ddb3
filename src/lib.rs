//! # tapekv
//!
//! An embeddable, persistent key-value store built around a single
//! **append-only log** with an in-memory index of byte offsets. Unlike an
//! LSM tree, there is no memtable/SSTable hierarchy: the log file *is*
//! the data, start to finish.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                        Engine                          │
//! │                                                        │
//! │   set/get/delete ──► log-lock ──► Log + Index           │
//! │              delete ──► tombstone-lock ──► TombstoneLog │
//! │                                                        │
//! │   ┌──────────────┐        ┌──────────────┐             │
//! │   │  compaction  │        │   deletion   │             │
//! │   │   (timer)    │        │   (timer)    │             │
//! │   └──────┬───────┘        └──────┬───────┘             │
//! │          └── log-lock ───────────┘                     │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | Core storage engine — open, set, get, delete, close, stats |
//! | [`engine::compaction`] | Periodic task that rewrites the log to one record per live key |
//! | [`engine::deletion`] | Periodic task that drains tombstones and erases matching records |
//! | [`log`] | The append-only, line-delimited log file and its record grammar |
//! | [`tombstone`] | The durable tombstone work queue consumed by the deletion task |
//! | [`index`] | The in-memory `key -> offset` map and its recovery-time rebuild |
//!
//! ## Key Features
//!
//! - **Crash recovery** — the index is always reconstructible by scanning
//!   the log from offset 0; [`Engine::open`](engine::Engine::open) does
//!   exactly that on every start.
//! - **Lazy deletes** — `delete` is durable immediately (a tombstone is
//!   flushed before the call returns) but physical removal from the log
//!   is deferred to the next deletion-task cycle.
//! - **Non-nested locking** — a log-lock and a tombstone-lock guard
//!   disjoint state; no operation ever holds both, so deadlock is
//!   impossible by construction.
//! - **Cooperative background tasks** — compaction and deletion run on a
//!   timer and can be woken early and joined deterministically by
//!   [`Engine::close`](engine::Engine::close).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tapekv::engine::{Engine, EngineConfig};
//!
//! let engine = Engine::open("/tmp/my_kv", EngineConfig::default()).unwrap();
//!
//! engine.set(b"hello", b"world").unwrap();
//! assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
//!
//! engine.delete(b"hello").unwrap();
//! assert_eq!(engine.get(b"hello").unwrap(), None);
//!
//! engine.close().unwrap();
//! ```

#![allow(dead_code)]

pub mod engine;
pub mod index;
pub mod log;
pub mod tombstone;
