//! # SiltDB: embeddable ordered key-value store
//!
//! A log-structured merge-tree engine: writes land in a durable
//! write-ahead log and an in-memory skip list; full memtables are sealed
//! into immutable sorted tables on disk; accumulated tables are merged in
//! the background.
//!
//! ```text
//! Caller
//!   |
//!   v
//! ┌──────────────────────────────────────────────────────────┐
//! │                        ENGINE                            │
//! │                                                          │
//! │ put()  → WAL append+fsync → memtable insert              │
//! │             |                                            │
//! │             | (threshold reached? signal, capacity 1)    │
//! │             v                                            │
//! │        [worker] flush → sstable-<n> + .bloom sidecar     │
//! │             |           then WAL rotated                 │
//! │             | (≥ 3 tables? signal / 10 s tick)           │
//! │             v                                            │
//! │        [worker] compact → all tables merged into one     │
//! │                                                          │
//! │ get()  → memtable → tables newest→oldest                 │
//! │           (each gated by filter, then index)             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module responsibilities
//!
//! | Module          | Purpose                                            |
//! |-----------------|----------------------------------------------------|
//! | `lib.rs`        | `Engine`, `Options`, shared state, open/close      |
//! | [`recovery`]    | WAL replay, table discovery, tmp-file cleanup      |
//! | `write`         | `put()` and the flush path                         |
//! | `read`          | `get()`                                            |
//! | `compaction`    | full-merge compaction                              |
//! | `worker`        | background task: flush/compact signals + tick      |
//!
//! ## Crash safety
//!
//! Every write is fsynced into the WAL before the memtable sees it, and
//! the WAL is only removed after the table holding its records has been
//! fsynced and renamed into place. At any instant an acknowledged write
//! is recoverable from either the WAL or a table.
//!
//! ## Concurrency
//!
//! `put`/`get`/`compact`/`close` take `&self` and serialise on one
//! internal mutex, so an `Engine` can be shared across threads (alone or
//! in an `Arc`). A single background worker thread performs flushes and
//! compactions under the same mutex and holds only a weak reference to
//! the engine's state.

mod compaction;
mod error;
mod read;
mod recovery;
mod worker;
mod write;

pub use error::{EngineError, Result};

use log::info;
use memtable::Memtable;
use parking_lot::Mutex;
use sstable::SsTable;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;
use wal::WalWriter;

/// File name of the active write-ahead log inside the base directory.
pub(crate) const WAL_FILE: &str = "wal.log";
/// Prefix of sorted-table data files; the suffix is the sequence number.
pub(crate) const SSTABLE_PREFIX: &str = "sstable-";

/// Tuning knobs for an engine instance.
#[derive(Debug, Clone)]
pub struct Options {
    /// Distinct-key count at which the memtable is sealed and flushed.
    pub memtable_threshold: usize,
    /// Table count at which a flush (or the periodic tick) schedules a
    /// compaction.
    pub compact_trigger: usize,
    /// Period of the background tick that opportunistically compacts.
    pub tick_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            memtable_threshold: 1024,
            compact_trigger: 3,
            tick_interval: Duration::from_secs(10),
        }
    }
}

/// Everything the engine mutex protects.
pub(crate) struct State {
    pub(crate) mem: Memtable,
    /// `None` once the engine is closed.
    pub(crate) wal: Option<WalWriter>,
    /// Oldest first. List position is the only newness authority: on key
    /// collisions, later tables win.
    pub(crate) tables: Vec<SsTable>,
    /// Next sorted-table number. Strictly increasing, never reused.
    pub(crate) seq: u64,
    pub(crate) closed: bool,
}

/// State shared between the engine handle and the worker thread.
pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    pub(crate) base_dir: PathBuf,
    pub(crate) opts: Options,
    pub(crate) flush_tx: crossbeam_channel::Sender<()>,
    pub(crate) compact_tx: crossbeam_channel::Sender<()>,
}

impl Shared {
    pub(crate) fn wal_path(&self) -> PathBuf {
        self.base_dir.join(WAL_FILE)
    }

    pub(crate) fn table_path(&self, seq: u64) -> PathBuf {
        self.base_dir.join(format!("{}{}", SSTABLE_PREFIX, seq))
    }
}

/// An open storage engine rooted at one directory.
///
/// Dropping the engine performs a best-effort [`close`](Engine::close):
/// the worker is stopped and any buffered writes are flushed. Errors on
/// that path are ignored; the data is still safe in the WAL and will be
/// recovered on the next open.
pub struct Engine {
    shared: Arc<Shared>,
    stop_tx: crossbeam_channel::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Opens (creating if necessary) the engine at `base_dir` with the
    /// given memtable flush threshold and default tuning otherwise.
    ///
    /// Recovery: the WAL is replayed into a fresh memtable (stopping at
    /// the first malformed record), existing `sstable-<n>` files are
    /// re-opened oldest-first, and the sequence counter resumes above the
    /// highest number seen on disk.
    pub fn open<P: AsRef<Path>>(base_dir: P, memtable_threshold: usize) -> Result<Engine> {
        Self::open_with_options(
            base_dir,
            Options {
                memtable_threshold,
                ..Options::default()
            },
        )
    }

    /// [`open`](Engine::open) with full control over tuning.
    pub fn open_with_options<P: AsRef<Path>>(base_dir: P, opts: Options) -> Result<Engine> {
        if opts.memtable_threshold == 0 {
            return Err(EngineError::InvalidArgument(
                "memtable_threshold must be positive".into(),
            ));
        }

        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        recovery::remove_stale_tmp_files(&base_dir);

        let mem = recovery::replay_wal(&base_dir.join(WAL_FILE))?;
        let wal = WalWriter::create(base_dir.join(WAL_FILE))?;
        let (tables, next_seq) = recovery::load_tables(&base_dir)?;

        info!(
            "opened engine at {}: {} table(s), {} unflushed record(s)",
            base_dir.display(),
            tables.len(),
            mem.len()
        );

        let (flush_tx, flush_rx) = crossbeam_channel::bounded(1);
        let (compact_tx, compact_rx) = crossbeam_channel::bounded(1);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let tick_interval = opts.tick_interval;
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                mem,
                wal: Some(wal),
                tables,
                seq: next_seq,
                closed: false,
            }),
            base_dir,
            opts,
            flush_tx,
            compact_tx,
        });

        let weak: Weak<Shared> = Arc::downgrade(&shared);
        let handle = std::thread::Builder::new()
            .name("siltdb-worker".into())
            .spawn(move || worker::run(weak, flush_rx, compact_rx, stop_rx, tick_interval))?;

        Ok(Engine {
            shared,
            stop_tx,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Stops the worker, flushes any buffered writes, and releases the
    /// WAL. Idempotent; afterwards every other operation fails with
    /// [`EngineError::Closed`].
    ///
    /// Best-effort: the first error encountered is reported, but shutdown
    /// proceeds regardless.
    pub fn close(&self) -> Result<()> {
        {
            let mut st = self.shared.state.lock();
            if st.closed {
                return Ok(());
            }
            st.closed = true;
        }

        let _ = self.stop_tx.try_send(());
        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
        }

        let mut st = self.shared.state.lock();
        let mut first_err = None;
        if !st.mem.is_empty() {
            if let Err(e) = self.shared.flush_locked(&mut st) {
                log::error!("final flush on close failed: {}", e);
                first_err = Some(e);
            }
        }
        st.wal = None;

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of live sorted tables.
    pub fn sstable_count(&self) -> usize {
        self.shared.state.lock().tables.len()
    }

    /// Distinct keys currently buffered in the memtable.
    pub fn memtable_len(&self) -> usize {
        self.shared.state.lock().mem.len()
    }

    /// The sequence number the next sorted table will be named with.
    pub fn next_sstable_seq(&self) -> u64 {
        self.shared.state.lock().seq
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Directory this engine stores its files under.
    pub fn base_dir(&self) -> &Path {
        &self.shared.base_dir
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.shared.state.lock();
        f.debug_struct("Engine")
            .field("base_dir", &self.shared.base_dir)
            .field("memtable_len", &st.mem.len())
            .field("sstable_count", &st.tables.len())
            .field("next_seq", &st.seq)
            .field("closed", &st.closed)
            .finish()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests;
