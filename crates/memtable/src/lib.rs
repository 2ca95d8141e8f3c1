//! # Memtable
//!
//! The in-memory ordered write buffer of the storage engine: a skip list
//! keyed by bytes, holding the writes that have landed in the WAL but not
//! yet been flushed to a sorted table.
//!
//! The engine serialises writers, but flushes snapshot the table while
//! other threads may still be reading, so the list sits behind a
//! reader/writer lock: lookups and snapshots take the shared side,
//! inserts the exclusive side.

mod skiplist;

pub use skiplist::MAX_LEVEL;

use parking_lot::RwLock;
use skiplist::SkipList;

/// Ordered map from key to the latest value written for it.
///
/// `len()` counts distinct keys (overwrites do not grow the table), which
/// is also the measure the engine compares against its flush threshold.
pub struct Memtable {
    list: RwLock<SkipList>,
}

impl Memtable {
    pub fn new() -> Self {
        Self {
            list: RwLock::new(SkipList::new()),
        }
    }

    /// Builds a memtable whose skip list uses a caller-seeded RNG.
    pub fn with_rng(rng: fastrand::Rng) -> Self {
        Self {
            list: RwLock::new(SkipList::with_rng(rng)),
        }
    }

    /// Inserts or overwrites a key.
    pub fn insert(&self, key: Vec<u8>, value: Vec<u8>) {
        self.list.write().insert(key, value);
    }

    /// Returns the latest value for `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.list.read().get(key).map(<[u8]>::to_vec)
    }

    /// Insertion stamp of `key` within this memtable. Strictly increasing
    /// across inserts; refreshed on overwrite.
    pub fn timestamp(&self, key: &[u8]) -> Option<u64> {
        self.list.read().timestamp(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.list.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.read().is_empty()
    }

    /// Materialises the contents as `(key, value)` pairs in strictly
    /// ascending key order, the shape a sorted-table writer expects.
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.list.read().snapshot()
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memtable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let list = self.list.read();
        f.debug_struct("Memtable")
            .field("len", &list.len())
            .field("height", &list.height())
            .finish()
    }
}
