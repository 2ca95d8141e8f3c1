//! Merge of multiple scanned tables into one sorted, deduplicated stream.
//!
//! Sources are given **oldest first**; when the same key appears in more
//! than one source, the entry from the highest source position (the
//! newest table) wins. This is the compaction primitive: scan N tables,
//! merge, write the result as a single new table.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A pending record from one source, ordered for min-heap extraction.
struct HeapEntry {
    key: Vec<u8>,
    value: Vec<u8>,
    /// Position in the source list; higher = newer table.
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse the key comparison so the
        // smallest key surfaces first. Among equal keys the newest source
        // surfaces first, which makes it the kept entry when duplicates
        // are drained.
        other
            .key
            .cmp(&self.key)
            .then_with(|| self.source.cmp(&other.source))
    }
}

/// Streaming merge over the scanned contents of N tables.
///
/// Yields `(key, value)` pairs in strictly ascending key order with
/// duplicates resolved newest-source-wins. Infallible: sources are fully
/// decoded before the merge starts, so iteration itself cannot hit disk.
pub struct MergeIterator {
    sources: Vec<std::vec::IntoIter<(Vec<u8>, Vec<u8>)>>,
    heap: BinaryHeap<HeapEntry>,
}

impl MergeIterator {
    /// Builds a merge over `sources`, ordered oldest table first.
    pub fn new(sources: Vec<Vec<(Vec<u8>, Vec<u8>)>>) -> Self {
        let mut iters = Vec::with_capacity(sources.len());
        let mut heap = BinaryHeap::new();

        for (i, source) in sources.into_iter().enumerate() {
            let mut iter = source.into_iter();
            if let Some((key, value)) = iter.next() {
                heap.push(HeapEntry {
                    key,
                    value,
                    source: i,
                });
            }
            iters.push(iter);
        }

        Self {
            sources: iters,
            heap,
        }
    }

    fn advance(&mut self, source: usize) {
        if let Some((key, value)) = self.sources[source].next() {
            self.heap.push(HeapEntry { key, value, source });
        }
    }
}

impl Iterator for MergeIterator {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        let top = self.heap.pop()?;
        self.advance(top.source);

        // Drain every duplicate of this key. The heap surfaces the newest
        // source first, so `top` is already the winning entry.
        while self.heap.peek().map_or(false, |peek| peek.key == top.key) {
            if let Some(dup) = self.heap.pop() {
                self.advance(dup.source);
            }
        }

        Some((top.key, top.value))
    }
}
