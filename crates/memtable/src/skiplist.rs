//! Probabilistic skip list: the ordered core of the memtable.
//!
//! Nodes live in an arena (`Vec<Node>`) and link to each other by index,
//! which keeps the structure free of `unsafe` and keeps level-0 iteration
//! cache-friendly. Index 0 is the head sentinel, present at every level.
//!
//! ```text
//! Level 3:  HEAD ──────────────────────────────► 50 ──────────► NIL
//! Level 2:  HEAD ──────────► 20 ────────────────► 50 ──────────► NIL
//! Level 1:  HEAD ──► 10 ──► 20 ────► 35 ────────► 50 ──► 60 ──► NIL
//! Level 0:  HEAD ──► 10 ──► 20 ──► 25 ──► 35 ──► 50 ──► 60 ──► NIL
//! ```
//!
//! Every level-`i` chain is a sorted subsequence of level 0; level 0 holds
//! all entries. Search starts at the top level and drops one level each
//! time the next key would overshoot, giving O(log n) expected work.

/// Maximum number of levels. With p = 1/2 this comfortably covers
/// memtables far past any realistic flush threshold.
pub const MAX_LEVEL: usize = 16;

const HEAD: usize = 0;

struct Node {
    key: Vec<u8>,
    value: Vec<u8>,
    /// Monotonic insertion stamp, refreshed on overwrite. Never consulted
    /// for ordering between tables; it only records recency within this
    /// list.
    timestamp: u64,
    /// `forward[i]` is the next node on level `i`, or `None` at the end of
    /// that level's chain.
    forward: Vec<Option<usize>>,
}

pub struct SkipList {
    nodes: Vec<Node>,
    /// Number of levels currently in use (at least 1).
    level: usize,
    /// Count of distinct keys.
    len: usize,
    /// Monotonic timestamp source, strictly increasing per list.
    clock: u64,
    rng: fastrand::Rng,
}

impl SkipList {
    pub fn new() -> Self {
        Self::with_rng(fastrand::Rng::new())
    }

    /// Builds a list with a caller-supplied RNG so tests can pin level
    /// assignment.
    pub fn with_rng(rng: fastrand::Rng) -> Self {
        let head = Node {
            key: Vec::new(),
            value: Vec::new(),
            timestamp: 0,
            forward: vec![None; MAX_LEVEL],
        };
        Self {
            nodes: vec![head],
            level: 1,
            len: 0,
            clock: 0,
            rng,
        }
    }

    /// Inserts or overwrites a key.
    ///
    /// An existing key keeps its node: the value is replaced and the
    /// timestamp refreshed. A new key is spliced in at a randomly chosen
    /// height, growing the list's top level when the height exceeds it.
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let mut update = [HEAD; MAX_LEVEL];
        let mut cur = HEAD;

        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].forward[i] {
                if self.nodes[next].key < key {
                    cur = next;
                } else {
                    break;
                }
            }
            update[i] = cur;
        }

        self.clock += 1;
        let stamp = self.clock;

        if let Some(found) = self.nodes[update[0]].forward[0] {
            if self.nodes[found].key == key {
                self.nodes[found].value = value;
                self.nodes[found].timestamp = stamp;
                return;
            }
        }

        let height = self.random_height();
        if height > self.level {
            for slot in update.iter_mut().take(height).skip(self.level) {
                *slot = HEAD;
            }
            self.level = height;
        }

        let idx = self.nodes.len();
        let mut forward = Vec::with_capacity(height);
        for (i, &pred) in update.iter().enumerate().take(height) {
            forward.push(self.nodes[pred].forward[i]);
        }
        self.nodes.push(Node {
            key,
            value,
            timestamp: stamp,
            forward,
        });
        for (i, &pred) in update.iter().enumerate().take(height) {
            self.nodes[pred].forward[i] = Some(idx);
        }
        self.len += 1;
    }

    /// Top-down point lookup.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let mut cur = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].forward[i] {
                if self.nodes[next].key.as_slice() < key {
                    cur = next;
                } else {
                    break;
                }
            }
        }
        let candidate = self.nodes[cur].forward[0]?;
        let node = &self.nodes[candidate];
        (node.key == key).then_some(node.value.as_slice())
    }

    /// Timestamp of the most recent insert of `key`, if present.
    pub fn timestamp(&self, key: &[u8]) -> Option<u64> {
        let mut cur = HEAD;
        for i in (0..self.level).rev() {
            while let Some(next) = self.nodes[cur].forward[i] {
                if self.nodes[next].key.as_slice() < key {
                    cur = next;
                } else {
                    break;
                }
            }
        }
        let candidate = self.nodes[cur].forward[0]?;
        let node = &self.nodes[candidate];
        (node.key == key).then_some(node.timestamp)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current number of levels in use.
    pub fn height(&self) -> usize {
        self.level
    }

    /// Walks level 0 and clones out every `(key, value)` pair, strictly
    /// ascending by key with no duplicates.
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::with_capacity(self.len);
        let mut cur = self.nodes[HEAD].forward[0];
        while let Some(idx) = cur {
            let node = &self.nodes[idx];
            out.push((node.key.clone(), node.value.clone()));
            cur = node.forward[0];
        }
        out
    }

    /// Height for a new node: repeated coin flips at p = 1/2, capped at
    /// [`MAX_LEVEL`].
    fn random_height(&mut self) -> usize {
        let mut h = 1;
        while h < MAX_LEVEL && self.rng.bool() {
            h += 1;
        }
        h
    }
}

impl Default for SkipList {
    fn default() -> Self {
        Self::new()
    }
}
