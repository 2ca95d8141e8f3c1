//! # Bloom filter
//!
//! Probabilistic set-membership structure used to short-circuit negative
//! point lookups against sorted tables.
//!
//! A filter can say a key is **definitely absent** (no false negatives) or
//! **possibly present** (false positives at a tunable rate). Each sorted
//! table persists one filter in a sidecar file next to the data file; a
//! lookup consults the filter before touching the table's index or the
//! disk at all.
//!
//! ## Sidecar wire format
//!
//! ```text
//! [m: u32 LE][k: u32 LE][bit array, m/8 bytes]
//! ```
//!
//! `m` is the bit capacity and `k` the number of hash functions. `m` is
//! always rounded up to a multiple of 8 at construction, so the bit-array
//! length is exactly `m / 8` and the format needs no separate length field.

use std::io::{self, Read, Write};

/// Bit capacities above this are rejected on read (256 MiB of bits).
const MAX_BITS: u32 = 1 << 31;

/// A bloom filter backed by a byte vector with `k` derived hash functions.
///
/// Uses double hashing, `h(i) = h1 + i * h2`, where `h1` and `h2` come from
/// FNV-1a with two different seeds.
pub struct BloomFilter {
    bits: Vec<u8>,
    /// Bit capacity (`m`). Always a multiple of 8.
    num_bits: u32,
    /// Number of hash functions (`k`).
    num_hashes: u32,
}

impl BloomFilter {
    /// Creates a filter sized for `expected_items` keys at the given target
    /// `false_positive_rate`.
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 or `false_positive_rate` is not in
    /// `(0, 1)`.
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "false_positive_rate must be in (0, 1)"
        );

        // m = -n * ln(p) / ln(2)^2, rounded up to a whole byte of bits.
        let n = expected_items as f64;
        let m = (-n * false_positive_rate.ln() / (std::f64::consts::LN_2.powi(2))).ceil() as u64;
        let m = m.clamp(8, MAX_BITS as u64);
        let m = m.div_ceil(8) * 8;

        // k = (m/n) * ln(2)
        let k = ((m as f64 / n) * std::f64::consts::LN_2).ceil() as u32;
        let k = k.max(1);

        Self {
            bits: vec![0u8; (m / 8) as usize],
            num_bits: m as u32,
            num_hashes: k,
        }
    }

    /// Inserts a key.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let idx = self.bit_index(h1, h2, i);
            self.bits[(idx / 8) as usize] |= 1 << (idx % 8);
        }
    }

    /// Returns `true` if the key **might** have been inserted, `false` if it
    /// **definitely** was not.
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_pair(key);
        for i in 0..self.num_hashes {
            let idx = self.bit_index(h1, h2, i);
            if self.bits[(idx / 8) as usize] >> (idx % 8) & 1 == 0 {
                return false;
            }
        }
        true
    }

    /// Bit capacity (`m`).
    #[must_use]
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Number of hash functions (`k`).
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Size of the serialized filter in bytes: the 8-byte header plus the
    /// bit array.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        4 + 4 + self.bits.len()
    }

    /// Writes the filter in sidecar format: `[m: u32 LE][k: u32 LE][bits]`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.num_bits.to_le_bytes())?;
        w.write_all(&self.num_hashes.to_le_bytes())?;
        w.write_all(&self.bits)?;
        Ok(())
    }

    /// Reads a filter back from sidecar format.
    ///
    /// The bit-array length is derived from `m`; a header describing an
    /// absurd capacity or a short bit array is rejected as
    /// `InvalidData` / `UnexpectedEof`.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 4];

        r.read_exact(&mut buf)?;
        let num_bits = u32::from_le_bytes(buf);

        r.read_exact(&mut buf)?;
        let num_hashes = u32::from_le_bytes(buf);

        if num_bits == 0 || num_bits > MAX_BITS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bloom filter capacity out of range: {} bits", num_bits),
            ));
        }
        if num_hashes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bloom filter has zero hash functions",
            ));
        }

        let mut bits = vec![0u8; num_bits.div_ceil(8) as usize];
        r.read_exact(&mut bits)?;

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
        })
    }

    /// Double hashing: `h(i) = (h1 + i * h2) mod m`.
    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u32 {
        (h1.wrapping_add((i as u64).wrapping_mul(h2)) % self.num_bits as u64) as u32
    }
}

impl std::fmt::Debug for BloomFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("num_bits", &self.num_bits)
            .field("num_hashes", &self.num_hashes)
            .finish()
    }
}

/// Two independent 64-bit hashes via FNV-1a with distinct bases.
fn hash_pair(key: &[u8]) -> (u64, u64) {
    (
        fnv1a_64(key, 0xcbf2_9ce4_8422_2325),
        fnv1a_64(key, 0x517c_c1b7_2722_0a95),
    )
}

fn fnv1a_64(data: &[u8], basis: u64) -> u64 {
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = basis;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
