//! # Sorted tables
//!
//! Immutable on-disk key/value files for the storage engine. A table is
//! written once, at memtable flush or as compaction output, and then
//! only ever read or deleted.
//!
//! One logical table is three artefacts:
//!
//! ```text
//! sstable-<n>         data file: CRC-framed records, ascending key order
//! sstable-<n>.bloom   sidecar: serialized membership filter
//! (in memory)         offset index, key -> first byte of its record,
//!                     rebuilt by a sequential scan on open
//! ```
//!
//! ## Data record layout
//!
//! ```text
//! [crc32: u32 LE][key_len: u32 LE][key][val_len: u32 LE][value]
//! ```
//!
//! The CRC covers `key_len` through the end of the value. Records are
//! self-delimited, so a single record can be decoded from any offset the
//! index hands out, and a torn tail never damages the records before it.
//!
//! ## Lookup path
//!
//! `get` consults the sidecar filter first (a definite "absent" costs no
//! I/O), then the offset index, then performs one seek + one record
//! decode. A missing or unreadable sidecar degrades the table to
//! admit-all: correct, just slower on negative lookups.

mod format;
mod merge;
mod reader;
mod writer;

pub use format::{MAX_KEY_BYTES, MAX_VALUE_BYTES};
pub use merge::MergeIterator;
pub use reader::SsTable;

use thiserror::Error;

/// Errors from sorted-table operations.
#[derive(Debug, Error)]
pub enum SstError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be decoded (bad CRC, impossible field
    /// lengths, or an offset pointing at garbage).
    #[error("corrupt table record: {0}")]
    Corrupt(String),

    /// Refused to write a table with no records.
    #[error("refusing to write an empty table")]
    Empty,
}

pub type Result<T> = std::result::Result<T, SstError>;

#[cfg(test)]
mod tests;
