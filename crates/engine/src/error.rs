use std::io;
use thiserror::Error;

/// Errors surfaced by the engine's public operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The filesystem failed underneath us (open, write, fsync, rename,
    /// remove). Engine state is preserved: a failed WAL append leaves the
    /// memtable untouched.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A stored artefact could not be parsed. Reads degrade around this
    /// where the contract allows (replay truncation, per-table skip);
    /// compaction aborts on it.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    /// The engine has been closed and accepts no further operations.
    #[error("engine is closed")]
    Closed,

    /// The caller handed us something unusable (empty key, oversized
    /// key or value, zero threshold).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<wal::WalError> for EngineError {
    fn from(e: wal::WalError) -> Self {
        match e {
            wal::WalError::Io(io) => EngineError::Io(io),
        }
    }
}

impl From<sstable::SstError> for EngineError {
    fn from(e: sstable::SstError) -> Self {
        match e {
            sstable::SstError::Io(io) => EngineError::Io(io),
            sstable::SstError::Corrupt(msg) => EngineError::Corrupt(msg),
            sstable::SstError::Empty => {
                EngineError::InvalidArgument("refused to write an empty table".into())
            }
        }
    }
}
