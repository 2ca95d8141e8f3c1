//! # WAL (write-ahead log)
//!
//! The durability journal of the storage engine. Every accepted write is
//! serialized into a self-contained binary record and appended (with an
//! fsync) **before** the in-memory update; on restart the log is replayed
//! to reconstruct the unflushed memtable, so no acknowledged write is lost.
//!
//! ## Binary record format
//!
//! ```text
//! [record_len: u32 LE][crc32: u32 LE][key_len: u32 LE][key][val_len: u32 LE][value]
//! ```
//!
//! `record_len` counts the 4-byte CRC plus the body but **not** itself.
//! The CRC covers the body (`key_len` through the end of the value).
//! Records are self-contained: a torn write at the tail never damages the
//! records before it.
//!
//! ## Replay semantics
//!
//! [`replay`] yields records in exact append order. Duplicate keys are
//! expected: the caller applies them in order so later writes overwrite
//! earlier ones. The first malformed record ends the replay: a torn or
//! corrupt tail is reported through [`Replay::truncated`], never as a hard
//! failure. Only real I/O errors propagate.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use thiserror::Error;

/// Upper bound on a single record frame; anything larger is treated as
/// corruption rather than an allocation request.
const MAX_RECORD_LEN: u32 = 64 * 1024 * 1024;

/// Errors from WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a [`replay`]: how many records were applied and whether the
/// log ended in a malformed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replay {
    /// Number of records handed to the callback.
    pub records: usize,
    /// `true` if replay stopped at a torn or corrupt record instead of a
    /// clean end of file.
    pub truncated: bool,
}

/// Append-only WAL writer.
///
/// Records are serialized into a reusable scratch buffer, CRC-checksummed,
/// written with a single `write_all`, and fsynced before `append` returns.
pub struct WalWriter {
    file: File,
    buf: Vec<u8>,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, WalError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file,
            buf: Vec::with_capacity(256),
        })
    }

    /// Serializes one `(key, value)` record, appends it, and fsyncs.
    ///
    /// The record is durable on disk when this returns `Ok`.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<(), WalError> {
        self.buf.clear();

        // Reserve the 8-byte frame header (record_len + crc), filled below.
        self.buf.extend_from_slice(&[0u8; 8]);

        self.buf.write_u32::<LittleEndian>(key.len() as u32)?;
        self.buf.extend_from_slice(key);
        self.buf.write_u32::<LittleEndian>(value.len() as u32)?;
        self.buf.extend_from_slice(value);

        let body = &self.buf[8..];

        let mut hasher = Crc32::new();
        hasher.update(body);
        let crc = hasher.finalize();

        let record_len = (body.len() as u64) + 4;
        if record_len > MAX_RECORD_LEN as u64 {
            return Err(WalError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WAL record too large",
            )));
        }

        self.buf[0..4].copy_from_slice(&(record_len as u32).to_le_bytes());
        self.buf[4..8].copy_from_slice(&crc.to_le_bytes());

        // One write call for the whole frame, then make it durable.
        self.file.write_all(&self.buf)?;
        self.file.sync_all()?;

        Ok(())
    }
}

/// Sequential WAL reader.
///
/// Generic over any `Read` implementor so tests can replay from in-memory
/// buffers.
pub struct WalReader<R: Read> {
    rdr: BufReader<R>,
}

impl WalReader<File> {
    /// Opens an existing WAL file for sequential replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<WalReader<File>, WalError> {
        let f = File::open(path)?;
        Ok(WalReader {
            rdr: BufReader::new(f),
        })
    }
}

impl<R: Read> WalReader<R> {
    /// Constructs a reader from any `Read` implementor.
    pub fn from_reader(reader: R) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Replays every well-formed record, calling `apply` for each one in
    /// append order.
    ///
    /// Stops at the first record that is torn (unexpected EOF mid-frame),
    /// fails its CRC, or declares an impossible length; such a tail marks
    /// the result [`Replay::truncated`] but is not an error. Records read
    /// before the bad one have already been applied.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<Replay, WalError>
    where
        F: FnMut(Vec<u8>, Vec<u8>),
    {
        let mut body = Vec::with_capacity(256);
        let mut records = 0usize;

        loop {
            let record_len = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(Replay { records, truncated: false });
                }
                Err(e) => return Err(WalError::Io(e)),
            };

            // record_len counts the CRC (4 bytes) plus a body that holds at
            // least two length fields.
            if record_len < 4 + 8 || record_len > MAX_RECORD_LEN {
                return Ok(Replay { records, truncated: true });
            }

            let crc = match self.rdr.read_u32::<LittleEndian>() {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(Replay { records, truncated: true });
                }
                Err(e) => return Err(WalError::Io(e)),
            };

            let body_len = (record_len - 4) as usize;
            body.clear();
            body.resize(body_len, 0);
            match self.rdr.read_exact(&mut body) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(Replay { records, truncated: true });
                }
                Err(e) => return Err(WalError::Io(e)),
            }

            let mut hasher = Crc32::new();
            hasher.update(&body);
            if hasher.finalize() != crc {
                return Ok(Replay { records, truncated: true });
            }

            match decode_body(&body) {
                Some((key, value)) => {
                    apply(key, value);
                    records += 1;
                }
                None => return Ok(Replay { records, truncated: true }),
            }
        }
    }
}

/// Decodes `[key_len][key][val_len][value]`; `None` if the lengths do not
/// add up to the body.
fn decode_body(body: &[u8]) -> Option<(Vec<u8>, Vec<u8>)> {
    let mut br = body;

    let key_len = br.read_u32::<LittleEndian>().ok()? as usize;
    if key_len > br.len() {
        return None;
    }
    let key = br[..key_len].to_vec();
    br = &br[key_len..];

    let val_len = br.read_u32::<LittleEndian>().ok()? as usize;
    if val_len != br.len() {
        return None;
    }
    let value = br[..val_len].to_vec();

    Some((key, value))
}
