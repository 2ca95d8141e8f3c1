use bloom::BloomFilter;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::format::{frame_len, read_record, sidecar_path};
use crate::{Result, SstError};

/// A readable sorted table: data file, offset index, membership filter.
///
/// The index maps each key to the byte offset of its record in the data
/// file, so a point lookup is one seek and one record decode. A persistent
/// file handle is kept for the lifetime of the table, behind a `Mutex` so
/// `get` works through `&self`.
///
/// `filter == None` means the sidecar was missing or unreadable when the
/// table was opened; the table then admits every key (no negative
/// short-circuit) but stays fully readable.
pub struct SsTable {
    pub(crate) path: PathBuf,
    pub(crate) index: BTreeMap<Vec<u8>, u64>,
    pub(crate) filter: Option<BloomFilter>,
    pub(crate) filter_degraded: bool,
    pub(crate) truncated: bool,
    pub(crate) file: Mutex<BufReader<File>>,
    /// Count of point lookups that reached the disk (filter and index
    /// gates passed). Negative lookups the filter rejects never move it.
    pub(crate) disk_reads: AtomicU64,
}

impl SsTable {
    /// Opens an existing table, rebuilding the offset index with one
    /// sequential scan of the data file.
    ///
    /// A malformed record ends the scan; everything before it stays
    /// readable and [`truncated`](Self::truncated) reports the cut. The
    /// sidecar filter is loaded if it is present and well-formed;
    /// otherwise the table degrades to admit-all and
    /// [`filter_degraded`](Self::filter_degraded) reports it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut rdr = BufReader::new(file);

        let mut index = BTreeMap::new();
        let mut offset = 0u64;
        let mut truncated = false;
        loop {
            match read_record(&mut rdr) {
                Ok(Some((key, value))) => {
                    let len = frame_len(&key, &value);
                    index.insert(key, offset);
                    offset += len;
                }
                Ok(None) => break,
                Err(SstError::Corrupt(_)) => {
                    truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let (filter, filter_degraded) = match File::open(sidecar_path(&path)) {
            Ok(mut f) => match BloomFilter::read_from(&mut f) {
                Ok(filter) => (Some(filter), false),
                Err(_) => (None, true),
            },
            Err(_) => (None, true),
        };

        rdr.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path,
            index,
            filter,
            filter_degraded,
            truncated,
            file: Mutex::new(rdr),
            disk_reads: AtomicU64::new(0),
        })
    }

    /// Point lookup: filter gate, index gate, then a single bounded read.
    ///
    /// A filter false positive that misses the index returns `Ok(None)`
    /// without touching the disk. Decode failure at the indexed offset is
    /// [`SstError::Corrupt`].
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if !self.may_contain(key) {
            return Ok(None);
        }

        let offset = match self.index.get(key) {
            Some(&o) => o,
            None => return Ok(None),
        };

        self.disk_reads.fetch_add(1, Ordering::Relaxed);
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        match read_record(&mut *file)? {
            Some((stored_key, value)) => {
                if stored_key != key {
                    return Err(SstError::Corrupt(
                        "index offset points at a different key".into(),
                    ));
                }
                Ok(Some(value))
            }
            None => Err(SstError::Corrupt("index offset beyond end of file".into())),
        }
    }

    /// Reads every indexed record in ascending key order.
    ///
    /// This is the one place the on-disk encoding is walked in bulk;
    /// compaction merges tables through it. A record that fails to decode
    /// inside the indexed region is an error (the caller must not merge a
    /// table it cannot fully read).
    pub fn scan(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;

        let mut out = Vec::with_capacity(self.index.len());
        while out.len() < self.index.len() {
            match read_record(&mut *file)? {
                Some(pair) => out.push(pair),
                None => {
                    return Err(SstError::Corrupt(
                        "data file ends before the indexed records do".into(),
                    ))
                }
            }
        }
        Ok(out)
    }

    /// `true` if the filter admits `key` (or no filter is loaded).
    #[must_use]
    pub fn may_contain(&self, key: &[u8]) -> bool {
        self.filter.as_ref().map_or(true, |f| f.may_contain(key))
    }

    /// Path of the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Smallest key in the table.
    #[must_use]
    pub fn first_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(Vec::as_slice)
    }

    /// Largest key in the table.
    #[must_use]
    pub fn last_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(Vec::as_slice)
    }

    /// `true` if the sidecar filter was missing or unreadable at open.
    #[must_use]
    pub fn filter_degraded(&self) -> bool {
        self.filter_degraded
    }

    /// `true` if the open-time scan stopped at a malformed record.
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// Number of point lookups that reached the disk. Lookups rejected by
    /// the filter or the index never count.
    #[must_use]
    pub fn disk_reads(&self) -> u64 {
        self.disk_reads.load(Ordering::Relaxed)
    }

    /// Removes the data file and its sidecar. The two live and die
    /// together; a missing sidecar is not an error.
    pub fn delete(self) -> Result<()> {
        let SsTable { path, file, .. } = self;
        drop(file);

        fs::remove_file(&path)?;
        match fs::remove_file(sidecar_path(&path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for SsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsTable")
            .field("path", &self.path)
            .field("records", &self.index.len())
            .field("has_filter", &self.filter.is_some())
            .field("truncated", &self.truncated)
            .finish()
    }
}
