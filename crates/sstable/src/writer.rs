use bloom::BloomFilter;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::format::{encode_record, sidecar_path, tmp_path};
use crate::reader::SsTable;
use crate::{Result, SstError};

/// Target false-positive rate for per-table membership filters.
const FILTER_FPR: f64 = 0.01;

impl SsTable {
    /// Writes a new table at `path` from records in strictly ascending key
    /// order, and returns the live handle (index and filter already
    /// populated; no re-open, no re-scan).
    ///
    /// `expected_count` sizes the membership filter; both flush and
    /// compaction know their record counts, so the estimate is normally
    /// exact (an overestimate only makes the filter more selective).
    ///
    /// # Atomicity
    ///
    /// The data file is written to a `.tmp` sibling, fsynced, and renamed
    /// into place, so a partially written table is never visible under the
    /// final name. The sidecar is written and fsynced after the rename; a
    /// crash between the two leaves a table that opens in degraded
    /// (admit-all) filter mode.
    ///
    /// # Errors
    ///
    /// [`SstError::Empty`] if `records` yields nothing; the engine never
    /// flushes an empty memtable, so an empty table is a caller bug.
    pub fn write<P, I>(path: P, expected_count: usize, records: I) -> Result<SsTable>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        let path = path.as_ref();
        let tmp = tmp_path(path);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        let mut out = BufWriter::new(file);

        let mut index = BTreeMap::new();
        let mut filter = BloomFilter::new(expected_count.max(1), FILTER_FPR);
        let mut offset = 0u64;
        let mut buf = Vec::with_capacity(256);
        let mut last_key: Option<Vec<u8>> = None;

        for (key, value) in records {
            debug_assert!(
                last_key.as_deref().map_or(true, |prev| prev < key.as_slice()),
                "records must arrive in strictly ascending key order"
            );
            encode_record(&mut buf, &key, &value);
            out.write_all(&buf)?;

            filter.insert(&key);
            last_key = Some(key.clone());
            index.insert(key, offset);
            offset += buf.len() as u64;
        }

        if index.is_empty() {
            drop(out);
            let _ = fs::remove_file(&tmp);
            return Err(SstError::Empty);
        }

        // Data must be durable before the rename makes it visible.
        let file = out.into_inner().map_err(|e| SstError::Io(e.into_error()))?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)?;

        let mut sidecar = File::create(sidecar_path(path))?;
        filter.write_to(&mut sidecar)?;
        sidecar.sync_all()?;

        let reader = File::open(path)?;
        Ok(SsTable {
            path: path.to_path_buf(),
            index,
            filter: Some(filter),
            filter_degraded: false,
            truncated: false,
            file: Mutex::new(BufReader::new(reader)),
            disk_reads: std::sync::atomic::AtomicU64::new(0),
        })
    }
}
