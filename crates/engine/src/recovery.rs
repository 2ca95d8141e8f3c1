//! Cold-start path: WAL replay, sorted-table discovery, tmp cleanup.

use log::{info, warn};
use memtable::Memtable;
use sstable::SsTable;
use std::path::Path;
use wal::WalReader;

use crate::{Result, SSTABLE_PREFIX};

/// Replays the WAL at `path` into a fresh memtable.
///
/// A missing file is a fresh start. Records are applied in append order,
/// so duplicated keys resolve to their latest write. Replay stops at the
/// first malformed record; everything before it is recovered, and the
/// cut is logged.
pub(crate) fn replay_wal(path: &Path) -> Result<Memtable> {
    let mem = Memtable::new();

    let mut reader = match WalReader::open(path) {
        Ok(r) => r,
        Err(wal::WalError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(mem);
        }
        Err(e) => return Err(e.into()),
    };

    let replay = reader.replay(|key, value| mem.insert(key, value))?;
    if replay.truncated {
        warn!(
            "write-ahead log ended in a malformed record; recovered {} record(s) before it",
            replay.records
        );
    } else if replay.records > 0 {
        info!("replayed {} record(s) from the write-ahead log", replay.records);
    }

    Ok(mem)
}

/// Re-opens every `sstable-<n>` under `base_dir`, oldest (lowest `n`)
/// first, and returns the list plus the next free sequence number.
///
/// Sidecar-less tables open in degraded admit-all mode; tables with a
/// torn tail serve their readable prefix. Both conditions are logged.
pub(crate) fn load_tables(base_dir: &Path) -> Result<(Vec<SsTable>, u64)> {
    let mut numbered: Vec<(u64, std::path::PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(base_dir)? {
        let entry = entry?;
        let path = entry.path();
        if let Some(seq) = table_seq(&path) {
            numbered.push((seq, path));
        }
    }
    numbered.sort_by_key(|(seq, _)| *seq);

    let next_seq = numbered.last().map_or(0, |(seq, _)| seq + 1);

    let mut tables = Vec::with_capacity(numbered.len());
    for (_, path) in numbered {
        let table = SsTable::open(&path)?;
        if table.filter_degraded() {
            warn!(
                "{}: filter sidecar missing or unreadable; admitting all keys",
                path.display()
            );
        }
        if table.truncated() {
            warn!(
                "{}: data file ends in a malformed record; serving {} record(s)",
                path.display(),
                table.len()
            );
        }
        tables.push(table);
    }

    Ok((tables, next_seq))
}

/// Parses `sstable-<n>` file names; sidecars and tmp files do not match.
fn table_seq(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix(SSTABLE_PREFIX)?.parse().ok()
}

/// Removes leftover `.tmp` files from writes interrupted mid-flight.
/// Best-effort; a tmp file that will not go away only wastes space.
pub(crate) fn remove_stale_tmp_files(base_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(base_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_tmp = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(SSTABLE_PREFIX) && n.ends_with(".tmp"));
        if is_tmp {
            let _ = std::fs::remove_file(&path);
        }
    }
}
