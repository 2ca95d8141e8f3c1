//! Compaction: merge every live table into a single new one.

use log::{info, warn};
use sstable::{MergeIterator, SsTable};

use crate::{Engine, EngineError, Result, Shared, State};

impl Engine {
    /// Merges all sorted tables into one.
    ///
    /// On key collisions the value from the newest table (latest list
    /// position) wins. A no-op with fewer than two tables. The worker
    /// invokes this on signal and on its periodic tick; callers may also
    /// invoke it directly.
    pub fn compact(&self) -> Result<()> {
        let shared = self.shared();
        let mut st = shared.state.lock();
        if st.closed {
            return Err(EngineError::Closed);
        }
        shared.compact_locked(&mut st)
    }
}

impl Shared {
    /// Runs only under the engine mutex.
    ///
    /// Every source table is fully scanned up front; a table that cannot
    /// be read aborts the compaction with the current list intact. Only
    /// after the merged table is durable is the list swapped, the counter
    /// advanced, and the superseded files removed.
    pub(crate) fn compact_locked(&self, st: &mut State) -> Result<()> {
        if st.tables.len() < 2 {
            return Ok(());
        }

        let mut sources = Vec::with_capacity(st.tables.len());
        for table in &st.tables {
            sources.push(table.scan()?);
        }
        let expected: usize = sources.iter().map(Vec::len).sum();

        let merged = SsTable::write(
            self.table_path(st.seq),
            expected,
            MergeIterator::new(sources),
        )?;

        info!(
            "compacted {} table(s) into {} ({} record(s))",
            st.tables.len(),
            merged.path().display(),
            merged.len()
        );

        let old = std::mem::replace(&mut st.tables, vec![merged]);
        st.seq += 1;

        // The new list is installed; removing the superseded files cannot
        // un-install it. Leftovers from a failed removal carry lower
        // sequence numbers and stay shadowed on any future open.
        let mut first_err: Option<EngineError> = None;
        for table in old {
            let path = table.path().to_path_buf();
            if let Err(e) = table.delete() {
                warn!("failed to remove superseded {}: {}", path.display(), e);
                first_err.get_or_insert(e.into());
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
