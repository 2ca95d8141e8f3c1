//! Read path: point lookups.

use log::warn;
use sstable::SstError;

use crate::{Engine, EngineError, Result};

impl Engine {
    /// Looks up the most recent value written for `key`.
    ///
    /// Checks the memtable first (freshest data), then the sorted tables
    /// from newest to oldest; the first hit wins. Each table is gated by
    /// its membership filter and offset index, so a miss usually costs no
    /// I/O at all.
    ///
    /// A record that fails to decode in one table is logged and treated
    /// as absent from that table; the lookup continues into older
    /// tables. Real I/O errors propagate.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let st = self.shared().state.lock();
        if st.closed {
            return Err(EngineError::Closed);
        }

        if let Some(value) = st.mem.get(key) {
            return Ok(Some(value));
        }

        for table in st.tables.iter().rev() {
            match table.get(key) {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => continue,
                Err(SstError::Corrupt(msg)) => {
                    warn!(
                        "{}: unreadable record for lookup, treating as absent: {}",
                        table.path().display(),
                        msg
                    );
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }
}
