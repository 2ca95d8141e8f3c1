use crate::{Engine, Options};
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens an engine whose background worker never compacts on its own:
/// the compact trigger is unreachable and the tick is an hour out. Used
/// by tests that want to stage table layouts by hand.
pub fn open_quiet(dir: &Path, threshold: usize) -> Engine {
    Engine::open_with_options(
        dir,
        Options {
            memtable_threshold: threshold,
            compact_trigger: usize::MAX,
            tick_interval: Duration::from_secs(3600),
        },
    )
    .unwrap()
}

/// Polls `pred` until it holds or a 5 second deadline passes. Background
/// flush and compaction are asynchronous; tests observe their effects.
pub fn wait_until(what: &str, mut pred: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if pred() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {}", what);
}

/// Data-file names (`sstable-<n>`, no sidecars, no tmp files) in `dir`,
/// sorted by sequence number.
pub fn sstable_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<(u64, String)> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            let seq: u64 = name.strip_prefix("sstable-")?.parse().ok()?;
            Some((seq, name))
        })
        .collect();
    names.sort();
    names.into_iter().map(|(_, name)| name).collect()
}

pub fn put(engine: &Engine, key: &str, value: &str) {
    engine
        .put(key.as_bytes().to_vec(), value.as_bytes().to_vec())
        .unwrap();
}

pub fn get(engine: &Engine, key: &str) -> Option<String> {
    engine
        .get(key.as_bytes())
        .unwrap()
        .map(|v| String::from_utf8(v).unwrap())
}
