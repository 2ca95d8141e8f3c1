use crate::tests::helpers::{get, open_quiet, put, sstable_files, wait_until};
use crate::{Engine, Options, WAL_FILE};
use anyhow::Result;
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

// -------------------- Threshold-driven flush --------------------

#[test]
fn threshold_reached_flushes_in_background() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 3);

    put(&engine, "a", "1");
    put(&engine, "b", "2");
    put(&engine, "c", "3"); // third distinct key reaches the threshold

    wait_until("background flush", || engine.sstable_count() == 1);

    assert_eq!(sstable_files(dir.path()), vec!["sstable-0".to_string()]);
    assert!(dir.path().join("sstable-0.bloom").exists());
    assert_eq!(engine.memtable_len(), 0);
    assert_eq!(fs::metadata(dir.path().join(WAL_FILE))?.len(), 0);

    // Flushed data remains readable.
    assert_eq!(get(&engine, "a"), Some("1".into()));
    assert_eq!(get(&engine, "b"), Some("2".into()));
    assert_eq!(get(&engine, "c"), Some("3".into()));
    Ok(())
}

#[test]
fn below_threshold_does_not_flush() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 3);

    put(&engine, "a", "1");
    put(&engine, "b", "2");

    // Give a wrong flush every chance to happen.
    std::thread::sleep(Duration::from_millis(100));

    assert_eq!(engine.sstable_count(), 0);
    assert_eq!(engine.memtable_len(), 2);
    assert!(sstable_files(dir.path()).is_empty());
    Ok(())
}

#[test]
fn overwrites_do_not_count_toward_the_threshold() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 3);

    // Distinct-key count stays at 1 no matter how many overwrites land.
    for i in 0..10u32 {
        put(&engine, "same", &format!("v{}", i));
    }
    std::thread::sleep(Duration::from_millis(100));

    assert_eq!(engine.sstable_count(), 0);
    assert_eq!(engine.memtable_len(), 1);
    Ok(())
}

#[test]
fn rapid_puts_coalesce_into_flushes() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 10);

    for i in 0..200u32 {
        put(&engine, &format!("key-{:04}", i), "v");
    }

    // However the wake-ups coalesced, pressure must eventually drain and
    // nothing may be lost.
    wait_until("pressure drained", || engine.memtable_len() < 10);
    for i in 0..200u32 {
        assert_eq!(get(&engine, &format!("key-{:04}", i)), Some("v".into()));
    }
    Ok(())
}

// -------------------- Flush-triggered compaction --------------------

#[test]
fn reaching_the_trigger_compacts_in_background() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open_with_options(
        dir.path(),
        Options {
            memtable_threshold: 1,
            compact_trigger: 3,
            tick_interval: Duration::from_secs(3600),
        },
    )?;

    put(&engine, "x", "old");
    wait_until("flush 0", || engine.sstable_count() >= 1);
    put(&engine, "y", "mid");
    wait_until("flush 1", || engine.sstable_count() >= 2);
    put(&engine, "x", "new");

    // The third flush crosses the trigger; the worker merges down to one.
    wait_until("auto compaction", || engine.sstable_count() == 1);

    assert_eq!(get(&engine, "x"), Some("new".into()));
    assert_eq!(get(&engine, "y"), Some("mid".into()));
    Ok(())
}

// -------------------- Tick-driven compaction --------------------

#[test]
fn tick_compacts_accumulated_tables() -> Result<()> {
    let dir = tempdir()?;

    // Stage three tables on disk with no engine running.
    for (i, (k, v)) in [("a", "1"), ("b", "2"), ("c", "3")].iter().enumerate() {
        sstable::SsTable::write(
            dir.path().join(format!("sstable-{}", i)),
            1,
            vec![(k.as_bytes().to_vec(), v.as_bytes().to_vec())],
        )?;
    }

    // No signal ever fires for pre-existing tables; only the tick sees
    // them.
    let engine = Engine::open_with_options(
        dir.path(),
        Options {
            memtable_threshold: 100,
            compact_trigger: 3,
            tick_interval: Duration::from_millis(20),
        },
    )?;
    assert_eq!(engine.sstable_count(), 3);

    wait_until("tick compaction", || engine.sstable_count() == 1);
    assert_eq!(get(&engine, "a"), Some("1".into()));
    assert_eq!(get(&engine, "b"), Some("2".into()));
    assert_eq!(get(&engine, "c"), Some("3".into()));
    Ok(())
}

#[test]
fn tick_leaves_few_tables_alone() -> Result<()> {
    let dir = tempdir()?;
    for (i, k) in ["a", "b"].iter().enumerate() {
        sstable::SsTable::write(
            dir.path().join(format!("sstable-{}", i)),
            1,
            vec![(k.as_bytes().to_vec(), b"v".to_vec())],
        )?;
    }

    let engine = Engine::open_with_options(
        dir.path(),
        Options {
            memtable_threshold: 100,
            compact_trigger: 3,
            tick_interval: Duration::from_millis(20),
        },
    )?;

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(engine.sstable_count(), 2, "below the trigger, ticks do nothing");
    Ok(())
}

// -------------------- Shutdown --------------------

#[test]
fn close_stops_the_worker_and_settles_the_directory() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 100);
    put(&engine, "k", "v");

    engine.close()?;

    let listing = |p: &std::path::Path| -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(p)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    };

    let before = listing(dir.path());
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(listing(dir.path()), before, "no background activity after close");
    Ok(())
}

#[test]
fn drop_behaves_like_close() -> Result<()> {
    let dir = tempdir()?;
    {
        let engine = open_quiet(dir.path(), 100);
        put(&engine, "k", "v");
        // Dropped without an explicit close.
    }

    let engine = open_quiet(dir.path(), 100);
    assert_eq!(get(&engine, "k"), Some("v".into()));
    assert_eq!(engine.sstable_count(), 1, "drop flushed the memtable");
    Ok(())
}
