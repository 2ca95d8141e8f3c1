use crate::tests::helpers::{get, open_quiet, put};
use crate::EngineError;
use anyhow::Result;
use tempfile::tempdir;

// -------------------- Basic put/get --------------------

#[test]
fn put_then_get() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 100);

    put(&engine, "a", "1");
    put(&engine, "b", "2");

    assert_eq!(get(&engine, "a"), Some("1".into()));
    assert_eq!(get(&engine, "b"), Some("2".into()));
    assert_eq!(get(&engine, "c"), None);
    Ok(())
}

#[test]
fn overwrite_returns_latest_and_keeps_size() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 100);

    put(&engine, "k", "v1");
    put(&engine, "k", "v2");

    assert_eq!(get(&engine, "k"), Some("v2".into()));
    assert_eq!(engine.memtable_len(), 1, "overwrite must not grow the memtable");
    Ok(())
}

#[test]
fn double_put_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 100);

    put(&engine, "k", "v");
    put(&engine, "k", "v");

    assert_eq!(get(&engine, "k"), Some("v".into()));
    assert_eq!(engine.memtable_len(), 1);
    Ok(())
}

#[test]
fn read_your_writes_interleaved() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 1_000);

    for round in 0..10u32 {
        for key in ["x", "y", "z"] {
            put(&engine, key, &format!("{}-{}", key, round));
            assert_eq!(get(&engine, key), Some(format!("{}-{}", key, round)));
        }
    }
    Ok(())
}

// -------------------- Argument validation --------------------

#[test]
fn empty_key_is_rejected() {
    let dir = tempdir().unwrap();
    let engine = open_quiet(dir.path(), 100);

    let result = engine.put(Vec::new(), b"v".to_vec());
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

#[test]
fn oversized_key_is_rejected() {
    let dir = tempdir().unwrap();
    let engine = open_quiet(dir.path(), 100);

    let result = engine.put(vec![b'k'; 64 * 1024 + 1], b"v".to_vec());
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

#[test]
fn empty_value_is_fine() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 100);

    engine.put(b"k".to_vec(), Vec::new())?;
    assert_eq!(engine.get(b"k")?, Some(Vec::new()));
    Ok(())
}

#[test]
fn zero_threshold_is_rejected_at_open() {
    let dir = tempdir().unwrap();
    let result = crate::Engine::open(dir.path(), 0);
    assert!(matches!(result, Err(EngineError::InvalidArgument(_))));
}

// -------------------- Closed engine --------------------

#[test]
fn operations_fail_after_close() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 100);
    put(&engine, "k", "v");

    engine.close()?;

    assert!(matches!(
        engine.put(b"k2".to_vec(), b"v".to_vec()),
        Err(EngineError::Closed)
    ));
    assert!(matches!(engine.get(b"k"), Err(EngineError::Closed)));
    assert!(matches!(engine.compact(), Err(EngineError::Closed)));
    assert!(engine.is_closed());
    Ok(())
}

#[test]
fn close_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 100);
    put(&engine, "k", "v");

    engine.close()?;
    engine.close()?;
    Ok(())
}

// -------------------- Binary payloads --------------------

#[test]
fn binary_keys_and_values() -> Result<()> {
    let dir = tempdir()?;
    let engine = open_quiet(dir.path(), 100);

    let key = vec![0x00u8, 0xFF, 0x7F];
    let value = vec![0xDEu8, 0xAD, 0x00, 0xEF];
    engine.put(key.clone(), value.clone())?;

    assert_eq!(engine.get(&key)?, Some(value));
    Ok(())
}
