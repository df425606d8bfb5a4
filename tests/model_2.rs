// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use pagekv::{Config, Value};
use test_log::test;

#[test]
fn delete_then_case_insensitive_exists() -> pagekv::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = Config::new(dir.path().join("t2.kvs"))
        .min_size_bytes(131_072)
        .create()?;

    store.insert("bert", "ernie")?;
    store.insert("Donald", "duck")?;
    store.delete("bert")?;

    assert!(!store.exists("BERT")?);
    assert_eq!(store.get("donald")?, Value::String("duck".into()));
    Ok(())
}
