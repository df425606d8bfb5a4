// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use pagekv::{Config, KvStore, Value};
use test_log::test;

#[test]
fn thousand_keys_survive_reopen_and_filter_by_prefix() -> pagekv::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("t3.kvs");

    let mut store = Config::new(&path).min_size_bytes(131_072).create()?;
    for i in 0..1000 {
        store.insert(&format!("k_{i}"), i as i64)?;
    }
    store.close()?;

    let store = KvStore::open(&path)?;
    for i in 0..1000 {
        assert_eq!(store.get(&format!("k_{i}"))?, Value::Int64(i as i64));
    }

    let mut matches = store.filter("k_1%")?;
    matches.sort();

    let mut expected: Vec<String> = vec!["k_1".to_owned()];
    expected.extend((10..20).map(|i| format!("k_{i}")));
    expected.extend((100..200).map(|i| format!("k_{i}")));
    expected.sort();

    assert_eq!(matches, expected);
    Ok(())
}
