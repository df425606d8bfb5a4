// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use pagekv::{Config, Value};
use test_log::test;

#[test]
fn filter_everything_visits_keys_in_ascending_order() -> pagekv::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = Config::new(dir.path().join("order.kvs")).create()?;

    let words = ["zebra", "mango", "apple", "newt", "bert", "crab", "donkey"];
    for (i, w) in words.iter().enumerate() {
        store.insert(w, i as i64)?;
    }

    let all = store.filter("%")?;
    let mut sorted = words.to_vec();
    sorted.sort_unstable();
    assert_eq!(all, sorted);
    Ok(())
}

#[test]
fn set_can_change_a_keys_value_type() -> pagekv::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = Config::new(dir.path().join("retype.kvs")).create()?;

    store.insert("k", 7_i64)?;
    assert_eq!(store.get("k")?, Value::Int64(7));

    store.set("k", "now text")?;
    assert_eq!(store.get("k")?, Value::String("now text".into()));

    store.set("k", vec![1u8, 2, 3])?;
    assert_eq!(store.get("k")?, Value::Bytes(vec![1, 2, 3]));
    Ok(())
}

#[test]
fn byte_values_round_trip_at_arbitrary_sizes() -> pagekv::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = Config::new(dir.path().join("bytes.kvs")).create()?;

    for size in [0usize, 1, 17, 4096, 9001] {
        let key = format!("blob_{size}");
        let bytes: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
        store.insert(&key, bytes.clone())?;
        assert_eq!(store.get(&key)?, Value::Bytes(bytes));
    }
    Ok(())
}

#[test]
fn case_variants_collide_on_insert_and_lookup() -> pagekv::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut store = Config::new(dir.path().join("case.kvs")).create()?;

    store.insert("Duck", "quack")?;
    assert_eq!(store.get("DUCK")?, Value::String("quack".into()));
    assert_eq!(store.get("duck")?, Value::String("quack".into()));

    let err = store.insert("dUcK", "honk").unwrap_err();
    assert!(matches!(err, pagekv::Error::AlreadyExists));
    Ok(())
}
