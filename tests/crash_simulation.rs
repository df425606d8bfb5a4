// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Property 10: flipping any single byte outside a block's (id, type, crc32)
//! header fields must cause that block's CRC verification to fail, and
//! `analyze` must surface exactly that block as corrupt without aborting the
//! rest of the report.

use pagekv::{Config, KvStore};
use std::io::{Seek, SeekFrom, Write};
use test_log::test;

#[test]
fn single_byte_flip_is_detected_by_analyze() -> pagekv::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("crash.kvs");

    let mut store = Config::new(&path).create()?;
    store.insert("k", "a value long enough to occupy real payload bytes")?;
    store.close()?;

    let clean_failures = KvStore::open(&path)?.analyze()?.crc_failures;
    assert!(clean_failures.is_empty());

    // Flip a byte well past every block's 16-byte header (id + type + crc32),
    // inside block 2's payload region.
    let block_size = 4096u64;
    let target_block = 2u64;
    let offset = target_block * block_size + 64;
    {
        use std::io::Read;
        let mut file = std::fs::OpenOptions::new().read(true).write(true).open(&path)?;
        let mut byte = [0u8; 1];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut byte)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&[byte[0] ^ 0x01])?;
    }

    let report = KvStore::open(&path)?.analyze()?;
    assert!(report.crc_failures.contains(&target_block));
    Ok(())
}
