// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The table of contents: a chain of blocks that map every block id in the
//! store to its [`BlockType`], so a reader can tell what a block is without
//! trusting (or before trusting) its own header.
//!
//! Each TOC block covers a contiguous range `[lowest, highest]` of block ids
//! and stores one packed `u32` type tag per id in that range, in order. When
//! a range fills up, a new TOC block is appended and linked via `next_toc`.

use byteorder::{ByteOrder, LittleEndian};

use crate::block::{self, BlockType};
use crate::store_file::StoreFile;

const OFF_LOWEST: usize = block::HEADER_SIZE; // 16
const OFF_HIGHEST: usize = OFF_LOWEST + 8; // 24
const OFF_NEXT_TOC: usize = OFF_HIGHEST + 8; // 32
const OFF_ENTRIES: usize = OFF_NEXT_TOC + 8; // 40

/// Number of block-id entries a single TOC block of `block_size` bytes can
/// hold.
#[must_use]
pub fn max_entries(block_size: u32) -> u64 {
    ((block_size as usize - OFF_ENTRIES) / 4) as u64
}

fn lowest(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_LOWEST..])
}

fn highest(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_HIGHEST..])
}

fn next_toc(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_NEXT_TOC..])
}

fn set_next_toc(buf: &mut [u8], v: u64) {
    LittleEndian::write_u64(&mut buf[OFF_NEXT_TOC..], v);
}

fn entry(buf: &[u8], slot: u64) -> crate::Result<BlockType> {
    let off = OFF_ENTRIES + (slot as usize) * 4;
    BlockType::from_u32(LittleEndian::read_u32(&buf[off..]))
}

fn set_entry_raw(buf: &mut [u8], slot: u64, block_type: BlockType) {
    let off = OFF_ENTRIES + (slot as usize) * 4;
    LittleEndian::write_u32(&mut buf[off..], block_type as u32);
}

/// Formats `buf` as a fresh TOC block covering `[lo, hi]`, with every entry
/// initialized to `fill`.
pub fn init_range(buf: &mut [u8], block_id: u64, lo: u64, hi: u64, fill: BlockType) {
    block::init(buf, block_id, BlockType::Toc);
    LittleEndian::write_u64(&mut buf[OFF_LOWEST..], lo);
    LittleEndian::write_u64(&mut buf[OFF_HIGHEST..], hi);
    set_next_toc(buf, 0);
    for slot in 0..=(hi - lo) {
        set_entry_raw(buf, slot, fill);
    }
    block::sync_crc(buf);
}

fn find_owning_toc(store: &StoreFile, first_toc_id: u64, id: u64) -> crate::Result<u64> {
    let mut toc_id = first_toc_id;
    loop {
        let buf = store.block(toc_id);
        let (lo, hi) = (lowest(buf), highest(buf));
        if id >= lo && id <= hi {
            return Ok(toc_id);
        }
        let next = next_toc(buf);
        if next == 0 {
            return Err(crate::Error::Corrupt(format!(
                "block id {id} is not covered by any toc range"
            )));
        }
        toc_id = next;
    }
}

/// Looks up the type of `id` by walking the TOC chain starting at
/// `first_toc_id`.
pub fn lookup_type(store: &StoreFile, first_toc_id: u64, id: u64) -> crate::Result<BlockType> {
    let toc_id = find_owning_toc(store, first_toc_id, id)?;
    let buf = store.block(toc_id);
    entry(buf, id - lowest(buf))
}

/// Records `id`'s type in the TOC chain.
pub fn set_entry(
    store: &mut StoreFile,
    first_toc_id: u64,
    id: u64,
    block_type: BlockType,
) -> crate::Result<()> {
    let toc_id = find_owning_toc(store, first_toc_id, id)?;
    let buf = store.block_mut(toc_id);
    let slot = id - lowest(buf);
    set_entry_raw(buf, slot, block_type);
    block::sync_crc(buf);
    Ok(())
}

/// Appends a new TOC block (already formatted by the caller at `new_toc_id`
/// covering `[lo, hi]`) to the end of the chain starting at `first_toc_id`.
pub fn append(store: &mut StoreFile, first_toc_id: u64, new_toc_id: u64) -> crate::Result<()> {
    let mut toc_id = first_toc_id;
    loop {
        let next = next_toc(store.block(toc_id));
        if next == 0 {
            break;
        }
        toc_id = next;
    }
    let buf = store.block_mut(toc_id);
    set_next_toc(buf, new_toc_id);
    block::sync_crc(buf);
    Ok(())
}

/// Collects every block id whose recorded type equals `want`, in ascending
/// order. Used by `analyze` and by the allocator's sanity checks.
pub fn collect(store: &StoreFile, first_toc_id: u64, want: BlockType) -> crate::Result<Vec<u64>> {
    let mut out = Vec::new();
    let mut toc_id = first_toc_id;
    loop {
        let buf = store.block(toc_id);
        let (lo, hi) = (lowest(buf), highest(buf));
        for id in lo..=hi {
            if entry(buf, id - lo)? == want {
                out.push(id);
            }
        }
        let next = next_toc(buf);
        if next == 0 {
            break;
        }
        toc_id = next;
    }
    Ok(out)
}

/// Number of TOC blocks in the chain starting at `first_toc_id`.
pub fn chain_length(store: &StoreFile, first_toc_id: u64) -> crate::Result<u64> {
    let mut len = 0;
    let mut toc_id = first_toc_id;
    loop {
        len += 1;
        let next = next_toc(store.block(toc_id));
        if next == 0 {
            return Ok(len);
        }
        toc_id = next;
    }
}

/// Counts blocks of every type across the whole chain, for `analyze`.
pub fn histogram(
    store: &StoreFile,
    first_toc_id: u64,
) -> crate::Result<std::collections::BTreeMap<BlockType, u64>> {
    let mut counts = std::collections::BTreeMap::new();
    let mut toc_id = first_toc_id;
    loop {
        let buf = store.block(toc_id);
        let (lo, hi) = (lowest(buf), highest(buf));
        for id in lo..=hi {
            *counts.entry(entry(buf, id - lo)?).or_insert(0) += 1;
        }
        let next = next_toc(buf);
        if next == 0 {
            break;
        }
        toc_id = next;
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn new_store() -> crate::Result<(tempfile::TempDir, StoreFile)> {
        let dir = tempfile::tempdir()?;
        let config = crate::Config::new(dir.path().join("t.pkv"));
        let store = StoreFile::create(&config)?;
        Ok((dir, store))
    }

    #[test]
    fn lookup_and_set_round_trip() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        let buf = store.block_mut(1);
        init_range(buf, 1, 2, 7, BlockType::Free);
        assert_eq!(lookup_type(&store, 1, 5)?, BlockType::Free);
        set_entry(&mut store, 1, 5, BlockType::Data)?;
        assert_eq!(lookup_type(&store, 1, 5)?, BlockType::Data);
        assert_eq!(lookup_type(&store, 1, 2)?, BlockType::Free);
        Ok(())
    }

    #[test]
    fn chain_spans_multiple_toc_blocks() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        init_range(store.block_mut(1), 1, 2, 4, BlockType::Free);
        init_range(store.block_mut(5), 5, 5, 7, BlockType::Data);
        append(&mut store, 1, 5)?;

        assert_eq!(lookup_type(&store, 1, 2)?, BlockType::Free);
        assert_eq!(lookup_type(&store, 1, 6)?, BlockType::Data);
        Ok(())
    }

    #[test]
    fn collect_finds_every_match() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        let buf = store.block_mut(1);
        init_range(buf, 1, 2, 7, BlockType::Free);
        set_entry(&mut store, 1, 4, BlockType::Data)?;
        let data_blocks = collect(&store, 1, BlockType::Data)?;
        assert_eq!(data_blocks, vec![4]);
        Ok(())
    }
}
