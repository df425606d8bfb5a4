// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The free-block allocator: a singly-linked list of free blocks threaded
//! through the store file itself, with the file header holding the head
//! pointer. When the list runs dry, the store doubles in size and the newly
//! available range is folded into the TOC and the free list.

use byteorder::{ByteOrder, LittleEndian};

use crate::block::{self, BlockType};
use crate::header;
use crate::store_file::StoreFile;
use crate::toc;

const OFF_NEXT_FREE: usize = block::HEADER_SIZE; // 16

fn next_free(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_NEXT_FREE..])
}

fn set_next_free(buf: &mut [u8], v: u64) {
    LittleEndian::write_u64(&mut buf[OFF_NEXT_FREE..], v);
}

/// Allocates a block, formats it as `desired_type`, records that type in the
/// TOC, and returns its id. Grows the store if the free list is empty.
///
/// # Errors
///
/// Returns [`crate::Error::Exhausted`] if growing the store still leaves no
/// free block (only possible if the store has somehow shrunk below usable
/// size), or propagates an I/O error from growing the file.
pub fn allocate(
    store: &mut StoreFile,
    first_toc_id: u64,
    desired_type: BlockType,
) -> crate::Result<u64> {
    if header::free_head_id(store.block(0)) == 0 {
        grow(store, first_toc_id)?;
    }

    let head = header::free_head_id(store.block(0));
    if head == 0 {
        return Err(crate::Error::Exhausted);
    }

    let next = next_free(store.block(head));
    header::set_free_head_id(store.block_mut(0), next);
    block::sync_crc(store.block_mut(0));

    block::init(store.block_mut(head), head, desired_type);
    block::sync_crc(store.block_mut(head));
    toc::set_entry(store, first_toc_id, head, desired_type)?;

    log::trace!("allocated block {head} as {desired_type:?}");
    Ok(head)
}

/// Returns `id` to the free list and records it as [`BlockType::Free`] in
/// the TOC.
pub fn free(store: &mut StoreFile, first_toc_id: u64, id: u64) -> crate::Result<()> {
    let head = header::free_head_id(store.block(0));

    let buf = store.block_mut(id);
    block::init(buf, id, BlockType::Free);
    set_next_free(buf, head);
    block::sync_crc(buf);

    header::set_free_head_id(store.block_mut(0), id);
    block::sync_crc(store.block_mut(0));

    toc::set_entry(store, first_toc_id, id, BlockType::Free)?;
    log::trace!("freed block {id}");
    Ok(())
}

/// Pushes a freshly-formatted free block `id` onto the free list without
/// touching the TOC (used during `grow`, where the TOC entry is already
/// correct from [`toc::init_range`]'s fill value).
fn push_free_no_toc(store: &mut StoreFile, id: u64) {
    let head = header::free_head_id(store.block(0));

    let buf = store.block_mut(id);
    block::init(buf, id, BlockType::Free);
    set_next_free(buf, head);
    block::sync_crc(buf);

    header::set_free_head_id(store.block_mut(0), id);
    block::sync_crc(store.block_mut(0));
}

/// Doubles the store's block count, designates the first new blocks as TOC
/// blocks (enough to cover the whole new range), and threads the remainder
/// onto the free list.
fn grow(store: &mut StoreFile, first_toc_id: u64) -> crate::Result<()> {
    let grown = store.grow()?;
    let per_toc = toc::max_entries(store.block_size());

    let mut chunks = Vec::new();
    let mut cursor = grown.start;
    while cursor < grown.end {
        let lo = cursor;
        let hi = (lo + per_toc - 1).min(grown.end - 1);
        chunks.push((lo, hi));
        cursor = hi + 1;
    }

    for &(lo, hi) in &chunks {
        toc::init_range(store.block_mut(lo), lo, lo, hi, BlockType::Free);
        toc::append(store, first_toc_id, lo)?;
        toc::set_entry(store, first_toc_id, lo, BlockType::Toc)?;
    }

    let chunk_heads: std::collections::HashSet<u64> = chunks.iter().map(|&(lo, _)| lo).collect();
    for id in (grown.start..grown.end).rev() {
        if chunk_heads.contains(&id) {
            continue;
        }
        push_free_no_toc(store, id);
    }

    log::debug!(
        "grew store to {} blocks, added {} toc block(s)",
        store.block_count(),
        chunks.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use test_log::test;

    /// Builds a minimal store: block 0 is the header, block 1 a TOC
    /// covering the whole initial file as Free, with `free_head_id`
    /// pointing at block 2 (the lowest free id; block 1 itself is Toc).
    fn new_store() -> crate::Result<(tempfile::TempDir, StoreFile)> {
        let dir = tempfile::tempdir()?;
        let config = Config::new(dir.path().join("t.pkv"));
        let mut store = StoreFile::create(&config)?;

        let block_count = store.block_count();
        toc::init_range(store.block_mut(1), 1, 1, block_count - 1, BlockType::Free);
        toc::set_entry(&mut store, 1, 1, BlockType::Toc)?;

        for id in (2..block_count).rev() {
            push_free_no_toc(&mut store, id);
        }

        header::set_first_toc_id(store.block_mut(0), 1);
        block::sync_crc(store.block_mut(0));

        Ok((dir, store))
    }

    #[test]
    fn allocate_then_free_round_trips() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        let id = allocate(&mut store, 1, BlockType::Data)?;
        assert_eq!(toc::lookup_type(&store, 1, id)?, BlockType::Data);

        free(&mut store, 1, id)?;
        assert_eq!(toc::lookup_type(&store, 1, id)?, BlockType::Free);

        let id2 = allocate(&mut store, 1, BlockType::IndexLeaf)?;
        assert_eq!(id2, id, "freed block should be reused by the next allocation");
        Ok(())
    }

    #[test]
    fn exhausting_free_list_grows_the_store() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        let before = store.block_count();

        let mut allocated = Vec::new();
        // Drain every free block from the initial 8-block file (blocks
        // 2..8, i.e. 6 free blocks) to force a grow.
        for _ in 0..6 {
            allocated.push(allocate(&mut store, 1, BlockType::Data)?);
        }

        let grown_id = allocate(&mut store, 1, BlockType::Data)?;
        assert!(store.block_count() > before);
        assert!(grown_id >= before);
        Ok(())
    }
}
