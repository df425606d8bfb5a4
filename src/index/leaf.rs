// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! `IndexLeaf` blocks: the terminal nodes of the index, holding
//! `key -> (data_block, row_id)` entries in ascending key order, threaded
//! into a singly-linked list via `next_leaf` for ordered scans.
//!
//! Entries grow upward from just after the block header; key bytes are
//! packed from the block's tail, growing downward. This is the classic
//! slotted-page layout, which lets entries be small, fixed-size records
//! while keys stay variable-length.

use byteorder::{ByteOrder, LittleEndian};

use crate::block::{self, BlockType};
use crate::key::Key;

const OFF_NUM_ENTRIES: usize = block::HEADER_SIZE; // 16
const OFF_NEXT_LEAF: usize = OFF_NUM_ENTRIES + 4; // 20
const OFF_ENTRIES: usize = OFF_NEXT_LEAF + 8; // 28
const ENTRY_SIZE: usize = 2 + 2 + 8 + 4; // key_offset, key_size, data_block, row_id

/// A decoded leaf entry: a canonicalized key and the data-subsystem pointer
/// it resolves to.
#[derive(Clone, Debug, PartialEq)]
pub struct LeafEntry {
    pub key: Key,
    pub data_block: u64,
    pub row_id: u32,
}

/// Returns the `next_leaf` link without decoding the entry array.
pub fn next_leaf(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_NEXT_LEAF..])
}

/// Decodes every entry in the block, in ascending order.
pub fn decode_all(buf: &[u8]) -> crate::Result<Vec<LeafEntry>> {
    let count = LittleEndian::read_u32(&buf[OFF_NUM_ENTRIES..]) as usize;
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let base = OFF_ENTRIES + i * ENTRY_SIZE;
        let key_offset = LittleEndian::read_u16(&buf[base..]) as usize;
        let key_size = LittleEndian::read_u16(&buf[base + 2..]) as usize;
        let data_block = LittleEndian::read_u64(&buf[base + 4..]);
        let row_id = LittleEndian::read_u32(&buf[base + 12..]);
        let key = Key::from_canonical_bytes(&buf[key_offset..key_offset + key_size])?;
        out.push(LeafEntry {
            key,
            data_block,
            row_id,
        });
    }
    Ok(out)
}

/// Bytes needed to store `entries` in a leaf block, not counting the fixed
/// header fields before `OFF_ENTRIES`.
#[must_use]
pub fn encoded_size(entries: &[LeafEntry]) -> usize {
    entries
        .iter()
        .map(|e| ENTRY_SIZE + e.key.as_bytes().len())
        .sum()
}

/// Returns `true` if `entries` fit within a block of `block_size` bytes.
#[must_use]
pub fn fits(block_size: u32, entries: &[LeafEntry]) -> bool {
    OFF_ENTRIES + encoded_size(entries) <= block_size as usize
}

/// Rewrites `buf` from scratch as a leaf block holding `entries` (already
/// sorted ascending by key) and linked to `next_leaf_id`.
///
/// # Panics
///
/// Panics if `entries` do not fit in the block; callers must check
/// [`fits`] (or split) first.
pub fn encode_into(buf: &mut [u8], block_id: u64, next_leaf_id: u64, entries: &[LeafEntry]) {
    let block_size = buf.len();
    assert!(
        fits(block_size as u32, entries),
        "leaf entries exceed block capacity"
    );

    block::init(buf, block_id, BlockType::IndexLeaf);
    LittleEndian::write_u32(&mut buf[OFF_NUM_ENTRIES..], entries.len() as u32);
    LittleEndian::write_u64(&mut buf[OFF_NEXT_LEAF..], next_leaf_id);

    let mut tail = block_size;
    for (i, entry) in entries.iter().enumerate() {
        let key_bytes = entry.key.as_bytes();
        tail -= key_bytes.len();
        buf[tail..tail + key_bytes.len()].copy_from_slice(key_bytes);

        let base = OFF_ENTRIES + i * ENTRY_SIZE;
        LittleEndian::write_u16(&mut buf[base..], tail as u16);
        LittleEndian::write_u16(&mut buf[base + 2..], key_bytes.len() as u16);
        LittleEndian::write_u64(&mut buf[base + 4..], entry.data_block);
        LittleEndian::write_u32(&mut buf[base + 12..], entry.row_id);
    }

    block::sync_crc(buf);
}

/// Splits `entries` into two byte-balanced halves: the left half (kept in
/// the original block) and the right half (moved to a new block). The
/// split point is chosen by accumulated byte size, not entry count, per
/// the store's byte-balanced split rule.
#[must_use]
pub fn split_point(entries: &[LeafEntry]) -> usize {
    let total: usize = entries.iter().map(|e| ENTRY_SIZE + e.key.as_bytes().len()).sum();
    let half = total / 2;
    let mut acc = 0;
    for (i, e) in entries.iter().enumerate() {
        acc += ENTRY_SIZE + e.key.as_bytes().len();
        if acc >= half {
            return (i + 1).min(entries.len() - 1).max(1);
        }
    }
    entries.len() / 2
}
