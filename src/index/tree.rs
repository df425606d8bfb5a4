// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! `IndexTree` blocks: interior index nodes. Each entry `(key, left_child)`
//! is a separator: every key strictly less than `key` lives under
//! `left_child`; keys greater than or equal to the last entry's key (and
//! less than whatever bounds this subtree from above) live under
//! `rightmost`.

use byteorder::{ByteOrder, LittleEndian};

use crate::binary_search::partition_point;
use crate::block::{self, BlockType};
use crate::key::Key;

const OFF_NUM_ENTRIES: usize = block::HEADER_SIZE; // 16
const OFF_RIGHTMOST: usize = OFF_NUM_ENTRIES + 4; // 20
const OFF_ENTRIES: usize = OFF_RIGHTMOST + 8; // 28
const ENTRY_SIZE: usize = 2 + 2 + 8; // key_offset, key_size, left_child

/// A decoded interior entry.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeEntry {
    pub key: Key,
    pub left_child: u64,
}

/// A fully decoded interior node: its separators and its rightmost child.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub entries: Vec<TreeEntry>,
    pub rightmost: u64,
}

pub fn rightmost(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_RIGHTMOST..])
}

/// Decodes the whole interior node.
pub fn decode(buf: &[u8]) -> crate::Result<TreeNode> {
    let count = LittleEndian::read_u32(&buf[OFF_NUM_ENTRIES..]) as usize;
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let base = OFF_ENTRIES + i * ENTRY_SIZE;
        let key_offset = LittleEndian::read_u16(&buf[base..]) as usize;
        let key_size = LittleEndian::read_u16(&buf[base + 2..]) as usize;
        let left_child = LittleEndian::read_u64(&buf[base + 4..]);
        let key = Key::from_canonical_bytes(&buf[key_offset..key_offset + key_size])?;
        entries.push(TreeEntry { key, left_child });
    }
    Ok(TreeNode {
        entries,
        rightmost: rightmost(buf),
    })
}

/// Finds the child block id to descend into for `key`: the first entry
/// whose key is strictly greater than `key`, or `rightmost` if none.
#[must_use]
pub fn find_child(node: &TreeNode, key: &Key) -> u64 {
    let idx = partition_point(&node.entries, |e| e.key <= *key);
    node.entries
        .get(idx)
        .map_or(node.rightmost, |e| e.left_child)
}

#[must_use]
pub fn encoded_size(entries: &[TreeEntry]) -> usize {
    entries
        .iter()
        .map(|e| ENTRY_SIZE + e.key.as_bytes().len())
        .sum()
}

#[must_use]
pub fn fits(block_size: u32, entries: &[TreeEntry]) -> bool {
    OFF_ENTRIES + encoded_size(entries) <= block_size as usize
}

/// Rewrites `buf` from scratch as an interior block.
///
/// # Panics
///
/// Panics if `entries` do not fit; callers must check [`fits`] first.
pub fn encode_into(buf: &mut [u8], block_id: u64, entries: &[TreeEntry], rightmost_child: u64) {
    let block_size = buf.len();
    assert!(
        fits(block_size as u32, entries),
        "interior entries exceed block capacity"
    );

    block::init(buf, block_id, BlockType::IndexTree);
    LittleEndian::write_u32(&mut buf[OFF_NUM_ENTRIES..], entries.len() as u32);
    LittleEndian::write_u64(&mut buf[OFF_RIGHTMOST..], rightmost_child);

    let mut tail = block_size;
    for (i, entry) in entries.iter().enumerate() {
        let key_bytes = entry.key.as_bytes();
        tail -= key_bytes.len();
        buf[tail..tail + key_bytes.len()].copy_from_slice(key_bytes);

        let base = OFF_ENTRIES + i * ENTRY_SIZE;
        LittleEndian::write_u16(&mut buf[base..], tail as u16);
        LittleEndian::write_u16(&mut buf[base + 2..], key_bytes.len() as u16);
        LittleEndian::write_u64(&mut buf[base + 4..], entry.left_child);
    }

    block::sync_crc(buf);
}

/// Chooses a byte-balanced split point for an overflowing entry list,
/// returning `(left_entries, promoted_key, left_child_of_promoted,
/// right_entries)`. The entry at the split point is promoted to the
/// parent and does not appear in either half directly; its `left_child`
/// becomes the left half's new rightmost.
#[must_use]
pub fn split_point(entries: &[TreeEntry]) -> usize {
    let total: usize = entries.iter().map(|e| ENTRY_SIZE + e.key.as_bytes().len()).sum();
    let half = total / 2;
    let mut acc = 0;
    for (i, e) in entries.iter().enumerate() {
        acc += ENTRY_SIZE + e.key.as_bytes().len();
        if acc >= half {
            return i.clamp(1, entries.len().saturating_sub(2).max(1));
        }
    }
    entries.len() / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn entry(k: &str, child: u64) -> TreeEntry {
        TreeEntry {
            key: Key::new(k),
            left_child: child,
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut buf = vec![0u8; 256];
        let entries = vec![entry("m", 2), entry("t", 3)];
        encode_into(&mut buf, 1, &entries, 4);

        let node = decode(&buf).unwrap();
        assert_eq!(node.entries, entries);
        assert_eq!(node.rightmost, 4);
    }

    #[test]
    fn find_child_routes_by_separator() {
        let node = TreeNode {
            entries: vec![entry("m", 2), entry("t", 3)],
            rightmost: 4,
        };
        assert_eq!(find_child(&node, &Key::new("apple")), 2);
        assert_eq!(find_child(&node, &Key::new("newt")), 3);
        assert_eq!(find_child(&node, &Key::new("zebra")), 4);
        assert_eq!(find_child(&node, &Key::new("m")), 3, "separator key itself routes right");
    }
}
