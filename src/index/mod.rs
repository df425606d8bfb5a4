// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The index subsystem: a classical B-tree over canonicalized string keys,
//! built from [`tree`] (interior) and [`leaf`] blocks.
//!
//! Interior separators follow the convention stated in the file format:
//! for entry `i`, every key strictly less than `entries[i].key` lives under
//! `entries[i].left_child`; keys greater than or equal to the last entry's
//! key live under `rightmost`. Splits and merges are expressed as
//! "rewrite the node's full entry list, then re-encode the block from
//! scratch" rather than in-place splicing, which keeps the split/merge
//! logic independent of the slotted-page byte layout.

pub mod leaf;
pub mod tree;

pub use leaf::LeafEntry;
pub use tree::TreeEntry;

use crate::alloc;
use crate::block::{self, BlockType};
use crate::key::Key;
use crate::store_file::StoreFile;
use crate::toc;

/// Result of an insert or set: `Some(id)` if the index root changed (a
/// split grew the tree, or the root was previously empty).
#[derive(Debug)]
pub struct InsertOutcome {
    pub new_root: Option<u64>,
}

/// Result of a delete: the removed entry, and the new root id if deleting
/// caused a root demotion.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub new_root: Option<u64>,
    pub removed: LeafEntry,
}

fn descend_to_leaf(store: &StoreFile, root_id: u64, key: &Key) -> crate::Result<(Vec<u64>, u64)> {
    let mut path = Vec::new();
    let mut current = root_id;
    loop {
        match block::block_type(store.block(current))? {
            BlockType::IndexLeaf => return Ok((path, current)),
            BlockType::IndexTree => {
                let node = tree::decode(store.block(current))?;
                path.push(current);
                current = tree::find_child(&node, key);
            }
            other => {
                return Err(crate::Error::Corrupt(format!(
                    "index descent hit block {current} of unexpected type {other:?}"
                )))
            }
        }
    }
}

/// Returns `true` if `key` alone fits in an otherwise-empty leaf, i.e. is
/// not too large to ever be indexed regardless of store state.
#[must_use]
pub fn key_fits(block_size: u32, key: &Key) -> bool {
    leaf::fits(
        block_size,
        std::slice::from_ref(&LeafEntry { key: key.clone(), data_block: 0, row_id: 0 }),
    )
}

/// Finds the leftmost leaf of the tree rooted at `root_id`. `root_id == 0`
/// denotes an empty store with no leaves; callers must check that first.
pub fn first_leaf(store: &StoreFile, root_id: u64) -> crate::Result<u64> {
    let mut current = root_id;
    loop {
        match block::block_type(store.block(current))? {
            BlockType::IndexLeaf => return Ok(current),
            BlockType::IndexTree => {
                let node = tree::decode(store.block(current))?;
                current = node.entries.first().map_or(node.rightmost, |e| e.left_child);
            }
            other => {
                return Err(crate::Error::Corrupt(format!(
                    "index descent hit block {current} of unexpected type {other:?}"
                )))
            }
        }
    }
}

/// Looks up `key`, returning its leaf entry if present. `root_id == 0`
/// (empty store) always misses.
pub fn search(store: &StoreFile, root_id: u64, key: &Key) -> crate::Result<Option<LeafEntry>> {
    if root_id == 0 {
        return Ok(None);
    }
    let (_, leaf_id) = descend_to_leaf(store, root_id, key)?;
    let entries = leaf::decode_all(store.block(leaf_id))?;
    Ok(entries.into_iter().find(|e| &e.key == key))
}

/// Visits every leaf entry in ascending key order, starting at the
/// leftmost leaf and following `next_leaf`.
pub fn for_each_entry<F>(store: &StoreFile, root_id: u64, mut f: F) -> crate::Result<()>
where
    F: FnMut(&LeafEntry) -> crate::Result<()>,
{
    if root_id == 0 {
        return Ok(());
    }
    let mut leaf_id = first_leaf(store, root_id)?;
    loop {
        let buf = store.block(leaf_id);
        let entries = leaf::decode_all(buf)?;
        let next = leaf::next_leaf(buf);
        for entry in &entries {
            f(entry)?;
        }
        if next == 0 {
            return Ok(());
        }
        leaf_id = next;
    }
}

/// Inserts or updates `key -> (data_block, row_id)`.
///
/// If `root_id == 0` (empty store), allocates the first leaf and returns it
/// as the new root. If `overwrite` is `false` and the key already exists,
/// returns [`crate::Error::AlreadyExists`].
pub fn insert(
    store: &mut StoreFile,
    first_toc_id: u64,
    root_id: u64,
    key: Key,
    data_block: u64,
    row_id: u32,
    overwrite: bool,
) -> crate::Result<InsertOutcome> {
    let block_size = store.block_size();

    if !leaf::fits(block_size, std::slice::from_ref(&LeafEntry {
        key: key.clone(),
        data_block,
        row_id,
    })) {
        return Err(crate::Error::KeyTooLarge);
    }

    if root_id == 0 {
        let leaf_id = alloc::allocate(store, first_toc_id, BlockType::IndexLeaf)?;
        leaf::encode_into(
            store.block_mut(leaf_id),
            leaf_id,
            0,
            &[LeafEntry { key, data_block, row_id }],
        );
        return Ok(InsertOutcome { new_root: Some(leaf_id) });
    }

    let (mut path, leaf_id) = descend_to_leaf(store, root_id, &key)?;
    let next_leaf_saved = leaf::next_leaf(store.block(leaf_id));
    let mut entries = leaf::decode_all(store.block(leaf_id))?;

    match entries.binary_search_by(|e| e.key.cmp(&key)) {
        Ok(idx) => {
            if !overwrite {
                return Err(crate::Error::AlreadyExists);
            }
            entries[idx].data_block = data_block;
            entries[idx].row_id = row_id;
        }
        Err(idx) => entries.insert(idx, LeafEntry { key, data_block, row_id }),
    }

    if leaf::fits(block_size, &entries) {
        leaf::encode_into(store.block_mut(leaf_id), leaf_id, next_leaf_saved, &entries);
        return Ok(InsertOutcome { new_root: None });
    }

    let split_at = leaf::split_point(&entries);
    let right_entries = entries.split_off(split_at);
    let left_entries = entries;
    let right_id = alloc::allocate(store, first_toc_id, BlockType::IndexLeaf)?;
    leaf::encode_into(store.block_mut(right_id), right_id, next_leaf_saved, &right_entries);
    leaf::encode_into(store.block_mut(leaf_id), leaf_id, right_id, &left_entries);

    let mut pending = Some((right_entries[0].key.clone(), leaf_id, right_id));

    while let Some((separator, old_id, new_id)) = pending.take() {
        let Some(parent_id) = path.pop() else {
            let new_root_id = alloc::allocate(store, first_toc_id, BlockType::IndexTree)?;
            tree::encode_into(
                store.block_mut(new_root_id),
                new_root_id,
                &[TreeEntry { key: separator, left_child: old_id }],
                new_id,
            );
            return Ok(InsertOutcome { new_root: Some(new_root_id) });
        };

        let mut node = tree::decode(store.block(parent_id))?;
        if node.rightmost == old_id {
            node.entries.push(TreeEntry { key: separator, left_child: old_id });
            node.rightmost = new_id;
        } else if let Some(pos) = node.entries.iter().position(|e| e.left_child == old_id) {
            node.entries.insert(pos, TreeEntry { key: separator, left_child: old_id });
            node.entries[pos + 1].left_child = new_id;
        } else {
            return Err(crate::Error::Corrupt(format!(
                "dangling child pointer {old_id} under parent {parent_id}"
            )));
        }

        if tree::fits(block_size, &node.entries) {
            tree::encode_into(store.block_mut(parent_id), parent_id, &node.entries, node.rightmost);
        } else {
            let split_at = tree::split_point(&node.entries);
            let mut left_entries = node.entries;
            let right_entries = left_entries.split_off(split_at + 1);
            let promoted = left_entries.remove(split_at);

            let new_right_id = alloc::allocate(store, first_toc_id, BlockType::IndexTree)?;
            tree::encode_into(store.block_mut(new_right_id), new_right_id, &right_entries, node.rightmost);
            tree::encode_into(store.block_mut(parent_id), parent_id, &left_entries, promoted.left_child);

            pending = Some((promoted.key, parent_id, new_right_id));
        }
    }

    Ok(InsertOutcome { new_root: None })
}

fn unlink_leaf(
    store: &mut StoreFile,
    root_id: u64,
    removed_id: u64,
    removed_next: u64,
) -> crate::Result<()> {
    let first = first_leaf(store, root_id)?;
    if first == removed_id {
        return Ok(());
    }
    let mut leaf_id = first;
    loop {
        let next = leaf::next_leaf(store.block(leaf_id));
        if next == removed_id {
            let entries = leaf::decode_all(store.block(leaf_id))?;
            leaf::encode_into(store.block_mut(leaf_id), leaf_id, removed_next, &entries);
            return Ok(());
        }
        if next == 0 {
            return Err(crate::Error::Corrupt(format!(
                "leaf {removed_id} has no predecessor in the next_leaf chain"
            )));
        }
        leaf_id = next;
    }
}

/// Removes `key`, freeing its leaf entry's block when the leaf becomes
/// empty (and demoting the root if that leaves it with a single child).
///
/// This implementation merges away fully-emptied leaves and (only at the
/// root) collapses a single-child interior root, but does not redistribute
/// keys between underfull siblings; an underfull-but-nonempty leaf is left
/// in place. This keeps delete simple while preserving every structural
/// invariant (ascending separators, acyclic free list, valid CRCs).
pub fn delete(store: &mut StoreFile, first_toc_id: u64, root_id: u64, key: &Key) -> crate::Result<DeleteOutcome> {
    if root_id == 0 {
        return Err(crate::Error::NotFound);
    }
    let (mut path, leaf_id) = descend_to_leaf(store, root_id, key)?;
    let next_leaf_saved = leaf::next_leaf(store.block(leaf_id));
    let mut entries = leaf::decode_all(store.block(leaf_id))?;

    let idx = entries
        .binary_search_by(|e| e.key.cmp(key))
        .map_err(|_| crate::Error::NotFound)?;
    let removed = entries.remove(idx);

    if !entries.is_empty() || leaf_id == root_id {
        leaf::encode_into(store.block_mut(leaf_id), leaf_id, next_leaf_saved, &entries);
        return Ok(DeleteOutcome { new_root: None, removed });
    }

    // The leaf is now empty and is not the root: fold it out of the tree.
    unlink_leaf(store, root_id, leaf_id, next_leaf_saved)?;
    alloc::free(store, first_toc_id, leaf_id)?;

    let Some(parent_id) = path.pop() else {
        return Ok(DeleteOutcome { new_root: None, removed });
    };

    let mut node = tree::decode(store.block(parent_id))?;
    if node.rightmost == leaf_id {
        if let Some(last) = node.entries.pop() {
            node.rightmost = last.left_child;
        }
    } else if let Some(pos) = node.entries.iter().position(|e| e.left_child == leaf_id) {
        node.entries.remove(pos);
    } else {
        return Err(crate::Error::Corrupt(format!(
            "dangling child pointer {leaf_id} under parent {parent_id}"
        )));
    }

    if node.entries.is_empty() && parent_id == root_id {
        alloc::free(store, first_toc_id, parent_id)?;
        return Ok(DeleteOutcome { new_root: Some(node.rightmost), removed });
    }

    tree::encode_into(store.block_mut(parent_id), parent_id, &node.entries, node.rightmost);
    Ok(DeleteOutcome { new_root: None, removed })
}
