// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The data subsystem: typed, variable-length values stored in `Data`
//! blocks, addressable by `(block_id, row_id)`. A value too large for one
//! block's payload spans a chain of continuation blocks linked by
//! `continuation_block_id`.
//!
//! A `Data` block holding row descriptors uses the same slotted-page shape
//! as [`crate::index::leaf`] and [`crate::index::tree`]: descriptors grow
//! upward from the header, chunk bytes pack from the tail downward.
//! Continuation blocks carry no row array — just a link to the next block
//! and raw bytes.
//!
//! This implementation allocates one row per `Data` block on `put`, so a
//! block's row array never holds more than one live entry in practice;
//! [`free_chain`]'s hole-compaction path exists to keep `row_id`s of
//! sibling rows stable if that ever changes, not because today's `put`
//! produces siblings.

use byteorder::{ByteOrder, LittleEndian};

use crate::alloc;
use crate::block::{self, BlockType};
use crate::store_file::StoreFile;
use crate::value::Value;
use crate::value_type::ValueType;

const OFF_ROW_COUNT: usize = block::HEADER_SIZE; // 16
const OFF_ROWS: usize = OFF_ROW_COUNT + 4; // 20
// type_tag, total_length (whole value, across every block in the chain),
// chunk_length (bytes of the value stored in *this* block), offset,
// continuation_block
const ROW_DESC_SIZE: usize = 1 + 4 + 4 + 2 + 8;
const TOMBSTONE_TAG: u8 = 0xFF;

const CONT_OFF_NEXT: usize = block::HEADER_SIZE; // 16
const CONT_HEADER_SIZE: usize = CONT_OFF_NEXT + 8; // 24

#[derive(Clone, Debug)]
struct Row {
    value_type: ValueType,
    total_len: usize,
    chunk: Vec<u8>,
    continuation_block: u64,
}

fn decode_rows(buf: &[u8]) -> crate::Result<Vec<Option<Row>>> {
    let count = LittleEndian::read_u32(&buf[OFF_ROW_COUNT..]) as usize;
    let mut rows = Vec::with_capacity(count);
    for i in 0..count {
        let base = OFF_ROWS + i * ROW_DESC_SIZE;
        let tag = buf[base];
        if tag == TOMBSTONE_TAG {
            rows.push(None);
            continue;
        }
        let total_len = LittleEndian::read_u32(&buf[base + 1..]) as usize;
        let chunk_len = LittleEndian::read_u32(&buf[base + 5..]) as usize;
        let offset = LittleEndian::read_u16(&buf[base + 9..]) as usize;
        let continuation_block = LittleEndian::read_u64(&buf[base + 11..]);
        let value_type = ValueType::try_from(tag)?;
        rows.push(Some(Row {
            value_type,
            total_len,
            chunk: buf[offset..offset + chunk_len].to_vec(),
            continuation_block,
        }));
    }
    Ok(rows)
}

fn fits(block_size: u32, rows: &[Option<Row>]) -> bool {
    let payload: usize = rows.iter().flatten().map(|r| r.chunk.len()).sum();
    OFF_ROWS + rows.len() * ROW_DESC_SIZE + payload <= block_size as usize
}

fn encode_into(buf: &mut [u8], block_id: u64, rows: &[Option<Row>]) {
    let block_size = buf.len();
    assert!(fits(block_size as u32, rows), "data rows exceed block capacity");

    block::init(buf, block_id, BlockType::Data);
    LittleEndian::write_u32(&mut buf[OFF_ROW_COUNT..], rows.len() as u32);

    let mut tail = block_size;
    for (i, slot) in rows.iter().enumerate() {
        let base = OFF_ROWS + i * ROW_DESC_SIZE;
        match slot {
            None => {
                buf[base] = TOMBSTONE_TAG;
            }
            Some(row) => {
                tail -= row.chunk.len();
                buf[tail..tail + row.chunk.len()].copy_from_slice(&row.chunk);

                buf[base] = u8::from(row.value_type);
                LittleEndian::write_u32(&mut buf[base + 1..], row.total_len as u32);
                LittleEndian::write_u32(&mut buf[base + 5..], row.chunk.len() as u32);
                LittleEndian::write_u16(&mut buf[base + 9..], tail as u16);
                LittleEndian::write_u64(&mut buf[base + 11..], row.continuation_block);
            }
        }
    }

    block::sync_crc(buf);
}

fn encode_continuation(buf: &mut [u8], block_id: u64, next: u64, chunk: &[u8]) {
    block::init(buf, block_id, BlockType::Data);
    LittleEndian::write_u64(&mut buf[CONT_OFF_NEXT..], next);
    let start = CONT_HEADER_SIZE;
    buf[start..start + chunk.len()].copy_from_slice(chunk);
    block::sync_crc(buf);
}

fn write_continuation_chain(
    store: &mut StoreFile,
    first_toc_id: u64,
    block_id: u64,
    bytes: &[u8],
) -> crate::Result<()> {
    let cap = store.block_size() as usize - CONT_HEADER_SIZE;
    if bytes.len() <= cap {
        encode_continuation(store.block_mut(block_id), block_id, 0, bytes);
        return Ok(());
    }
    let (chunk, rest) = bytes.split_at(cap);
    let next_id = alloc::allocate(store, first_toc_id, BlockType::Data)?;
    encode_continuation(store.block_mut(block_id), block_id, next_id, chunk);
    write_continuation_chain(store, first_toc_id, next_id, rest)
}

fn free_continuation_chain(store: &mut StoreFile, first_toc_id: u64, first: u64) -> crate::Result<()> {
    let mut cur = first;
    while cur != 0 {
        let next = LittleEndian::read_u64(&store.block(cur)[CONT_OFF_NEXT..]);
        alloc::free(store, first_toc_id, cur)?;
        cur = next;
    }
    Ok(())
}

fn write_first_row(
    store: &mut StoreFile,
    first_toc_id: u64,
    block_id: u64,
    value_type: ValueType,
    bytes: &[u8],
) -> crate::Result<()> {
    let first_cap = store.block_size() as usize - OFF_ROWS - ROW_DESC_SIZE;
    let total_len = bytes.len();
    if bytes.len() <= first_cap {
        let rows = [Some(Row { value_type, total_len, chunk: bytes.to_vec(), continuation_block: 0 })];
        encode_into(store.block_mut(block_id), block_id, &rows);
        return Ok(());
    }
    let (chunk, rest) = bytes.split_at(first_cap);
    let cont_id = alloc::allocate(store, first_toc_id, BlockType::Data)?;
    let rows = [Some(Row { value_type, total_len, chunk: chunk.to_vec(), continuation_block: cont_id })];
    encode_into(store.block_mut(block_id), block_id, &rows);
    write_continuation_chain(store, first_toc_id, cont_id, rest)
}

/// Stores `value`, allocating a fresh data block chain. Returns the pointer
/// callers should attach to an index leaf entry.
pub fn put(store: &mut StoreFile, first_toc_id: u64, value: &Value) -> crate::Result<(u64, u32)> {
    let block_id = alloc::allocate(store, first_toc_id, BlockType::Data)?;
    write_first_row(store, first_toc_id, block_id, value.value_type(), &value.encode())?;
    log::trace!("put value of type {:?} at block {block_id} row 0", value.value_type());
    Ok((block_id, 0))
}

/// Reads the value at `(block_id, row_id)`, reassembling its chain if any.
pub fn get(store: &StoreFile, block_id: u64, row_id: u32) -> crate::Result<Value> {
    let rows = decode_rows(store.block(block_id))?;
    let row = rows
        .get(row_id as usize)
        .and_then(|r| r.as_ref())
        .ok_or_else(|| crate::Error::Corrupt(format!("no row {row_id} in data block {block_id}")))?;

    let mut bytes = row.chunk.clone();
    let mut cont = row.continuation_block;
    while cont != 0 {
        if block::block_type(store.block(cont))? != BlockType::Data {
            return Err(crate::Error::Corrupt(format!(
                "data chain continuation {cont} is not a Data block"
            )));
        }
        if !block::verify_crc(store.block(cont)) {
            return Err(crate::Error::Corrupt(format!("crc mismatch in data chain at block {cont}")));
        }
        let buf = store.block(cont);
        let next = LittleEndian::read_u64(&buf[CONT_OFF_NEXT..]);
        bytes.extend_from_slice(&buf[CONT_HEADER_SIZE..]);
        cont = next;
    }
    // Every continuation block but the last is written full; the last one
    // may be padded with zeroed capacity, so trim back to the recorded
    // total before decoding.
    bytes.truncate(row.total_len);

    Value::decode(row.value_type, &bytes)
}

/// Replaces the value at `(block_id, row_id)` in place, reusing the same
/// pointer. Frees the old continuation chain (if any) first.
pub fn overwrite(
    store: &mut StoreFile,
    first_toc_id: u64,
    block_id: u64,
    row_id: u32,
    value: &Value,
) -> crate::Result<(u64, u32)> {
    let mut rows = decode_rows(store.block(block_id))?;
    let slot = rows
        .get_mut(row_id as usize)
        .ok_or_else(|| crate::Error::Corrupt(format!("no row {row_id} in data block {block_id}")))?;
    let old = slot
        .take()
        .ok_or_else(|| crate::Error::Corrupt(format!("row {row_id} in block {block_id} already freed")))?;
    if old.continuation_block != 0 {
        free_continuation_chain(store, first_toc_id, old.continuation_block)?;
    }

    let block_size = store.block_size() as usize;
    let sibling_size: usize = rows.iter().flatten().map(|r| ROW_DESC_SIZE + r.chunk.len()).sum();
    let available = block_size.saturating_sub(OFF_ROWS + ROW_DESC_SIZE + sibling_size);

    let bytes = value.encode();
    let total_len = bytes.len();
    let (first_chunk, rest): (&[u8], &[u8]) = if bytes.len() <= available {
        (&bytes, &[])
    } else {
        bytes.split_at(available)
    };

    let continuation_block = if rest.is_empty() {
        0
    } else {
        let id = alloc::allocate(store, first_toc_id, BlockType::Data)?;
        write_continuation_chain(store, first_toc_id, id, rest)?;
        id
    };

    rows[row_id as usize] = Some(Row {
        value_type: value.value_type(),
        total_len,
        chunk: first_chunk.to_vec(),
        continuation_block,
    });
    encode_into(store.block_mut(block_id), block_id, &rows);
    Ok((block_id, row_id))
}

/// Frees the value at `(block_id, row_id)` and its continuation chain. If
/// other rows remain in the block, the row's descriptor becomes a
/// tombstone (preserving their `row_id`s); otherwise the whole block is
/// returned to the allocator.
pub fn free_chain(store: &mut StoreFile, first_toc_id: u64, block_id: u64, row_id: u32) -> crate::Result<()> {
    let mut rows = decode_rows(store.block(block_id))?;
    let slot = rows
        .get_mut(row_id as usize)
        .ok_or_else(|| crate::Error::Corrupt(format!("no row {row_id} in data block {block_id}")))?;
    let old = slot
        .take()
        .ok_or_else(|| crate::Error::Corrupt(format!("row {row_id} in block {block_id} already freed")))?;

    if old.continuation_block != 0 {
        free_continuation_chain(store, first_toc_id, old.continuation_block)?;
    }

    if rows.iter().all(Option::is_none) {
        alloc::free(store, first_toc_id, block_id)?;
    } else {
        encode_into(store.block_mut(block_id), block_id, &rows);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toc;
    use crate::Config;
    use test_log::test;

    fn new_store() -> crate::Result<(tempfile::TempDir, StoreFile)> {
        let dir = tempfile::tempdir()?;
        let config = Config::new(dir.path().join("t.pkv"));
        let mut store = StoreFile::create(&config)?;
        let block_count = store.block_count();
        toc::init_range(store.block_mut(1), 1, 1, block_count - 1, BlockType::Free);
        toc::set_entry(&mut store, 1, 1, BlockType::Toc)?;
        for id in (2..block_count).rev() {
            alloc::free(&mut store, 1, id)?;
        }
        Ok((dir, store))
    }

    #[test]
    fn put_get_small_value_round_trips() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        let (block, row) = put(&mut store, 1, &Value::Int64(-7))?;
        assert_eq!(get(&store, block, row)?, Value::Int64(-7));
        Ok(())
    }

    #[test]
    fn put_get_large_value_chains_across_blocks() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        let big = vec![0xABu8; 40 * 1024];
        let (block, row) = put(&mut store, 1, &Value::Bytes(big.clone()))?;
        let got = get(&store, block, row)?;
        assert_eq!(got, Value::Bytes(big));
        Ok(())
    }

    #[test]
    fn overwrite_replaces_value_and_frees_old_chain() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        let big = vec![7u8; 20 * 1024];
        let (block, row) = put(&mut store, 1, &Value::Bytes(big))?;
        let (block2, row2) = overwrite(&mut store, 1, block, row, &Value::Int64(99))?;
        assert_eq!(block, block2);
        assert_eq!(row, row2);
        assert_eq!(get(&store, block2, row2)?, Value::Int64(99));
        Ok(())
    }

    #[test]
    fn free_chain_reclaims_block() -> crate::Result<()> {
        let (_dir, mut store) = new_store()?;
        let (block, row) = put(&mut store, 1, &Value::String("duck".into()))?;
        free_chain(&mut store, 1, block, row)?;
        assert_eq!(toc::lookup_type(&store, 1, block)?, BlockType::Free);
        Ok(())
    }
}
