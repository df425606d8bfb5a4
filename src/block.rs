// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Block primitives: the common header every page in the store begins with,
//! plus the CRC-32 that protects it.
//!
//! A block is a fixed-size (`block_size`) region of the memory-mapped file.
//! Every block starts with a [`BlockHeader`]: an 8-byte id, a 4-byte type
//! tag, and a 4-byte CRC-32 computed over everything in the block except
//! those three fields themselves. Higher-level modules (`toc`, `index`,
//! `data`) interpret the remainder of the block; this module only knows
//! about the header.

use byteorder::{ByteOrder, LittleEndian};

/// Byte size of a [`BlockHeader`] as laid out on disk: `block_id` (8) +
/// `block_type` (4) + `crc32` (4).
pub const HEADER_SIZE: usize = 16;

const OFF_BLOCK_ID: usize = 0;
const OFF_BLOCK_TYPE: usize = 8;
const OFF_CRC32: usize = 12;

/// The type tag stored in a block's header and in its covering TOC entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u32)]
pub enum BlockType {
    /// Unallocated block, linked into the free list.
    Free = 0,
    /// Block 0, the store's file header.
    FileHeader = 1,
    /// A table-of-contents block.
    Toc = 2,
    /// An interior B-tree block.
    IndexTree = 3,
    /// A leaf B-tree block.
    IndexLeaf = 4,
    /// A data (value) block.
    Data = 5,
}

impl BlockType {
    /// Reconstructs a `BlockType` from its on-disk `u32` tag.
    pub fn from_u32(v: u32) -> crate::Result<Self> {
        match v {
            0 => Ok(Self::Free),
            1 => Ok(Self::FileHeader),
            2 => Ok(Self::Toc),
            3 => Ok(Self::IndexTree),
            4 => Ok(Self::IndexLeaf),
            5 => Ok(Self::Data),
            _ => Err(crate::Error::Corrupt(format!("unknown block type tag {v}"))),
        }
    }
}

/// Zeroes `buf` (assumed to be exactly one block long) and sets the id and
/// type fields. The CRC is left at zero; callers must call [`sync_crc`]
/// before the block is considered durable.
pub fn init(buf: &mut [u8], block_id: u64, block_type: BlockType) {
    buf.fill(0);
    LittleEndian::write_u64(&mut buf[OFF_BLOCK_ID..], block_id);
    LittleEndian::write_u32(&mut buf[OFF_BLOCK_TYPE..], block_type as u32);
}

/// Reads the block id from a block's header.
pub fn block_id(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_BLOCK_ID..])
}

/// Reads the block type from a block's header.
pub fn block_type(buf: &[u8]) -> crate::Result<BlockType> {
    BlockType::from_u32(LittleEndian::read_u32(&buf[OFF_BLOCK_TYPE..]))
}

/// Overwrites the block type in a block's header (used when a free block is
/// repurposed in place, without re-zeroing the rest of the block).
pub fn set_block_type(buf: &mut [u8], block_type: BlockType) {
    LittleEndian::write_u32(&mut buf[OFF_BLOCK_TYPE..], block_type as u32);
}

/// Computes the CRC-32 (IEEE 802.3, polynomial `0xEDB88320`) over `buf`
/// excluding the `(block_id, block_type, crc32)` header fields, seeded with
/// 0 and computed in the two surrounding ranges so the crc32 field itself is
/// skipped.
fn calc_crc32(buf: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&buf[..OFF_BLOCK_TYPE + 4]);
    hasher.update(&buf[OFF_CRC32 + 4..]);
    hasher.finalize()
}

/// Recomputes the CRC-32 over `buf` and stores it in the header.
pub fn sync_crc(buf: &mut [u8]) {
    let crc = calc_crc32(buf);
    LittleEndian::write_u32(&mut buf[OFF_CRC32..], crc);
}

/// Returns `true` iff the stored CRC-32 matches the recomputed one.
pub fn verify_crc(buf: &[u8]) -> bool {
    let stored = LittleEndian::read_u32(&buf[OFF_CRC32..]);
    stored == calc_crc32(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn init_zeroes_and_sets_header() {
        let mut buf = vec![0xAAu8; 64];
        init(&mut buf, 7, BlockType::Data);
        assert_eq!(block_id(&buf), 7);
        assert_eq!(block_type(&buf).unwrap(), BlockType::Data);
        assert_eq!(&buf[HEADER_SIZE..], &[0u8; 48][..]);
    }

    #[test]
    fn crc_round_trips() {
        let mut buf = vec![0u8; 64];
        init(&mut buf, 1, BlockType::IndexLeaf);
        buf[20] = 0x42;
        buf[40] = 0x99;
        assert!(!verify_crc(&buf), "zeroed crc should not match freshly-dirtied contents");
        sync_crc(&mut buf);
        assert!(verify_crc(&buf));
    }

    #[test]
    fn crc_detects_single_byte_flip() {
        let mut buf = vec![0u8; 64];
        init(&mut buf, 1, BlockType::Data);
        sync_crc(&mut buf);
        assert!(verify_crc(&buf));

        buf[30] ^= 0x01;
        assert!(!verify_crc(&buf));
    }

    #[test]
    fn crc_ignores_header_fields_themselves() {
        // Flipping the crc32 field must not be "fixed" by recomputation
        // happening to collide; verify must simply fail.
        let mut buf = vec![0u8; 64];
        init(&mut buf, 1, BlockType::Data);
        sync_crc(&mut buf);
        buf[OFF_CRC32] ^= 0xFF;
        assert!(!verify_crc(&buf));
    }
}
