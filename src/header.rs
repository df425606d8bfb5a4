// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Layout of block 0, the file header.

use byteorder::{ByteOrder, LittleEndian};

use crate::block;

/// 8-byte magic constant stamped into every store's file header.
pub const MAGIC: u64 = u64::from_le_bytes(*b"PAGEKVS\0");

/// The on-disk format version this build writes and the highest version it
/// understands on read.
pub const FORMAT_VERSION: u32 = 1;

const OFF_MAGIC: usize = block::HEADER_SIZE; // 16
const OFF_VERSION: usize = OFF_MAGIC + 8; // 24
const OFF_BLOCK_SIZE: usize = OFF_VERSION + 4; // 28
const OFF_BLOCK_COUNT: usize = OFF_BLOCK_SIZE + 4; // 32
const OFF_FIRST_TOC_ID: usize = OFF_BLOCK_COUNT + 8; // 40
const OFF_INDEX_ROOT_ID: usize = OFF_FIRST_TOC_ID + 8; // 48
const OFF_FREE_HEAD_ID: usize = OFF_INDEX_ROOT_ID + 8; // 56

/// Total size in bytes of the fields defined above (not counting padding to
/// `block_size`).
pub const HEADER_SIZE: usize = OFF_FREE_HEAD_ID + 8; // 64

pub fn magic(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_MAGIC..])
}

pub fn set_magic(buf: &mut [u8], v: u64) {
    LittleEndian::write_u64(&mut buf[OFF_MAGIC..], v);
}

pub fn version(buf: &[u8]) -> u32 {
    LittleEndian::read_u32(&buf[OFF_VERSION..])
}

pub fn set_version(buf: &mut [u8], v: u32) {
    LittleEndian::write_u32(&mut buf[OFF_VERSION..], v);
}

pub fn block_size(buf: &[u8]) -> u32 {
    LittleEndian::read_u32(&buf[OFF_BLOCK_SIZE..])
}

pub fn set_block_size(buf: &mut [u8], v: u32) {
    LittleEndian::write_u32(&mut buf[OFF_BLOCK_SIZE..], v);
}

pub fn block_count(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_BLOCK_COUNT..])
}

pub fn set_block_count(buf: &mut [u8], v: u64) {
    LittleEndian::write_u64(&mut buf[OFF_BLOCK_COUNT..], v);
}

pub fn first_toc_id(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_FIRST_TOC_ID..])
}

pub fn set_first_toc_id(buf: &mut [u8], v: u64) {
    LittleEndian::write_u64(&mut buf[OFF_FIRST_TOC_ID..], v);
}

pub fn index_root_id(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_INDEX_ROOT_ID..])
}

pub fn set_index_root_id(buf: &mut [u8], v: u64) {
    LittleEndian::write_u64(&mut buf[OFF_INDEX_ROOT_ID..], v);
}

pub fn free_head_id(buf: &[u8]) -> u64 {
    LittleEndian::read_u64(&buf[OFF_FREE_HEAD_ID..])
}

pub fn set_free_head_id(buf: &mut [u8], v: u64) {
    LittleEndian::write_u64(&mut buf[OFF_FREE_HEAD_ID..], v);
}
