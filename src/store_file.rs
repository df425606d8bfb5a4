// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! File backing: opens or creates the store file, memory-maps it, and hands
//! out block-sized slices by id.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::MmapMut;

use crate::block;
use crate::config::{Config, MIN_BLOCKS};
use crate::header;

/// Owns the store's file descriptor and its memory map. All block-typed
/// views into the store are non-owning slices borrowed from this mapping,
/// valid for as long as the `StoreFile` lives.
pub struct StoreFile {
    file: File,
    map: MmapMut,
    block_size: u32,
    block_count: u64,
    path: PathBuf,
}

impl StoreFile {
    /// Opens an existing store file and maps it. Does not validate the
    /// header; callers (`KvStore::open`) do that after mapping.
    pub fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    crate::Error::NotFound
                } else {
                    crate::Error::IoError(e)
                }
            })?;

        let len = file.metadata()?.len();
        if len < header::HEADER_SIZE as u64 {
            return Err(crate::Error::BadMagic);
        }

        // SAFETY: `map` is the sole owner of this mapping for the lifetime
        // of the `StoreFile`; no other process or thread maps this file
        // concurrently (single-writer model, see spec §5).
        let map = unsafe { MmapMut::map_mut(&file)? };

        let block_size = header::block_size(&map[..header::HEADER_SIZE]);
        let block_size = if block_size == 0 { 4096 } else { block_size };
        let block_count = len / u64::from(block_size);

        Ok(Self {
            file,
            map,
            block_size,
            block_count,
            path: path.to_path_buf(),
        })
    }

    /// Creates (truncating if it exists) a store file sized per `config`,
    /// zeroes it, and leaves block 0 and block 1 uninitialized for the
    /// caller (`KvStore::init`) to fill in. Blocks `2..block_count` are left
    /// zeroed; the caller is responsible for formatting them as Free and
    /// recording them in the TOC.
    pub fn create(config: &Config) -> crate::Result<Self> {
        if config.min_size_bytes > 0 && config.block_size == 0 {
            return Err(crate::Error::InvalidArgument(
                "block_size must be nonzero".into(),
            ));
        }

        let block_size = u64::from(config.block_size);
        let min_blocks = MIN_BLOCKS;
        let wanted_blocks = config.min_size_bytes.div_ceil(block_size);
        let block_count = wanted_blocks.max(min_blocks);
        let size = block_count * block_size;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&config.path)?;

        // Extend the file to its full size by writing a single sentinel
        // byte at the last offset, mirroring a whole-file preallocation.
        file.seek(SeekFrom::Start(size - 1))?;
        file.write_all(&[0u8])?;
        file.flush()?;

        // SAFETY: sole owner of the mapping, see `open`.
        let map = unsafe { MmapMut::map_mut(&file)? };

        log::debug!(
            "created store file {:?} with {block_count} blocks of {block_size} bytes",
            config.path
        );

        Ok(Self {
            file,
            map,
            block_size: config.block_size,
            block_count,
            path: config.path.clone(),
        })
    }

    /// Block size in bytes.
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Total number of blocks currently backing the file.
    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns an immutable view of block `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= block_count()`; an out-of-range block id is a
    /// programmer error, not a recoverable condition.
    pub fn block(&self, id: u64) -> &[u8] {
        let (start, end) = self.range(id);
        &self.map[start..end]
    }

    /// Returns a mutable view of block `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id >= block_count()`.
    pub fn block_mut(&mut self, id: u64) -> &mut [u8] {
        let (start, end) = self.range(id);
        &mut self.map[start..end]
    }

    fn range(&self, id: u64) -> (usize, usize) {
        assert!(
            id < self.block_count,
            "block id {id} out of range (block_count={})",
            self.block_count
        );
        let start = (id * u64::from(self.block_size)) as usize;
        (start, start + self.block_size as usize)
    }

    /// Grows the backing file by doubling its block count, extending the
    /// file and remapping it. Newly added blocks are zeroed.
    pub fn grow(&mut self) -> crate::Result<std::ops::Range<u64>> {
        let old_blocks = self.block_count;
        let new_blocks = old_blocks * 2;
        let new_size = new_blocks * u64::from(self.block_size);

        self.file.set_len(new_size)?;
        // SAFETY: remapping replaces the only outstanding mapping; no
        // block views outlive this call (the borrow checker enforces this
        // through `&mut self`).
        self.map = unsafe { MmapMut::map_mut(&self.file)? };
        self.block_count = new_blocks;

        let hdr = self.block_mut(0);
        header::set_block_count(hdr, new_blocks);
        block::sync_crc(hdr);

        log::debug!("grew store file from {old_blocks} to {new_blocks} blocks");

        Ok(old_blocks..new_blocks)
    }

    /// Flushes all dirty pages synchronously.
    pub fn sync(&mut self) -> crate::Result<()> {
        self.map.flush()?;
        Ok(())
    }

    /// Recomputes and stores the CRC of block `id`.
    pub fn sync_block_crc(&mut self, id: u64) {
        block::sync_crc(self.block_mut(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn create_rounds_up_to_min_blocks() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::new(dir.path().join("t.pkv"));
        let file = StoreFile::create(&config)?;
        assert_eq!(file.block_count(), MIN_BLOCKS);
        assert_eq!(file.block_size(), 4096);
        Ok(())
    }

    #[test]
    fn create_rounds_up_requested_size() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::new(dir.path().join("t.pkv")).min_size_bytes(100_000);
        let file = StoreFile::create(&config)?;
        // ceil(100_000 / 4096) = 25
        assert_eq!(file.block_count(), 25);
        Ok(())
    }

    #[test]
    fn grow_doubles_block_count() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::new(dir.path().join("t.pkv"));
        let mut file = StoreFile::create(&config)?;
        let before = file.block_count();
        let added = file.grow()?;
        assert_eq!(file.block_count(), before * 2);
        assert_eq!(added, before..before * 2);
        Ok(())
    }

    #[test]
    fn open_missing_file_is_not_found() {
        let err = StoreFile::open("/nonexistent/path/to/store.pkv").unwrap_err();
        assert!(matches!(err, crate::Error::NotFound));
    }
}
