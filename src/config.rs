// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Store configuration: where the file lives, how big to make it, and what
//! block size to use.

use std::path::{Path, PathBuf};

use crate::kvstore::KvStore;

/// The default block size: one 4 KiB page.
pub const DEFAULT_BLOCK_SIZE: u32 = 4_096;

/// The minimum number of blocks any store is created with, regardless of
/// `min_size_bytes`.
pub const MIN_BLOCKS: u64 = 8;

/// Builder for opening or creating a [`KvStore`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Path to the store file.
    pub path: PathBuf,

    /// Minimum size, in bytes, to create the file with. Actual size is
    /// rounded up to a whole number of blocks and clamped to at least
    /// [`MIN_BLOCKS`] blocks.
    pub min_size_bytes: u64,

    /// Block size in bytes. Must be a power of two, at least 512 bytes, and
    /// at most 65536 (block-internal offsets are stored as `u16`).
    pub block_size: u32,
}

impl Config {
    /// Starts a new config pointing at `path`, with default block size and
    /// no minimum size (i.e. [`MIN_BLOCKS`] blocks).
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            min_size_bytes: 0,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Sets the minimum file size in bytes.
    ///
    /// The actual file size will be `max(MIN_BLOCKS, ceil(min_size_bytes /
    /// block_size)) * block_size`.
    #[must_use]
    pub fn min_size_bytes(mut self, bytes: u64) -> Self {
        self.min_size_bytes = bytes;
        self
    }

    /// Sets the block size.
    ///
    /// Defaults to 4 KiB.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is not a power of two, or falls outside
    /// `512..=65536`.
    #[must_use]
    pub fn block_size(mut self, block_size: u32) -> Self {
        assert!(
            block_size.is_power_of_two(),
            "block_size must be a power of two"
        );
        assert!(
            (512..=65_536).contains(&block_size),
            "block_size must be between 512 and 65536 bytes"
        );
        self.block_size = block_size;
        self
    }

    /// Creates a new store file using this config, truncating any existing
    /// file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidArgument`] or
    /// [`crate::Error::IoError`] on failure.
    pub fn create(self) -> crate::Result<KvStore> {
        KvStore::init(self)
    }

    /// Opens an existing store file using this config's `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`], [`crate::Error::BadMagic`],
    /// [`crate::Error::VersionMismatch`], or [`crate::Error::IoError`] on
    /// failure.
    pub fn open(self) -> crate::Result<KvStore> {
        KvStore::open(self.path)
    }
}
