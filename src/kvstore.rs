// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The public façade: [`KvStore`] composes the block, file, allocator,
//! TOC, index and data layers into the operations described at the crate
//! root.

use std::collections::BTreeMap;
use std::path::Path;

use crate::block::{self, BlockType};
use crate::config::Config;
use crate::data;
use crate::error::{Error, Result};
use crate::header;
use crate::index;
use crate::key::Key;
use crate::like;
use crate::store_file::StoreFile;
use crate::toc;
use crate::value::Value;

/// A structural report produced by [`KvStore::analyze`]. Never mutates the
/// store; CRC failures are collected rather than raised, so one corrupt
/// block doesn't stop the rest of the report from being built.
#[derive(Debug, Clone)]
pub struct AnalyzeReport {
    pub magic_ok: bool,
    pub version: u32,
    pub block_count: u64,
    pub toc_chain_length: u64,
    pub histogram: BTreeMap<BlockType, u64>,
    pub crc_failures: Vec<u64>,
}

impl std::fmt::Display for AnalyzeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "magic: {}", if self.magic_ok { "ok" } else { "MISMATCH" })?;
        writeln!(f, "version: {}", self.version)?;
        writeln!(f, "blocks: {}", self.block_count)?;
        writeln!(f, "toc chain length: {}", self.toc_chain_length)?;
        writeln!(f, "block type histogram:")?;
        for (ty, count) in &self.histogram {
            writeln!(f, "  {ty:?}: {count}")?;
        }
        if self.crc_failures.is_empty() {
            writeln!(f, "crc: all blocks verified")?;
        } else {
            writeln!(f, "crc: {} block(s) failed verification: {:?}", self.crc_failures.len(), self.crc_failures)?;
        }
        Ok(())
    }
}

/// An open key-value store. Owns the memory-mapped backing file; all
/// operations go through this handle.
pub struct KvStore {
    inner: Option<StoreFile>,
}

impl KvStore {
    /// Creates a new store on disk per `config`, truncating any existing
    /// file at `config.path`.
    pub fn init(config: Config) -> Result<Self> {
        let mut store = StoreFile::create(&config)?;
        let block_count = store.block_count();

        let hdr = store.block_mut(0);
        block::init(hdr, 0, BlockType::FileHeader);
        header::set_magic(hdr, header::MAGIC);
        header::set_version(hdr, header::FORMAT_VERSION);
        header::set_block_size(hdr, config.block_size);
        header::set_block_count(hdr, block_count);
        header::set_first_toc_id(hdr, 1);
        header::set_index_root_id(hdr, 0);
        header::set_free_head_id(hdr, 0);
        block::sync_crc(hdr);

        toc::init_range(store.block_mut(1), 1, 0, block_count - 1, BlockType::Free);
        toc::set_entry(&mut store, 1, 0, BlockType::FileHeader)?;
        toc::set_entry(&mut store, 1, 1, BlockType::Toc)?;

        for id in (2..block_count).rev() {
            crate::alloc::free(&mut store, 1, id)?;
        }

        store.sync()?;
        log::info!("initialized store {:?} with {block_count} blocks", store.path());
        Ok(Self { inner: Some(store) })
    }

    /// Opens an existing store, validating its file header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = StoreFile::open(path)?;
        let hdr = store.block(0);

        if header::magic(hdr) != header::MAGIC {
            return Err(Error::BadMagic);
        }
        let version = header::version(hdr);
        if version > header::FORMAT_VERSION {
            return Err(Error::VersionMismatch { found: version, supported: header::FORMAT_VERSION });
        }
        if !block::verify_crc(hdr) {
            return Err(Error::Corrupt("file header crc mismatch".into()));
        }

        log::info!("opened store {:?}", store.path());
        Ok(Self { inner: Some(store) })
    }

    fn store(&self) -> Result<&StoreFile> {
        self.inner.as_ref().ok_or(Error::Closed)
    }

    fn store_mut(&mut self) -> Result<&mut StoreFile> {
        self.inner.as_mut().ok_or(Error::Closed)
    }

    fn first_toc_id(&self) -> Result<u64> {
        Ok(header::first_toc_id(self.store()?.block(0)))
    }

    fn root_id(&self) -> Result<u64> {
        Ok(header::index_root_id(self.store()?.block(0)))
    }

    fn set_root_id(&mut self, id: u64) -> Result<()> {
        let hdr = self.store_mut()?.block_mut(0);
        header::set_index_root_id(hdr, id);
        block::sync_crc(hdr);
        Ok(())
    }

    /// Returns whether `key` (case-insensitively) is present.
    pub fn exists(&self, key: &str) -> Result<bool> {
        let k = Key::new(key);
        Ok(index::search(self.store()?, self.root_id()?, &k)?.is_some())
    }

    /// Reads the value stored under `key`.
    pub fn get(&self, key: &str) -> Result<Value> {
        let k = Key::new(key);
        let entry = index::search(self.store()?, self.root_id()?, &k)?.ok_or(Error::NotFound)?;
        data::get(self.store()?, entry.data_block, entry.row_id)
    }

    /// Reads the value stored under `key`, requiring it to be an `Int64`.
    pub fn get_int64(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            Value::Int64(v) => Ok(v),
            other => Err(Error::TypeMismatch { stored: other.value_type(), requested: crate::ValueType::Int64 }),
        }
    }

    /// Reads the value stored under `key`, requiring it to be a `Float64`.
    pub fn get_float64(&self, key: &str) -> Result<f64> {
        match self.get(key)? {
            Value::Float64(v) => Ok(v),
            other => Err(Error::TypeMismatch { stored: other.value_type(), requested: crate::ValueType::Float64 }),
        }
    }

    /// Reads the value stored under `key`, requiring it to be a `String`.
    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            Value::String(v) => Ok(v),
            other => Err(Error::TypeMismatch { stored: other.value_type(), requested: crate::ValueType::String }),
        }
    }

    /// Reads the value stored under `key`, requiring it to be `Bytes`.
    pub fn get_bytes(&self, key: &str) -> Result<Vec<u8>> {
        match self.get(key)? {
            Value::Bytes(v) => Ok(v),
            other => Err(Error::TypeMismatch { stored: other.value_type(), requested: crate::ValueType::Bytes }),
        }
    }

    /// Inserts a new key. Fails with [`Error::AlreadyExists`] if `key` is
    /// already present.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let k = Key::new(key);
        let block_size = self.store()?.block_size();
        if !index::key_fits(block_size, &k) {
            return Err(Error::KeyTooLarge);
        }

        let root = self.root_id()?;
        if index::search(self.store()?, root, &k)?.is_some() {
            return Err(Error::AlreadyExists);
        }

        let value = value.into();
        let first_toc = self.first_toc_id()?;
        let (block_id, row_id) = data::put(self.store_mut()?, first_toc, &value)?;

        let outcome = index::insert(self.store_mut()?, first_toc, root, k, block_id, row_id, false)?;
        if let Some(new_root) = outcome.new_root {
            self.set_root_id(new_root)?;
        }
        self.store_mut()?.sync()?;
        Ok(())
    }

    /// Replaces the value stored under an existing `key`.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let k = Key::new(key);
        let root = self.root_id()?;
        let existing = index::search(self.store()?, root, &k)?.ok_or(Error::NotFound)?;

        let first_toc = self.first_toc_id()?;
        data::overwrite(self.store_mut()?, first_toc, existing.data_block, existing.row_id, &value.into())?;
        self.store_mut()?.sync()?;
        Ok(())
    }

    /// Removes `key` and frees its value.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let k = Key::new(key);
        let root = self.root_id()?;
        let first_toc = self.first_toc_id()?;

        let outcome = index::delete(self.store_mut()?, first_toc, root, &k)?;
        data::free_chain(self.store_mut()?, first_toc, outcome.removed.data_block, outcome.removed.row_id)?;
        if let Some(new_root) = outcome.new_root {
            self.set_root_id(new_root)?;
        }
        self.store_mut()?.sync()?;
        Ok(())
    }

    /// Returns every key matching a SQL-style `LIKE` `pattern` (`%` any
    /// byte run, `_` any single byte), in ascending order.
    pub fn filter(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = pattern.to_lowercase();
        let root = self.root_id()?;
        let mut out = Vec::new();
        index::for_each_entry(self.store()?, root, |entry| {
            if like::matches(&pattern, entry.key.as_str()) {
                out.push(entry.key.as_str().to_owned());
            }
            Ok(())
        })?;
        Ok(out)
    }

    /// Produces a structural report: header validity, block counts, the
    /// TOC type histogram, and per-block CRC verification. Never mutates
    /// the store and never stops at the first corrupt block.
    pub fn analyze(&self) -> Result<AnalyzeReport> {
        let store = self.store()?;
        let hdr = store.block(0);
        let first_toc = header::first_toc_id(hdr);

        let crc_failures = (0..store.block_count())
            .filter(|&id| !block::verify_crc(store.block(id)))
            .collect();

        Ok(AnalyzeReport {
            magic_ok: header::magic(hdr) == header::MAGIC,
            version: header::version(hdr),
            block_count: store.block_count(),
            toc_chain_length: toc::chain_length(store, first_toc)?,
            histogram: toc::histogram(store, first_toc)?,
            crc_failures,
        })
    }

    /// Flushes pending mutations and releases the mapping. Subsequent
    /// operations on this handle fail with [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut store) = self.inner.take() {
            store.sync()?;
            log::info!("closed store {:?}", store.path());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn temp_config() -> crate::Result<(tempfile::TempDir, Config)> {
        let dir = tempfile::tempdir()?;
        let config = Config::new(dir.path().join("t.pkv"));
        Ok((dir, config))
    }

    #[test]
    fn init_then_insert_get_roundtrip() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let mut store = KvStore::init(config)?;
        store.insert("Newton", 0.98_f64)?;
        assert_eq!(store.get("newton")?, Value::Float64(0.98));
        Ok(())
    }

    #[test]
    fn typed_getter_rejects_wrong_type() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let mut store = KvStore::init(config)?;
        store.insert("newton", 0.98_f64)?;
        assert_eq!(store.get_float64("newton")?, 0.98);
        let err = store.get_int64("newton").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        Ok(())
    }

    #[test]
    fn insert_duplicate_fails() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let mut store = KvStore::init(config)?;
        store.insert("bert", "ernie")?;
        let err = store.insert("BERT", "oops").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists));
        Ok(())
    }

    #[test]
    fn delete_then_exists_false() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let mut store = KvStore::init(config)?;
        store.insert("bert", "ernie")?;
        store.insert("donald", "duck")?;
        store.delete("bert")?;
        assert!(!store.exists("BERT")?);
        assert_eq!(store.get("donald")?, Value::String("duck".into()));
        Ok(())
    }

    #[test]
    fn set_changes_value_and_type() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let mut store = KvStore::init(config)?;
        store.insert("k", 1_i64)?;
        store.set("k", "now a string")?;
        assert_eq!(store.get("k")?, Value::String("now a string".into()));
        Ok(())
    }

    #[test]
    fn filter_returns_ascending_matches() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let mut store = KvStore::init(config)?;
        for i in 0..20 {
            store.insert(&format!("k_{i}"), i as i64)?;
        }
        let mut matches = store.filter("k_1%")?;
        matches.sort();
        assert!(matches.contains(&"k_1".to_string()));
        assert!(matches.contains(&"k_19".to_string()));
        assert!(!matches.iter().any(|k| k == "k_2"));
        Ok(())
    }

    #[test]
    fn open_rejects_bad_magic() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let path = config.path.clone();
        let mut store = KvStore::init(config)?;
        store.close()?;

        {
            let mut reopened = StoreFile::open(&path)?;
            let hdr = reopened.block_mut(0);
            header::set_magic(hdr, 0xDEAD_BEEF);
            block::sync_crc(hdr);
            reopened.sync()?;
        }

        let err = KvStore::open(&path).unwrap_err();
        assert!(matches!(err, Error::BadMagic));
        Ok(())
    }

    #[test]
    fn closed_store_rejects_further_operations() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let mut store = KvStore::init(config)?;
        store.close()?;
        let err = store.insert("a", 1_i64).unwrap_err();
        assert!(matches!(err, Error::Closed));
        Ok(())
    }

    #[test]
    fn analyze_reports_clean_store() -> crate::Result<()> {
        let (_dir, config) = temp_config()?;
        let mut store = KvStore::init(config)?;
        store.insert("a", 1_i64)?;
        let report = store.analyze()?;
        assert!(report.magic_ok);
        assert!(report.crc_failures.is_empty());
        Ok(())
    }
}
