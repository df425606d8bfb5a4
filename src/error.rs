// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::value_type::ValueType;

/// Represents errors that can occur while operating on a [`KvStore`](crate::KvStore).
#[derive(Debug)]
pub enum Error {
    /// The store file does not exist.
    NotFound,

    /// `insert` was called with a key that already exists.
    AlreadyExists,

    /// `get` requested a type different from the stored tag.
    TypeMismatch {
        /// The type tag actually stored.
        stored: ValueType,
        /// The type the caller asked for.
        requested: ValueType,
    },

    /// The key alone exceeds the usable leaf payload.
    KeyTooLarge,

    /// No free block is available and the store may not grow further.
    Exhausted,

    /// The file header's magic constant did not match on `open`.
    BadMagic,

    /// The file header's format version is not supported by this build.
    VersionMismatch {
        /// The version found in the file.
        found: u32,
        /// The highest version this build understands.
        supported: u32,
    },

    /// A CRC mismatch or structural inconsistency was discovered while
    /// traversing the store.
    Corrupt(String),

    /// An underlying OS error (open/read/write/mmap/msync/ftruncate/close).
    IoError(std::io::Error),

    /// An argument passed to `init`/`open`/`Config` was invalid.
    InvalidArgument(String),

    /// The operation was attempted after the store was closed.
    Closed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key or file not found"),
            Self::AlreadyExists => write!(f, "key already exists"),
            Self::TypeMismatch { stored, requested } => write!(
                f,
                "type mismatch: stored value is {stored:?}, requested {requested:?}"
            ),
            Self::KeyTooLarge => write!(f, "key exceeds usable leaf payload"),
            Self::Exhausted => write!(f, "no free block available"),
            Self::BadMagic => write!(f, "bad file magic"),
            Self::VersionMismatch { found, supported } => write!(
                f,
                "format version {found} is newer than the {supported} this build supports"
            ),
            Self::Corrupt(msg) => write!(f, "store corrupt: {msg}"),
            Self::IoError(e) => write!(f, "io error: {e}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Closed => write!(f, "store is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

/// `KvStore` result.
pub type Result<T> = std::result::Result<T, Error>;
