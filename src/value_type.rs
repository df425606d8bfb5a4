// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The type tag stored alongside every row in a data block.

/// The on-disk type tag of a stored [`Value`](crate::Value).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum ValueType {
    /// A little-endian signed 64-bit integer.
    Int64 = 0,
    /// An IEEE-754 binary64 float, little-endian.
    Float64 = 1,
    /// UTF-8 text.
    String = 2,
    /// Opaque bytes.
    Bytes = 3,
}

impl TryFrom<u8> for ValueType {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Int64),
            1 => Ok(Self::Float64),
            2 => Ok(Self::String),
            3 => Ok(Self::Bytes),
            other => Err(crate::Error::Corrupt(format!(
                "unknown value type tag {other}"
            ))),
        }
    }
}

impl From<ValueType> for u8 {
    fn from(value: ValueType) -> Self {
        value as u8
    }
}
