// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The typed value stored under a key: one of a 64-bit integer, a 64-bit
//! float, a UTF-8 string, or opaque bytes.

use crate::value_type::ValueType;
use byteorder::{ByteOrder, LittleEndian};

/// A value stored in the key-value store.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A signed 64-bit integer.
    Int64(i64),
    /// A 64-bit IEEE-754 float.
    Float64(f64),
    /// A UTF-8 string.
    String(String),
    /// Opaque bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the on-disk type tag for this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int64(_) => ValueType::Int64,
            Self::Float64(_) => ValueType::Float64,
            Self::String(_) => ValueType::String,
            Self::Bytes(_) => ValueType::Bytes,
        }
    }

    /// Serializes the value's payload (without its type tag) to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Int64(v) => {
                let mut buf = [0u8; 8];
                LittleEndian::write_i64(&mut buf, *v);
                buf.to_vec()
            }
            Self::Float64(v) => {
                let mut buf = [0u8; 8];
                LittleEndian::write_f64(&mut buf, *v);
                buf.to_vec()
            }
            Self::String(s) => s.as_bytes().to_vec(),
            Self::Bytes(b) => b.clone(),
        }
    }

    /// Reconstructs a value from its type tag and encoded payload.
    pub fn decode(value_type: ValueType, bytes: &[u8]) -> crate::Result<Self> {
        match value_type {
            ValueType::Int64 => {
                if bytes.len() != 8 {
                    return Err(crate::Error::Corrupt(
                        "Int64 payload is not 8 bytes".into(),
                    ));
                }
                Ok(Self::Int64(LittleEndian::read_i64(bytes)))
            }
            ValueType::Float64 => {
                if bytes.len() != 8 {
                    return Err(crate::Error::Corrupt(
                        "Float64 payload is not 8 bytes".into(),
                    ));
                }
                Ok(Self::Float64(LittleEndian::read_f64(bytes)))
            }
            ValueType::String => {
                let s = std::str::from_utf8(bytes)
                    .map_err(|e| crate::Error::Corrupt(format!("invalid utf-8: {e}")))?;
                Ok(Self::String(s.to_owned()))
            }
            ValueType::Bytes => Ok(Self::Bytes(bytes.to_vec())),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}
