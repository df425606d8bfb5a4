// Copyright (c) 2026-present, pagekv
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The canonicalized key type: keys are lowercased on construction, and all
//! ordering and equality compares the lowercased form only.

/// A printable key, canonicalized to lowercase. Ordering and equality are
/// byte-lex over the canonicalized form.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Key(String);

impl Key {
    /// Builds a key from `s`, lowercasing it.
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_lowercase())
    }

    /// Returns the canonicalized key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns the canonicalized key as a `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a key from raw, already-canonicalized bytes read back from a
    /// block (e.g. an index leaf entry). The bytes are assumed to already be
    /// lowercase UTF-8, since only [`Key::new`] ever writes keys to disk.
    pub fn from_canonical_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| crate::Error::Corrupt(format!("key is not valid utf-8: {e}")))?;
        Ok(Self(s.to_owned()))
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Key({:?})", self.0)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn lowercases_on_construction() {
        assert_eq!(Key::new("Newton").as_str(), "newton");
        assert_eq!(Key::new("BERT"), Key::new("bert"));
    }

    #[test]
    fn orders_byte_lexically() {
        assert!(Key::new("a") < Key::new("b"));
        assert!(Key::new("Apple") < Key::new("banana"));
    }
}
