// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Header Maps
//!
//! Case-insensitive token-to-token maps with unique keys, used for the raw
//! message headers and for the request and reply header sets exchanged
//! with the protocol layer. Lookup order is irrelevant; keys are unique
//! and inserting an existing key replaces its value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Case-insensitive header map.
///
/// Keys are folded to lowercase on insertion and lookup, so `Shm`,
/// `SHM`, and `shm` name the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeaderMap {
    entries: HashMap<String, String>,
}

impl HeaderMap {
    /// Creates an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header, replacing any existing value under the same
    /// case-folded key. Returns the replaced value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(name.as_ref().to_lowercase(), value.into())
    }

    /// Looks up a header value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Checks for a header
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_lowercase())
    }

    /// Removes a header, returning its value
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.remove(&name.to_lowercase())
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over case-folded names and values
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Moves every entry of `other` into this map, replacing duplicates
    pub fn merge(&mut self, other: HeaderMap) {
        self.entries.extend(other.entries);
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for HeaderMap {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut map = HeaderMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut headers = HeaderMap::new();
        headers.insert("Shm-Offset", "16");
        assert_eq!(headers.get("shm-offset"), Some("16"));
        assert_eq!(headers.get("SHM-OFFSET"), Some("16"));
        assert!(headers.contains("Shm-Offset"));
    }

    #[test]
    fn test_unique_keys() {
        let mut headers = HeaderMap::new();
        assert!(headers.insert("File", "/tmp/a.eml").is_none());
        assert_eq!(headers.insert("file", "/tmp/b.eml"), Some("/tmp/a.eml".to_string()));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("FILE"), Some("/tmp/b.eml"));
    }

    #[test]
    fn test_merge() {
        let mut headers: HeaderMap = [("a", "1"), ("b", "2")].into_iter().collect();
        let other: HeaderMap = [("B", "3"), ("c", "4")].into_iter().collect();
        headers.merge(other);
        assert_eq!(headers.get("b"), Some("3"));
        assert_eq!(headers.len(), 3);
    }
}
