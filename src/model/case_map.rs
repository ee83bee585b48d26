// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Case-insensitive keyed map
//!
//! Property and metadata names in build files are case-insensitive. Keys are
//! stored uppercased; the casing of the most recent write is kept alongside
//! for display.

use indexmap::IndexMap;
use indexmap::map::Entry;

/// Insertion-ordered map with case-insensitive string keys
#[derive(Debug, Clone, PartialEq)]
pub struct CaseInsensitiveMap<V> {
    entries: IndexMap<String, (String, V)>,
}

impl<V> Default for CaseInsensitiveMap<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<V> CaseInsensitiveMap<V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get a value by key, ignoring case
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries
            .get(&key.to_ascii_uppercase())
            .map(|(_, value)| value)
    }

    /// Get a mutable value by key, ignoring case
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries
            .get_mut(&key.to_ascii_uppercase())
            .map(|(_, value)| value)
    }

    /// Whether a key is present, ignoring case
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_ascii_uppercase())
    }

    /// Insert a value; the last write wins, including its key casing
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        match self.entries.entry(key.to_ascii_uppercase()) {
            Entry::Occupied(mut occupied) => {
                let (_, old) = occupied.insert((key, value));
                Some(old)
            }
            Entry::Vacant(vacant) => {
                vacant.insert((key, value));
                None
            }
        }
    }

    /// Remove a value, preserving the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries
            .shift_remove(&key.to_ascii_uppercase())
            .map(|(_, value)| value)
    }

    /// Keys with their original casing
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(|(key, _)| key.as_str())
    }

    /// Uppercased keys
    pub fn upper_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate `(original key, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries
            .values()
            .map(|(key, value)| (key.as_str(), value))
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for CaseInsensitiveMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}
