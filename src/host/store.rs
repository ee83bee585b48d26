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

//! Key/value registry collaborator (the operating-system registry)

use crate::model::CaseInsensitiveMap;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// One key of the store: its named values and the names of its subkeys.
/// The default value of a key is stored under the empty name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryKey {
    /// Values by name
    pub values: CaseInsensitiveMap<String>,
    /// Subkey names
    pub subkeys: Vec<String>,
}

/// Hierarchical key/value store, queried by key path and view
/// (`Default`, `Registry32`, `Registry64`)
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// Look up a key; missing keys and failures yield `None`
    async fn get(&self, key: &str, view: &str) -> Option<RegistryKey>;
}

/// Store with no keys, used on hosts without a registry
#[derive(Debug, Clone, Copy, Default)]
pub struct NullKeyValueStore;

#[async_trait]
impl KeyValueStore for NullKeyValueStore {
    async fn get(&self, _key: &str, _view: &str) -> Option<RegistryKey> {
        None
    }
}

/// In-memory store, shared by every view
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    keys: RwLock<HashMap<String, RegistryKey>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set a value under a key
    pub fn with_value(self, key: &str, name: &str, value: &str) -> Self {
        self.set_value(key, name, value);
        self
    }

    /// Set a value under a key, creating the key and registering it as a
    /// subkey of its parent
    pub fn set_value(&self, key: &str, name: &str, value: &str) {
        let key = normalize_key(key);
        let mut keys = self.keys.write();
        if let Some((parent, child)) = key.rsplit_once('\\') {
            let parent_entry = keys.entry(parent.to_ascii_uppercase()).or_default();
            if !parent_entry
                .subkeys
                .iter()
                .any(|s| s.eq_ignore_ascii_case(child))
            {
                parent_entry.subkeys.push(child.to_string());
            }
        }
        keys.entry(key.to_ascii_uppercase())
            .or_default()
            .values
            .insert(name, value.to_string());
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str, _view: &str) -> Option<RegistryKey> {
        self.keys
            .read()
            .get(&normalize_key(key).to_ascii_uppercase())
            .cloned()
    }
}

/// Normalize separators and abbreviate hive names
pub fn normalize_key(key: &str) -> String {
    let key = key.trim().replace('/', "\\");
    let key = key.trim_matches('\\');
    let (hive, rest) = key.split_once('\\').unwrap_or((key, ""));
    let hive = match hive.to_ascii_uppercase().as_str() {
        "HKEY_LOCAL_MACHINE" => "HKLM".to_string(),
        "HKEY_CURRENT_USER" => "HKCU".to_string(),
        "HKEY_CLASSES_ROOT" => "HKCR".to_string(),
        "HKEY_USERS" => "HKU".to_string(),
        other => other.to_string(),
    };
    if rest.is_empty() {
        hive
    } else {
        format!("{hive}\\{rest}")
    }
}
