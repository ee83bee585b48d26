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

//! Imports resolved during one evaluation pass

use crate::model::Element;
use indexmap::{IndexMap, IndexSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolved imports: every path once, plus per-label lists. The unlabeled
/// group uses the empty label.
///
/// The pass also records each `ItemGroup` and `ItemDefinitionGroup` it
/// reaches, with the file holding it, so items can later be read in the
/// same order as the property pass visited them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Imports {
    all: IndexSet<PathBuf>,
    groups: IndexMap<String, Vec<PathBuf>>,
    item_groups: Vec<(PathBuf, Arc<Element>)>,
}

impl Imports {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `path` was already imported
    pub fn contains(&self, path: &Path) -> bool {
        self.all.contains(path)
    }

    /// Record an import under `label`; returns false if the path was
    /// already present
    pub fn record(&mut self, label: &str, path: &Path) -> bool {
        if !self.all.insert(path.to_path_buf()) {
            return false;
        }
        self.groups
            .entry(label.to_string())
            .or_default()
            .push(path.to_path_buf());
        true
    }

    /// All imported paths in the order they were entered
    pub fn all(&self) -> impl Iterator<Item = &Path> {
        self.all.iter().map(PathBuf::as_path)
    }

    /// Paths imported under `label`
    pub fn group(&self, label: &str) -> &[PathBuf] {
        self.groups.get(label).map(Vec::as_slice).unwrap_or_default()
    }

    /// Labels in first-use order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Note an item-bearing group reached while evaluating `file`
    pub fn record_item_group(&mut self, file: &Path, group: &Arc<Element>) {
        self.item_groups.push((file.to_path_buf(), group.clone()));
    }

    /// Item-bearing groups in evaluation order, with their files
    pub fn item_groups(&self) -> impl Iterator<Item = (&Path, &Arc<Element>)> {
        self.item_groups
            .iter()
            .map(|(file, group)| (file.as_path(), group))
    }

    /// Number of distinct imported paths
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// Whether nothing was imported
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_dedups() {
        let mut imports = Imports::new();
        assert!(imports.record("", Path::new("/a.props")));
        assert!(imports.record("Shared", Path::new("/b.props")));
        assert!(!imports.record("Shared", Path::new("/a.props")));

        assert_eq!(imports.len(), 2);
        assert_eq!(imports.group("Shared"), &[PathBuf::from("/b.props")]);
        assert!(imports.group("Missing").is_empty());
        assert_eq!(imports.labels().collect::<Vec<_>>(), vec!["", "Shared"]);
    }

    #[test]
    fn test_item_groups_keep_order() {
        let mut imports = Imports::new();
        let first = Arc::new(Element::new("ItemGroup"));
        let second = Arc::new(Element::new("ItemDefinitionGroup"));
        imports.record_item_group(Path::new("/sdk/Sdk.props"), &first);
        imports.record_item_group(Path::new("/p/app.csproj"), &second);

        let seen: Vec<(&Path, &str)> = imports
            .item_groups()
            .map(|(file, group)| (file, group.name()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (Path::new("/sdk/Sdk.props"), "ItemGroup"),
                (Path::new("/p/app.csproj"), "ItemDefinitionGroup"),
            ]
        );
        assert!(imports.is_empty());
    }
}
