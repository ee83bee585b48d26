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

//! Item model and glob inclusion engine
//!
//! One [`Items`] collection exists per item type. It holds the item
//! definitions (metadata defaults guarded by a condition) and the entries
//! included so far. File-oriented collections key their entries by full path,
//! identifier-oriented ones by name; including an existing key merges
//! metadata into the entry instead of duplicating it.

pub mod metadata;
pub mod setting;
pub mod table;

pub use metadata::{MetadataSnapshot, evaluate_metadata};
pub use setting::{SettingTarget, add_setting};
pub use table::{ItemTable, read_items};

use crate::host::Host;
use crate::host::glob::{
    PatternSet, absolute_pattern, has_wildcard, path_to_pattern_text, recursive_dir, split_list,
};
use crate::model::Element;
use crate::registry::functions::msbuild::relative_path;
use crate::registry::functions::path::full_path;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static LINK_METADATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\(\s*(\w+)\s*\)").unwrap_or_else(|e| panic!("invalid link regex: {e}"))
});

/// How the entries of an item type are identified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Entries are files, keyed by full path
    File,
    /// Entries are identifiers (package names, capabilities), keyed by name
    Plain,
}

/// Metadata defaults for an item type
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDefinition {
    /// Condition guarding the defaults, as written
    pub condition: String,
    /// Whether the definition lives in the project file itself
    pub is_project: bool,
    /// Element whose children are the metadata defaults
    pub template: Arc<Element>,
}

/// One included item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemEntry {
    /// Display name: the relative path after link rewriting, or the
    /// identifier for plain items
    pub name: String,
    /// Absolute path for file items
    pub full_path: Option<PathBuf>,
    /// Path relative to the including project, or the identifier
    pub relative_path: String,
    /// Directory matched by the wildcard part of the include pattern
    pub recursive_dir: String,
    /// Metadata elements, in evaluation order
    pub metadata: Vec<Arc<Element>>,
    /// Item element that last included or updated the entry
    pub source: Option<Arc<Element>>,
}

impl ItemEntry {
    fn new(name: String, full_path: Option<PathBuf>, relative_path: String) -> Self {
        Self {
            name,
            full_path,
            relative_path,
            recursive_dir: String::new(),
            metadata: Vec::new(),
            source: None,
        }
    }

    /// Value of the `Identity` metadata
    pub fn identity(&self) -> &str {
        &self.relative_path
    }

    /// Merge the metadata children of `template`; same-named metadata is
    /// replaced
    fn merge(&mut self, template: &Arc<Element>) {
        for child in template.children() {
            self.metadata.retain(|existing| !existing.is(child.name()));
            self.metadata.push(child.clone());
        }
        self.source = Some(template.clone());
    }
}

/// Definitions and entries of one item type
#[derive(Debug, Clone, PartialEq)]
pub struct Items {
    name: String,
    kind: ItemKind,
    definitions: Vec<ItemDefinition>,
    entries: IndexMap<String, ItemEntry>,
}

impl Items {
    /// Create an empty collection
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            name: name.into(),
            kind,
            definitions: Vec::new(),
            entries: IndexMap::new(),
        }
    }

    /// Item type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry kind
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Definitions in the order they were added
    pub fn definitions(&self) -> &[ItemDefinition] {
        &self.definitions
    }

    /// Entries in inclusion order
    pub fn entries(&self) -> impl Iterator<Item = &ItemEntry> {
        self.entries.values()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a file path
    pub fn entry_for_path(&self, path: &Path) -> Option<&ItemEntry> {
        self.entries.get(&path_key(path))
    }

    /// Entry for an identifier
    pub fn entry_named(&self, name: &str) -> Option<&ItemEntry> {
        match self.kind {
            ItemKind::Plain => self.entries.get(&name.to_ascii_uppercase()),
            ItemKind::File => self.entries.values().find(|entry| entry.name == name),
        }
    }

    /// Append a definition
    pub fn add_definition(&mut self, condition: &str, template: Arc<Element>, is_project: bool) {
        self.definitions.push(ItemDefinition {
            condition: condition.trim().to_string(),
            is_project,
            template,
        });
    }

    /// Definition for the exact `(condition, is_project)` pair, created empty
    /// when missing
    pub fn definition_for(&mut self, condition: &str, is_project: bool) -> &mut ItemDefinition {
        let condition = condition.trim();
        let existing = self
            .definitions
            .iter()
            .position(|d| d.condition == condition && d.is_project == is_project);
        let index = match existing {
            Some(index) => index,
            None => {
                let template = Arc::new(Element::new(self.name.clone()));
                self.add_definition(condition, template, is_project);
                self.definitions.len() - 1
            }
        };
        &mut self.definitions[index]
    }

    /// Include the files matched by `include` under `base`, minus those
    /// matched by `exclude`. Returns the number of new entries.
    pub async fn include_files(
        &mut self,
        host: &Host,
        base: &Path,
        include: &str,
        exclude: Option<&str>,
        template: &Arc<Element>,
        link: Option<&str>,
    ) -> usize {
        let exclude_patterns: Vec<String> = exclude
            .map(|spec| split_list(spec).map(|p| absolute_pattern(base, p)).collect())
            .unwrap_or_default();
        let excluded = PatternSet::from_absolute(&exclude_patterns);

        let mut added = 0;
        for segment in split_list(include) {
            let pattern = absolute_pattern(base, segment);
            let paths = if has_wildcard(segment) {
                match host.fs.search(&pattern, &exclude_patterns).await {
                    Ok(paths) => paths,
                    Err(e) => {
                        log::warn!("{e}");
                        continue;
                    }
                }
            } else {
                vec![full_path(base, segment)]
            };

            for path in paths.into_iter().filter(|path| !excluded.matches(path)) {
                let recursive = recursive_dir(&pattern, &path_to_pattern_text(&path));
                if self.include_file(base, path, recursive, template, link) {
                    added += 1;
                }
            }
        }
        added
    }

    fn include_file(
        &mut self,
        base: &Path,
        path: PathBuf,
        recursive: String,
        template: &Arc<Element>,
        link: Option<&str>,
    ) -> bool {
        let key = path_key(&path);
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.merge(template);
            return false;
        }

        let relative = relative_path(base, &path).to_string_lossy().to_string();
        let name = link_name(link, &relative, &recursive);
        let mut entry = ItemEntry::new(name, Some(path), relative);
        entry.recursive_dir = recursive;
        entry.merge(template);
        self.entries.insert(key, entry);
        true
    }

    /// Drop entries whose full path matches `pattern`. Returns the number of
    /// entries removed.
    pub fn remove_files(&mut self, base: &Path, pattern: &str) -> usize {
        let patterns = PatternSet::new(base, pattern);
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            !entry
                .full_path
                .as_deref()
                .is_some_and(|path| patterns.matches(path))
        });
        before - self.entries.len()
    }

    /// Merge `template` into the entries matching `pattern` and recompute
    /// their names. Never adds or removes entries; returns the number of
    /// entries updated.
    pub fn update_files(
        &mut self,
        base: &Path,
        pattern: &str,
        template: &Arc<Element>,
        link: Option<&str>,
    ) -> usize {
        let patterns = PatternSet::new(base, pattern);
        let mut updated = 0;
        for entry in self.entries.values_mut() {
            let Some(path) = entry.full_path.clone() else {
                continue;
            };
            if !patterns.matches(&path) {
                continue;
            }
            entry.relative_path = relative_path(base, &path).to_string_lossy().to_string();
            entry.name = link_name(link, &entry.relative_path, &entry.recursive_dir);
            entry.merge(template);
            updated += 1;
        }
        updated
    }

    /// Include an identifier entry, merging into an existing one
    pub fn include_plain(&mut self, name: &str, template: &Arc<Element>) {
        let name = name.trim();
        let entry = self
            .entries
            .entry(name.to_ascii_uppercase())
            .or_insert_with(|| ItemEntry::new(name.to_string(), None, name.to_string()));
        entry.merge(template);
    }

    /// Remove the identifier entries listed in `names`
    pub fn remove_plain(&mut self, names: &str) -> usize {
        split_list(names)
            .filter(|name| self.entries.shift_remove(&name.to_ascii_uppercase()).is_some())
            .count()
    }

    /// Merge `template` into the identifier entries listed in `names`
    pub fn update_plain(&mut self, names: &str, template: &Arc<Element>) -> usize {
        let mut updated = 0;
        for name in split_list(names) {
            if let Some(entry) = self.entries.get_mut(&name.to_ascii_uppercase()) {
                entry.merge(template);
                updated += 1;
            }
        }
        updated
    }
}

fn path_key(path: &Path) -> String {
    let key = path.to_string_lossy().to_string();
    if cfg!(windows) {
        key.to_ascii_uppercase()
    } else {
        key
    }
}

/// Entry name after rewriting through `link`. `%(Extension)`, `%(Filename)`
/// and `%(RecursiveDir)` are taken from the unrewritten relative path.
pub fn link_name(link: Option<&str>, relative: &str, recursive: &str) -> String {
    let Some(link) = link.filter(|link| !link.trim().is_empty()) else {
        return relative.to_string();
    };
    let path = Path::new(relative);
    LINK_METADATA
        .replace_all(link, |captures: &regex::Captures<'_>| {
            match captures[1].to_ascii_lowercase().as_str() {
                "extension" => path
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default(),
                "filename" => path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default(),
                "recursivedir" => recursive.to_string(),
                _ => captures[0].to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryFileSystem;
    use pretty_assertions::assert_eq;

    fn template() -> Arc<Element> {
        Arc::new(Element::new("Compile"))
    }

    #[test]
    fn test_link_name() {
        assert_eq!(link_name(None, "src/a.cs", ""), "src/a.cs");
        assert_eq!(
            link_name(Some("Linked/%(RecursiveDir)%(Filename)%(Extension)"), "../shared/x/a.cs", "x/"),
            "Linked/x/a.cs"
        );
        assert_eq!(link_name(Some("%(Other)"), "a.cs", ""), "%(Other)");
    }

    #[test]
    fn test_definition_for_creates_once() {
        let mut items = Items::new("Compile", ItemKind::File);
        items.definition_for("'$(C)' == 'Debug'", true);
        items.definition_for(" '$(C)' == 'Debug' ", true);
        items.definition_for("'$(C)' == 'Debug'", false);
        assert_eq!(items.definitions().len(), 2);
        assert_eq!(items.definitions()[0].template.name(), "Compile");
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_include_exclude_and_merge() {
        let fs = MemoryFileSystem::new()
            .with_file("/r/a.cs", "")
            .with_file("/r/gen/b.cs", "")
            .with_file("/r/c.txt", "");
        let host = Host::in_memory(Arc::new(fs));
        let mut items = Items::new("Compile", ItemKind::File);

        let added = items
            .include_files(&host, Path::new("/r"), "**/*.cs", Some("gen/*.cs"), &template(), None)
            .await;
        assert_eq!(added, 1);

        let tagged = Arc::new(
            Element::new("Compile").with_child(Element::new("Visible").with_text("false")),
        );
        let added = items
            .include_files(&host, Path::new("/r"), "a.cs;missing.cs", None, &tagged, None)
            .await;
        assert_eq!(added, 1);
        assert_eq!(items.len(), 2);

        let a = items.entry_for_path(Path::new("/r/a.cs")).unwrap();
        assert_eq!(a.metadata.len(), 1);
        assert!(items.entry_for_path(Path::new("/r/missing.cs")).is_some());
    }

    #[test]
    fn test_plain_items_merge_by_name() {
        let mut items = Items::new("PackageReference", ItemKind::Plain);
        let versioned = Arc::new(
            Element::new("PackageReference").with_child(Element::new("Version").with_text("1.0")),
        );
        items.include_plain("Serilog", &template());
        items.include_plain("serilog", &versioned);
        items.include_plain("Dapper", &template());

        assert_eq!(items.len(), 2);
        assert_eq!(items.entry_named("SERILOG").unwrap().metadata.len(), 1);
        assert_eq!(items.update_plain("Dapper;Missing", &versioned), 1);
        assert_eq!(items.remove_plain("Serilog"), 1);
        assert_eq!(items.len(), 1);
    }
}
