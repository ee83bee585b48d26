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

//! Metadata evaluation for item definitions and entries

use super::{ItemEntry, Items};
use crate::evaluator::{Evaluator, OriginMap, PropertyContext, PropertyExpander};
use crate::host::FileStat;
use crate::model::{CaseInsensitiveMap, Element};
use crate::registry::functions::msbuild::ensure_trailing_slash_text;
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Component, Path};
use std::sync::Arc;

static METADATA_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\(\s*(?:([A-Za-z_][\w\-]*)\s*\.\s*)?([A-Za-z_][\w\-]*)\s*\)")
        .unwrap_or_else(|e| panic!("invalid metadata regex: {e}"))
});

/// Evaluated metadata of one definition set, optionally merged with one
/// entry's own metadata
#[derive(Debug, Clone, Default)]
pub struct MetadataSnapshot {
    /// Metadata values
    pub settings: CaseInsensitiveMap<String>,
    /// Element that produced each non-builtin value
    pub origins: OriginMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timestamp {
    Modified,
    Created,
    Accessed,
}

impl Timestamp {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "modifiedtime" => Some(Self::Modified),
            "createdtime" => Some(Self::Created),
            "accessedtime" => Some(Self::Accessed),
            _ => None,
        }
    }

    fn select(self, stat: &FileStat) -> Option<DateTime<Local>> {
        match self {
            Self::Created => stat.created,
            Self::Modified | Self::Accessed => stat.modified,
        }
    }
}

/// Evaluate the definitions of `items` whose conditions hold and, when
/// `entry` is given, the entry's own metadata plus the builtin metadata.
///
/// Values are substituted for `$(...)` first and `%(...)` second, against
/// the metadata computed so far in this pass.
pub async fn evaluate_metadata(
    evaluator: &Evaluator,
    properties: &PropertyContext,
    items: &Items,
    entry: Option<&ItemEntry>,
) -> MetadataSnapshot {
    let expander = evaluator.expander(properties);
    let mut snapshot = MetadataSnapshot::default();
    if let Some(entry) = entry {
        builtin_metadata(entry, &mut snapshot.settings);
    }

    let mut metadata: Vec<Arc<Element>> = Vec::new();
    for definition in items.definitions() {
        if expander.condition(&definition.condition).await {
            metadata.extend(definition.template.children().iter().cloned());
        }
    }
    if let Some(entry) = entry {
        metadata.extend(entry.metadata.iter().cloned());
    }

    for element in metadata {
        if !expander.condition(element.condition()).await {
            continue;
        }
        let value = expand(
            evaluator,
            &expander,
            items.name(),
            entry,
            &snapshot.settings,
            element.text(),
        )
        .await;
        snapshot.settings.insert(element.name(), value);
        snapshot.origins.insert(element.name(), element.clone());
    }
    snapshot
}

async fn expand(
    evaluator: &Evaluator,
    expander: &PropertyExpander<'_>,
    item_type: &str,
    entry: Option<&ItemEntry>,
    settings: &CaseInsensitiveMap<String>,
    text: &str,
) -> String {
    let text = expander.substitute(text, false).await;
    let references: Vec<(std::ops::Range<usize>, Option<String>, String)> = METADATA_REFERENCE
        .captures_iter(&text)
        .filter_map(|captures| {
            let range = captures.get(0)?.range();
            let qualifier = captures.get(1).map(|m| m.as_str().to_string());
            Some((range, qualifier, captures[2].to_string()))
        })
        .collect();
    if references.is_empty() {
        return text;
    }

    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for (range, qualifier, name) in references {
        result.push_str(&text[last..range.start]);
        last = range.end;

        let literal = &text[range.clone()];
        if qualifier.is_some_and(|q| !q.eq_ignore_ascii_case(item_type)) {
            result.push_str(literal);
            continue;
        }
        if let Some(value) = settings.get(&name) {
            result.push_str(value);
            continue;
        }
        if let Some(kind) = Timestamp::from_name(&name) {
            if let Some(value) = timestamp(evaluator, entry, kind).await {
                result.push_str(&value);
                continue;
            }
        }
        log::warn!("Metadata %({name}) referenced before it was defined");
        result.push_str(literal);
    }
    result.push_str(&text[last..]);
    result
}

async fn timestamp(
    evaluator: &Evaluator,
    entry: Option<&ItemEntry>,
    kind: Timestamp,
) -> Option<String> {
    let path = entry?.full_path.as_deref()?;
    let stat = evaluator.host().stats.get(path).await?;
    kind.select(&stat).map(|time| format_timestamp(&time))
}

/// `yyyy-MM-dd HH:mm:ss.fffffff`
pub fn format_timestamp(time: &DateTime<Local>) -> String {
    format!(
        "{}.{:07}",
        time.format("%Y-%m-%d %H:%M:%S"),
        time.timestamp_subsec_nanos() / 100
    )
}

fn builtin_metadata(entry: &ItemEntry, settings: &mut CaseInsensitiveMap<String>) {
    settings.insert("Identity", entry.identity().to_string());

    if let Some(path) = &entry.full_path {
        let relative = Path::new(&entry.relative_path);
        settings.insert("FullPath", path.to_string_lossy().to_string());
        settings.insert("RootDir", root_dir(path));
        settings.insert(
            "Filename",
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        settings.insert(
            "Extension",
            path.extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        );
        settings.insert(
            "RelativeDir",
            relative
                .parent()
                .map(|dir| ensure_trailing_slash_text(&dir.to_string_lossy()))
                .unwrap_or_default(),
        );
        settings.insert("Directory", directory(path));
        settings.insert("RecursiveDir", entry.recursive_dir.clone());
    }

    let defining = entry
        .source
        .as_ref()
        .and_then(|source| source.source())
        .map(Path::to_path_buf)
        .unwrap_or_default();
    settings.insert("DefiningProjectFullPath", defining.to_string_lossy().to_string());
    settings.insert(
        "DefiningProjectDirectory",
        defining
            .parent()
            .map(|dir| ensure_trailing_slash_text(&dir.to_string_lossy()))
            .unwrap_or_default(),
    );
    settings.insert(
        "DefiningProjectName",
        defining
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
    );
    settings.insert(
        "DefiningProjectExtension",
        defining
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
    );
}

/// Prefix and root of `path`, such as `/` or `C:\`
fn root_dir(path: &Path) -> String {
    path.components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect()
}

/// Directory of `path` without its root, with a trailing separator
fn directory(path: &Path) -> String {
    let Some(parent) = path.parent() else {
        return String::new();
    };
    let relative: std::path::PathBuf = parent
        .components()
        .skip_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect();
    ensure_trailing_slash_text(&relative.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::host::{Host, MemoryFileSystem};
    use crate::items::ItemKind;
    use pretty_assertions::assert_eq;

    fn evaluator() -> Evaluator {
        let fs = MemoryFileSystem::new().with_file("/p/src/a.cs", "");
        Evaluator::new(Host::in_memory(Arc::new(fs)), EvaluatorConfig::default())
    }

    fn metadata(name: &str, text: &str) -> Element {
        Element::new(name).with_text(text)
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_definitions_entry_and_builtins() {
        let evaluator = evaluator();
        let mut properties = PropertyContext::new();
        properties.set("Configuration", "Debug");

        let mut items = Items::new("Compile", ItemKind::File);
        items.add_definition(
            "'$(Configuration)' == 'Debug'",
            Arc::new(
                Element::new("Compile")
                    .with_child(metadata("Optimize", "false"))
                    .with_child(metadata("Label", "%(Filename)-$(Configuration)")),
            ),
            true,
        );
        items.add_definition(
            "'$(Configuration)' == 'Release'",
            Arc::new(Element::new("Compile").with_child(metadata("Optimize", "true"))),
            true,
        );

        let template = Arc::new(
            Element::new("Compile")
                .with_child(metadata("Optimize", "%(Optimize)!"))
                .with_child(metadata("Late", "%(NotYet)"))
                .with_source(Path::new("/p/app.csproj")),
        );
        items
            .include_files(evaluator.host(), Path::new("/p"), "src/*.cs", None, &template, None)
            .await;
        let entry = items.entry_for_path(Path::new("/p/src/a.cs")).unwrap().clone();

        let snapshot = evaluate_metadata(&evaluator, &properties, &items, Some(&entry)).await;
        let get = |name: &str| snapshot.settings.get(name).cloned().unwrap_or_default();

        assert_eq!(get("Optimize"), "false!");
        assert_eq!(get("Label"), "a-Debug");
        assert_eq!(get("Late"), "%(NotYet)");
        assert_eq!(get("FullPath"), "/p/src/a.cs");
        assert_eq!(get("RootDir"), "/");
        assert_eq!(get("Directory"), "p/src/");
        assert_eq!(get("RelativeDir"), "src/");
        assert_eq!(get("Extension"), ".cs");
        assert_eq!(get("DefiningProjectName"), "app");
        assert!(snapshot.origins.contains_key("Optimize"));
        assert!(!snapshot.origins.contains_key("FullPath"));
    }

    #[tokio::test]
    async fn test_definitions_only() {
        let evaluator = evaluator();
        let properties = PropertyContext::new();
        let mut items = Items::new("PackageReference", ItemKind::Plain);
        items.add_definition(
            "",
            Arc::new(Element::new("PackageReference").with_child(metadata("PrivateAssets", "all"))),
            false,
        );

        let snapshot = evaluate_metadata(&evaluator, &properties, &items, None).await;
        assert_eq!(snapshot.settings.get("PrivateAssets").map(String::as_str), Some("all"));
        assert!(snapshot.settings.get("Identity").is_none());
    }
}
