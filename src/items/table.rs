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

//! Item walk over a project and its imports

use super::{ItemKind, Items};
use crate::evaluator::{Evaluation, Evaluator, PropertyContext};
use crate::host::glob::split_list;
use crate::model::Element;
use indexmap::IndexMap;
use std::path::Path;
use std::sync::Arc;

/// Attributes of an item element that are operations rather than metadata
const ITEM_OPERATIONS: &[&str] = &[
    "Include",
    "Exclude",
    "Remove",
    "Update",
    "Condition",
    "KeepMetadata",
    "RemoveMetadata",
    "KeepDuplicates",
    "MatchOnMetadata",
    "MatchOnMetadataOptions",
];

/// Item collections of a project, keyed case-insensitively by item type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemTable {
    items: IndexMap<String, Items>,
}

impl ItemTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Collection for an item type
    pub fn get(&self, item_type: &str) -> Option<&Items> {
        self.items.get(&item_type.to_ascii_uppercase())
    }

    /// Mutable collection for an item type
    pub fn get_mut(&mut self, item_type: &str) -> Option<&mut Items> {
        self.items.get_mut(&item_type.to_ascii_uppercase())
    }

    /// Collection for an item type, created empty when missing
    pub fn items_mut(&mut self, item_type: &str, kind: ItemKind) -> &mut Items {
        self.items
            .entry(item_type.to_ascii_uppercase())
            .or_insert_with(|| Items::new(item_type, kind))
    }

    /// Collections in first-use order
    pub fn iter(&self) -> impl Iterator<Item = &Items> {
        self.items.values()
    }

    /// Number of item types
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no item type was seen
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Apply the item groups and definition groups of an evaluated project in
/// the order the property pass reached them, so an import's items land
/// where its `<Import>` stands. Conditions are checked against the final
/// property table; relative item paths resolve against the project
/// directory.
pub async fn read_items(evaluator: &Evaluator, evaluation: &Evaluation) -> ItemTable {
    let mut table = ItemTable::new();
    let mut properties = evaluation.properties.clone();
    let base = properties.base_directory();
    let project_path = evaluation.project.path();

    for (file, group) in evaluation.imports.item_groups() {
        let saved = properties.set_file_context(file);
        apply_group(
            evaluator,
            &mut table,
            &properties,
            group,
            &base,
            file == project_path,
        )
        .await;
        properties.restore_file_context(saved);
    }
    table
}

async fn apply_group(
    evaluator: &Evaluator,
    table: &mut ItemTable,
    properties: &PropertyContext,
    group: &Element,
    base: &Path,
    is_project: bool,
) {
    if group.is("ItemDefinitionGroup") {
        for definition in group.children() {
            let condition = combine_conditions(group.condition(), definition.condition());
            let kind = item_kind(evaluator, definition.name());
            let template = Arc::new(metadata_template(definition));
            table
                .items_mut(definition.name(), kind)
                .add_definition(&condition, template, is_project);
        }
        return;
    }

    let expander = evaluator.expander(properties);
    if !expander.condition(group.condition()).await {
        return;
    }
    for item in group.children() {
        if expander.condition(item.condition()).await {
            apply_item(evaluator, table, properties, item, base).await;
        }
    }
}

async fn apply_item(
    evaluator: &Evaluator,
    table: &mut ItemTable,
    properties: &PropertyContext,
    item: &Arc<Element>,
    base: &Path,
) {
    let expander = evaluator.expander(properties);
    let kind = item_kind(evaluator, item.name());
    let template = if has_metadata_attributes(item) {
        Arc::new(metadata_template(item))
    } else {
        item.clone()
    };
    let link = match template.children_named("Link").next() {
        Some(link) => Some(expander.substitute(link.text(), false).await),
        None => None,
    };

    let items = table.items_mut(item.name(), kind);
    if let Some(include) = item.attribute("Include") {
        let include = expander.substitute(include, false).await;
        let exclude = match item.attribute("Exclude") {
            Some(exclude) => Some(expander.substitute(exclude, false).await),
            None => None,
        };
        match kind {
            ItemKind::File => {
                items
                    .include_files(
                        evaluator.host(),
                        base,
                        &include,
                        exclude.as_deref(),
                        &template,
                        link.as_deref(),
                    )
                    .await;
            }
            ItemKind::Plain => {
                let excluded: Vec<String> = exclude
                    .as_deref()
                    .map(|e| split_list(e).map(str::to_ascii_uppercase).collect())
                    .unwrap_or_default();
                for name in split_list(&include) {
                    if !excluded.contains(&name.to_ascii_uppercase()) {
                        items.include_plain(name, &template);
                    }
                }
            }
        }
    } else if let Some(remove) = item.attribute("Remove") {
        let remove = expander.substitute(remove, false).await;
        let removed = match kind {
            ItemKind::File => items.remove_files(base, &remove),
            ItemKind::Plain => items.remove_plain(&remove),
        };
        log::debug!("Removed {removed} {} item(s) matching \"{remove}\"", item.name());
    } else if let Some(update) = item.attribute("Update") {
        let update = expander.substitute(update, false).await;
        let updated = match kind {
            ItemKind::File => items.update_files(base, &update, &template, link.as_deref()),
            ItemKind::Plain => items.update_plain(&update, &template),
        };
        log::debug!("Updated {updated} {} item(s) matching \"{update}\"", item.name());
    } else {
        log::warn!("<{}> item without Include, Remove or Update ignored", item.name());
    }
}

fn item_kind(evaluator: &Evaluator, item_type: &str) -> ItemKind {
    if evaluator.config().is_plain_item_type(item_type) {
        ItemKind::Plain
    } else {
        ItemKind::File
    }
}

fn is_operation(attribute: &str) -> bool {
    ITEM_OPERATIONS
        .iter()
        .any(|operation| operation.eq_ignore_ascii_case(attribute))
}

fn has_metadata_attributes(item: &Element) -> bool {
    item.attributes().iter().any(|(name, _)| !is_operation(name))
}

/// Copy of `item` whose metadata attributes are turned into metadata
/// children; existing children are shared, not copied
fn metadata_template(item: &Element) -> Element {
    let mut template = Element::new(item.name());
    for (name, value) in item.attributes() {
        if is_operation(name) {
            template.set_attribute(name.clone(), value.clone());
        }
    }
    if let Some(source) = item.source() {
        template = template.with_source(source);
    }
    for (name, value) in item.attributes() {
        if !is_operation(name) {
            template.push_child(Element::new(name.clone()).with_text(value.clone()));
        }
    }
    for child in item.children() {
        template.push_shared_child(child.clone());
    }
    template
}

/// Conjunction of two conditions, either of which may be empty
pub fn combine_conditions(outer: &str, inner: &str) -> String {
    match (outer.trim(), inner.trim()) {
        ("", inner) => inner.to_string(),
        (outer, "") => outer.to_string(),
        (outer, inner) => format!("({outer}) And ({inner})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvaluatorConfig, ToolchainPaths};
    use crate::host::{Host, MemoryFileSystem};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn test_combine_conditions() {
        assert_eq!(combine_conditions("", " 'a'=='a' "), "'a'=='a'");
        assert_eq!(combine_conditions("x", ""), "x");
        assert_eq!(combine_conditions("x", "y"), "(x) And (y)");
    }

    #[test]
    fn test_metadata_template_from_attributes() {
        let item = Element::new("Compile")
            .with_attribute("Include", "*.cs")
            .with_attribute("Visible", "false")
            .with_child(Element::new("Link").with_text("x"));
        let template = metadata_template(&item);

        assert_eq!(template.attribute("Include"), Some("*.cs"));
        assert_eq!(template.attribute("Visible"), None);
        let names: Vec<&str> = template.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Visible", "Link"]);
        assert!(Arc::ptr_eq(&template.children()[1], &item.children()[0]));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_read_items_over_imports() {
        let fs = MemoryFileSystem::new()
            .with_file("/p/a.cs", "")
            .with_file("/p/b.cs", "")
            .with_file(
                "/p/common.props",
                r#"<Project>
                    <ItemGroup><PackageReference Include="Serilog" Version="3.0" /></ItemGroup>
                    <ItemGroup><Compile Remove="b.cs" /></ItemGroup>
                </Project>"#,
            )
            .with_file(
                "/p/app.csproj",
                r#"<Project>
                    <ItemDefinitionGroup Condition="'$(Configuration)' == 'Debug'">
                        <Compile><Optimize>false</Optimize></Compile>
                    </ItemDefinitionGroup>
                    <ItemGroup>
                        <Compile Include="*.cs" />
                        <None Include="skip.txt" Condition="false" />
                    </ItemGroup>
                    <Import Project="common.props" />
                </Project>"#,
            );
        let config = EvaluatorConfig {
            include_environment: false,
            ..EvaluatorConfig::default()
        };
        let evaluator = Evaluator::new(Host::in_memory(Arc::new(fs)), config);
        let evaluation = evaluator
            .evaluate_path(Path::new("/p/app.csproj"), None, &[])
            .await
            .unwrap();

        let table = evaluator.read_items(&evaluation).await;

        let compile = table.get("compile").unwrap();
        assert_eq!(compile.len(), 1);
        assert_eq!(compile.definitions().len(), 1);
        assert_eq!(compile.definitions()[0].condition, "'$(Configuration)' == 'Debug'");
        assert!(compile.definitions()[0].is_project);

        let packages = table.get("PackageReference").unwrap();
        assert_eq!(packages.kind(), ItemKind::Plain);
        let serilog = packages.entry_named("serilog").unwrap();
        assert_eq!(serilog.metadata[0].name(), "Version");
        assert!(table.get("None").map_or(true, Items::is_empty));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_sdk_props_items_precede_project_body() {
        let fs = MemoryFileSystem::new()
            .with_file("/p/a.cs", "")
            .with_file("/p/b.cs", "")
            .with_file(
                "/sdk/Demo.Sdk/Sdk/Sdk.props",
                r#"<Project><ItemGroup><Compile Include="*.cs" /></ItemGroup></Project>"#,
            )
            .with_file(
                "/sdk/Demo.Sdk/Sdk/Sdk.targets",
                r#"<Project><ItemGroup><Compile Include="late.cs" /></ItemGroup></Project>"#,
            )
            .with_file(
                "/p/app.csproj",
                r#"<Project Sdk="Demo.Sdk">
                    <ItemGroup><Compile Remove="b.cs" /></ItemGroup>
                </Project>"#,
            );
        let config = EvaluatorConfig {
            include_environment: false,
            toolchain: ToolchainPaths {
                sdks_path: Some(PathBuf::from("/sdk")),
                ..ToolchainPaths::default()
            },
            ..EvaluatorConfig::default()
        };
        let evaluator = Evaluator::new(Host::in_memory(Arc::new(fs)), config);
        let evaluation = evaluator
            .evaluate_path(Path::new("/p/app.csproj"), None, &[])
            .await
            .unwrap();

        let table = evaluator.read_items(&evaluation).await;

        let names: Vec<&str> = table
            .get("Compile")
            .unwrap()
            .entries()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["a.cs", "late.cs"]);
    }
}
