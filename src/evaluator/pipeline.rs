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

//! Depth-first property and import evaluation
//!
//! Elements are visited strictly in document order. Imports are entered one
//! at a time and share the caller's [`PropertyContext`], so properties set
//! inside an import are visible to everything evaluated after it. Item
//! groups are not evaluated here; they are noted on [`Imports`] in visit
//! order and read later against the final properties.

use super::context::{OriginMap, PropertyContext};
use super::engine::Evaluator;
use super::imports::Imports;
use crate::error::EvaluationError;
use crate::host::Host;
use crate::host::glob::{absolute_pattern, has_wildcard, split_list};
use crate::model::Element;
use crate::registry::functions::path::full_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Evaluate property groups, imports and `Choose` blocks of `elements`
pub async fn evaluate_properties_and_imports(
    evaluator: &Evaluator,
    elements: &[Arc<Element>],
    ctx: &mut PropertyContext,
    imports: &mut Imports,
    mut origins: Option<&mut OriginMap>,
) {
    for element in elements {
        if element.is("ItemGroup") || element.is("ItemDefinitionGroup") {
            imports.record_item_group(&ctx.file().full_path, element);
            continue;
        }
        if !evaluator.expander(ctx).condition(element.condition()).await {
            log::debug!("Skipping <{}>: condition is false", element.name());
            continue;
        }

        if element.is("PropertyGroup") {
            evaluate_property_group(evaluator, element, ctx, origins.as_deref_mut()).await;
        } else if element.is("Import") {
            evaluate_import(evaluator, element, "", ctx, imports, origins.as_deref_mut()).await;
        } else if element.is("ImportGroup") {
            let label = element.attribute("Label").unwrap_or_default().to_string();
            for import in element.children_named("Import") {
                if !evaluator.expander(ctx).condition(import.condition()).await {
                    continue;
                }
                evaluate_import(evaluator, import, &label, ctx, imports, origins.as_deref_mut())
                    .await;
            }
        } else if element.is("Choose") {
            let Some(branch) = choose_branch(evaluator, element, ctx).await else {
                continue;
            };
            Box::pin(evaluate_properties_and_imports(
                evaluator,
                branch.children(),
                ctx,
                imports,
                origins.as_deref_mut(),
            ))
            .await;
        }
    }
}

/// First `When` of a `Choose` whose condition holds, else its `Otherwise`
pub async fn choose_branch(
    evaluator: &Evaluator,
    choose: &Element,
    ctx: &PropertyContext,
) -> Option<Arc<Element>> {
    for branch in choose.children() {
        if branch.is("Otherwise") {
            return Some(branch.clone());
        }
        if branch.is("When") && evaluator.expander(ctx).condition(branch.condition()).await {
            return Some(branch.clone());
        }
    }
    None
}

async fn evaluate_property_group(
    evaluator: &Evaluator,
    group: &Element,
    ctx: &mut PropertyContext,
    mut origins: Option<&mut OriginMap>,
) {
    for property in group.children() {
        if !evaluator.expander(ctx).condition(property.condition()).await {
            continue;
        }
        let name = property.name();
        if ctx.is_global(name) {
            log::debug!("Property '{name}' is global; assignment ignored");
            continue;
        }

        let value = evaluator.expander(ctx).substitute(property.text(), false).await;
        ctx.set(name, value);
        if let Some(origins) = origins.as_deref_mut() {
            origins.insert(name, property.clone());
        }
    }
}

async fn evaluate_import(
    evaluator: &Evaluator,
    element: &Element,
    label: &str,
    ctx: &mut PropertyContext,
    imports: &mut Imports,
    mut origins: Option<&mut OriginMap>,
) {
    let Some(project) = element.attribute("Project") else {
        log::warn!("<Import> without a Project attribute ignored");
        return;
    };

    let spec = evaluator.expander(ctx).substitute_path(project).await;
    if spec.is_empty() {
        log::warn!("Import \"{project}\" resolved to an empty path; skipped");
        return;
    }

    let base = match element.attribute("Sdk") {
        Some(sdk) => match sdk_directory(evaluator.host(), sdk) {
            Some(directory) => directory,
            None => {
                log::warn!("Import \"{project}\" names SDK '{sdk}' but no SDK root is configured");
                return;
            }
        },
        None => ctx.file().directory.clone(),
    };

    let paths = resolve_import_paths(evaluator.host(), &base, &spec).await;
    if paths.is_empty() {
        log::debug!("Import \"{spec}\" matched no files");
    }

    for path in paths {
        if imports.contains(&path) {
            log::debug!("Duplicate import {} skipped", path.display());
            continue;
        }

        let Some(document) = evaluator.host().documents.get(&path).await else {
            let error = EvaluationError::MalformedImport {
                path,
                message: "file could not be read".to_string(),
            };
            log::warn!("{error}");
            continue;
        };
        if !document.root().is("Project") {
            let error = EvaluationError::MalformedImport {
                path,
                message: format!("root element is <{}>", document.root().name()),
            };
            log::warn!("{error}");
            continue;
        }

        imports.record(label, &path);
        let saved = ctx.set_file_context(&path);
        Box::pin(evaluate_properties_and_imports(
            evaluator,
            document.root().children(),
            ctx,
            imports,
            origins.as_deref_mut(),
        ))
        .await;
        ctx.restore_file_context(saved);
    }
}

/// `<sdks>/<Name>/Sdk` for an SDK reference such as `Name` or `Name/1.0`
pub fn sdk_directory(host: &Host, sdk: &str) -> Option<PathBuf> {
    let name = sdk.split('/').next().unwrap_or_default().trim();
    if name.is_empty() {
        return None;
    }
    host.toolchain
        .sdks_path
        .as_ref()
        .map(|root| root.join(name).join("Sdk"))
}

/// Expand an import specification into absolute paths. Wildcard segments
/// are searched; literal segments are returned whether or not they exist.
async fn resolve_import_paths(host: &Host, base: &Path, spec: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for segment in split_list(spec) {
        if !has_wildcard(segment) {
            paths.push(full_path(base, segment));
            continue;
        }
        match host.fs.search(&absolute_pattern(base, segment), &[]).await {
            Ok(found) => paths.extend(found),
            Err(e) => log::warn!("{e}"),
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluatorConfig;
    use crate::host::MemoryFileSystem;
    use pretty_assertions::assert_eq;

    fn evaluator(fs: MemoryFileSystem) -> Evaluator {
        let config = EvaluatorConfig {
            include_environment: false,
            ..EvaluatorConfig::default()
        };
        Evaluator::new(Host::in_memory(Arc::new(fs)), config)
    }

    #[tokio::test]
    async fn test_import_sees_and_feeds_outer_properties() {
        let fs = MemoryFileSystem::new().with_file(
            "/p/shared.props",
            r#"<Project><PropertyGroup><Out>$(In)-imported</Out></PropertyGroup></Project>"#,
        );
        let evaluator = evaluator(fs);
        let project = Element::new("Project")
            .with_child(Element::new("PropertyGroup").with_child(Element::new("In").with_text("x")))
            .with_child(Element::new("Import").with_attribute("Project", "shared.props"))
            .with_child(
                Element::new("PropertyGroup")
                    .with_child(Element::new("Last").with_text("$(Out)!")),
            );

        let mut ctx = PropertyContext::new();
        ctx.set_file_context(Path::new("/p/app.csproj"));
        let mut imports = Imports::new();
        let mut origins = OriginMap::new();
        evaluate_properties_and_imports(
            &evaluator,
            project.children(),
            &mut ctx,
            &mut imports,
            Some(&mut origins),
        )
        .await;

        assert_eq!(ctx.get("Last"), Some("x-imported!"));
        assert_eq!(ctx.get("MSBuildThisFile"), Some("app.csproj"));
        assert_eq!(imports.len(), 1);
        assert_eq!(origins.get("Out").map(|e| e.text().to_string()), Some("$(In)-imported".to_string()));
    }

    #[tokio::test]
    async fn test_wrong_root_is_skipped() {
        let fs = MemoryFileSystem::new().with_file("/p/bad.props", "<Other><A>1</A></Other>");
        let evaluator = evaluator(fs);
        let project = Element::new("Project")
            .with_child(Element::new("Import").with_attribute("Project", "/p/bad.props"));

        let mut ctx = PropertyContext::new();
        ctx.set_file_context(Path::new("/p/app.csproj"));
        let mut imports = Imports::new();
        evaluate_properties_and_imports(&evaluator, project.children(), &mut ctx, &mut imports, None)
            .await;

        assert!(imports.is_empty());
    }

    #[tokio::test]
    async fn test_choose_takes_first_matching_branch() {
        let evaluator = evaluator(MemoryFileSystem::new());
        let project = Element::new("Project").with_child(
            Element::new("Choose")
                .with_child(
                    Element::new("When")
                        .with_attribute("Condition", "'$(Mode)' == 'a'")
                        .with_child(
                            Element::new("PropertyGroup")
                                .with_child(Element::new("Picked").with_text("a")),
                        ),
                )
                .with_child(
                    Element::new("When")
                        .with_attribute("Condition", "'$(Mode)' == 'b'")
                        .with_child(
                            Element::new("PropertyGroup")
                                .with_child(Element::new("Picked").with_text("b")),
                        ),
                )
                .with_child(
                    Element::new("Otherwise").with_child(
                        Element::new("PropertyGroup")
                            .with_child(Element::new("Picked").with_text("other")),
                    ),
                ),
        );

        for (mode, expected) in [("b", "b"), ("z", "other")] {
            let mut ctx = PropertyContext::new();
            ctx.set("Mode", mode);
            let mut imports = Imports::new();
            evaluate_properties_and_imports(
                &evaluator,
                project.children(),
                &mut ctx,
                &mut imports,
                None,
            )
            .await;
            assert_eq!(ctx.get("Picked"), Some(expected));
        }
    }
}
