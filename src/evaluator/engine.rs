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

//! Top-level evaluation entry points

use super::context::{FileContext, OriginMap, PropertyContext};
use super::imports::Imports;
use super::pipeline::evaluate_properties_and_imports;
use super::substitution::PropertyExpander;
use crate::config::EvaluatorConfig;
use crate::error::Result;
use crate::host::Host;
use crate::host::glob::split_list;
use crate::items::{ItemTable, read_items};
use crate::model::{Document, Element};
use crate::registry::{self, StaticFunctionRegistry};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;

static CONFIGURATION_CONDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*'([^']*)'\s*==\s*'([^']*)'\s*$")
        .unwrap_or_else(|e| panic!("invalid configuration regex: {e}"))
});

static PROPERTY_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\$\(\s*([A-Za-z_][\w\-]*)\s*\)\s*$")
        .unwrap_or_else(|e| panic!("invalid property reference regex: {e}"))
});

static PROPERTY_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][\w\-]*$").unwrap_or_else(|e| panic!("invalid property name regex: {e}"))
});

/// Result of evaluating one project
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// The evaluated project
    pub project: Arc<Document>,
    /// Final property table
    pub properties: PropertyContext,
    /// Element that last assigned each property
    pub origins: OriginMap,
    /// Every import entered during the pass
    pub imports: Imports,
}

/// Evaluates build files against a [`Host`] and a function registry.
///
/// An evaluator is cheap to share; every call to [`Evaluator::evaluate`]
/// starts a fresh pass with its own property table.
#[derive(Debug, Clone)]
pub struct Evaluator {
    host: Host,
    registry: Arc<StaticFunctionRegistry>,
    config: EvaluatorConfig,
}

impl Evaluator {
    /// Create an evaluator using the process-wide builtin registry
    pub fn new(host: Host, config: EvaluatorConfig) -> Self {
        Self {
            host: host.with_config(&config),
            registry: registry::global(),
            config,
        }
    }

    /// Evaluator over the local disk and process environment
    pub fn local(config: EvaluatorConfig) -> Self {
        Self::new(Host::local(), config)
    }

    /// Builder: use a custom function registry
    pub fn with_registry(mut self, registry: Arc<StaticFunctionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// External collaborators
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Static function registry
    pub fn registry(&self) -> &StaticFunctionRegistry {
        &self.registry
    }

    /// Active configuration
    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Property expander over `properties`
    pub fn expander<'a>(&'a self, properties: &'a PropertyContext) -> PropertyExpander<'a> {
        PropertyExpander::new(properties, &self.registry, &self.host)
    }

    /// Read and parse a top-level project, seeding the document cache so a
    /// project that imports itself is recognized
    pub async fn load_project(&self, path: &Path) -> Result<Arc<Document>> {
        let text = self.host.fs.read_text(path).await?;
        let document = Document::parse(&text, path)?;
        self.host.documents.insert(document.clone());
        Ok(Arc::new(document))
    }

    /// Load and evaluate the project at `path`
    pub async fn evaluate_path(
        &self,
        path: &Path,
        condition: Option<&str>,
        extra_globals: &[(String, String)],
    ) -> Result<Evaluation> {
        let project = self.load_project(path).await?;
        Ok(self.evaluate(project, condition, extra_globals).await)
    }

    /// Evaluate the properties and imports of `project`.
    ///
    /// `condition` is an optional configuration condition such as
    /// `'$(Configuration)|$(Platform)' == 'Debug|x64'`; its pairs become
    /// global properties alongside `extra_globals`. Never fails: malformed
    /// content is logged and skipped.
    pub async fn evaluate(
        &self,
        project: Arc<Document>,
        condition: Option<&str>,
        extra_globals: &[(String, String)],
    ) -> Evaluation {
        let path = project.path().to_path_buf();
        let mut properties = PropertyContext::new();
        let mut imports = Imports::new();
        let mut origins = OriginMap::new();

        if self.config.include_environment {
            for (name, value) in self.host.environment.vars() {
                if PROPERTY_NAME.is_match(&name) {
                    properties.set(&name, value);
                }
            }
        }

        let condition_globals = condition.map(configuration_globals).unwrap_or_default();
        for (name, value) in extra_globals.iter().chain(condition_globals.iter()) {
            properties.set_global(name, value.as_str());
        }

        self.inject_reserved(&mut properties, &path);
        properties.set_file_context(&path);

        let root = project.root().clone();
        if !root.is("Project") {
            log::warn!(
                "{} has root element <{}>, expected <Project>",
                path.display(),
                root.name()
            );
            return Evaluation {
                project,
                properties,
                origins,
                imports,
            };
        }

        if let Some(locals) = root.attribute("TreatAsLocalProperty") {
            let locals = self.expander(&properties).substitute(locals, false).await;
            for name in split_list(&locals) {
                if properties.demote_global(name) {
                    log::debug!("Global property '{name}' treated as local");
                }
            }
        }

        let body = project_body(&root);
        evaluate_properties_and_imports(
            self,
            &body,
            &mut properties,
            &mut imports,
            Some(&mut origins),
        )
        .await;

        Evaluation {
            project,
            properties,
            origins,
            imports,
        }
    }

    /// Collect the items of an evaluated project
    pub async fn read_items(&self, evaluation: &Evaluation) -> ItemTable {
        read_items(self, evaluation).await
    }

    fn inject_reserved(&self, properties: &mut PropertyContext, path: &Path) {
        let file = FileContext::from_path(path);
        properties.inject("MSBuildProjectFullPath", path.to_string_lossy().to_string());
        properties.inject(
            "MSBuildProjectDirectory",
            file.directory.to_string_lossy().to_string(),
        );
        properties.inject("MSBuildProjectName", file.name.clone());
        properties.inject("MSBuildProjectExtension", file.extension.clone());
        properties.inject("MSBuildProjectFile", file.file_name());

        let toolchain = &self.host.toolchain;
        if let Some(bin) = &toolchain.bin_path {
            let bin = bin.to_string_lossy().to_string();
            properties.inject("MSBuildBinPath", bin.clone());
            properties.inject("MSBuildToolsPath", bin);
        }
        if let Some(extensions) = &toolchain.extensions_path {
            let extensions = extensions.to_string_lossy().to_string();
            properties.inject("MSBuildExtensionsPath", extensions.clone());
            properties.inject("MSBuildExtensionsPath32", extensions.clone());
            properties.inject("MSBuildExtensionsPath64", extensions);
        }
        if let Some(sdks) = &toolchain.sdks_path {
            properties.inject("MSBuildSDKsPath", sdks.to_string_lossy().to_string());
        }
        properties.inject(
            "MSBuildToolsVersion",
            toolchain.tools_version.as_deref().unwrap_or("Current"),
        );

        let os = if self.host.environment.platform().eq_ignore_ascii_case("windows") {
            "Windows_NT"
        } else {
            "Unix"
        };
        properties.inject("OS", os);
    }
}

/// Global properties named by a configuration condition.
///
/// `'$(A)|$(B)' == 'x|y'` yields `[("A", "x"), ("B", "y")]`. Anything that is
/// not of that shape is logged and contributes nothing.
pub fn configuration_globals(condition: &str) -> Vec<(String, String)> {
    let Some(captures) = CONFIGURATION_CONDITION.captures(condition) else {
        log::warn!("Unsupported configuration condition: {condition}");
        return Vec::new();
    };

    let names: Vec<&str> = captures[1].split('|').collect();
    let values: Vec<&str> = captures[2].split('|').collect();
    if names.len() != values.len() {
        log::warn!("Configuration condition sides differ in length: {condition}");
        return Vec::new();
    }

    names
        .into_iter()
        .zip(values)
        .filter_map(|(name, value)| match PROPERTY_REFERENCE.captures(name) {
            Some(reference) => Some((reference[1].to_string(), value.trim().to_string())),
            None => {
                log::warn!("'{name}' in configuration condition is not a property reference");
                None
            }
        })
        .collect()
}

/// Names of the SDKs referenced by a project root
fn sdk_names(root: &Element) -> Vec<String> {
    let mut names: Vec<String> = root
        .attribute("Sdk")
        .map(|sdks| split_list(sdks).map(str::to_string).collect())
        .unwrap_or_default();
    names.extend(
        root.children_named("Sdk")
            .filter_map(|sdk| sdk.attribute("Name"))
            .map(|name| name.trim().to_string()),
    );
    names
}

fn sdk_import(root: &Element, sdk: &str, file: &str) -> Arc<Element> {
    let mut import = Element::new("Import")
        .with_attribute("Project", file)
        .with_attribute("Sdk", sdk);
    if let Some(source) = root.source() {
        import = import.with_source(source);
    }
    Arc::new(import)
}

/// Children of the project root, wrapped in the implicit SDK imports
fn project_body(root: &Element) -> Vec<Arc<Element>> {
    let sdks = sdk_names(root);
    let mut body: Vec<Arc<Element>> = sdks
        .iter()
        .map(|sdk| sdk_import(root, sdk, "Sdk.props"))
        .collect();
    body.extend(root.children().iter().filter(|child| !child.is("Sdk")).cloned());
    body.extend(sdks.iter().map(|sdk| sdk_import(root, sdk, "Sdk.targets")));
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolchainPaths;
    use crate::host::{MapEnvironment, MemoryFileSystem};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn quiet_config() -> EvaluatorConfig {
        EvaluatorConfig {
            include_environment: false,
            ..EvaluatorConfig::default()
        }
    }

    #[test]
    fn test_configuration_globals() {
        assert_eq!(
            configuration_globals("'$(Configuration)|$(Platform)' == 'Debug|x64'"),
            vec![
                ("Configuration".to_string(), "Debug".to_string()),
                ("Platform".to_string(), "x64".to_string()),
            ]
        );
        assert!(configuration_globals("'$(A)|$(B)' == 'x'").is_empty());
        assert!(configuration_globals("$(A) == x").is_empty());
    }

    #[tokio::test]
    async fn test_reserved_and_environment_properties() {
        let fs = MemoryFileSystem::new().with_file(
            "/src/app/app.csproj",
            "<Project><PropertyGroup><Home>$(HOME)</Home></PropertyGroup></Project>",
        );
        let host = Host::in_memory(Arc::new(fs))
            .with_environment(Arc::new(MapEnvironment::new().with_var("HOME", "/home/me")));
        let config = EvaluatorConfig {
            toolchain: ToolchainPaths {
                sdks_path: Some(PathBuf::from("/sdk")),
                ..ToolchainPaths::default()
            },
            ..EvaluatorConfig::default()
        };
        let evaluator = Evaluator::new(host, config);

        let evaluation = evaluator
            .evaluate_path(Path::new("/src/app/app.csproj"), None, &[])
            .await
            .unwrap();
        let props = &evaluation.properties;

        assert_eq!(props.get("Home"), Some("/home/me"));
        assert_eq!(props.get("MSBuildProjectName"), Some("app"));
        assert_eq!(props.get("MSBuildProjectExtension"), Some(".csproj"));
        assert_eq!(props.get("MSBuildProjectFile"), Some("app.csproj"));
        assert_eq!(props.get("MSBuildSDKsPath"), Some("/sdk"));
        assert_eq!(props.get("MSBuildToolsVersion"), Some("Current"));
    }

    #[tokio::test]
    async fn test_sdk_imports_wrap_body() {
        let fs = MemoryFileSystem::new()
            .with_file(
                "/sdk/Demo.Sdk/Sdk/Sdk.props",
                "<Project><PropertyGroup><Order>props</Order></PropertyGroup></Project>",
            )
            .with_file(
                "/sdk/Demo.Sdk/Sdk/Sdk.targets",
                "<Project><PropertyGroup><Order>$(Order);targets</Order></PropertyGroup></Project>",
            )
            .with_file(
                "/p/app.csproj",
                r#"<Project Sdk="Demo.Sdk/1.0"><PropertyGroup><Order>$(Order);body</Order></PropertyGroup></Project>"#,
            );
        let config = EvaluatorConfig {
            toolchain: ToolchainPaths {
                sdks_path: Some(PathBuf::from("/sdk")),
                ..ToolchainPaths::default()
            },
            ..quiet_config()
        };
        let evaluator = Evaluator::new(Host::in_memory(Arc::new(fs)), config);

        let evaluation = evaluator
            .evaluate_path(Path::new("/p/app.csproj"), None, &[])
            .await
            .unwrap();

        assert_eq!(evaluation.properties.get("Order"), Some("props;body;targets"));
        assert_eq!(evaluation.imports.len(), 2);
    }

    #[tokio::test]
    async fn test_treat_as_local_property() {
        let fs = MemoryFileSystem::new().with_file(
            "/p/app.csproj",
            r#"<Project TreatAsLocalProperty="Platform">
                <PropertyGroup>
                    <Configuration>Debug</Configuration>
                    <Platform>AnyCPU</Platform>
                </PropertyGroup>
            </Project>"#,
        );
        let evaluator = Evaluator::new(Host::in_memory(Arc::new(fs)), quiet_config());

        let evaluation = evaluator
            .evaluate_path(
                Path::new("/p/app.csproj"),
                Some("'$(Configuration)|$(Platform)' == 'Release|x64'"),
                &[],
            )
            .await
            .unwrap();

        assert_eq!(evaluation.properties.get("Configuration"), Some("Release"));
        assert_eq!(evaluation.properties.get("Platform"), Some("AnyCPU"));
        assert!(evaluation.origins.contains_key("Platform"));
        assert!(!evaluation.origins.contains_key("Configuration"));
    }
}
