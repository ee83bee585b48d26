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

//! Evaluator configuration

use crate::error::{EvaluationError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Already-resolved toolchain locations.
///
/// Discovering these on disk is the caller's job; the evaluator only consumes
/// them through reserved properties, `Sdk` imports and the `[MSBuild]`
/// toolchain helpers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ToolchainPaths {
    /// Directory holding the build engine binaries (`MSBuildBinPath`)
    pub bin_path: Option<PathBuf>,
    /// Root for shared extension targets (`MSBuildExtensionsPath`)
    pub extensions_path: Option<PathBuf>,
    /// Root holding one directory per SDK (`MSBuildSDKsPath`)
    pub sdks_path: Option<PathBuf>,
    /// Tools version string (`MSBuildToolsVersion`)
    pub tools_version: Option<String>,
}

/// Configuration for an [`Evaluator`](crate::evaluator::Evaluator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluatorConfig {
    /// Toolchain locations
    pub toolchain: ToolchainPaths,
    /// Seed environment variables as ordinary properties
    pub include_environment: bool,
    /// Item types whose entries are identifiers rather than files
    pub plain_item_types: Vec<String>,
    /// Registry view used by `registry:` lookups without an explicit view
    pub registry_view: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            toolchain: ToolchainPaths::default(),
            include_environment: true,
            plain_item_types: [
                "PackageReference",
                "PackageVersion",
                "ProjectCapability",
                "FrameworkReference",
                "Using",
                "InternalsVisibleTo",
                "SupportedTargetFramework",
            ]
            .iter()
            .map(|name| name.to_string())
            .collect(),
            registry_view: "Default".to_string(),
        }
    }
}

impl EvaluatorConfig {
    /// Parse a configuration from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| EvaluationError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| EvaluationError::io(path, e))?;
        Self::from_json(&text)
    }

    /// Whether entries of `item_type` are identifiers rather than files
    pub fn is_plain_item_type(&self, item_type: &str) -> bool {
        self.plain_item_types
            .iter()
            .any(|name| name.eq_ignore_ascii_case(item_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EvaluatorConfig::from_json(
            r#"{ "includeEnvironment": false, "toolchain": { "sdksPath": "/opt/sdk" } }"#,
        )
        .unwrap();
        assert!(!config.include_environment);
        assert_eq!(config.toolchain.sdks_path, Some(PathBuf::from("/opt/sdk")));
        assert_eq!(config.registry_view, "Default");
        assert!(config.is_plain_item_type("packagereference"));
        assert!(!config.is_plain_item_type("Compile"));
    }

    #[test]
    fn test_invalid_json() {
        let err = EvaluatorConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidConfig { .. }));
    }
}
