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

//! Integration test helpers for project evaluation

#![allow(dead_code)]

use octofhir_msbuild::host::{Host, MapEnvironment, MemoryFileSystem};
use octofhir_msbuild::{Evaluation, Evaluator, EvaluatorConfig, ItemTable};
use std::path::Path;
use std::sync::Arc;

/// Evaluator over an in-memory filesystem with a fixed environment
pub struct IntegrationTestContext {
    pub fs: Arc<MemoryFileSystem>,
    pub evaluator: Evaluator,
}

impl IntegrationTestContext {
    /// Context over the given files with the default configuration
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::with_config(files, EvaluatorConfig::default())
    }

    /// Context with an explicit configuration
    pub fn with_config(files: &[(&str, &str)], config: EvaluatorConfig) -> Self {
        let fs = Arc::new(MemoryFileSystem::new());
        for (path, text) in files {
            fs.add_file(*path, *text);
        }
        let host = Host::in_memory(fs.clone())
            .with_environment(Arc::new(MapEnvironment::new().with_var("BUILD_NUMBER", "42")));
        Self {
            fs,
            evaluator: Evaluator::new(host, config),
        }
    }

    /// Evaluate a project file
    pub async fn evaluate(&self, project: &str) -> Evaluation {
        self.evaluate_with(project, None, &[]).await
    }

    /// Evaluate a project file with a configuration condition and globals
    pub async fn evaluate_with(
        &self,
        project: &str,
        condition: Option<&str>,
        globals: &[(&str, &str)],
    ) -> Evaluation {
        let globals: Vec<(String, String)> = globals
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        self.evaluator
            .evaluate_path(Path::new(project), condition, &globals)
            .await
            .unwrap_or_else(|e| panic!("failed to evaluate {project}: {e}"))
    }

    /// Evaluate a project file and read its items
    pub async fn items(&self, project: &str) -> (Evaluation, ItemTable) {
        let evaluation = self.evaluate(project).await;
        let table = self.evaluator.read_items(&evaluation).await;
        (evaluation, table)
    }

    /// Substitute text against evaluated properties
    pub async fn expand(&self, evaluation: &Evaluation, text: &str) -> String {
        self.evaluator
            .expander(&evaluation.properties)
            .substitute(text, false)
            .await
    }
}
