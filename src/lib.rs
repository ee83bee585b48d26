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

//! MSBuild-style project evaluation in Rust
//!
//! Evaluates build description files the way the build engine does before
//! running any target: properties with `$(...)` substitution and property
//! functions, conditions, imports (including SDK imports) and glob-based
//! items with metadata.
//!
//! ```no_run
//! use octofhir_msbuild::{Evaluator, EvaluatorConfig};
//! use std::path::Path;
//!
//! # async fn run() -> octofhir_msbuild::Result<()> {
//! let evaluator = Evaluator::local(EvaluatorConfig::default());
//! let evaluation = evaluator
//!     .evaluate_path(Path::new("app.csproj"), Some("'$(Configuration)' == 'Release'"), &[])
//!     .await?;
//! println!("{:?}", evaluation.properties.get("OutputPath"));
//! let items = evaluator.read_items(&evaluation).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod evaluator;
pub mod host;
pub mod items;
pub mod model;
pub mod registry;

pub use config::{EvaluatorConfig, ToolchainPaths};
pub use error::{EvaluationError, Result};
pub use evaluator::{Evaluation, Evaluator, Imports, OriginMap, PropertyContext};
pub use host::Host;
pub use items::{ItemEntry, ItemKind, ItemTable, Items, SettingTarget, add_setting};
pub use model::{Document, Element, Value};
pub use registry::StaticFunctionRegistry;
