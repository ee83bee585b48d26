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

//! Build-file evaluator
//!
//! Property substitution, condition evaluation and the depth-first
//! property/import pipeline, tied together by [`Evaluator`].

pub mod condition;
pub mod context;
pub mod engine;
pub mod imports;
pub mod pipeline;
pub mod substitution;

pub use condition::ConditionEvaluator;
pub use context::{FileContext, OriginMap, PropertyContext};
pub use engine::{Evaluation, Evaluator, configuration_globals};
pub use imports::Imports;
pub use pipeline::evaluate_properties_and_imports;
pub use substitution::PropertyExpander;
