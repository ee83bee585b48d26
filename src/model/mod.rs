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

//! Data model for build-file evaluation
//!
//! Values produced by property functions, the owned element tree that build
//! files are parsed into, and the case-insensitive map used for property and
//! metadata tables.

#![warn(missing_docs)]

pub mod case_map;
pub mod element;
pub mod value;
pub mod version;

pub use case_map::CaseInsensitiveMap;
pub use element::{Document, Element};
pub use value::{Value, format_number, parse_number};
pub use version::BuildVersion;
