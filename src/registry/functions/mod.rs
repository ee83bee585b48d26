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

//! Builtin static classes

pub mod environment;
pub mod file;
pub mod math;
pub mod msbuild;
pub mod path;
pub mod string;
pub mod version;
pub mod win32;

use super::StaticFunctionRegistry;

/// Register every builtin class
pub fn register_builtin_classes(registry: &StaticFunctionRegistry) {
    registry.register("System.IO.Path", &path::PathClass);
    registry.register("System.IO.File", &file::FileClass);
    registry.register("System.IO.Directory", &file::DirectoryClass);
    registry.register("System.String", &string::StringClass);
    registry.register("System.Convert", &string::ConvertClass);
    registry.register("System.Math", &math::MathClass);
    registry.register("System.Environment", &environment::EnvironmentClass);
    registry.register("System.Version", &version::VersionClass);
    registry.register("MSBuild", &msbuild::MsBuildClass);
    registry.register("Microsoft.Win32.Registry", &win32::RegistryClass);
}
