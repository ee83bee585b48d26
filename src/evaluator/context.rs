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

//! Property table and "current file" context of one evaluation pass

use crate::model::{CaseInsensitiveMap, Element};
use rustc_hash::FxHashSet;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::sync::Arc;

/// Map from property or metadata name to the element that last assigned it
pub type OriginMap = CaseInsensitiveMap<Arc<Element>>;

/// Path-derived description of the file currently being evaluated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileContext {
    /// Absolute path of the file
    pub full_path: PathBuf,
    /// Directory holding the file
    pub directory: PathBuf,
    /// File name without extension
    pub name: String,
    /// Extension including the leading dot, or ""
    pub extension: String,
}

impl FileContext {
    /// Describe `path`
    pub fn from_path(path: &Path) -> Self {
        Self {
            full_path: path.to_path_buf(),
            directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default(),
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        }
    }

    /// Directory with a trailing separator, as exposed to build files
    pub fn directory_with_separator(&self) -> String {
        let mut directory = self.directory.to_string_lossy().to_string();
        if !directory.is_empty() && !directory.ends_with(['/', '\\']) {
            directory.push(MAIN_SEPARATOR);
        }
        directory
    }

    /// File name including extension
    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }
}

/// Properties of one evaluation pass.
///
/// Names are case-insensitive. Names listed in `globals` can only be written
/// through [`PropertyContext::inject`] or after being demoted with
/// [`PropertyContext::demote_global`].
#[derive(Debug, Clone, Default)]
pub struct PropertyContext {
    properties: CaseInsensitiveMap<String>,
    globals: FxHashSet<String>,
    file: FileContext,
}

impl PropertyContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of a property
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Whether a property is defined
    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Ordinary assignment. Global names are left untouched; returns whether
    /// the value was stored.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        if self.is_global(name) {
            log::debug!("Global property '{name}' not overridden");
            return false;
        }
        self.properties.insert(name, value.into());
        true
    }

    /// Write a property regardless of `globals`
    pub fn inject(&mut self, name: &str, value: impl Into<String>) {
        self.properties.insert(name, value.into());
    }

    /// Define a global property
    pub fn set_global(&mut self, name: &str, value: impl Into<String>) {
        self.globals.insert(name.to_ascii_uppercase());
        self.inject(name, value);
    }

    /// Remove a property
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.properties.remove(name)
    }

    /// Whether a name is global
    pub fn is_global(&self, name: &str) -> bool {
        self.globals.contains(&name.to_ascii_uppercase())
    }

    /// Remove a name from `globals`, keeping its current value; returns
    /// whether it was global
    pub fn demote_global(&mut self, name: &str) -> bool {
        self.globals.remove(&name.to_ascii_uppercase())
    }

    /// Uppercased global names
    pub fn globals(&self) -> impl Iterator<Item = &str> {
        self.globals.iter().map(String::as_str)
    }

    /// All properties
    pub fn properties(&self) -> &CaseInsensitiveMap<String> {
        &self.properties
    }

    /// The file currently being evaluated
    pub fn file(&self) -> &FileContext {
        &self.file
    }

    /// Directory that relative paths in conditions and items resolve
    /// against: the project directory, else the current file's directory
    pub fn base_directory(&self) -> PathBuf {
        match self.get("MSBuildProjectDirectory") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => self.file.directory.clone(),
        }
    }

    /// Enter `path`: replace the file context and its `MSBuildThisFile*`
    /// properties, returning the previous context for
    /// [`PropertyContext::restore_file_context`]
    pub fn set_file_context(&mut self, path: &Path) -> FileContext {
        let next = FileContext::from_path(path);
        let previous = std::mem::replace(&mut self.file, next);
        self.expose_file_context();
        previous
    }

    /// Leave the current file, restoring a saved context
    pub fn restore_file_context(&mut self, saved: FileContext) {
        self.file = saved;
        self.expose_file_context();
    }

    fn expose_file_context(&mut self) {
        let file = self.file.clone();
        self.inject(
            "MSBuildThisFileFullPath",
            file.full_path.to_string_lossy().to_string(),
        );
        self.inject("MSBuildThisFileDirectory", file.directory_with_separator());
        self.inject("MSBuildThisFileName", file.name.clone());
        self.inject("MSBuildThisFileExtension", file.extension.clone());
        self.inject("MSBuildThisFile", file.file_name());
    }
}
