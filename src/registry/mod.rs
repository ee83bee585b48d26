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

//! Static function registry
//!
//! Property functions of the form `$([Class]::Method(...))` dispatch through
//! a table of classes, each a table of methods. Both levels are keyed by the
//! uppercased name, and a leading `System.` qualifier is ignored so that
//! `[System.IO.Path]` and `[IO.Path]` reach the same entry.
//!
//! The process-wide registry returned by [`global`] is populated once with the
//! builtin classes; further classes may be appended but never removed.

#![warn(missing_docs)]

pub mod function;
pub mod functions;
pub mod instance;

pub use function::{AsyncStaticFn, FunctionImpl, SyncStaticFn};
pub use instance::call_instance;

use crate::error::{EvaluationError, Result};
use crate::host::Host;
use crate::model::Value;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Source of a class implementation: the list of its callable members
pub trait ClassSource {
    /// Members as `(method name, implementation)` pairs
    fn members(&self) -> Vec<(&'static str, FunctionImpl)>;
}

type ClassTable = FxHashMap<String, FunctionImpl>;

/// Registry of static classes and their methods
#[derive(Debug, Default)]
pub struct StaticFunctionRegistry {
    classes: RwLock<FxHashMap<String, ClassTable>>,
}

impl StaticFunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every builtin class
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        functions::register_builtin_classes(&registry);
        registry
    }

    /// Register every member of `source` under `class_name`
    pub fn register(&self, class_name: &str, source: &dyn ClassSource) {
        let key = normalize_class_name(class_name);
        let mut classes = self.classes.write();
        let table = classes.entry(key).or_default();
        for (method, implementation) in source.members() {
            table.insert(method.to_ascii_uppercase(), implementation);
        }
    }

    /// Register a single method
    pub fn register_function(&self, class_name: &str, method: &str, implementation: FunctionImpl) {
        self.classes
            .write()
            .entry(normalize_class_name(class_name))
            .or_default()
            .insert(method.to_ascii_uppercase(), implementation);
    }

    /// Whether a class is registered
    pub fn contains_class(&self, class_name: &str) -> bool {
        self.classes
            .read()
            .contains_key(&normalize_class_name(class_name))
    }

    /// Find a method. Fails with `UnknownClass` when the class itself is not
    /// registered and with `UnknownFunction` when only the method is missing.
    pub fn lookup(&self, class_name: &str, method: &str) -> Result<FunctionImpl> {
        let key = normalize_class_name(class_name);
        let classes = self.classes.read();
        let table = classes
            .get(&key)
            .ok_or_else(|| EvaluationError::UnknownClass {
                class_name: class_name.to_string(),
            })?;
        table
            .get(&method.to_ascii_uppercase())
            .cloned()
            .ok_or_else(|| EvaluationError::unknown_function(method, class_name))
    }

    /// Invoke `class_name::method` with `args`
    pub async fn run(
        &self,
        class_name: &str,
        method: &str,
        args: Vec<Value>,
        host: &Host,
    ) -> Result<Value> {
        let implementation = self.lookup(class_name, method)?;
        implementation.call(args, host).await
    }
}

static GLOBAL: Lazy<Arc<StaticFunctionRegistry>> =
    Lazy::new(|| Arc::new(StaticFunctionRegistry::with_builtins()));

/// The process-wide registry
pub fn global() -> Arc<StaticFunctionRegistry> {
    GLOBAL.clone()
}

/// Uppercase a class name and strip brackets and the root `System.` qualifier
pub fn normalize_class_name(class_name: &str) -> String {
    let trimmed = class_name.trim();
    let trimmed = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed)
        .trim();
    let upper = trimmed.to_ascii_uppercase();
    match upper.strip_prefix("SYSTEM.") {
        Some(rest) => rest.to_string(),
        None => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryFileSystem;

    struct Greeter;

    impl ClassSource for Greeter {
        fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
            vec![(
                "Hello",
                FunctionImpl::Sync(|args, _| Ok(Value::string(format!("hi {}", args[0])))),
            )]
        }
    }

    fn host() -> Host {
        Host::in_memory(Arc::new(MemoryFileSystem::new()))
    }

    #[test]
    fn test_normalize_class_name() {
        assert_eq!(normalize_class_name("[System.IO.Path]"), "IO.PATH");
        assert_eq!(normalize_class_name("IO.Path"), "IO.PATH");
        assert_eq!(normalize_class_name("MSBuild"), "MSBUILD");
        assert_eq!(normalize_class_name("System"), "SYSTEM");
    }

    #[tokio::test]
    async fn test_register_and_run() {
        let registry = StaticFunctionRegistry::new();
        registry.register("System.Greeter", &Greeter);

        let result = registry
            .run("GREETER", "hello", vec![Value::string("bob")], &host())
            .await
            .unwrap();
        assert_eq!(result, Value::string("hi bob"));
    }

    #[tokio::test]
    async fn test_unknown_class_and_method() {
        let registry = StaticFunctionRegistry::new();
        registry.register("Greeter", &Greeter);

        let err = registry.run("Nope", "Hello", vec![], &host()).await.unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownClass { .. }));

        let err = registry.run("Greeter", "Bye", vec![], &host()).await.unwrap_err();
        assert!(matches!(err, EvaluationError::UnknownFunction { .. }));
    }

    #[test]
    fn test_global_has_builtins() {
        let registry = global();
        assert!(registry.contains_class("System.IO.Path"));
        assert!(registry.contains_class("MSBuild"));
        assert!(registry.lookup("Math", "Max").is_ok());
    }
}
