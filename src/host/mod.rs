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

//! External collaborators consumed by the evaluator
//!
//! Everything that touches the outside world (disk, registry, environment)
//! sits behind a trait here and is bundled into a [`Host`] that the evaluator
//! and the static function library share.

pub mod cache;
pub mod environment;
pub mod fs;
pub mod glob;
pub mod store;

pub use cache::{DocumentCache, StatCache};
pub use environment::{HostEnvironment, MapEnvironment, SystemEnvironment};
pub use fs::{FileStat, FileSystem, LocalFileSystem, MemoryFileSystem};
pub use store::{KeyValueStore, MemoryKeyValueStore, NullKeyValueStore, RegistryKey};

use crate::config::{EvaluatorConfig, ToolchainPaths};
use std::sync::Arc;

/// Collaborators shared by one evaluator
#[derive(Debug, Clone)]
pub struct Host {
    /// Filesystem
    pub fs: Arc<dyn FileSystem>,
    /// Parsed-document cache over `fs`
    pub documents: Arc<DocumentCache>,
    /// Stat cache over `fs`
    pub stats: Arc<StatCache>,
    /// Key/value registry
    pub store: Arc<dyn KeyValueStore>,
    /// Environment
    pub environment: Arc<dyn HostEnvironment>,
    /// Resolved toolchain paths
    pub toolchain: ToolchainPaths,
    /// Default registry view
    pub registry_view: String,
}

impl Host {
    /// Assemble a host from its collaborators
    pub fn new(
        fs: Arc<dyn FileSystem>,
        store: Arc<dyn KeyValueStore>,
        environment: Arc<dyn HostEnvironment>,
    ) -> Self {
        let config = EvaluatorConfig::default();
        Self {
            documents: Arc::new(DocumentCache::new(fs.clone())),
            stats: Arc::new(StatCache::new(fs.clone())),
            fs,
            store,
            environment,
            toolchain: config.toolchain,
            registry_view: config.registry_view,
        }
    }

    /// Host over the local disk and process environment
    pub fn local() -> Self {
        Self::new(
            Arc::new(LocalFileSystem),
            Arc::new(NullKeyValueStore),
            Arc::new(SystemEnvironment),
        )
    }

    /// Host over an in-memory filesystem with an empty environment
    pub fn in_memory(fs: Arc<MemoryFileSystem>) -> Self {
        Self::new(
            fs,
            Arc::new(NullKeyValueStore),
            Arc::new(MapEnvironment::new()),
        )
    }

    /// Builder: replace the key/value store
    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = store;
        self
    }

    /// Builder: replace the environment
    pub fn with_environment(mut self, environment: Arc<dyn HostEnvironment>) -> Self {
        self.environment = environment;
        self
    }

    /// Builder: apply toolchain and registry settings from a configuration
    pub fn with_config(mut self, config: &EvaluatorConfig) -> Self {
        self.toolchain = config.toolchain.clone();
        self.registry_view = config.registry_view.clone();
        self
    }
}
