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

//! Memoizing caches over the filesystem collaborator
//!
//! Both caches memoize the in-flight request rather than the settled result:
//! concurrent lookups of the same path share one `OnceCell`, so exactly one
//! read or stat is issued and every caller observes the same value.

use super::fs::{FileStat, FileSystem};
use crate::model::Document;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

type Slot<T> = Arc<OnceCell<T>>;

/// Parsed-document cache keyed by path
#[derive(Debug)]
pub struct DocumentCache {
    fs: Arc<dyn FileSystem>,
    entries: DashMap<PathBuf, Slot<Option<Arc<Document>>>>,
}

impl DocumentCache {
    /// Create a cache reading through `fs`
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            entries: DashMap::new(),
        }
    }

    /// Parsed document at `path`; unreadable or malformed files yield `None`
    pub async fn get(&self, path: &Path) -> Option<Arc<Document>> {
        let slot = self.entries.entry(path.to_path_buf()).or_default().clone();
        slot.get_or_init(|| async {
            let text = match self.fs.read_text(path).await {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("{e}");
                    return None;
                }
            };
            match Document::parse(&text, path) {
                Ok(doc) => Some(Arc::new(doc)),
                Err(e) => {
                    log::warn!("{e}");
                    None
                }
            }
        })
        .await
        .clone()
    }

    /// Seed the cache with an already parsed document
    pub fn insert(&self, document: Document) {
        let path = document.path().to_path_buf();
        let slot = Arc::new(OnceCell::new_with(Some(Some(Arc::new(document)))));
        self.entries.insert(path, slot);
    }

    /// Forget a cached document so the next lookup re-reads it
    pub fn invalidate(&self, path: &Path) {
        self.entries.remove(path);
    }

    /// Number of cached paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-path stat cache
#[derive(Debug)]
pub struct StatCache {
    fs: Arc<dyn FileSystem>,
    entries: DashMap<PathBuf, Slot<Option<FileStat>>>,
}

impl StatCache {
    /// Create a cache reading through `fs`
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            entries: DashMap::new(),
        }
    }

    /// Timestamps of `path`; failures yield `None`
    pub async fn get(&self, path: &Path) -> Option<FileStat> {
        let slot = self.entries.entry(path.to_path_buf()).or_default().clone();
        *slot
            .get_or_init(|| async {
                match self.fs.stat(path).await {
                    Ok(stat) => Some(stat),
                    Err(e) => {
                        log::debug!("{e}");
                        None
                    }
                }
            })
            .await
    }

    /// Forget a cached stat
    pub fn invalidate(&self, path: &Path) {
        self.entries.remove(path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::fs::MemoryFileSystem;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_gets_issue_one_read() {
        let fs = Arc::new(
            MemoryFileSystem::new()
                .with_file("/p/a.props", "<Project />")
                .with_latency(Duration::from_millis(20)),
        );
        let cache = DocumentCache::new(fs.clone());
        let path = Path::new("/p/a.props");

        let (first, second) = tokio::join!(cache.get(path), cache.get(path));
        let first = first.unwrap();
        let second = second.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fs.read_count(), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_is_none_and_memoized() {
        let fs = Arc::new(MemoryFileSystem::new().with_file("/p/bad.props", "<Project>"));
        let cache = DocumentCache::new(fs.clone());

        assert!(cache.get(Path::new("/p/bad.props")).await.is_none());
        assert!(cache.get(Path::new("/p/bad.props")).await.is_none());
        assert_eq!(fs.read_count(), 1);

        cache.invalidate(Path::new("/p/bad.props"));
        fs.add_file("/p/bad.props", "<Project />");
        assert!(cache.get(Path::new("/p/bad.props")).await.is_some());
    }

    #[tokio::test]
    async fn test_stat_cache() {
        let fs = Arc::new(MemoryFileSystem::new().with_file("/p/a.cs", ""));
        let cache = StatCache::new(fs);
        assert!(cache.get(Path::new("/p/a.cs")).await.is_some());
        assert!(cache.get(Path::new("/p/missing.cs")).await.is_none());
    }
}
