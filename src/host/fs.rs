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

//! Filesystem collaborator
//!
//! The evaluator never touches the disk directly; every existence check,
//! stat, glob search and read goes through [`FileSystem`]. Two
//! implementations are provided: [`LocalFileSystem`] for real projects and
//! [`MemoryFileSystem`] for tests and editors holding unsaved buffers.

use super::glob::{PatternSet, compile, expand_braces, match_options, normalize_separators};
use crate::error::{EvaluationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Timestamps of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Last modification time
    pub modified: Option<DateTime<Local>>,
    /// Creation time
    pub created: Option<DateTime<Local>>,
}

/// Filesystem operations used during evaluation
#[async_trait]
pub trait FileSystem: Send + Sync + std::fmt::Debug {
    /// Whether a file or directory exists
    async fn exists(&self, path: &Path) -> bool;

    /// Timestamps of a file
    async fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Files matching an absolute glob pattern, minus the excluded patterns,
    /// sorted
    async fn search(&self, pattern: &str, excludes: &[String]) -> Result<Vec<PathBuf>>;

    /// Read a file as text
    async fn read_text(&self, path: &Path) -> Result<String>;

    /// Write a file as text
    async fn write_text(&self, path: &Path, text: &str) -> Result<()>;
}

/// Filesystem backed by the local disk
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| EvaluationError::io(path, e))?;
        Ok(FileStat {
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
            created: metadata.created().ok().map(DateTime::<Local>::from),
        })
    }

    async fn search(&self, pattern: &str, excludes: &[String]) -> Result<Vec<PathBuf>> {
        let pattern = normalize_separators(pattern);
        let excludes = PatternSet::from_absolute(excludes);
        let origin = PathBuf::from(&pattern);

        tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            for alternative in expand_braces(&pattern) {
                let paths = ::glob::glob_with(&alternative, match_options())
                    .map_err(|e| EvaluationError::io(&origin, e))?;
                for path in paths.flatten() {
                    if path.is_file() && !excludes.matches(&path) {
                        found.push(path);
                    }
                }
            }
            found.sort();
            found.dedup();
            Ok(found)
        })
        .await
        .map_err(|e| EvaluationError::io(PathBuf::new(), e))?
    }

    async fn read_text(&self, path: &Path) -> Result<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| EvaluationError::io(path, e))
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EvaluationError::io(parent, e))?;
        }
        tokio::fs::write(path, text)
            .await
            .map_err(|e| EvaluationError::io(path, e))
    }
}

#[derive(Debug, Clone)]
struct MemoryFile {
    text: String,
    stat: FileStat,
}

/// In-memory filesystem
///
/// Counts reads and existence checks so callers can observe how much I/O an
/// evaluation issued.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: RwLock<BTreeMap<PathBuf, MemoryFile>>,
    latency: Option<Duration>,
    reads: AtomicUsize,
    exists_checks: AtomicUsize,
}

impl MemoryFileSystem {
    /// Create an empty filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a file
    pub fn with_file(self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.add_file(path, text);
        self
    }

    /// Builder: delay every read, to exercise in-flight deduplication
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Add or replace a file, stamping it with the current time
    pub fn add_file(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        let now = Local::now();
        self.files.write().insert(
            path.into(),
            MemoryFile {
                text: text.into(),
                stat: FileStat {
                    modified: Some(now),
                    created: Some(now),
                },
            },
        );
    }

    /// Remove a file
    pub fn remove_file(&self, path: &Path) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Number of `read_text` calls so far
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `exists` calls so far
    pub fn exists_count(&self) -> usize {
        self.exists_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn exists(&self, path: &Path) -> bool {
        self.exists_checks.fetch_add(1, Ordering::SeqCst);
        let files = self.files.read();
        files.contains_key(path) || files.keys().any(|file| file.starts_with(path))
    }

    async fn stat(&self, path: &Path) -> Result<FileStat> {
        self.files
            .read()
            .get(path)
            .map(|file| file.stat)
            .ok_or_else(|| EvaluationError::io(path, "file not found"))
    }

    async fn search(&self, pattern: &str, excludes: &[String]) -> Result<Vec<PathBuf>> {
        let patterns = compile(&normalize_separators(pattern));
        let excludes = PatternSet::from_absolute(excludes);
        let files = self.files.read();
        Ok(files
            .keys()
            .filter(|path| {
                let text = normalize_separators(&path.to_string_lossy());
                patterns
                    .iter()
                    .any(|p| p.matches_with(&text, match_options()))
                    && !excludes.matches(path)
            })
            .cloned()
            .collect())
    }

    async fn read_text(&self, path: &Path) -> Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.files
            .read()
            .get(path)
            .map(|file| file.text.clone())
            .ok_or_else(|| EvaluationError::io(path, "file not found"))
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        self.add_file(path, text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryFileSystem {
        MemoryFileSystem::new()
            .with_file("/r/a.cs", "")
            .with_file("/r/sub/b.cs", "")
            .with_file("/r/c.txt", "")
    }

    #[tokio::test]
    async fn test_memory_search() {
        let fs = sample();
        let found = fs.search("/r/**/*.cs", &[]).await.unwrap();
        assert_eq!(
            found,
            vec![PathBuf::from("/r/a.cs"), PathBuf::from("/r/sub/b.cs")]
        );

        let found = fs
            .search("/r/**/*.{cs,txt}", &["/r/sub/**".to_string()])
            .await
            .unwrap();
        assert_eq!(found, vec![PathBuf::from("/r/a.cs"), PathBuf::from("/r/c.txt")]);
    }

    #[tokio::test]
    async fn test_memory_exists_counts() {
        let fs = sample();
        assert!(fs.exists(Path::new("/r/sub")).await);
        assert!(!fs.exists(Path::new("/r/missing")).await);
        assert_eq!(fs.exists_count(), 2);
    }

    #[tokio::test]
    async fn test_memory_read_missing() {
        let fs = sample();
        assert!(fs.read_text(Path::new("/nope")).await.is_err());
        assert_eq!(fs.read_count(), 1);
    }
}
