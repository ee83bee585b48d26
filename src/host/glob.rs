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

//! Glob helpers shared by the filesystem collaborators and the item engine
//!
//! Patterns use `/` internally; backslashes written in build files are
//! normalized first. `{a,b}` alternatives are expanded before the patterns
//! are handed to the `glob` crate.

use glob::{MatchOptions, Pattern};
use std::path::{MAIN_SEPARATOR, MAIN_SEPARATOR_STR, Path};

/// Matching options used for every pattern
pub fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Whether the text contains glob syntax
pub fn has_wildcard(text: &str) -> bool {
    text.contains(['*', '?', '[', '{'])
}

/// Normalize separators to `/`
pub fn normalize_separators(text: &str) -> String {
    text.replace('\\', "/")
}

/// Render a path with `/` separators
pub fn path_to_pattern_text(path: &Path) -> String {
    normalize_separators(&path.to_string_lossy())
}

/// Join a possibly relative pattern onto `base`, resolving `.` and `..`
/// components that precede any wildcard
pub fn absolute_pattern(base: &Path, pattern: &str) -> String {
    let pattern = normalize_separators(pattern.trim());
    if Path::new(&pattern).is_absolute() || pattern.starts_with('/') {
        resolve_dots(&pattern)
    } else {
        let base = path_to_pattern_text(base);
        resolve_dots(&format!("{}/{}", base.trim_end_matches('/'), pattern))
    }
}

fn resolve_dots(pattern: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in pattern.split('/') {
        match component {
            "." => {}
            ".." => match components.last() {
                Some(&last) if !last.is_empty() && last != ".." && !has_wildcard(last) => {
                    components.pop();
                }
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }
    components.join("/")
}

/// Expand `{a,b}` alternatives into separate patterns
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };

    let mut depth = 0;
    let mut close = None;
    let mut splits = Vec::new();
    for (offset, c) in pattern[open..].char_indices() {
        let index = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => splits.push(index),
            _ => {}
        }
    }
    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut bounds = vec![open];
    bounds.extend(splits);
    bounds.push(close);

    bounds
        .windows(2)
        .flat_map(|w| {
            let alternative = &pattern[w[0] + 1..w[1]];
            expand_braces(&format!("{prefix}{alternative}{suffix}"))
        })
        .collect()
}

/// Compile one pattern (brace-expanded); invalid alternatives are logged and
/// dropped
pub fn compile(pattern: &str) -> Vec<Pattern> {
    expand_braces(pattern)
        .into_iter()
        .filter_map(|p| match Pattern::new(&p) {
            Ok(compiled) => Some(compiled),
            Err(e) => {
                log::warn!("Ignoring invalid glob pattern '{p}': {e}");
                None
            }
        })
        .collect()
}

/// A `;`-separated list of patterns resolved against a base directory
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile `spec` relative to `base`
    pub fn new(base: &Path, spec: &str) -> Self {
        let patterns = split_list(spec)
            .flat_map(|segment| compile(&absolute_pattern(base, segment)))
            .collect();
        Self { patterns }
    }

    /// Compile already absolute patterns
    pub fn from_absolute<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            patterns: patterns
                .iter()
                .flat_map(|p| compile(&normalize_separators(p.as_ref())))
                .collect(),
        }
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Whether any pattern matches the path
    pub fn matches(&self, path: &Path) -> bool {
        let text = path_to_pattern_text(path);
        self.patterns
            .iter()
            .any(|pattern| pattern.matches_with(&text, match_options()))
    }
}

/// Split a `;`-separated list, dropping empty segments
pub fn split_list(spec: &str) -> impl Iterator<Item = &str> {
    spec.split(';').map(str::trim).filter(|s| !s.is_empty())
}

/// Directory portion of `relative_path` matched by the wildcard part of
/// `pattern`, with a trailing separator, or "" when none
pub fn recursive_dir(pattern: &str, relative_path: &str) -> String {
    let pattern = normalize_separators(pattern);
    let fixed = pattern
        .split('/')
        .take_while(|component| !has_wildcard(component))
        .count();

    let relative = normalize_separators(relative_path);
    let components: Vec<&str> = relative.split('/').collect();
    if components.len() <= fixed + 1 {
        return String::new();
    }

    let mut dir = components[fixed..components.len() - 1].join(MAIN_SEPARATOR_STR);
    dir.push(MAIN_SEPARATOR);
    dir
}
