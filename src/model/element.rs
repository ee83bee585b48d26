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

//! Owned build-file element tree
//!
//! Documents are parsed once with `roxmltree` and converted into owned,
//! cheaply cloneable nodes. Every element remembers the file it came from so
//! that origin lookups and defining-project metadata can be answered without
//! keeping the source text alive.

use crate::error::{EvaluationError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An element of a build file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Arc<Element>>,
    source: Option<Arc<Path>>,
}

impl Element {
    /// Create an element with the given tag name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder: add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: set the text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder: append a child
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    /// Builder: set the defining file, recursively
    pub fn with_source(mut self, source: &Path) -> Self {
        self.assign_source(Arc::from(source));
        self
    }

    fn assign_source(&mut self, source: Arc<Path>) {
        for child in &mut self.children {
            Arc::make_mut(child).assign_source(source.clone());
        }
        self.source = Some(source);
    }

    /// Tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the tag name matches, ignoring case
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Attribute value by name, ignoring case
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The `Condition` attribute, or "" when absent
    pub fn condition(&self) -> &str {
        self.attribute("Condition").unwrap_or_default()
    }

    /// All attributes in document order
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// Set or replace an attribute
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Text content
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Child elements in document order
    pub fn children(&self) -> &[Arc<Element>] {
        &self.children
    }

    /// Child elements with the given tag name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Arc<Element>> {
        self.children.iter().filter(move |child| child.is(name))
    }

    /// Append a child, returning the shared handle
    pub fn push_child(&mut self, mut child: Element) -> Arc<Element> {
        if let Some(source) = &self.source {
            child.assign_source(source.clone());
        }
        let child = Arc::new(child);
        self.children.push(child.clone());
        child
    }

    /// Append an already shared child without copying it
    pub fn push_shared_child(&mut self, child: Arc<Element>) {
        self.children.push(child);
    }

    /// Position of the first child matching `predicate`
    pub fn position(&self, predicate: impl Fn(&Element) -> bool) -> Option<usize> {
        self.children.iter().position(|child| predicate(child))
    }

    /// Mutable access to a child by position
    pub fn child_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.children.get_mut(index).map(Arc::make_mut)
    }

    /// Remove children matching `predicate`, returning them
    pub fn remove_children(&mut self, predicate: impl Fn(&Element) -> bool) -> Vec<Arc<Element>> {
        let (removed, kept) = std::mem::take(&mut self.children)
            .into_iter()
            .partition(|child| predicate(child));
        self.children = kept;
        removed
    }

    /// File this element was read from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    fn from_node(node: roxmltree::Node<'_, '_>, source: &Arc<Path>) -> Self {
        let mut text = String::new();
        let mut children = Vec::new();
        for child in node.children() {
            if child.is_element() {
                children.push(Arc::new(Self::from_node(child, source)));
            } else if child.is_text() {
                text.push_str(child.text().unwrap_or_default());
            }
        }

        Self {
            name: node.tag_name().name().to_string(),
            attributes: node
                .attributes()
                .map(|attr| (attr.name().to_string(), attr.value().to_string()))
                .collect(),
            text: text.trim().to_string(),
            children,
            source: Some(source.clone()),
        }
    }
}

/// A parsed build file
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: PathBuf,
    root: Arc<Element>,
}

impl Document {
    /// Parse build-file text read from `path`
    pub fn parse(text: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let doc = roxmltree::Document::parse(text).map_err(|e| EvaluationError::Xml {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let source: Arc<Path> = Arc::from(path.as_path());
        let root = Element::from_node(doc.root_element(), &source);
        Ok(Self {
            path,
            root: Arc::new(root),
        })
    }

    /// Wrap an already built element tree
    pub fn from_root(path: impl Into<PathBuf>, root: Element) -> Self {
        let path = path.into();
        let root = root.with_source(&path);
        Self {
            path,
            root: Arc::new(root),
        }
    }

    /// Path the document was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Root element
    pub fn root(&self) -> &Arc<Element> {
        &self.root
    }
}
