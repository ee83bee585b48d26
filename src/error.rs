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

//! Error types for build-file evaluation
//!
//! Most of these never escape the public evaluation entry points: the
//! evaluator logs them and degrades to a usable value. They are still typed so
//! that the internal layers can propagate failures with `?`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for evaluation operations
pub type Result<T> = std::result::Result<T, EvaluationError>;

/// Errors raised while evaluating a build description
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// Static function class is not registered
    #[error("Unknown class: {class_name}")]
    UnknownClass {
        /// Class name as written (qualifier already stripped)
        class_name: String,
    },

    /// Function or member is not available on the receiver
    #[error("Unknown function '{function_name}' on {receiver}")]
    UnknownFunction {
        /// Name of the function that was requested
        function_name: String,
        /// Receiver description (class name or value kind)
        receiver: String,
    },

    /// Arguments could not be coerced to what the function needs
    #[error("Function '{function_name}' error: {message}")]
    InvalidArguments {
        /// Name of the function that rejected its arguments
        function_name: String,
        /// Human-readable error message
        message: String,
    },

    /// Argument list or macro is missing its closing parenthesis
    #[error("Missing closing parenthesis in '{text}'")]
    ParenMismatch {
        /// Text that was being scanned
        text: String,
    },

    /// Index access is missing its closing bracket
    #[error("Missing closing bracket in '{text}'")]
    MissingBracket {
        /// Text that was being scanned
        text: String,
    },

    /// Imported file is unreadable or has the wrong root element
    #[error("Invalid import {}: {message}", path.display())]
    MalformedImport {
        /// Resolved path of the import
        path: PathBuf,
        /// Human-readable error message
        message: String,
    },

    /// Filesystem failure reported by a collaborator
    #[error("IO error on {}: {message}", path.display())]
    Io {
        /// Path the operation was applied to
        path: PathBuf,
        /// Underlying error message
        message: String,
    },

    /// Build file could not be parsed
    #[error("XML error in {}: {message}", path.display())]
    Xml {
        /// Path of the document
        path: PathBuf,
        /// Parser error message
        message: String,
    },

    /// Configuration could not be loaded
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable error message
        message: String,
    },
}

impl EvaluationError {
    /// Create an invalid-arguments error
    pub fn invalid_arguments(function_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            function_name: function_name.into(),
            message: message.into(),
        }
    }

    /// Create an unknown-function error
    pub fn unknown_function(function_name: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self::UnknownFunction {
            function_name: function_name.into(),
            receiver: receiver.into(),
        }
    }

    /// Create an IO error for the given path
    pub fn io(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }
}
