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

//! Runtime values produced by property functions
//!
//! Properties are plain strings. Values only take a richer shape while a
//! property function call chain is being evaluated; the chain result is
//! stringified before it is spliced back into the surrounding text.

use super::version::BuildVersion;
use crate::error::{EvaluationError, Result};
use std::fmt;

/// Value produced by a property function
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value, stringifies to ""
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value
    Number(f64),
    /// String value
    String(String),
    /// Array value, stringified as a `;`-separated list
    Array(Vec<Value>),
    /// Parsed version
    Version(BuildVersion),
}

impl Value {
    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Name of the value kind, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Version(_) => "Version",
        }
    }

    /// Boolean coercion: truthy and not the string "false"
    pub fn coerce_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
            Value::Array(_) | Value::Version(_) => true,
        }
    }

    /// Numeric coercion; unparseable text yields NaN
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => parse_number(s),
            Value::Array(_) | Value::Version(_) => f64::NAN,
        }
    }

    /// Access a named member of the value
    pub fn field(&self, name: &str) -> Result<Value> {
        let upper = name.to_ascii_uppercase();
        match (self, upper.as_str()) {
            (Value::String(s), "LENGTH") => Ok(Value::Number(s.chars().count() as f64)),
            (Value::Array(items), "LENGTH" | "COUNT") => Ok(Value::Number(items.len() as f64)),
            (Value::Version(v), "MAJOR") => Ok(Value::Number(v.major as f64)),
            (Value::Version(v), "MINOR") => Ok(Value::Number(v.minor as f64)),
            (Value::Version(v), "BUILD") => Ok(Value::Number(v.build_or_undefined())),
            (Value::Version(v), "REVISION") => Ok(Value::Number(v.revision_or_undefined())),
            _ => Err(EvaluationError::unknown_function(name, self.kind())),
        }
    }

    /// Index into the value
    pub fn index(&self, index: &Value) -> Result<Value> {
        let position = index.to_number();
        if position.is_nan() || position < 0.0 {
            return Err(EvaluationError::invalid_arguments(
                "[]",
                format!("invalid index '{index}'"),
            ));
        }
        let position = position as usize;
        match self {
            Value::Array(items) => Ok(items.get(position).cloned().unwrap_or_default()),
            Value::String(s) => Ok(s
                .chars()
                .nth(position)
                .map(|c| Value::String(c.to_string()))
                .unwrap_or_default()),
            _ => Err(EvaluationError::unknown_function("[]", self.kind())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Version(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// Parse text as a number: decimal, `0x` hexadecimal, empty is zero
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let parsed = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).map(|n| n as f64).ok()
    } else {
        digits.parse::<f64>().ok()
    };
    match parsed {
        Some(n) if negative => -n,
        Some(n) => n,
        None => f64::NAN,
    }
}

/// Format a number the way it reads in a build file: integral values without
/// a fractional part
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
