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

//! `System.String` and `System.Convert` functions

use crate::error::{EvaluationError, Result};
use crate::host::Host;
use crate::model::Value;
use crate::registry::ClassSource;
use crate::registry::function::{FunctionImpl, arg_num, arg_str, require_args};

/// `System.String`
pub struct StringClass;

impl ClassSource for StringClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            ("IsNullOrEmpty", FunctionImpl::Sync(is_null_or_empty)),
            ("IsNullOrWhiteSpace", FunctionImpl::Sync(is_null_or_white_space)),
            ("Concat", FunctionImpl::Sync(concat)),
            ("Copy", FunctionImpl::Sync(copy)),
            ("Join", FunctionImpl::Sync(join)),
            ("Format", FunctionImpl::Sync(format)),
            ("Equals", FunctionImpl::Sync(equals)),
        ]
    }
}

/// `System.Convert`
pub struct ConvertClass;

impl ClassSource for ConvertClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            ("ToInt32", FunctionImpl::Sync(to_int32)),
            ("ToInt64", FunctionImpl::Sync(to_int32)),
            ("ToDouble", FunctionImpl::Sync(to_double)),
            ("ToString", FunctionImpl::Sync(copy)),
            ("ToBoolean", FunctionImpl::Sync(to_boolean)),
        ]
    }
}

fn is_null_or_empty(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(arg_str(args, 0).is_empty()))
}

fn is_null_or_white_space(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(arg_str(args, 0).trim().is_empty()))
}

fn concat(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::String(args.iter().map(Value::to_string).collect()))
}

fn copy(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::String(arg_str(args, 0)))
}

fn join(args: &[Value], _host: &Host) -> Result<Value> {
    require_args(args, 1, "Join")?;
    let separator = arg_str(args, 0);
    let parts: Vec<String> = args[1..]
        .iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().map(Value::to_string).collect(),
            other => vec![other.to_string()],
        })
        .collect();
    Ok(Value::String(parts.join(&separator)))
}

/// Composite formatting with `{0}`, `{1}`, ... placeholders; `{{`/`}}` escape
fn format(args: &[Value], _host: &Host) -> Result<Value> {
    require_args(args, 1, "Format")?;
    let template = arg_str(args, 0);
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let spec: String = chars.by_ref().take_while(|&ch| ch != '}').collect();
                let index = spec
                    .split([',', ':'])
                    .next()
                    .and_then(|i| i.trim().parse::<usize>().ok())
                    .ok_or_else(|| {
                        EvaluationError::invalid_arguments(
                            "Format",
                            format!("bad placeholder {{{spec}}}"),
                        )
                    })?;
                let value = args.get(index + 1).ok_or_else(|| {
                    EvaluationError::invalid_arguments(
                        "Format",
                        format!("missing argument {index}"),
                    )
                })?;
                out.push_str(&value.to_string());
            }
            other => out.push(other),
        }
    }
    Ok(Value::String(out))
}

fn equals(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(arg_str(args, 0) == arg_str(args, 1)))
}

fn to_int32(args: &[Value], _host: &Host) -> Result<Value> {
    let n = arg_num(args, 0, "ToInt32")?;
    Ok(Value::Number(n.round()))
}

fn to_double(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Number(arg_num(args, 0, "ToDouble")?))
}

fn to_boolean(args: &[Value], _host: &Host) -> Result<Value> {
    let text = arg_str(args, 0);
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => match arg_num(args, 0, "ToBoolean") {
            Ok(n) => Ok(Value::Bool(n != 0.0)),
            Err(_) => Err(EvaluationError::invalid_arguments(
                "ToBoolean",
                format!("'{text}' is not a boolean"),
            )),
        },
    }
}
