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

//! `System.Environment` functions, answered by the host environment

use crate::error::Result;
use crate::host::Host;
use crate::model::Value;
use crate::registry::ClassSource;
use crate::registry::function::{FunctionImpl, arg_str};

/// `System.Environment`
pub struct EnvironmentClass;

impl ClassSource for EnvironmentClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            (
                "GetEnvironmentVariable",
                FunctionImpl::Sync(get_environment_variable),
            ),
            ("GetFolderPath", FunctionImpl::Sync(get_folder_path)),
            (
                "ExpandEnvironmentVariables",
                FunctionImpl::Sync(expand_environment_variables),
            ),
        ]
    }
}

fn get_environment_variable(args: &[Value], host: &Host) -> Result<Value> {
    Ok(host
        .environment
        .var(&arg_str(args, 0))
        .map(Value::String)
        .unwrap_or_default())
}

/// Accepts `ApplicationData` as well as `SpecialFolder.ApplicationData`
fn get_folder_path(args: &[Value], host: &Host) -> Result<Value> {
    let folder = arg_str(args, 0);
    let folder = folder.rsplit('.').next().unwrap_or_default();
    Ok(host
        .environment
        .special_folder(folder)
        .map(|path| Value::string(path.to_string_lossy()))
        .unwrap_or_else(|| Value::string("")))
}

/// Replace `%NAME%` with environment values; unknown names stay as written
fn expand_environment_variables(args: &[Value], host: &Host) -> Result<Value> {
    let text = arg_str(args, 0);
    let mut out = String::with_capacity(text.len());
    let mut rest = text.as_str();

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match host.environment.var(name) {
                    Some(value) if !name.is_empty() => out.push_str(&value),
                    _ => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(Value::String(out))
}
