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

//! `System.Version`

use crate::error::{EvaluationError, Result};
use crate::host::Host;
use crate::model::{BuildVersion, Value};
use crate::registry::ClassSource;
use crate::registry::function::{FunctionImpl, arg_str};

/// `System.Version`
pub struct VersionClass;

impl ClassSource for VersionClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            ("Parse", FunctionImpl::Sync(parse)),
            ("TryParse", FunctionImpl::Sync(try_parse)),
        ]
    }
}

/// Parse a version argument, accepting an already-parsed version
pub fn version_arg(args: &[Value], index: usize, function: &str) -> Result<BuildVersion> {
    if let Some(Value::Version(version)) = args.get(index) {
        return Ok(version.clone());
    }
    let text = arg_str(args, index);
    BuildVersion::parse(&text).ok_or_else(|| {
        EvaluationError::invalid_arguments(function, format!("'{text}' is not a version"))
    })
}

fn parse(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Version(version_arg(args, 0, "Parse")?))
}

fn try_parse(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(BuildVersion::parse(&arg_str(args, 0)).is_some()))
}
