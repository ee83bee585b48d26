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

//! `System.IO.File` and `System.IO.Directory` functions
//!
//! These go through the host filesystem so they see the same view of the
//! disk (real or in-memory) as the rest of the evaluation.

use super::path::native_separators;
use crate::error::Result;
use crate::host::Host;
use crate::host::glob::{absolute_pattern, path_to_pattern_text};
use crate::model::Value;
use crate::registry::ClassSource;
use crate::registry::function::{FunctionImpl, arg_str};
use std::path::PathBuf;

/// `System.IO.File`
pub struct FileClass;

impl ClassSource for FileClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            ("Exists", FunctionImpl::asynchronous(exists)),
            ("ReadAllText", FunctionImpl::asynchronous(read_all_text)),
            ("GetLastWriteTime", FunctionImpl::asynchronous(get_last_write_time)),
            ("GetCreationTime", FunctionImpl::asynchronous(get_creation_time)),
        ]
    }
}

/// `System.IO.Directory`
pub struct DirectoryClass;

impl ClassSource for DirectoryClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            ("Exists", FunctionImpl::asynchronous(exists)),
            ("GetFiles", FunctionImpl::asynchronous(get_files)),
            ("GetCurrentDirectory", FunctionImpl::Sync(get_current_directory)),
        ]
    }
}

fn arg_path(args: &[Value], index: usize) -> PathBuf {
    PathBuf::from(native_separators(&arg_str(args, index)))
}

async fn exists(args: Vec<Value>, host: Host) -> Result<Value> {
    let path = arg_path(&args, 0);
    if path.as_os_str().is_empty() {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(host.fs.exists(&path).await))
}

async fn read_all_text(args: Vec<Value>, host: Host) -> Result<Value> {
    let text = host.fs.read_text(&arg_path(&args, 0)).await?;
    Ok(Value::String(text))
}

async fn get_last_write_time(args: Vec<Value>, host: Host) -> Result<Value> {
    let stat = host.fs.stat(&arg_path(&args, 0)).await?;
    Ok(stat
        .modified
        .map(|time| Value::string(time.format("%Y-%m-%d %H:%M:%S").to_string()))
        .unwrap_or_default())
}

async fn get_creation_time(args: Vec<Value>, host: Host) -> Result<Value> {
    let stat = host.fs.stat(&arg_path(&args, 0)).await?;
    Ok(stat
        .created
        .map(|time| Value::string(time.format("%Y-%m-%d %H:%M:%S").to_string()))
        .unwrap_or_default())
}

async fn get_files(args: Vec<Value>, host: Host) -> Result<Value> {
    let directory = arg_path(&args, 0);
    let pattern = match arg_str(&args, 1) {
        p if p.is_empty() => "*".to_string(),
        p => p,
    };
    let pattern = absolute_pattern(&directory, &pattern);
    let files = host.fs.search(&pattern, &[]).await?;
    Ok(Value::Array(
        files
            .iter()
            .map(|path| Value::string(path_to_pattern_text(path)))
            .collect(),
    ))
}

fn get_current_directory(_args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::string(
        std::env::current_dir()
            .unwrap_or_default()
            .to_string_lossy(),
    ))
}
