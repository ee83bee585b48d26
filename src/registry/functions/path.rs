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

//! `System.IO.Path` functions

use crate::error::Result;
use crate::host::Host;
use crate::model::Value;
use crate::registry::ClassSource;
use crate::registry::function::{FunctionImpl, arg_str};
use std::path::{Component, Path, PathBuf};

/// `System.IO.Path`
pub struct PathClass;

impl ClassSource for PathClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            ("Combine", FunctionImpl::Sync(combine)),
            ("GetFileName", FunctionImpl::Sync(get_file_name)),
            (
                "GetFileNameWithoutExtension",
                FunctionImpl::Sync(get_file_name_without_extension),
            ),
            ("GetExtension", FunctionImpl::Sync(get_extension)),
            ("HasExtension", FunctionImpl::Sync(has_extension)),
            ("ChangeExtension", FunctionImpl::Sync(change_extension)),
            ("GetDirectoryName", FunctionImpl::Sync(get_directory_name)),
            ("GetFullPath", FunctionImpl::Sync(get_full_path)),
            ("GetPathRoot", FunctionImpl::Sync(get_path_root)),
            ("IsPathRooted", FunctionImpl::Sync(is_path_rooted)),
            ("GetTempPath", FunctionImpl::Sync(get_temp_path)),
        ]
    }
}

/// Convert `\` separators to the native separator
pub fn native_separators(path: &str) -> String {
    if cfg!(windows) {
        path.to_string()
    } else {
        path.replace('\\', "/")
    }
}

/// Lexically normalize a path: resolve `.` and `..` without touching disk
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Absolute, normalized form of `path` resolved against `base`
pub fn full_path(base: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(native_separators(path));
    let joined = if path.is_absolute() {
        path
    } else {
        base.join(path)
    };
    normalize_lexically(&joined)
}

fn arg_path(args: &[Value], index: usize) -> PathBuf {
    PathBuf::from(native_separators(&arg_str(args, index)))
}

fn path_value(path: &Path) -> Value {
    Value::string(path.to_string_lossy())
}

fn combine(args: &[Value], _host: &Host) -> Result<Value> {
    let mut combined = PathBuf::new();
    for index in 0..args.len() {
        combined.push(arg_path(args, index));
    }
    Ok(path_value(&combined))
}

fn get_file_name(args: &[Value], _host: &Host) -> Result<Value> {
    let path = arg_path(args, 0);
    Ok(path
        .file_name()
        .map(|name| Value::string(name.to_string_lossy()))
        .unwrap_or_else(|| Value::string("")))
}

fn get_file_name_without_extension(args: &[Value], _host: &Host) -> Result<Value> {
    let path = arg_path(args, 0);
    Ok(path
        .file_stem()
        .map(|stem| Value::string(stem.to_string_lossy()))
        .unwrap_or_else(|| Value::string("")))
}

fn get_extension(args: &[Value], _host: &Host) -> Result<Value> {
    let path = arg_path(args, 0);
    Ok(Value::string(
        path.extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default(),
    ))
}

fn has_extension(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(arg_path(args, 0).extension().is_some()))
}

fn change_extension(args: &[Value], _host: &Host) -> Result<Value> {
    let path = arg_path(args, 0);
    let extension = arg_str(args, 1);
    let extension = extension.trim_start_matches('.');
    Ok(path_value(&path.with_extension(extension)))
}

fn get_directory_name(args: &[Value], _host: &Host) -> Result<Value> {
    let path = arg_path(args, 0);
    Ok(path
        .parent()
        .map(path_value)
        .unwrap_or_else(|| Value::string("")))
}

fn get_full_path(args: &[Value], _host: &Host) -> Result<Value> {
    let base = std::env::current_dir().unwrap_or_default();
    Ok(path_value(&full_path(&base, &arg_str(args, 0))))
}

fn get_path_root(args: &[Value], _host: &Host) -> Result<Value> {
    let path = arg_path(args, 0);
    let root: PathBuf = path
        .components()
        .take_while(|c| matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect();
    Ok(path_value(&root))
}

fn is_path_rooted(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(arg_path(args, 0).has_root()))
}

fn get_temp_path(_args: &[Value], _host: &Host) -> Result<Value> {
    let mut temp = std::env::temp_dir().to_string_lossy().to_string();
    if !temp.ends_with(std::path::MAIN_SEPARATOR) {
        temp.push(std::path::MAIN_SEPARATOR);
    }
    Ok(Value::string(temp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryFileSystem;
    use std::sync::Arc;

    fn call(f: crate::registry::SyncStaticFn, args: &[&str]) -> String {
        let host = Host::in_memory(Arc::new(MemoryFileSystem::new()));
        let args: Vec<Value> = args.iter().map(|a| Value::string(*a)).collect();
        f(&args, &host).unwrap().to_string()
    }

    #[test]
    fn test_path_functions() {
        assert_eq!(call(get_file_name, &["/a/b/c.txt"]), "c.txt");
        assert_eq!(call(get_file_name_without_extension, &["/a/b/c.txt"]), "c");
        assert_eq!(call(get_extension, &["/a/b/c.txt"]), ".txt");
        assert_eq!(call(get_extension, &["/a/b/c"]), "");
        assert_eq!(call(change_extension, &["/a/c.txt", ".md"]), "/a/c.md");
        assert_eq!(call(is_path_rooted, &["/a"]), "true");
        assert_eq!(call(is_path_rooted, &["a/b"]), "false");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_backslashes_and_combine() {
        assert_eq!(call(get_directory_name, &["a\\b\\c.txt"]), "a/b");
        assert_eq!(call(combine, &["/root", "sub", "f.cs"]), "/root/sub/f.cs");
        assert_eq!(call(combine, &["/root", "/abs"]), "/abs");
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(full_path(Path::new("/base"), "x/../y"), PathBuf::from("/base/y"));
    }
}
