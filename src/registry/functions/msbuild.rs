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

//! `[MSBuild]` property functions
//!
//! The toolchain's own helper class: arithmetic on string operands, bitwise
//! operations, version comparison, path shaping, escaping, registry access
//! and the resolved toolchain locations carried by the [`Host`].

use super::path::{full_path, native_separators, normalize_lexically};
use super::version::version_arg;
use super::win32::registry_value;
use crate::error::{EvaluationError, Result};
use crate::host::Host;
use crate::model::Value;
use crate::registry::ClassSource;
use crate::registry::function::{FunctionImpl, arg_int, arg_num, arg_str, require_args};
use std::cmp::Ordering;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};

/// `[MSBuild]`
pub struct MsBuildClass;

impl ClassSource for MsBuildClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            ("Add", FunctionImpl::Sync(add)),
            ("Subtract", FunctionImpl::Sync(subtract)),
            ("Multiply", FunctionImpl::Sync(multiply)),
            ("Divide", FunctionImpl::Sync(divide)),
            ("Modulo", FunctionImpl::Sync(modulo)),
            ("BitwiseOr", FunctionImpl::Sync(bitwise_or)),
            ("BitwiseAnd", FunctionImpl::Sync(bitwise_and)),
            ("BitwiseXor", FunctionImpl::Sync(bitwise_xor)),
            ("BitwiseNot", FunctionImpl::Sync(bitwise_not)),
            ("VersionEquals", FunctionImpl::Sync(version_equals)),
            ("VersionNotEquals", FunctionImpl::Sync(version_not_equals)),
            ("VersionGreaterThan", FunctionImpl::Sync(version_greater_than)),
            (
                "VersionGreaterThanOrEquals",
                FunctionImpl::Sync(version_greater_than_or_equals),
            ),
            ("VersionLessThan", FunctionImpl::Sync(version_less_than)),
            (
                "VersionLessThanOrEquals",
                FunctionImpl::Sync(version_less_than_or_equals),
            ),
            ("EnsureTrailingSlash", FunctionImpl::Sync(ensure_trailing_slash)),
            ("NormalizePath", FunctionImpl::Sync(normalize_path)),
            ("NormalizeDirectory", FunctionImpl::Sync(normalize_directory)),
            ("MakeRelative", FunctionImpl::Sync(make_relative)),
            ("ValueOrDefault", FunctionImpl::Sync(value_or_default)),
            ("Escape", FunctionImpl::Sync(escape_fn)),
            ("Unescape", FunctionImpl::Sync(unescape_fn)),
            ("IsOSPlatform", FunctionImpl::Sync(is_os_platform)),
            ("IsOSUnixLike", FunctionImpl::Sync(is_os_unix_like)),
            ("IsRunningFromVisualStudio", FunctionImpl::Sync(always_false)),
            (
                "GetDirectoryNameOfFileAbove",
                FunctionImpl::asynchronous(get_directory_name_of_file_above),
            ),
            ("GetPathOfFileAbove", FunctionImpl::asynchronous(get_path_of_file_above)),
            ("GetRegistryValue", FunctionImpl::asynchronous(get_registry_value)),
            (
                "GetRegistryValueFromView",
                FunctionImpl::asynchronous(get_registry_value_from_view),
            ),
            ("GetCurrentToolsDirectory", FunctionImpl::Sync(tools_directory)),
            ("GetToolsDirectory32", FunctionImpl::Sync(tools_directory)),
            ("GetToolsDirectory64", FunctionImpl::Sync(tools_directory)),
            ("GetMSBuildSDKsPath", FunctionImpl::Sync(sdks_path)),
            ("GetMSBuildExtensionsPath", FunctionImpl::Sync(extensions_path)),
            ("GetProgramFiles32", FunctionImpl::Sync(program_files_32)),
            (
                "GetTargetFrameworkIdentifier",
                FunctionImpl::Sync(target_framework_identifier),
            ),
            (
                "GetTargetFrameworkVersion",
                FunctionImpl::Sync(target_framework_version),
            ),
            (
                "GetTargetPlatformIdentifier",
                FunctionImpl::Sync(target_platform_identifier),
            ),
        ]
    }
}

fn binary(args: &[Value], name: &str, op: fn(f64, f64) -> f64) -> Result<Value> {
    require_args(args, 2, name)?;
    Ok(Value::Number(op(arg_num(args, 0, name)?, arg_num(args, 1, name)?)))
}

fn add(args: &[Value], _host: &Host) -> Result<Value> {
    binary(args, "Add", |a, b| a + b)
}

fn subtract(args: &[Value], _host: &Host) -> Result<Value> {
    binary(args, "Subtract", |a, b| a - b)
}

fn multiply(args: &[Value], _host: &Host) -> Result<Value> {
    binary(args, "Multiply", |a, b| a * b)
}

fn divide(args: &[Value], _host: &Host) -> Result<Value> {
    binary(args, "Divide", |a, b| a / b)
}

fn modulo(args: &[Value], _host: &Host) -> Result<Value> {
    binary(args, "Modulo", |a, b| a % b)
}

fn bitwise(args: &[Value], name: &str, op: fn(i64, i64) -> i64) -> Result<Value> {
    require_args(args, 2, name)?;
    Ok(Value::Number(
        op(arg_int(args, 0, name)?, arg_int(args, 1, name)?) as f64,
    ))
}

fn bitwise_or(args: &[Value], _host: &Host) -> Result<Value> {
    bitwise(args, "BitwiseOr", |a, b| a | b)
}

fn bitwise_and(args: &[Value], _host: &Host) -> Result<Value> {
    bitwise(args, "BitwiseAnd", |a, b| a & b)
}

fn bitwise_xor(args: &[Value], _host: &Host) -> Result<Value> {
    bitwise(args, "BitwiseXor", |a, b| a ^ b)
}

fn bitwise_not(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Number(!arg_int(args, 0, "BitwiseNot")? as f64))
}

fn compare_versions(args: &[Value], name: &str) -> Result<Ordering> {
    require_args(args, 2, name)?;
    Ok(version_arg(args, 0, name)?.cmp(&version_arg(args, 1, name)?))
}

fn version_equals(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(compare_versions(args, "VersionEquals")?.is_eq()))
}

fn version_not_equals(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(compare_versions(args, "VersionNotEquals")?.is_ne()))
}

fn version_greater_than(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(compare_versions(args, "VersionGreaterThan")?.is_gt()))
}

fn version_greater_than_or_equals(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(
        compare_versions(args, "VersionGreaterThanOrEquals")?.is_ge(),
    ))
}

fn version_less_than(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(compare_versions(args, "VersionLessThan")?.is_lt()))
}

fn version_less_than_or_equals(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(
        compare_versions(args, "VersionLessThanOrEquals")?.is_le(),
    ))
}

/// Append the native separator unless the path is empty or already ends
/// with a separator
pub fn ensure_trailing_slash_text(path: &str) -> String {
    if path.is_empty() || path.ends_with(['/', '\\']) {
        path.to_string()
    } else {
        format!("{path}{MAIN_SEPARATOR}")
    }
}

fn ensure_trailing_slash(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::String(ensure_trailing_slash_text(&arg_str(args, 0))))
}

fn combined_full_path(args: &[Value]) -> PathBuf {
    let mut combined = PathBuf::new();
    for index in 0..args.len() {
        combined.push(native_separators(&arg_str(args, index)));
    }
    let base = std::env::current_dir().unwrap_or_default();
    full_path(&base, &combined.to_string_lossy())
}

fn normalize_path(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::string(combined_full_path(args).to_string_lossy()))
}

fn normalize_directory(args: &[Value], _host: &Host) -> Result<Value> {
    let path = combined_full_path(args);
    Ok(Value::String(ensure_trailing_slash_text(
        &path.to_string_lossy(),
    )))
}

fn same_component(a: &Component<'_>, b: &Component<'_>) -> bool {
    if cfg!(windows) {
        a.as_os_str()
            .to_string_lossy()
            .eq_ignore_ascii_case(&b.as_os_str().to_string_lossy())
    } else {
        a == b
    }
}

/// Path of `path` relative to the directory `base`
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    let base = normalize_lexically(base);
    let target = normalize_lexically(path);
    let base_parts: Vec<Component<'_>> = base.components().collect();
    let target_parts: Vec<Component<'_>> = target.components().collect();

    let common = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| same_component(a, b))
        .count();
    if common == 0 && target.has_root() {
        return target;
    }

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[common..] {
        relative.push(part.as_os_str());
    }
    relative
}

fn make_relative(args: &[Value], _host: &Host) -> Result<Value> {
    require_args(args, 2, "MakeRelative")?;
    let base = native_separators(&arg_str(args, 0));
    let path = native_separators(&arg_str(args, 1));
    let mut relative = relative_path(Path::new(&base), Path::new(&path))
        .to_string_lossy()
        .to_string();
    if path.ends_with(['/', '\\']) {
        relative = ensure_trailing_slash_text(&relative);
    }
    Ok(Value::String(relative))
}

fn value_or_default(args: &[Value], _host: &Host) -> Result<Value> {
    let value = arg_str(args, 0);
    if value.is_empty() {
        Ok(Value::String(arg_str(args, 1)))
    } else {
        Ok(Value::String(value))
    }
}

const ESCAPED: &[char] = &['%', '*', '?', '@', '$', '(', ')', ';', '\''];

/// Replace the build language's special characters with `%XX` escapes
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ESCAPED.contains(&c) {
            out.push_str(&format!("%{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

/// Decode `%XX` escapes; malformed sequences are kept as written
pub fn unescape(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let decoded = text
                .get(i + 1..i + 3)
                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn escape_fn(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::String(escape(&arg_str(args, 0))))
}

fn unescape_fn(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::String(unescape(&arg_str(args, 0))))
}

fn is_os_platform(args: &[Value], host: &Host) -> Result<Value> {
    let wanted = arg_str(args, 0);
    let platform = host.environment.platform();
    let matches = platform.eq_ignore_ascii_case(&wanted)
        || (wanted.eq_ignore_ascii_case("macos") && platform.eq_ignore_ascii_case("OSX"));
    Ok(Value::Bool(matches))
}

fn is_os_unix_like(_args: &[Value], host: &Host) -> Result<Value> {
    Ok(Value::Bool(
        !host.environment.platform().eq_ignore_ascii_case("Windows"),
    ))
}

fn always_false(_args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Bool(false))
}

/// Walk from `start` towards the root, returning the first directory holding
/// `file_name`
async fn find_file_above(host: &Host, start: &Path, file_name: &str) -> Option<PathBuf> {
    let mut directory = Some(normalize_lexically(start));
    while let Some(current) = directory {
        if host.fs.exists(&current.join(file_name)).await {
            return Some(current);
        }
        directory = current.parent().map(Path::to_path_buf);
    }
    None
}

fn start_directory(args: &[Value], index: usize) -> PathBuf {
    let start = native_separators(&arg_str(args, index));
    if start.is_empty() {
        std::env::current_dir().unwrap_or_default()
    } else {
        PathBuf::from(start)
    }
}

/// `GetDirectoryNameOfFileAbove(startingDirectory, fileName)`
async fn get_directory_name_of_file_above(args: Vec<Value>, host: Host) -> Result<Value> {
    require_args(&args, 2, "GetDirectoryNameOfFileAbove")?;
    let start = start_directory(&args, 0);
    let found = find_file_above(&host, &start, &arg_str(&args, 1)).await;
    Ok(Value::string(
        found
            .map(|dir| dir.to_string_lossy().to_string())
            .unwrap_or_default(),
    ))
}

/// `GetPathOfFileAbove(fileName, startingDirectory)`
async fn get_path_of_file_above(args: Vec<Value>, host: Host) -> Result<Value> {
    require_args(&args, 1, "GetPathOfFileAbove")?;
    let file_name = arg_str(&args, 0);
    let start = start_directory(&args, 1);
    let found = find_file_above(&host, &start, &file_name).await;
    Ok(Value::string(
        found
            .map(|dir| dir.join(&file_name).to_string_lossy().to_string())
            .unwrap_or_default(),
    ))
}

/// `GetRegistryValue(key, valueName)`
async fn get_registry_value(args: Vec<Value>, host: Host) -> Result<Value> {
    let view = host.registry_view.clone();
    let value = registry_value(&host, &arg_str(&args, 0), &arg_str(&args, 1), &view).await;
    Ok(Value::string(value.unwrap_or_default()))
}

/// `GetRegistryValueFromView(key, valueName, default, view...)`: the first
/// view holding the value wins
async fn get_registry_value_from_view(args: Vec<Value>, host: Host) -> Result<Value> {
    require_args(&args, 2, "GetRegistryValueFromView")?;
    let key = arg_str(&args, 0);
    let name = arg_str(&args, 1);
    let mut views: Vec<String> = (3..args.len())
        .map(|index| arg_str(&args, index))
        .map(|view| view.rsplit('.').next().unwrap_or_default().to_string())
        .filter(|view| !view.is_empty())
        .collect();
    if views.is_empty() {
        views.push(host.registry_view.clone());
    }

    for view in &views {
        if let Some(value) = registry_value(&host, &key, &name, view).await {
            return Ok(Value::String(value));
        }
    }
    Ok(args.get(2).cloned().unwrap_or_default())
}

fn path_or_empty(path: &Option<PathBuf>) -> Value {
    Value::string(
        path.as_ref()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default(),
    )
}

fn tools_directory(_args: &[Value], host: &Host) -> Result<Value> {
    Ok(path_or_empty(&host.toolchain.bin_path))
}

fn sdks_path(_args: &[Value], host: &Host) -> Result<Value> {
    Ok(path_or_empty(&host.toolchain.sdks_path))
}

fn extensions_path(_args: &[Value], host: &Host) -> Result<Value> {
    Ok(path_or_empty(&host.toolchain.extensions_path))
}

fn program_files_32(_args: &[Value], host: &Host) -> Result<Value> {
    let folder = host
        .environment
        .special_folder("ProgramFilesX86")
        .or_else(|| host.environment.special_folder("ProgramFiles"));
    Ok(path_or_empty(&folder))
}

/// Target framework moniker split into identifier, version and platform
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFramework {
    /// Framework identifier such as `.NETCoreApp`
    pub identifier: String,
    /// Dotted framework version
    pub version: String,
    /// Platform suffix (`windows`, `android`, ...), empty when absent
    pub platform: String,
}

impl TargetFramework {
    /// Parse a short moniker (`net8.0`, `netstandard2.0`, `net472`,
    /// `net8.0-windows`)
    pub fn parse(moniker: &str) -> Option<Self> {
        let moniker = moniker.trim().to_ascii_lowercase();
        let (framework, platform) = moniker.split_once('-').unwrap_or((moniker.as_str(), ""));
        let digits_at = framework.find(|c: char| c.is_ascii_digit())?;
        let (name, digits) = framework.split_at(digits_at);

        let version = if digits.contains('.') {
            digits.to_string()
        } else {
            digits
                .chars()
                .map(String::from)
                .collect::<Vec<_>>()
                .join(".")
        };
        let major: u64 = version.split('.').next()?.parse().ok()?;

        let identifier = match name {
            "netstandard" => ".NETStandard",
            "netcoreapp" => ".NETCoreApp",
            "net" if major >= 5 => ".NETCoreApp",
            "net" => ".NETFramework",
            _ => return None,
        };
        Some(Self {
            identifier: identifier.to_string(),
            version,
            platform: platform.to_string(),
        })
    }

    /// Version padded or truncated to `parts` components
    pub fn version_with_parts(&self, parts: usize) -> String {
        let mut components: Vec<&str> = self.version.split('.').collect();
        components.resize(parts.max(1), "0");
        components.join(".")
    }
}

fn parse_framework(args: &[Value], function: &str) -> Result<TargetFramework> {
    let moniker = arg_str(args, 0);
    TargetFramework::parse(&moniker).ok_or_else(|| {
        EvaluationError::invalid_arguments(
            function,
            format!("'{moniker}' is not a target framework"),
        )
    })
}

fn target_framework_identifier(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::String(
        parse_framework(args, "GetTargetFrameworkIdentifier")?.identifier,
    ))
}

fn target_framework_version(args: &[Value], _host: &Host) -> Result<Value> {
    let framework = parse_framework(args, "GetTargetFrameworkVersion")?;
    let parts = if args.len() > 1 {
        let parts = arg_int(args, 1, "GetTargetFrameworkVersion")?;
        if !(1..=4).contains(&parts) {
            return Err(EvaluationError::invalid_arguments(
                "GetTargetFrameworkVersion",
                format!("{parts} version parts out of range 1..=4"),
            ));
        }
        parts as usize
    } else {
        2
    };
    Ok(Value::String(framework.version_with_parts(parts)))
}

fn target_platform_identifier(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::String(
        parse_framework(args, "GetTargetPlatformIdentifier")?.platform,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{MapEnvironment, MemoryFileSystem};
    use rstest::rstest;
    use std::sync::Arc;

    fn host() -> Host {
        Host::in_memory(Arc::new(
            MemoryFileSystem::new()
                .with_file("/repo/Directory.Build.props", "<Project/>")
                .with_file("/repo/src/app/app.csproj", "<Project/>"),
        ))
    }

    fn call(f: crate::registry::SyncStaticFn, args: &[&str]) -> Result<Value> {
        let args: Vec<Value> = args.iter().map(|a| Value::string(*a)).collect();
        f(&args, &host())
    }

    #[rstest]
    #[case(add, "2", "3", "5")]
    #[case(subtract, "2", "3", "-1")]
    #[case(multiply, "2.5", "2", "5")]
    #[case(divide, "7", "2", "3.5")]
    #[case(modulo, "7", "2", "1")]
    #[case(bitwise_or, "0x1", "6", "7")]
    #[case(bitwise_and, "12", "10", "8")]
    #[case(bitwise_xor, "12", "10", "6")]
    fn test_arithmetic(
        #[case] f: crate::registry::SyncStaticFn,
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(call(f, &[a, b]).unwrap().to_string(), expected);
    }

    #[rstest]
    #[case(version_equals, "1.2", "1.2.0", true)]
    #[case(version_greater_than, "10.0", "9.9.9", true)]
    #[case(version_less_than, "v2.0-preview", "2.0.1", true)]
    #[case(version_greater_than_or_equals, "1.0", "1.1", false)]
    fn test_version_comparisons(
        #[case] f: crate::registry::SyncStaticFn,
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(call(f, &[a, b]).unwrap(), Value::Bool(expected));
    }

    #[test]
    fn test_escape_roundtrip() {
        assert_eq!(escape("a;b$(c)"), "a%3Bb%24%28c%29");
        assert_eq!(unescape("a%3Bb%24%28c%29"), "a;b$(c)");
        assert_eq!(unescape("100%"), "100%");
        assert_eq!(unescape("%zz"), "%zz");
    }

    #[test]
    fn test_value_or_default() {
        assert_eq!(call(value_or_default, &["", "x"]).unwrap(), Value::string("x"));
        assert_eq!(call(value_or_default, &["y", "x"]).unwrap(), Value::string("y"));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_path_helpers() {
        assert_eq!(call(ensure_trailing_slash, &["/a"]).unwrap(), Value::string("/a/"));
        assert_eq!(call(ensure_trailing_slash, &[""]).unwrap(), Value::string(""));
        assert_eq!(
            call(make_relative, &["/a/b", "/a/c/d.txt"]).unwrap(),
            Value::string("../c/d.txt")
        );
        assert_eq!(
            call(make_relative, &["/a/b/", "/a/b/c/"]).unwrap(),
            Value::string("c/")
        );
        assert_eq!(
            call(normalize_directory, &["/a/b", "../c"]).unwrap(),
            Value::string("/a/c/")
        );
    }

    #[test]
    fn test_target_framework() {
        assert_eq!(
            call(target_framework_identifier, &["net8.0-windows"]).unwrap(),
            Value::string(".NETCoreApp")
        );
        assert_eq!(
            call(target_framework_identifier, &["net472"]).unwrap(),
            Value::string(".NETFramework")
        );
        assert_eq!(
            call(target_framework_version, &["net472", "3"]).unwrap(),
            Value::string("4.7.2")
        );
        assert_eq!(
            call(target_framework_version, &["netstandard2.0"]).unwrap(),
            Value::string("2.0")
        );
        assert_eq!(
            call(target_platform_identifier, &["net8.0-android"]).unwrap(),
            Value::string("android")
        );
        assert!(call(target_framework_identifier, &["foo"]).is_err());
    }

    #[test]
    fn test_platform() {
        let host = Host::in_memory(Arc::new(MemoryFileSystem::new()))
            .with_environment(Arc::new(MapEnvironment::new().with_platform("OSX")));
        assert_eq!(
            is_os_platform(&[Value::string("macos")], &host).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(is_os_unix_like(&[], &host).unwrap(), Value::Bool(true));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_file_above() {
        let found = get_directory_name_of_file_above(
            vec![Value::string("/repo/src/app"), Value::string("Directory.Build.props")],
            host(),
        )
        .await
        .unwrap();
        assert_eq!(found, Value::string("/repo"));

        let found = get_path_of_file_above(
            vec![Value::string("Directory.Build.props"), Value::string("/repo/src")],
            host(),
        )
        .await
        .unwrap();
        assert_eq!(found, Value::string("/repo/Directory.Build.props"));

        let missing = get_directory_name_of_file_above(
            vec![Value::string("/repo/src"), Value::string("nothing.props")],
            host(),
        )
        .await
        .unwrap();
        assert_eq!(missing, Value::string(""));
    }
}
