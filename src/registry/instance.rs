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

//! Instance methods callable on a property value: `$(Name.Method(...))`
//!
//! The receiver is treated as a string, except where a method has a more
//! specific meaning for versions.

use super::function::{arg_i32, arg_int, arg_str, require_args};
use crate::error::{EvaluationError, Result};
use crate::model::{BuildVersion, Value};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

type InstanceFn = fn(&Value, &[Value]) -> Result<Value>;

static METHODS: Lazy<FxHashMap<&'static str, InstanceFn>> = Lazy::new(|| {
    let entries: [(&'static str, InstanceFn); 26] = [
        ("SUBSTRING", substring),
        ("INDEXOF", index_of),
        ("LASTINDEXOF", last_index_of),
        ("TRIM", trim),
        ("TRIMSTART", trim_start),
        ("TRIMEND", trim_end),
        ("TOUPPER", to_upper),
        ("TOUPPERINVARIANT", to_upper),
        ("TOLOWER", to_lower),
        ("TOLOWERINVARIANT", to_lower),
        ("SPLIT", split),
        ("REPLACE", replace),
        ("STARTSWITH", starts_with),
        ("ENDSWITH", ends_with),
        ("CONTAINS", contains),
        ("PADLEFT", pad_left),
        ("PADRIGHT", pad_right),
        ("REMOVE", remove),
        ("INSERT", insert),
        ("EQUALS", equals),
        ("TOSTRING", to_string),
        ("GET_CHARS", get_chars),
        ("GET_LENGTH", get_length),
        ("COMPARETO", compare_to),
        ("ISEMPTY", is_empty),
        ("COUNT", get_length),
    ];
    entries.into_iter().collect()
});

/// Invoke `method` on `receiver`
pub fn call_instance(receiver: &Value, method: &str, args: &[Value]) -> Result<Value> {
    let function = METHODS
        .get(method.to_ascii_uppercase().as_str())
        .ok_or_else(|| EvaluationError::unknown_function(method, receiver.kind()))?;
    function(receiver, args)
}

fn chars_of(receiver: &Value) -> Vec<char> {
    receiver.to_string().chars().collect()
}

fn char_index(value: i64, len: usize, function: &str) -> Result<usize> {
    if value < 0 || value as usize > len {
        return Err(EvaluationError::invalid_arguments(
            function,
            format!("index {value} out of range for length {len}"),
        ));
    }
    Ok(value as usize)
}

/// `start + length` as a character index
fn char_end(start: usize, length: i64, len: usize, function: &str) -> Result<usize> {
    let end = (start as i64).checked_add(length).ok_or_else(|| {
        EvaluationError::invalid_arguments(function, format!("length {length} out of range"))
    })?;
    char_index(end, len, function)
}

fn ignore_case(args: &[Value], index: usize) -> bool {
    arg_str(args, index).to_ascii_lowercase().ends_with("ignorecase")
}

fn substring(receiver: &Value, args: &[Value]) -> Result<Value> {
    let chars = chars_of(receiver);
    let start = char_index(arg_int(args, 0, "Substring")?, chars.len(), "Substring")?;
    let end = if args.len() > 1 {
        let length = arg_int(args, 1, "Substring")?;
        char_end(start, length, chars.len(), "Substring")?
    } else {
        chars.len()
    };
    if end < start {
        return Err(EvaluationError::invalid_arguments(
            "Substring",
            "negative length",
        ));
    }
    Ok(Value::String(chars[start..end].iter().collect()))
}

fn find_chars(haystack: &[char], needle: &[char], from: usize, last: bool) -> Option<usize> {
    if needle.is_empty() {
        return Some(if last { haystack.len() } else { from });
    }
    if needle.len() > haystack.len() {
        return None;
    }
    let candidates = from..=haystack.len() - needle.len();
    let matches = |i: &usize| haystack[*i..*i + needle.len()] == *needle;
    if last {
        candidates.rev().find(matches)
    } else {
        candidates.into_iter().find(matches)
    }
}

fn folded(receiver: &Value, args: &[Value], case_arg: usize) -> (Vec<char>, Vec<char>) {
    let mut text = receiver.to_string();
    let mut needle = arg_str(args, 0);
    if ignore_case(args, case_arg) {
        text = text.to_lowercase();
        needle = needle.to_lowercase();
    }
    (text.chars().collect(), needle.chars().collect())
}

fn position(found: Option<usize>) -> Value {
    Value::Number(found.map(|i| i as f64).unwrap_or(-1.0))
}

fn index_of(receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args(args, 1, "IndexOf")?;
    let numeric_start = args.len() > 1 && !ignore_case(args, 1);
    let (text, needle) = folded(receiver, args, if numeric_start { 2 } else { 1 });
    let from = if numeric_start {
        char_index(arg_int(args, 1, "IndexOf")?, text.len(), "IndexOf")?
    } else {
        0
    };
    Ok(position(find_chars(&text, &needle, from, false)))
}

fn last_index_of(receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args(args, 1, "LastIndexOf")?;
    let (text, needle) = folded(receiver, args, 1);
    Ok(position(find_chars(&text, &needle, 0, true)))
}

fn trim_set(args: &[Value]) -> Vec<char> {
    args.iter().flat_map(|arg| arg.to_string().chars().collect::<Vec<_>>()).collect()
}

fn trim(receiver: &Value, args: &[Value]) -> Result<Value> {
    let text = receiver.to_string();
    if args.is_empty() {
        return Ok(Value::string(text.trim()));
    }
    let set = trim_set(args);
    Ok(Value::string(text.trim_matches(set.as_slice())))
}

fn trim_start(receiver: &Value, args: &[Value]) -> Result<Value> {
    let text = receiver.to_string();
    if args.is_empty() {
        return Ok(Value::string(text.trim_start()));
    }
    let set = trim_set(args);
    Ok(Value::string(text.trim_start_matches(set.as_slice())))
}

fn trim_end(receiver: &Value, args: &[Value]) -> Result<Value> {
    let text = receiver.to_string();
    if args.is_empty() {
        return Ok(Value::string(text.trim_end()));
    }
    let set = trim_set(args);
    Ok(Value::string(text.trim_end_matches(set.as_slice())))
}

fn to_upper(receiver: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::String(receiver.to_string().to_uppercase()))
}

fn to_lower(receiver: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::String(receiver.to_string().to_lowercase()))
}

/// Split on any of the separators; no separators splits on whitespace
fn split(receiver: &Value, args: &[Value]) -> Result<Value> {
    let text = receiver.to_string();
    let separators: Vec<String> = args
        .iter()
        .map(Value::to_string)
        .filter(|s| !s.is_empty() && !s.to_ascii_lowercase().contains("splitoptions"))
        .collect();
    let remove_empty = args
        .iter()
        .any(|arg| arg.to_string().eq_ignore_ascii_case("StringSplitOptions.RemoveEmptyEntries"));

    let parts: Vec<String> = if separators.is_empty() {
        text.split(char::is_whitespace).map(str::to_string).collect()
    } else {
        let single_chars = separators.iter().all(|s| s.chars().count() == 1);
        if single_chars || separators.len() == 1 {
            // `Split('ab')` splits on each of a, b
            let set: Vec<char> = separators.iter().flat_map(|s| s.chars()).collect();
            text.split(set.as_slice()).map(str::to_string).collect()
        } else {
            split_on_strings(&text, &separators)
        }
    };

    Ok(Value::Array(
        parts
            .into_iter()
            .filter(|part| !remove_empty || !part.is_empty())
            .map(Value::String)
            .collect(),
    ))
}

fn split_on_strings(text: &str, separators: &[String]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;
    loop {
        let next = separators
            .iter()
            .filter_map(|sep| rest.find(sep.as_str()).map(|at| (at, sep.len())))
            .min_by_key(|(at, _)| *at);
        match next {
            Some((at, len)) => {
                parts.push(rest[..at].to_string());
                rest = &rest[at + len..];
            }
            None => {
                parts.push(rest.to_string());
                return parts;
            }
        }
    }
}

fn replace(receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args(args, 1, "Replace")?;
    let old = arg_str(args, 0);
    if old.is_empty() {
        return Err(EvaluationError::invalid_arguments(
            "Replace",
            "old value is empty",
        ));
    }
    Ok(Value::String(
        receiver.to_string().replace(&old, &arg_str(args, 1)),
    ))
}

fn starts_with(receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args(args, 1, "StartsWith")?;
    let (text, needle) = folded(receiver, args, 1);
    Ok(Value::Bool(text.starts_with(&needle)))
}

fn ends_with(receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args(args, 1, "EndsWith")?;
    let (text, needle) = folded(receiver, args, 1);
    Ok(Value::Bool(text.ends_with(&needle)))
}

fn contains(receiver: &Value, args: &[Value]) -> Result<Value> {
    require_args(args, 1, "Contains")?;
    let (text, needle) = folded(receiver, args, 1);
    Ok(Value::Bool(find_chars(&text, &needle, 0, false).is_some()))
}

fn pad(receiver: &Value, args: &[Value], function: &str, left: bool) -> Result<Value> {
    let text = receiver.to_string();
    let width = arg_i32(args, 0, function)?.max(0) as usize;
    let fill = arg_str(args, 1).chars().next().unwrap_or(' ');
    let missing = width.saturating_sub(text.chars().count());
    let padding: String = std::iter::repeat_n(fill, missing).collect();
    Ok(Value::String(if left {
        padding + &text
    } else {
        text + &padding
    }))
}

fn pad_left(receiver: &Value, args: &[Value]) -> Result<Value> {
    pad(receiver, args, "PadLeft", true)
}

fn pad_right(receiver: &Value, args: &[Value]) -> Result<Value> {
    pad(receiver, args, "PadRight", false)
}

fn remove(receiver: &Value, args: &[Value]) -> Result<Value> {
    let mut chars = chars_of(receiver);
    let start = char_index(arg_int(args, 0, "Remove")?, chars.len(), "Remove")?;
    let end = if args.len() > 1 {
        let count = arg_int(args, 1, "Remove")?;
        char_end(start, count, chars.len(), "Remove")?
    } else {
        chars.len()
    };
    chars.drain(start..end.max(start));
    Ok(Value::String(chars.into_iter().collect()))
}

fn insert(receiver: &Value, args: &[Value]) -> Result<Value> {
    let chars = chars_of(receiver);
    let at = char_index(arg_int(args, 0, "Insert")?, chars.len(), "Insert")?;
    let mut out: String = chars[..at].iter().collect();
    out.push_str(&arg_str(args, 1));
    out.extend(&chars[at..]);
    Ok(Value::String(out))
}

fn equals(receiver: &Value, args: &[Value]) -> Result<Value> {
    let other = arg_str(args, 0);
    let text = receiver.to_string();
    Ok(Value::Bool(if ignore_case(args, 1) {
        text.to_lowercase() == other.to_lowercase()
    } else {
        text == other
    }))
}

fn to_string(receiver: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::String(receiver.to_string()))
}

fn get_chars(receiver: &Value, args: &[Value]) -> Result<Value> {
    let index = arg_int(args, 0, "get_Chars")?;
    chars_of(receiver)
        .get(index.max(0) as usize)
        .filter(|_| index >= 0)
        .map(|c| Value::String(c.to_string()))
        .ok_or_else(|| {
            EvaluationError::invalid_arguments("get_Chars", format!("index {index} out of range"))
        })
}

fn get_length(receiver: &Value, _args: &[Value]) -> Result<Value> {
    match receiver {
        Value::Array(items) => Ok(Value::Number(items.len() as f64)),
        other => Ok(Value::Number(other.to_string().chars().count() as f64)),
    }
}

fn compare_to(receiver: &Value, args: &[Value]) -> Result<Value> {
    let ordering = match receiver {
        Value::Version(version) => {
            let other = match args.first() {
                Some(Value::Version(other)) => Some(other.clone()),
                _ => BuildVersion::parse(&arg_str(args, 0)),
            };
            match other {
                Some(other) => version.cmp(&other),
                None => Ordering::Greater,
            }
        }
        other => other.to_string().as_str().cmp(arg_str(args, 0).as_str()),
    };
    Ok(Value::Number(match ordering {
        Ordering::Less => -1.0,
        Ordering::Equal => 0.0,
        Ordering::Greater => 1.0,
    }))
}

fn is_empty(receiver: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(receiver.to_string().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn call(receiver: &str, method: &str, args: &[&str]) -> Result<Value> {
        let args: Vec<Value> = args.iter().map(|a| Value::string(*a)).collect();
        call_instance(&Value::string(receiver), method, &args)
    }

    #[rstest]
    #[case("Hello World", "Substring", &["6"], "World")]
    #[case("Hello World", "substring", &["0", "5"], "Hello")]
    #[case("Hello World", "IndexOf", &["o"], "4")]
    #[case("Hello World", "IndexOf", &["o", "5"], "7")]
    #[case("Hello World", "IndexOf", &["WORLD", "StringComparison.OrdinalIgnoreCase"], "6")]
    #[case("Hello World", "LastIndexOf", &["o"], "7")]
    #[case("Hello World", "IndexOf", &["z"], "-1")]
    #[case("  pad  ", "Trim", &[], "pad")]
    #[case("xxpadxx", "TrimStart", &["x"], "padxx")]
    #[case("path/", "TrimEnd", &["/\\"], "path")]
    #[case("MiXeD", "ToUpperInvariant", &[], "MIXED")]
    #[case("MiXeD", "ToLower", &[], "mixed")]
    #[case("a;b;c", "Split", &[";"], "a;b;c")]
    #[case("a-b", "Replace", &["-", "+"], "a+b")]
    #[case("net8.0", "StartsWith", &["net"], "true")]
    #[case("net8.0", "EndsWith", &["7.0"], "false")]
    #[case("net8.0", "Contains", &["8"], "true")]
    #[case("7", "PadLeft", &["3", "0"], "007")]
    #[case("7", "PadRight", &["3"], "7  ")]
    #[case("abcdef", "Remove", &["2", "2"], "abef")]
    #[case("abef", "Insert", &["2", "cd"], "abcdef")]
    #[case("abc", "get_Chars", &["1"], "b")]
    #[case("abc", "CompareTo", &["abd"], "-1")]
    fn test_string_methods(
        #[case] receiver: &str,
        #[case] method: &str,
        #[case] args: &[&str],
        #[case] expected: &str,
    ) {
        assert_eq!(call(receiver, method, args).unwrap().to_string(), expected);
    }

    #[test]
    fn test_split_produces_array() {
        let parts = call("a;b;;c", "Split", &[";"]).unwrap();
        assert_eq!(parts.field("Length").unwrap(), Value::Number(4.0));
        assert_eq!(parts.index(&Value::Number(1.0)).unwrap(), Value::string("b"));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            call("abc", "Frobnicate", &[]),
            Err(EvaluationError::UnknownFunction { .. })
        ));
        assert!(call("abc", "Substring", &["9"]).is_err());
        assert!(call("abc", "Substring", &["x"]).is_err());
    }

    #[rstest]
    #[case("Substring", &["1", "99999999999999999999"])]
    #[case("Substring", &["1", "9223372036854774784"])]
    #[case("Remove", &["1", "9223372036854774784"])]
    #[case("Substring", &["2", "-5"])]
    #[case("PadLeft", &["4294967296"])]
    fn test_oversized_arguments_are_errors(#[case] method: &str, #[case] args: &[&str]) {
        assert!(matches!(
            call("abcdef", method, args),
            Err(EvaluationError::InvalidArguments { .. })
        ));
    }

    #[test]
    fn test_version_compare_to() {
        let version = Value::Version(BuildVersion::parse("1.10").unwrap());
        assert_eq!(
            call_instance(&version, "CompareTo", &[Value::string("1.9")]).unwrap(),
            Value::Number(1.0)
        );
    }
}
