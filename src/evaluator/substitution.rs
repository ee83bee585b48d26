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

//! Property substitution: `$(Name)`, `$(Name.Method(...))`,
//! `$([Class]::Method(...))` and `$(registry:KEY@VALUE)`
//!
//! Tokens are expanded right to left. For the leftmost token in a slice, the
//! text after it is substituted first and the token is then resolved against
//! that already-literal tail, so argument lists never contain unexpanded
//! property references. After a call, `.Field`, `.Method(...)` and `[index]`
//! accessors are applied to the in-memory value; only the final value of the
//! chain is turned back into text.
//!
//! Substitution never fails. Unknown functions become a visible
//! `unknown_<name>(...)` placeholder and malformed accessors are logged and
//! cut short.

use super::condition::ConditionEvaluator;
use super::context::PropertyContext;
use crate::error::{EvaluationError, Result};
use crate::host::Host;
use crate::model::Value;
use crate::registry::functions::win32::registry_value;
use crate::registry::{StaticFunctionRegistry, call_instance};
use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use regex::Regex;

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"\$\((?:",
        r"(?i:registry):(?P<key>[^@)]*)@(?P<value>[^)]*)\)",
        r"|(?P<class>\[[^\]]+\]|[A-Za-z_][\w.]*)::(?P<method>\w+)\(",
        r"|(?P<name>[A-Za-z_][\w\-]*)\s*(?P<delim>[).\[])",
        r")"
    ))
    .unwrap_or_else(|e| panic!("invalid substitution regex: {e}"))
});

static MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.\s*([A-Za-z_]\w*)").unwrap_or_else(|e| panic!("invalid member regex: {e}"))
});

/// A recognized `$(` token, detached from the text it was found in
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Registry { key: String, value: String },
    Static { class: String, method: String },
    Property { name: String },
}

/// Expands property references against one property table
#[derive(Debug, Clone, Copy)]
pub struct PropertyExpander<'a> {
    properties: &'a PropertyContext,
    registry: &'a StaticFunctionRegistry,
    host: &'a Host,
}

impl<'a> PropertyExpander<'a> {
    /// Create an expander
    pub fn new(
        properties: &'a PropertyContext,
        registry: &'a StaticFunctionRegistry,
        host: &'a Host,
    ) -> Self {
        Self {
            properties,
            registry,
            host,
        }
    }

    /// Replace every property reference in `text`. Undefined properties
    /// become "" or, with `leave_unresolved`, stay as written.
    pub async fn substitute(&self, text: &str, leave_unresolved: bool) -> String {
        if !text.contains("$(") {
            return text.to_string();
        }
        self.substitute_from(text, leave_unresolved).await
    }

    /// Substitute text that names a path. Any reference left unresolved
    /// makes the whole path empty.
    pub async fn substitute_path(&self, text: &str) -> String {
        let substituted = self.substitute(text, true).await;
        if substituted.contains("$(") {
            log::warn!("Unresolved property in path \"{text}\" (got \"{substituted}\")");
            return String::new();
        }
        substituted
    }

    /// Substitute a `Condition` attribute and evaluate it
    pub async fn condition(&self, condition: &str) -> bool {
        if condition.trim().is_empty() {
            return true;
        }
        let substituted = self.substitute(condition, false).await;
        let base = self.properties.base_directory();
        let holds = ConditionEvaluator::new(self.host, &base)
            .holds(&substituted)
            .await;
        if !holds {
            log::debug!("Condition \"{condition}\" is false");
        }
        holds
    }

    fn substitute_from<'b>(
        &'b self,
        text: &'b str,
        leave_unresolved: bool,
    ) -> BoxFuture<'b, String> {
        async move {
            let Some((start, body_end, token)) = find_token(text) else {
                return text.to_string();
            };
            let tail = self.substitute_from(&text[body_end..], leave_unresolved).await;
            let replaced = self
                .expand(token, &text[start..body_end], &tail, leave_unresolved)
                .await;
            format!("{}{}", &text[..start], replaced)
        }
        .boxed()
    }

    /// Resolve one token whose source text is `token_text`, given the
    /// substituted text that follows it; returns the replacement followed by
    /// whatever of `right` the token did not consume
    async fn expand(
        &self,
        token: Token,
        token_text: &str,
        right: &str,
        leave_unresolved: bool,
    ) -> String {
        match token {
            Token::Registry { key, value } => {
                let found = registry_value(self.host, &key, &value, &self.host.registry_view).await;
                format!("{}{}", found.unwrap_or_default(), right)
            }
            Token::Property { name } => {
                let value = self.properties.get(&name);
                if let Some(rest) = right.strip_prefix(')') {
                    return match value {
                        Some(value) => format!("{value}{rest}"),
                        None if leave_unresolved => format!("{token_text}){rest}"),
                        None => rest.to_string(),
                    };
                }
                let receiver = Value::string(value.unwrap_or_default());
                self.finish(receiver, right).await
            }
            Token::Static { class, method } => {
                let (args, consumed) = match parse_arguments(right) {
                    Ok(parsed) => parsed,
                    Err(e) => {
                        log::warn!("{e} in call to {class}::{method}");
                        return format!("{token_text}{right}");
                    }
                };
                let args: Vec<Value> = args.into_iter().map(Value::String).collect();
                let value = match self
                    .registry
                    .run(&class, &method, args.clone(), self.host)
                    .await
                {
                    Ok(value) => value,
                    Err(e) => {
                        log::warn!("{class}::{method} failed: {e}");
                        placeholder(&method, &args)
                    }
                };
                self.finish(value, &right[consumed..]).await
            }
        }
    }

    /// Apply the accessor chain at the start of `right`, then expect the
    /// closing `)` of the token
    async fn finish(&self, value: Value, right: &str) -> String {
        let (value, consumed) = self.apply_chain(value, right).await;
        let rest = &right[consumed..];
        match rest.strip_prefix(')') {
            Some(after) => format!("{value}{after}"),
            None => {
                log::warn!(
                    "{}",
                    EvaluationError::ParenMismatch {
                        text: right.to_string()
                    }
                );
                format!("{value}{rest}")
            }
        }
    }

    /// Apply `.Field`, `.Method(args)` and `[index]` accessors in order;
    /// returns the resulting value and the number of bytes of `right` used
    pub async fn apply_chain(&self, mut value: Value, right: &str) -> (Value, usize) {
        let mut position = 0;
        loop {
            let rest = &right[position..];
            if let Some(caps) = MEMBER.captures(rest) {
                let name = caps[1].to_string();
                let after = position + caps[0].len();
                if let Some(arguments) = right[after..].strip_prefix('(') {
                    let (args, consumed) = match parse_arguments(arguments) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            log::warn!("{e} in call to {name}");
                            return (value, position);
                        }
                    };
                    let args: Vec<Value> = args.into_iter().map(Value::String).collect();
                    value = call_instance(&value, &name, &args).unwrap_or_else(|e| {
                        log::warn!("{name} failed: {e}");
                        placeholder(&name, &args)
                    });
                    position = after + 1 + consumed;
                } else {
                    value = value.field(&name).unwrap_or_else(|e| {
                        log::warn!("{name} failed: {e}");
                        placeholder(&name, &[])
                    });
                    position = after;
                }
            } else if rest.starts_with('[') {
                let Some(close) = closing_bracket(rest) else {
                    log::warn!(
                        "{}",
                        EvaluationError::MissingBracket {
                            text: rest.to_string()
                        }
                    );
                    return (value, position);
                };
                let index_text = &rest[1..close];
                let base = self.properties.base_directory();
                let index = ConditionEvaluator::new(self.host, &base)
                    .evaluate_atom(index_text)
                    .await;
                value = match index.map(|index| value.index(&index)) {
                    Some(Ok(element)) => element,
                    Some(Err(e)) => {
                        log::warn!("Index [{index_text}] failed: {e}");
                        Value::Null
                    }
                    None => {
                        log::warn!("Invalid index expression [{index_text}]");
                        Value::Null
                    }
                };
                position += close + 1;
            } else {
                return (value, position);
            }
        }
    }
}

/// Leftmost token in `text`: its start, the end of its own text, and the
/// token
fn find_token(text: &str) -> Option<(usize, usize, Token)> {
    let caps = TOKEN.captures(text)?;
    let whole = caps.get(0)?;
    if let (Some(key), Some(value)) = (caps.name("key"), caps.name("value")) {
        let token = Token::Registry {
            key: key.as_str().to_string(),
            value: value.as_str().to_string(),
        };
        return Some((whole.start(), whole.end(), token));
    }
    if let (Some(class), Some(method)) = (caps.name("class"), caps.name("method")) {
        let token = Token::Static {
            class: class.as_str().to_string(),
            method: method.as_str().to_string(),
        };
        return Some((whole.start(), whole.end(), token));
    }
    let name = caps.name("name")?;
    let delim = caps.name("delim")?;
    let token = Token::Property {
        name: name.as_str().to_string(),
    };
    Some((whole.start(), delim.start(), token))
}

/// Parse a comma-separated argument list that starts just after `(`.
/// Returns the arguments, quotes trimmed, and the bytes consumed including
/// the closing `)`.
pub fn parse_arguments(text: &str) -> Result<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            ')' => {
                let last = text[start..i].trim();
                if !(args.is_empty() && last.is_empty()) {
                    args.push(unquote(last));
                }
                return Ok((args, i + 1));
            }
            ',' if depth == 0 => {
                args.push(unquote(text[start..i].trim()));
                start = i + 1;
            }
            _ => {}
        }
    }
    Err(EvaluationError::ParenMismatch {
        text: text.to_string(),
    })
}

fn unquote(arg: &str) -> String {
    let mut chars = arg.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && matches!(first, '\'' | '"' | '`') => {
            arg[1..arg.len() - 1].to_string()
        }
        _ => arg.to_string(),
    }
}

/// Offset of the `]` matching the `[` at the start of `text`
fn closing_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        if let Some(open) = quote {
            if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' => quote = Some(c),
            '[' => depth += 1,
            ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn placeholder(name: &str, args: &[Value]) -> Value {
    let args: Vec<String> = args.iter().map(Value::to_string).collect();
    Value::String(format!("unknown_{name}({})", args.join(", ")))
}
