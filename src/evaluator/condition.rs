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

//! Condition expressions
//!
//! Conditions are evaluated after property substitution, so the grammar only
//! sees literal text:
//!
//! ```text
//! or         := and ( "Or" and )*
//! and        := comparison ( "And" comparison )*
//! comparison := atom ( op atom )?          op: == != <= >= < >
//! atom       := "(" or ")" | "Exists(" or ")" | "HasTrailingSlash(" or ")"
//!             | "!" atom | 'quoted' | bare-word
//! ```
//!
//! `And`/`Or` evaluate both operands before combining them. A malformed
//! expression evaluates to no value (`None`), which propagates through every
//! enclosing operator.

use crate::host::Host;
use crate::model::{Value, parse_number};
use crate::registry::functions::path::full_path;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            _ => return None,
        })
    }
}

/// Condition tokens
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `'text'`, quotes removed
    Quoted(String),
    /// Unquoted word
    Word(String),
    /// Comparison operator
    Op(CompareOp),
    /// `(`
    Open,
    /// `)`
    Close,
    /// `!`
    Not,
    /// `And`
    And,
    /// `Or`
    Or,
    /// `Exists(`
    Exists,
    /// `HasTrailingSlash(`
    HasTrailingSlash,
    /// Character no rule accepts
    Unknown(char),
}

static TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^\s*(?:",
        r"'(?P<quoted>[^']*)'",
        r"|(?P<op>==|!=|<=|>=|<|>)",
        r"|(?P<open>\()",
        r"|(?P<close>\))",
        r"|(?P<not>!)",
        r"|(?i:(?P<exists>exists)\s*\()",
        r"|(?i:(?P<trailing>hastrailingslash)\s*\()",
        r"|(?i:(?P<and>and))\b",
        r"|(?i:(?P<or>or))\b",
        r"|(?P<word>[^\s()'!=<>]+)",
        r")"
    ))
    .unwrap_or_else(|e| panic!("invalid condition token regex: {e}"))
});

/// Tokenizer with one token of lookahead
#[derive(Debug)]
pub struct Tokenizer<'a> {
    rest: &'a str,
    peeked: Option<Option<Token>>,
}

impl<'a> Tokenizer<'a> {
    /// Tokenize `text`
    pub fn new(text: &'a str) -> Self {
        Self {
            rest: text,
            peeked: None,
        }
    }

    /// Next token without consuming it
    pub fn peek(&mut self) -> Option<&Token> {
        if self.peeked.is_none() {
            let token = self.scan();
            self.peeked = Some(token);
        }
        self.peeked.as_ref().and_then(Option::as_ref)
    }

    /// Consume the next token
    pub fn consume(&mut self) -> Option<Token> {
        match self.peeked.take() {
            Some(token) => token,
            None => self.scan(),
        }
    }

    fn scan(&mut self) -> Option<Token> {
        if self.rest.trim_start().is_empty() {
            self.rest = "";
            return None;
        }
        let Some(caps) = TOKEN.captures(self.rest) else {
            let trimmed = self.rest.trim_start();
            let c = trimmed.chars().next()?;
            self.rest = &trimmed[c.len_utf8()..];
            return Some(Token::Unknown(c));
        };
        let end = caps.get(0).map(|m| m.end()).unwrap_or_default();
        self.rest = &self.rest[end..];

        let token = if let Some(m) = caps.name("quoted") {
            Token::Quoted(m.as_str().to_string())
        } else if let Some(m) = caps.name("op") {
            CompareOp::parse(m.as_str()).map_or(Token::Unknown('='), Token::Op)
        } else if caps.name("open").is_some() {
            Token::Open
        } else if caps.name("close").is_some() {
            Token::Close
        } else if caps.name("not").is_some() {
            Token::Not
        } else if caps.name("exists").is_some() {
            Token::Exists
        } else if caps.name("trailing").is_some() {
            Token::HasTrailingSlash
        } else if caps.name("and").is_some() {
            Token::And
        } else if caps.name("or").is_some() {
            Token::Or
        } else {
            Token::Word(caps.name("word").map(|m| m.as_str()).unwrap_or_default().to_string())
        };
        Some(token)
    }
}

/// Parsed condition
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal text
    Literal(String),
    /// `Exists(path)`
    Exists(Box<Expr>),
    /// `HasTrailingSlash(text)`
    HasTrailingSlash(Box<Expr>),
    /// `!operand`
    Not(Box<Expr>),
    /// `left op right`
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    /// `left And right`
    And(Box<Expr>, Box<Expr>),
    /// `left Or right`
    Or(Box<Expr>, Box<Expr>),
    /// Unparseable input
    Invalid,
}

/// Parse a whole condition
pub fn parse(text: &str) -> Expr {
    let mut tokens = Tokenizer::new(text);
    let expr = parse_or(&mut tokens);
    match tokens.consume() {
        None => expr,
        Some(extra) => {
            log::warn!("Unexpected {extra:?} in condition \"{text}\"");
            Expr::Invalid
        }
    }
}

/// Parse a single atom, ignoring anything after it
pub fn parse_atom_only(text: &str) -> Expr {
    parse_atom(&mut Tokenizer::new(text))
}

fn parse_or(tokens: &mut Tokenizer<'_>) -> Expr {
    let mut left = parse_and(tokens);
    while tokens.peek() == Some(&Token::Or) {
        tokens.consume();
        let right = parse_and(tokens);
        left = Expr::Or(Box::new(left), Box::new(right));
    }
    left
}

fn parse_and(tokens: &mut Tokenizer<'_>) -> Expr {
    let mut left = parse_comparison(tokens);
    while tokens.peek() == Some(&Token::And) {
        tokens.consume();
        let right = parse_comparison(tokens);
        left = Expr::And(Box::new(left), Box::new(right));
    }
    left
}

fn parse_comparison(tokens: &mut Tokenizer<'_>) -> Expr {
    let left = parse_atom(tokens);
    if let Some(Token::Op(op)) = tokens.peek() {
        let op = *op;
        tokens.consume();
        let right = parse_atom(tokens);
        return Expr::Compare(Box::new(left), op, Box::new(right));
    }
    left
}

fn parse_group(tokens: &mut Tokenizer<'_>) -> Option<Expr> {
    let inner = parse_or(tokens);
    match tokens.consume() {
        Some(Token::Close) => Some(inner),
        _ => None,
    }
}

fn parse_atom(tokens: &mut Tokenizer<'_>) -> Expr {
    match tokens.consume() {
        Some(Token::Open) => parse_group(tokens).unwrap_or(Expr::Invalid),
        Some(Token::Exists) => parse_group(tokens)
            .map(|inner| Expr::Exists(Box::new(inner)))
            .unwrap_or(Expr::Invalid),
        Some(Token::HasTrailingSlash) => parse_group(tokens)
            .map(|inner| Expr::HasTrailingSlash(Box::new(inner)))
            .unwrap_or(Expr::Invalid),
        Some(Token::Not) => Expr::Not(Box::new(parse_atom(tokens))),
        Some(Token::Quoted(text)) | Some(Token::Word(text)) => Expr::Literal(text),
        _ => Expr::Invalid,
    }
}

/// Boolean coercion: truthy and not the string "false"
pub fn coerce(value: &Value) -> bool {
    value.coerce_bool()
}

/// Evaluates conditions against a host, resolving relative `Exists` paths
/// against a base directory
#[derive(Debug, Clone, Copy)]
pub struct ConditionEvaluator<'a> {
    host: &'a Host,
    base: &'a Path,
}

impl<'a> ConditionEvaluator<'a> {
    /// Create an evaluator
    pub fn new(host: &'a Host, base: &'a Path) -> Self {
        Self { host, base }
    }

    /// Evaluate a substituted condition to a value, `None` when malformed
    pub async fn evaluate(&self, text: &str) -> Option<Value> {
        self.eval(&parse(text)).await
    }

    /// Evaluate a substituted condition to a boolean. An empty condition
    /// holds; a malformed one does not.
    pub async fn holds(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return true;
        }
        match self.evaluate(text).await {
            Some(value) => coerce(&value),
            None => {
                log::warn!("Condition \"{text}\" could not be evaluated; treating as false");
                false
            }
        }
    }

    /// Evaluate a single atom, as used by `[index]` access
    pub async fn evaluate_atom(&self, text: &str) -> Option<Value> {
        self.eval(&parse_atom_only(text)).await
    }

    async fn eval(&self, expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Literal(text) => Some(Value::string(text.as_str())),
            Expr::Invalid => None,
            Expr::Exists(inner) => {
                let path = Box::pin(self.eval(inner)).await?.to_string();
                Some(Value::Bool(self.exists(path.trim()).await))
            }
            Expr::HasTrailingSlash(inner) => {
                let text = Box::pin(self.eval(inner)).await?.to_string();
                Some(Value::Bool(text.ends_with(['/', '\\'])))
            }
            Expr::Not(inner) => {
                let value = Box::pin(self.eval(inner)).await?;
                Some(Value::Bool(!coerce(&value)))
            }
            Expr::Compare(left, op, right) => {
                let left = Box::pin(self.eval(left)).await;
                let right = Box::pin(self.eval(right)).await;
                Some(Value::Bool(compare(&left?, *op, &right?)))
            }
            Expr::And(left, right) => {
                let left = Box::pin(self.eval(left)).await;
                let right = Box::pin(self.eval(right)).await;
                Some(Value::Bool(coerce(&left?) && coerce(&right?)))
            }
            Expr::Or(left, right) => {
                let left = Box::pin(self.eval(left)).await;
                let right = Box::pin(self.eval(right)).await;
                Some(Value::Bool(coerce(&left?) || coerce(&right?)))
            }
        }
    }

    async fn exists(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let resolved = full_path(self.base, path);
        self.host.fs.exists(&resolved).await
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    match op {
        CompareOp::Eq => left.to_string() == right.to_string(),
        CompareOp::Ne => left.to_string() != right.to_string(),
        _ => {
            let l = number(left);
            let r = number(right);
            match op {
                CompareOp::Lt => l < r,
                CompareOp::Le => l <= r,
                CompareOp::Gt => l > r,
                _ => l >= r,
            }
        }
    }
}

fn number(value: &Value) -> f64 {
    match value {
        Value::String(text) => parse_number(text),
        other => other.to_number(),
    }
}
