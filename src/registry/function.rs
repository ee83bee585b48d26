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

//! Callable static functions and argument coercion helpers

use crate::error::{EvaluationError, Result};
use crate::host::Host;
use crate::model::{Value, parse_number};
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;

/// Synchronous static function
pub type SyncStaticFn = fn(&[Value], &Host) -> Result<Value>;

/// Asynchronous static function; takes owned arguments and a host handle so
/// the returned future is `'static`
pub type AsyncStaticFn =
    dyn Fn(Vec<Value>, Host) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// Implementation of one static member
#[derive(Clone)]
pub enum FunctionImpl {
    /// Pure or host-synchronous function
    Sync(SyncStaticFn),
    /// Function awaiting a collaborator (filesystem, registry)
    Async(Arc<AsyncStaticFn>),
}

impl std::fmt::Debug for FunctionImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FunctionImpl::Sync(_) => f.write_str("Sync"),
            FunctionImpl::Async(_) => f.write_str("Async"),
        }
    }
}

impl FunctionImpl {
    /// Wrap an async function
    pub fn asynchronous<F, Fut>(function: F) -> Self
    where
        F: Fn(Vec<Value>, Host) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        FunctionImpl::Async(Arc::new(move |args: Vec<Value>, host: Host| {
            function(args, host).boxed()
        }))
    }

    /// Invoke the function
    pub async fn call(&self, args: Vec<Value>, host: &Host) -> Result<Value> {
        match self {
            FunctionImpl::Sync(function) => function(&args, host),
            FunctionImpl::Async(function) => function(args, host.clone()).await,
        }
    }
}

/// String form of argument `index`, "" when missing
pub fn arg_str(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_string).unwrap_or_default()
}

/// Numeric form of argument `index`
pub fn arg_num(args: &[Value], index: usize, function: &str) -> Result<f64> {
    let value = args.get(index).ok_or_else(|| {
        EvaluationError::invalid_arguments(function, format!("missing argument {index}"))
    })?;
    let number = match value {
        Value::String(s) => parse_number(s),
        other => other.to_number(),
    };
    if number.is_nan() {
        return Err(EvaluationError::invalid_arguments(
            function,
            format!("argument {index} '{value}' is not a number"),
        ));
    }
    Ok(number)
}

/// Integer form of argument `index`
pub fn arg_int(args: &[Value], index: usize, function: &str) -> Result<i64> {
    let number = arg_num(args, index, function)?;
    if number.fract() != 0.0 {
        return Err(EvaluationError::invalid_arguments(
            function,
            format!("argument {index} '{number}' is not an integer"),
        ));
    }
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    if number < i64::MIN as f64 || number >= i64::MAX as f64 {
        return Err(EvaluationError::invalid_arguments(
            function,
            format!("argument {index} '{number}' is out of range"),
        ));
    }
    Ok(number as i64)
}

/// 32-bit integer form of argument `index`, for counts and widths
pub fn arg_i32(args: &[Value], index: usize, function: &str) -> Result<i32> {
    let number = arg_int(args, index, function)?;
    i32::try_from(number).map_err(|_| {
        EvaluationError::invalid_arguments(
            function,
            format!("argument {index} '{number}' is out of range"),
        )
    })
}

/// Boolean form of argument `index`
pub fn arg_bool(args: &[Value], index: usize) -> bool {
    args.get(index).is_some_and(Value::coerce_bool)
}

/// Fail unless at least `min` arguments were passed
pub fn require_args(args: &[Value], min: usize, function: &str) -> Result<()> {
    if args.len() < min {
        return Err(EvaluationError::invalid_arguments(
            function,
            format!("expects at least {min} arguments, got {}", args.len()),
        ));
    }
    Ok(())
}
