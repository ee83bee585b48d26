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

//! `System.Math` functions

use crate::error::{EvaluationError, Result};
use crate::host::Host;
use crate::model::Value;
use crate::registry::ClassSource;
use crate::registry::function::{FunctionImpl, arg_i32, arg_num, require_args};

/// `System.Math`
pub struct MathClass;

impl ClassSource for MathClass {
    fn members(&self) -> Vec<(&'static str, FunctionImpl)> {
        vec![
            ("Max", FunctionImpl::Sync(max)),
            ("Min", FunctionImpl::Sync(min)),
            ("Abs", FunctionImpl::Sync(abs)),
            ("Floor", FunctionImpl::Sync(floor)),
            ("Ceiling", FunctionImpl::Sync(ceiling)),
            ("Round", FunctionImpl::Sync(round)),
            ("Truncate", FunctionImpl::Sync(truncate)),
            ("Pow", FunctionImpl::Sync(pow)),
            ("Sqrt", FunctionImpl::Sync(sqrt)),
        ]
    }
}

fn max(args: &[Value], _host: &Host) -> Result<Value> {
    require_args(args, 2, "Max")?;
    Ok(Value::Number(arg_num(args, 0, "Max")?.max(arg_num(args, 1, "Max")?)))
}

fn min(args: &[Value], _host: &Host) -> Result<Value> {
    require_args(args, 2, "Min")?;
    Ok(Value::Number(arg_num(args, 0, "Min")?.min(arg_num(args, 1, "Min")?)))
}

fn abs(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Number(arg_num(args, 0, "Abs")?.abs()))
}

fn floor(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Number(arg_num(args, 0, "Floor")?.floor()))
}

fn ceiling(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Number(arg_num(args, 0, "Ceiling")?.ceil()))
}

/// Rounds half to even, with an optional number of decimals
fn round(args: &[Value], _host: &Host) -> Result<Value> {
    let n = arg_num(args, 0, "Round")?;
    let digits = if args.len() > 1 {
        arg_i32(args, 1, "Round")?
    } else {
        0
    };
    if !(0..=15).contains(&digits) {
        return Err(EvaluationError::invalid_arguments(
            "Round",
            format!("{digits} decimals out of range 0..=15"),
        ));
    }
    let scale = 10f64.powi(digits);
    let scaled = n * scale;
    let rounded = if (scaled.fract().abs() - 0.5).abs() < f64::EPSILON {
        let floor = scaled.floor();
        if floor % 2.0 == 0.0 { floor } else { floor + 1.0 }
    } else {
        scaled.round()
    };
    Ok(Value::Number(rounded / scale))
}

fn truncate(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Number(arg_num(args, 0, "Truncate")?.trunc()))
}

fn pow(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Number(
        arg_num(args, 0, "Pow")?.powf(arg_num(args, 1, "Pow")?),
    ))
}

fn sqrt(args: &[Value], _host: &Host) -> Result<Value> {
    Ok(Value::Number(arg_num(args, 0, "Sqrt")?.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryFileSystem;
    use std::sync::Arc;

    fn call(f: crate::registry::SyncStaticFn, args: &[&str]) -> Result<Value> {
        let host = Host::in_memory(Arc::new(MemoryFileSystem::new()));
        let args: Vec<Value> = args.iter().map(|a| Value::string(*a)).collect();
        f(&args, &host)
    }

    #[test]
    fn test_math() {
        assert_eq!(call(max, &["3", "7"]).unwrap(), Value::Number(7.0));
        assert_eq!(call(min, &["3", "-7"]).unwrap(), Value::Number(-7.0));
        assert_eq!(call(round, &["2.5"]).unwrap(), Value::Number(2.0));
        assert_eq!(call(round, &["3.5"]).unwrap(), Value::Number(4.0));
        assert_eq!(call(round, &["1.26", "1"]).unwrap().to_string(), "1.3");
        assert!(call(max, &["3"]).is_err());
        assert!(call(abs, &["x"]).is_err());
        assert!(call(round, &["1.5", "16"]).is_err());
    }
}
