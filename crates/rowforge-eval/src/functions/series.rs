//! Array construction, series generation, and variadic scalar helpers.

use std::cmp::Ordering;

use rowforge_error::{ForgeError, Result};
use rowforge_types::{cmp, Kind, Value};

use crate::compiled::Compiled;
use crate::context::CompileContext;
use crate::functions::Function;

/// Hard ceiling on materialized series length; beyond this the call errors
/// instead of allocating without bound.
pub const MAX_SERIES_LEN: usize = 1 << 24;

fn constant(value: Value) -> Result<Compiled> {
    Ok(Compiled::Constant(value))
}

/// `ARRAY[…]` construction. Zero elements materialize as `[NULL]`.
#[derive(Debug)]
pub struct ArrayFunc;

impl Function for ArrayFunc {
    fn name(&self) -> &'static str {
        "array"
    }

    fn num_args(&self) -> i32 {
        -1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        constant(Value::array(args))
    }
}

/// `base[index]`: 1-based array subscript. Out-of-range and big-integer
/// indices yield NULL.
#[derive(Debug)]
pub struct SubscriptFunc;

impl Function for SubscriptFunc {
    fn name(&self) -> &'static str {
        "subscript"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let base = args[0].as_array()?;
        if args[1].kind() != Kind::Int {
            return Err(ForgeError::Function(format!(
                "subscript must be an integer, got {}",
                args[1].kind()
            )));
        }
        if !args[1].is_int64() {
            return constant(Value::Null);
        }
        let index = args[1].as_i64()?;
        if index <= 0 || index > base.len() as i64 {
            return constant(Value::Null);
        }
        constant(base[index as usize - 1].clone())
    }
}

/// `generate_series(start, stop [, step])`: the arithmetic progression
/// from `start` while it has not passed `stop`, inclusive.
#[derive(Debug)]
pub struct GenerateSeriesFunc;

impl Function for GenerateSeriesFunc {
    fn name(&self) -> &'static str {
        "generate_series"
    }

    fn num_args(&self) -> i32 {
        -1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        if args.len() < 2 {
            return Err(ForgeError::Function(format!(
                "generate_series requires at least 2 arguments, got {}",
                args.len()
            )));
        }
        if args.len() > 3 {
            return Err(ForgeError::Function(format!(
                "generate_series requires at most 3 arguments, got {}",
                args.len()
            )));
        }
        let (start, stop) = (&args[0], &args[1]);

        let step = args.get(2).cloned().unwrap_or(Value::Int(1));
        let step_sign = match step.sign() {
            0 => {
                return Err(ForgeError::Function(
                    "generate_series step cannot be zero".to_owned(),
                ))
            }
            s => s,
        };
        // The loop stops once `value` passes `stop` in the step direction.
        let stop_ordering = if step_sign > 0 {
            Ordering::Greater
        } else {
            Ordering::Less
        };

        let mut result = Vec::new();
        let mut value = start.clone();
        loop {
            let (ordering, is_null) = cmp(&value, stop)?;
            if is_null || ordering == stop_ordering {
                break;
            }
            if result.len() >= MAX_SERIES_LEN {
                return Err(ForgeError::Function(format!(
                    "generate_series result exceeds {MAX_SERIES_LEN} elements"
                )));
            }
            result.push(value.clone());
            value = value.add(&step)?;
        }
        constant(Value::array(result))
    }
}

/// `coalesce(…)`: the first non-NULL argument.
#[derive(Debug)]
pub struct CoalesceFunc;

impl Function for CoalesceFunc {
    fn name(&self) -> &'static str {
        "coalesce"
    }

    fn num_args(&self) -> i32 {
        -1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let value = args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null);
        constant(value)
    }
}

/// `least(…)` / `greatest(…)`: extremum of the non-NULL arguments; NULL
/// when every argument is NULL.
fn extremum(args: Vec<Value>, keep: Ordering) -> Result<Compiled> {
    let mut best: Option<Value> = None;
    for arg in args {
        if arg.is_null() {
            continue;
        }
        best = Some(match best {
            None => arg,
            Some(current) => {
                let (ordering, _) = cmp(&arg, &current)?;
                if ordering == keep {
                    arg
                } else {
                    current
                }
            }
        });
    }
    constant(best.unwrap_or(Value::Null))
}

#[derive(Debug)]
pub struct LeastFunc;

impl Function for LeastFunc {
    fn name(&self) -> &'static str {
        "least"
    }

    fn num_args(&self) -> i32 {
        -1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        extremum(args, Ordering::Less)
    }
}

#[derive(Debug)]
pub struct GreatestFunc;

impl Function for GreatestFunc {
    fn name(&self) -> &'static str {
        "greatest"
    }

    fn num_args(&self) -> i32 {
        -1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        extremum(args, Ordering::Greater)
    }
}

/// `round(x)`: floats round half away from zero; integers pass through.
#[derive(Debug)]
pub struct RoundFunc;

impl Function for RoundFunc {
    fn name(&self) -> &'static str {
        "round"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, mut args: Vec<Value>) -> Result<Compiled> {
        let value = args.remove(0);
        match value {
            Value::Null | Value::Int(_) | Value::BigInt(_) => constant(value),
            Value::Float(f) => constant(Value::Float(f.round())),
            other => Err(ForgeError::unary_op("round", other.describe())),
        }
    }
}

/// `debug.panic(…)`: always fails with its arguments in the message.
#[derive(Debug)]
pub struct DebugPanicFunc;

impl Function for DebugPanicFunc {
    fn name(&self) -> &'static str {
        "debug.panic"
    }

    fn num_args(&self) -> i32 {
        -1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let rendered: Vec<String> = args.iter().map(ToString::to_string).collect();
        Err(ForgeError::Function(format!(
            "runtime panic: {}",
            rendered.join(", ")
        )))
    }
}
