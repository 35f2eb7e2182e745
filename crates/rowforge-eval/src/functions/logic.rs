//! Boolean and bitwise operators, plus the statement separator.

use num_bigint::BigInt;
use rowforge_ast::Op;
use rowforge_error::{ForgeError, Result};
use rowforge_types::Value;

use crate::compiled::Compiled;
use crate::context::CompileContext;
use crate::functions::Function;

fn constant(value: Value) -> Result<Compiled> {
    Ok(Compiled::Constant(value))
}

/// Three-valued truth of an operand: NULL is unknown, booleans are
/// themselves, anything else is a type error.
fn truth(op: &'static str, a: &Value, b: &Value, v: &Value) -> Result<Option<bool>> {
    match v {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        _ => Err(ForgeError::binary_op(op, a.describe(), b.describe())),
    }
}

/// Unary `NOT`: three-valued (NOT NULL is NULL).
#[derive(Debug)]
pub struct NotFunc;

impl Function for NotFunc {
    fn name(&self) -> &'static str {
        "not"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        match &args[0] {
            Value::Null => constant(Value::Null),
            Value::Bool(b) => constant(Value::Bool(!b)),
            other => Err(ForgeError::unary_op("not", other.describe())),
        }
    }
}

/// Logical `AND` with SQL three-valued semantics: FALSE dominates NULL.
#[derive(Debug)]
pub struct AndFunc;

impl Function for AndFunc {
    fn name(&self) -> &'static str {
        "and"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let a = truth("and", &args[0], &args[1], &args[0])?;
        let b = truth("and", &args[0], &args[1], &args[1])?;
        constant(match (a, b) {
            (Some(false), _) | (_, Some(false)) => Value::Bool(false),
            (Some(true), Some(true)) => Value::Bool(true),
            _ => Value::Null,
        })
    }
}

/// Logical `OR` with SQL three-valued semantics: TRUE dominates NULL.
#[derive(Debug)]
pub struct OrFunc;

impl Function for OrFunc {
    fn name(&self) -> &'static str {
        "or"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let a = truth("or", &args[0], &args[1], &args[0])?;
        let b = truth("or", &args[0], &args[1], &args[1])?;
        constant(match (a, b) {
            (Some(true), _) | (_, Some(true)) => Value::Bool(true),
            (Some(false), Some(false)) => Value::Bool(false),
            _ => Value::Null,
        })
    }
}

/// Unary `~`: integer bitwise complement.
#[derive(Debug)]
pub struct BitNotFunc;

impl Function for BitNotFunc {
    fn name(&self) -> &'static str {
        "bit_not"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        match &args[0] {
            Value::Null => constant(Value::Null),
            Value::Int(i) => constant(Value::Int(!i)),
            Value::BigInt(b) => constant(Value::bigint(-((**b).clone() + 1i64))),
            other => Err(ForgeError::unary_op("bit_not", other.describe())),
        }
    }
}

/// Bitwise `&`, `|`, `^` over integers of either width.
#[derive(Debug)]
pub struct BitwiseFunc {
    op: Op,
}

impl BitwiseFunc {
    #[must_use]
    pub const fn new(op: Op) -> Self {
        Self { op }
    }
}

impl Function for BitwiseFunc {
    fn name(&self) -> &'static str {
        match self.op {
            Op::BitAnd => "bit_and",
            Op::BitOr => "bit_or",
            _ => "bit_xor",
        }
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        if args[0].is_null() || args[1].is_null() {
            return constant(Value::Null);
        }
        if let (Value::Int(x), Value::Int(y)) = (&args[0], &args[1]) {
            let result = match self.op {
                Op::BitAnd => x & y,
                Op::BitOr => x | y,
                _ => x ^ y,
            };
            return constant(Value::Int(result));
        }
        let to_big = |v: &Value| -> Result<BigInt> {
            v.as_bigint().map_err(|e| {
                e.into_binary_op(self.name(), args[0].describe(), args[1].describe())
            })
        };
        let x = to_big(&args[0])?;
        let y = to_big(&args[1])?;
        let result = match self.op {
            Op::BitAnd => x & y,
            Op::BitOr => x | y,
            _ => x ^ y,
        };
        constant(Value::bigint(result))
    }
}

/// `;`: evaluate both operands, yield the right one. Statement chains
/// compile to a left-leaning tree of these.
#[derive(Debug)]
pub struct LastFunc;

impl Function for LastFunc {
    fn name(&self) -> &'static str {
        ";"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, mut args: Vec<Value>) -> Result<Compiled> {
        constant(args.remove(1))
    }
}
