//! Arithmetic operators: `+ - * /`, `div`, `mod`, and unary sign.

use rowforge_error::{ForgeError, Result};
use rowforge_types::Value;

use crate::compiled::Compiled;
use crate::context::CompileContext;
use crate::functions::Function;

/// Which arithmetic operation an [`ArithFunc`] performs.
#[derive(Debug, Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    /// `/`: always float (or interval-scaling) division.
    FloatDiv,
    /// `div(a, b)`: flooring integer division.
    Div,
    /// `mod(a, b)`: flooring remainder.
    Mod,
}

/// The shared implementation of every two-operand arithmetic function;
/// the concrete semantics live on [`Value`].
#[derive(Debug)]
pub struct ArithFunc {
    op: ArithOp,
}

impl ArithFunc {
    #[must_use]
    pub const fn new(op: ArithOp) -> Self {
        Self { op }
    }
}

impl Function for ArithFunc {
    fn name(&self) -> &'static str {
        match self.op {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::FloatDiv => "float_div",
            ArithOp::Div => "div",
            ArithOp::Mod => "mod",
        }
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let result = match self.op {
            ArithOp::Add => args[0].add(&args[1])?,
            ArithOp::Sub => args[0].sub(&args[1])?,
            ArithOp::Mul => args[0].mul(&args[1])?,
            ArithOp::FloatDiv => args[0].float_div(&args[1])?,
            ArithOp::Div => args[0].div(&args[1])?,
            ArithOp::Mod => args[0].rem(&args[1])?,
        };
        Ok(Compiled::Constant(result))
    }
}

/// Unary `-`.
#[derive(Debug)]
pub struct NegFunc;

impl Function for NegFunc {
    fn name(&self) -> &'static str {
        "neg"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        Ok(Compiled::Constant(args[0].neg()?))
    }
}

/// Unary `+`: the identity on numerics and intervals.
#[derive(Debug)]
pub struct IdentityFunc;

impl Function for IdentityFunc {
    fn name(&self) -> &'static str {
        "pos"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, mut args: Vec<Value>) -> Result<Compiled> {
        let value = args.remove(0);
        match value {
            Value::Null
            | Value::Int(_)
            | Value::BigInt(_)
            | Value::Float(_)
            | Value::Interval(_) => Ok(Compiled::Constant(value)),
            other => Err(ForgeError::unary_op("pos", other.describe())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_value(func: &dyn Function, args: Vec<Value>) -> Value {
        let mut ctx = CompileContext::new();
        match func.compile(&mut ctx, args).unwrap() {
            Compiled::Constant(v) => v,
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn test_arith_folds_to_constants() {
        let add = ArithFunc::new(ArithOp::Add);
        assert_eq!(
            compile_value(&add, vec![Value::Int(2), Value::Int(3)]),
            Value::Int(5)
        );

        let div = ArithFunc::new(ArithOp::Div);
        assert_eq!(
            compile_value(&div, vec![Value::Int(-7), Value::Int(2)]),
            Value::Int(-4)
        );

        let float_div = ArithFunc::new(ArithOp::FloatDiv);
        assert_eq!(
            compile_value(&float_div, vec![Value::Int(7), Value::Int(2)]),
            Value::Float(3.5)
        );
    }

    #[test]
    fn test_divide_by_zero_surfaces() {
        let mut ctx = CompileContext::new();
        let div = ArithFunc::new(ArithOp::Div);
        assert!(div
            .compile(&mut ctx, vec![Value::Int(1), Value::Int(0)])
            .is_err());
    }

    #[test]
    fn test_identity_rejects_bytes() {
        let mut ctx = CompileContext::new();
        assert!(IdentityFunc
            .compile(&mut ctx, vec![Value::bytes(*b"x")])
            .is_err());
        assert_eq!(
            compile_value(&IdentityFunc, vec![Value::Int(4)]),
            Value::Int(4)
        );
    }
}
