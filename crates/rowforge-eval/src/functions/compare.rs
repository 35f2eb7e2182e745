//! Comparison operators and NULL-safe identity.

use std::cmp::Ordering;

use rowforge_error::Result;
use rowforge_types::{cmp, Value};

use crate::compiled::Compiled;
use crate::context::CompileContext;
use crate::functions::Function;

/// The six ordering comparisons. Each instance records which orderings
/// count as TRUE; NULL operands yield NULL.
#[derive(Debug)]
pub struct CompareFunc {
    name: &'static str,
    lt: bool,
    eq: bool,
    gt: bool,
}

impl CompareFunc {
    #[must_use]
    pub const fn new(name: &'static str, lt: bool, eq: bool, gt: bool) -> Self {
        Self { name, lt, eq, gt }
    }
}

impl Function for CompareFunc {
    fn name(&self) -> &'static str {
        self.name
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let (ordering, is_null) = cmp(&args[0], &args[1])?;
        if is_null {
            return Ok(Compiled::Constant(Value::Null));
        }
        let result = match ordering {
            Ordering::Less => self.lt,
            Ordering::Equal => self.eq,
            Ordering::Greater => self.gt,
        };
        Ok(Compiled::Constant(Value::Bool(result)))
    }
}

/// NULL-safe equality: never NULL. `NULL IS NULL` is TRUE; values of
/// incomparable kinds are simply not identical.
fn is_identical(a: &Value, b: &Value) -> bool {
    match (a.is_null(), b.is_null()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        (false, false) => {}
    }
    matches!(cmp(a, b), Ok((Ordering::Equal, false)))
}

/// Binary `IS`.
#[derive(Debug)]
pub struct IsFunc;

impl Function for IsFunc {
    fn name(&self) -> &'static str {
        "is"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        Ok(Compiled::Constant(Value::Bool(is_identical(
            &args[0], &args[1],
        ))))
    }
}

/// Binary `IS NOT`.
#[derive(Debug)]
pub struct IsNotFunc;

impl Function for IsNotFunc {
    fn name(&self) -> &'static str {
        "is not"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        Ok(Compiled::Constant(Value::Bool(!is_identical(
            &args[0], &args[1],
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: &dyn Function, a: Value, b: Value) -> Value {
        let mut ctx = CompileContext::new();
        match func.compile(&mut ctx, vec![a, b]).unwrap() {
            Compiled::Constant(v) => v,
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn test_comparisons() {
        let lt = CompareFunc::new("<", true, false, false);
        assert_eq!(run(&lt, Value::Int(1), Value::Int(2)), Value::Bool(true));
        assert_eq!(run(&lt, Value::Int(2), Value::Int(2)), Value::Bool(false));

        let ne = CompareFunc::new("<>", true, false, true);
        assert_eq!(run(&ne, Value::Int(1), Value::Int(2)), Value::Bool(true));
        assert_eq!(run(&ne, Value::Int(2), Value::Int(2)), Value::Bool(false));
    }

    #[test]
    fn test_comparison_with_null_is_null() {
        let eq = CompareFunc::new("=", false, true, false);
        assert_eq!(run(&eq, Value::Null, Value::Int(2)), Value::Null);
    }

    #[test]
    fn test_is_null_safe() {
        assert_eq!(run(&IsFunc, Value::Null, Value::Null), Value::Bool(true));
        assert_eq!(run(&IsFunc, Value::Null, Value::Int(1)), Value::Bool(false));
        assert_eq!(run(&IsFunc, Value::Int(1), Value::Int(1)), Value::Bool(true));
        // Incomparable kinds are not identical rather than an error.
        assert_eq!(
            run(&IsFunc, Value::Int(1), Value::bytes(*b"1")),
            Value::Bool(false)
        );
        assert_eq!(
            run(&IsNotFunc, Value::Null, Value::Int(1)),
            Value::Bool(true)
        );
    }
}
