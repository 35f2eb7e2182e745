//! The compiled expression tree and its evaluator.

use std::sync::Arc;

use rowforge_ast::{Name, QName};
use rowforge_error::Result;
use rowforge_types::{cmp, Value};

use crate::functions::random::Sampler;
use crate::functions::Function;
use crate::state::State;

/// A fully compiled template: the global statement row plus one compiled
/// table per source table, with derived-count expressions compiled too.
#[derive(Debug)]
pub struct CompiledTemplate {
    pub global_row: Row,
    pub tables: Vec<CompiledTable>,
}

/// A compiled table: metadata carried over from the AST plus the compiled
/// column expressions.
#[derive(Debug)]
pub struct CompiledTable {
    pub name: QName,
    /// Annotation-stripped `CREATE TABLE` text, verbatim from the AST.
    pub content: String,
    pub columns: Vec<Name>,
    pub row: Row,
    /// `(child index, compiled row-count expression)` edges.
    pub derived: Vec<(usize, Compiled)>,
}

/// A row of compiled expressions, evaluated in column order.
#[derive(Debug, Default)]
pub struct Row(pub Vec<Compiled>);

impl Row {
    /// Evaluate every column against the state, failing fast on the first
    /// error.
    pub fn eval(&self, state: &mut State<'_>) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(self.0.len());
        for compiled in &self.0 {
            values.push(compiled.eval(state)?);
        }
        Ok(values)
    }
}

/// A `WHEN cond THEN then` arm in compiled form.
#[derive(Debug)]
pub struct CompiledWhen {
    pub cond: Compiled,
    pub then: Compiled,
}

/// An executable expression node.
#[derive(Debug)]
pub enum Compiled {
    /// A value known at compile time.
    Constant(Value),
    /// The current row number.
    RowNum,
    /// The current derived-row number.
    SubRowNum,
    /// Read of a variable slot.
    GetVariable(usize),
    /// Write of a variable slot; yields the written value.
    SetVariable { index: usize, value: Box<Compiled> },
    /// A function whose arguments were not all constant: evaluate them,
    /// then re-invoke the function's `compile` and evaluate its result.
    /// This is how per-row values flow through the same code path as
    /// constant folding.
    RawFunction {
        func: Arc<dyn Function>,
        args: Vec<Compiled>,
    },
    /// A `CASE` expression. `has_value` distinguishes `CASE x WHEN …`
    /// (equality dispatch) from `CASE WHEN …` (boolean dispatch).
    CaseValueWhen {
        value: Box<Compiled>,
        has_value: bool,
        whens: Vec<CompiledWhen>,
        else_: Box<Compiled>,
    },
    /// A non-deterministic generator node; draws from the state's PRNG.
    Random(Sampler),
}

impl Compiled {
    /// Whether this node is a compile-time constant. The folding decision
    /// is exactly this structural check, nothing deeper.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Constant(_))
    }

    /// Evaluate against a per-row state.
    pub fn eval(&self, state: &mut State<'_>) -> Result<Value> {
        match self {
            Self::Constant(value) => Ok(value.clone()),
            Self::RowNum => Ok(Value::Int(state.row_num)),
            Self::SubRowNum => Ok(Value::Int(state.sub_row_num)),
            Self::GetVariable(index) => Ok(state.ctx().variables[*index].1.clone()),
            Self::SetVariable { index, value } => {
                let value = value.eval(state)?;
                state.ctx_mut().variables[*index].1 = value.clone();
                Ok(value)
            }
            Self::RawFunction { func, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.eval(state)?);
                }
                let compiled = func.compile(state.ctx_mut(), values)?;
                compiled.eval(state)
            }
            Self::CaseValueWhen {
                value,
                has_value,
                whens,
                else_,
            } => {
                let selector = value.eval(state)?;
                for when in whens {
                    let cond = when.cond.eval(state)?;
                    let hit = if *has_value {
                        let (ord, is_null) = cmp(&selector, &cond)?;
                        !is_null && ord == std::cmp::Ordering::Equal
                    } else {
                        // Searched CASE: a NULL condition is not TRUE.
                        match &cond {
                            Value::Null => false,
                            other => other.as_bool()?,
                        }
                    };
                    if hit {
                        return when.then.eval(state);
                    }
                }
                else_.eval(state)
            }
            Self::Random(sampler) => sampler.sample(state),
        }
    }
}
