//! The compile context: shared environment for compilation and evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use rowforge_ast::{Expr, Table, Template};
use rowforge_error::{ForgeError, Result};
use rowforge_types::Value;
use tracing::debug;

use crate::compiled::{Compiled, CompiledTable, CompiledTemplate, CompiledWhen, Row};
use crate::functions::time::{TimestampFunc, TimestampWithTimeZoneFunc};
use crate::functions::{default_registry, Function, Registry};
use crate::state::State;

/// A pluggable time-zone resolver: name → UTC offset.
pub type TimeZoneResolver = dyn Fn(&str) -> Result<FixedOffset> + Send + Sync;

/// Environment shared by all compilations in one generation run.
///
/// The variable table is append-only during compilation (each name gets one
/// stable slot) and mutated during evaluation by `SetVariable`. A context is
/// **not** shareable across concurrent evaluators; clone it per worker:
/// clones share the parsed template but own their slots and zone cache.
#[derive(Clone)]
pub struct CompileContext {
    /// The offset used to interpret strings into timestamps.
    pub time_zone: FixedOffset,
    /// Captured once at construction; `current_timestamp` compiles to this.
    pub current_timestamp: DateTime<FixedOffset>,
    /// Variable slots, in interning order. Fresh slots hold NULL.
    pub variables: Vec<(String, Value)>,
    resolver: Arc<TimeZoneResolver>,
    registry: Arc<Registry>,
    tz_cache: HashMap<String, FixedOffset>,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompileContext {
    /// A context in UTC with the builtin function registry and the default
    /// resolver (accepts `UTC` and fixed offsets such as `+08:00`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            time_zone: Utc.fix(),
            current_timestamp: Utc::now().fixed_offset(),
            variables: Vec::new(),
            resolver: Arc::new(parse_fixed_offset),
            registry: default_registry(),
            tz_cache: HashMap::new(),
        }
    }

    /// Replace the function registry, e.g. one extended with custom
    /// generators via [`Registry::with_builtins`].
    pub fn set_registry(&mut self, registry: Arc<Registry>) {
        self.registry = registry;
    }

    /// Replace the time-zone resolver, e.g. with a tz-database lookup.
    pub fn set_time_zone_resolver(
        &mut self,
        resolver: impl Fn(&str) -> Result<FixedOffset> + Send + Sync + 'static,
    ) {
        self.resolver = Arc::new(resolver);
    }

    /// Resolve a zone name through the read-through cache.
    pub fn parse_time_zone(&mut self, name: &str) -> Result<FixedOffset> {
        if let Some(offset) = self.tz_cache.get(name) {
            return Ok(*offset);
        }
        let offset = (self.resolver)(name)?;
        self.tz_cache.insert(name.to_owned(), offset);
        Ok(offset)
    }

    /// The slot index for a variable, appending a NULL-initialized slot on
    /// first sight. Indices are stable for the context's lifetime.
    pub fn intern_variable(&mut self, name: &str) -> usize {
        if let Some(index) = self.variables.iter().position(|(n, _)| n == name) {
            return index;
        }
        self.variables.push((name.to_owned(), Value::Null));
        self.variables.len() - 1
    }

    // -----------------------------------------------------------------------
    // Template compilation
    // -----------------------------------------------------------------------

    pub fn compile_template(&mut self, template: &Template) -> Result<CompiledTemplate> {
        let global_row = self.compile_row(&template.global_exprs)?;
        let mut tables = Vec::with_capacity(template.tables.len());
        for table in &template.tables {
            tables.push(self.compile_table(table)?);
        }
        debug!(
            tables = tables.len(),
            variables = self.variables.len(),
            "compiled template"
        );
        Ok(CompiledTemplate { global_row, tables })
    }

    pub fn compile_table(&mut self, table: &Table) -> Result<CompiledTable> {
        let exprs: Vec<Expr> = table.columns.iter().map(|c| c.expr.clone()).collect();
        let row = self.compile_row(&exprs)?;
        let mut derived = Vec::with_capacity(table.derived.len());
        for (index, count) in &table.derived {
            derived.push((*index, self.compile_expr(count)?));
        }
        Ok(CompiledTable {
            name: table.name.clone(),
            content: table.content.clone(),
            columns: table.columns.iter().map(|c| c.name.clone()).collect(),
            row,
            derived,
        })
    }

    pub fn compile_row(&mut self, exprs: &[Expr]) -> Result<Row> {
        let mut row = Vec::with_capacity(exprs.len());
        for expr in exprs {
            row.push(self.compile_expr(expr)?);
        }
        Ok(Row(row))
    }

    // -----------------------------------------------------------------------
    // Expression compilation
    // -----------------------------------------------------------------------

    pub fn compile_expr(&mut self, expr: &Expr) -> Result<Compiled> {
        match expr {
            Expr::RowNum => Ok(Compiled::RowNum),
            Expr::SubRowNum => Ok(Compiled::SubRowNum),
            Expr::CurrentTimestamp => Ok(Compiled::Constant(Value::Timestamp(
                self.current_timestamp,
            ))),
            Expr::Constant(value) => Ok(Compiled::Constant(value.clone())),
            Expr::GetVariable(name) => Ok(Compiled::GetVariable(self.intern_variable(name))),
            Expr::SetVariable { name, value } => {
                let index = self.intern_variable(name);
                let value = self.compile_expr(value)?;
                Ok(Compiled::SetVariable {
                    index,
                    value: Box::new(value),
                })
            }
            Expr::Unary { op, expr } => {
                let func = self
                    .registry
                    .unary_op(*op)
                    .ok_or_else(|| ForgeError::UnknownOperator { op: op.to_string() })?;
                self.compile_raw_function(func, &[Some(expr)])
            }
            Expr::Binary { op, left, right } => {
                let func = self
                    .registry
                    .binary_op(*op)
                    .ok_or_else(|| ForgeError::UnknownOperator { op: op.to_string() })?;
                self.compile_raw_function(func, &[Some(left), Some(right)])
            }
            Expr::Paren(inner) => self.compile_expr(inner),
            Expr::Func { name, args } => {
                let unique = name.unique_name();
                let func = self
                    .registry
                    .generic(&unique)
                    .ok_or_else(|| ForgeError::UnknownFunction {
                        name: name.to_string(),
                    })?;
                if func.num_args() >= 0 && args.len() != func.num_args() as usize {
                    return Err(ForgeError::WrongArity {
                        name: name.to_string(),
                        expected: func.num_args(),
                        actual: args.len(),
                    });
                }
                let arg_refs: Vec<Option<&Expr>> = args.iter().map(Some).collect();
                self.compile_raw_function(func, &arg_refs)
            }
            Expr::Case {
                value,
                whens,
                else_,
            } => self.compile_case(value.as_deref(), whens, else_.as_deref()),
            Expr::Timestamp {
                with_time_zone,
                value,
            } => {
                let func: Arc<dyn Function> = if *with_time_zone {
                    Arc::new(TimestampWithTimeZoneFunc)
                } else {
                    Arc::new(TimestampFunc)
                };
                self.compile_raw_function(func, &[Some(value)])
            }
            Expr::Interval { unit, value } => {
                let func = self
                    .registry
                    .binary_op(rowforge_ast::Op::Mul)
                    .ok_or_else(|| ForgeError::UnknownOperator {
                        op: rowforge_ast::Op::Mul.to_string(),
                    })?;
                let unit_expr = Expr::Constant(Value::Interval(unit.nanos()));
                self.compile_raw_function(func, &[Some(value), Some(&unit_expr)])
            }
            Expr::Array(elems) => {
                let refs: Vec<Option<&Expr>> = elems.iter().map(Some).collect();
                self.compile_raw_function(Arc::new(crate::functions::series::ArrayFunc), &refs)
            }
            Expr::Subscript { base, index } => self.compile_raw_function(
                Arc::new(crate::functions::series::SubscriptFunc),
                &[Some(base), Some(index)],
            ),
            Expr::Substring {
                input,
                from,
                for_,
                unit,
            } => {
                let func: Arc<dyn Function> =
                    Arc::new(crate::functions::string::SubstringFunc { unit: *unit });
                self.compile_raw_function(func, &[Some(input), from.as_deref(), for_.as_deref()])
            }
            Expr::Overlay {
                input,
                placing,
                from,
                for_,
                unit,
            } => {
                let func: Arc<dyn Function> =
                    Arc::new(crate::functions::string::OverlayFunc { unit: *unit });
                self.compile_raw_function(
                    func,
                    &[Some(input), Some(placing), Some(from), for_.as_deref()],
                )
            }
        }
    }

    /// Compile a call. Missing optional arguments become NULL constants.
    /// When every argument is constant the function compiles immediately:
    /// deterministic functions return a folded `Constant`, samplers return
    /// a `Random` node regardless.
    fn compile_raw_function(
        &mut self,
        func: Arc<dyn Function>,
        args: &[Option<&Expr>],
    ) -> Result<Compiled> {
        let mut compiled_args = Vec::with_capacity(args.len());
        let mut all_const = true;
        for arg in args {
            let compiled = match arg {
                Some(expr) => self.compile_expr(expr)?,
                None => Compiled::Constant(Value::Null),
            };
            all_const = all_const && compiled.is_constant();
            compiled_args.push(compiled);
        }

        if all_const {
            let values = compiled_args
                .into_iter()
                .map(|c| match c {
                    Compiled::Constant(v) => v,
                    _ => Value::Null,
                })
                .collect();
            return func.compile(self, values);
        }
        Ok(Compiled::RawFunction {
            func,
            args: compiled_args,
        })
    }

    fn compile_case(
        &mut self,
        value: Option<&Expr>,
        whens: &[rowforge_ast::When],
        else_: Option<&Expr>,
    ) -> Result<Compiled> {
        let has_value = value.is_some();
        let value = match value {
            Some(expr) => self.compile_expr(expr)?,
            None => Compiled::Constant(Value::Null),
        };
        let mut compiled_whens = Vec::with_capacity(whens.len());
        for when in whens {
            compiled_whens.push(CompiledWhen {
                cond: self.compile_expr(&when.cond)?,
                then: self.compile_expr(&when.then)?,
            });
        }
        let else_ = match else_ {
            Some(expr) => self.compile_expr(expr)?,
            None => Compiled::Constant(Value::Null),
        };

        let all_const = value.is_constant()
            && compiled_whens
                .iter()
                .all(|w| w.cond.is_constant() && w.then.is_constant())
            && else_.is_constant();

        let compiled = Compiled::CaseValueWhen {
            value: Box::new(value),
            has_value,
            whens: compiled_whens,
            else_: Box::new(else_),
        };

        if all_const {
            // Every sub-tree is constant, so one evaluation against a
            // scratch state collapses the whole CASE.
            let folded = {
                let mut state = State::new(self, 0);
                compiled.eval(&mut state)?
            };
            return Ok(Compiled::Constant(folded));
        }
        Ok(compiled)
    }
}

/// The default resolver: `UTC`/`Z` and fixed offsets (`+08:00`, `-0530`,
/// `+07`). Anything else is an unknown zone; callers wanting tz-database
/// names install their own resolver.
fn parse_fixed_offset(name: &str) -> Result<FixedOffset> {
    let unknown = || ForgeError::UnknownTimeZone {
        name: name.to_owned(),
    };
    match name {
        "UTC" | "utc" | "Z" | "z" => return FixedOffset::east_opt(0).ok_or_else(unknown),
        _ => {}
    }

    let bytes = name.as_bytes();
    let sign = match bytes.first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(unknown()),
    };
    let digits: String = name[1..].chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok(), Some(0)),
        4 => (
            digits[..2].parse::<i32>().ok(),
            digits[2..].parse::<i32>().ok(),
        ),
        _ => (None, None),
    };
    match (hours, minutes) {
        (Some(h), Some(m)) if h < 24 && m < 60 => {
            FixedOffset::east_opt(sign * (h * 3600 + m * 60)).ok_or_else(unknown)
        }
        _ => Err(unknown()),
    }
}
