//! RowForge: a template engine for synthetic database content generation.
//!
//! A template looks like one or more `CREATE TABLE` statements annotated
//! with generator expressions in `{{ … }}` or `/*{{ … }}*/` blocks. From it
//! the engine produces annotation-free table definitions and, per column, a
//! compiled expression that yields a concrete value for each generated row:
//!
//! ```
//! use rowforge::{parse, CompileContext, State};
//!
//! let template = parse(
//!     "CREATE TABLE users (id INT {{ rownum }}, tag CHAR(4) {{ 'user' }});",
//! )?;
//! let mut ctx = CompileContext::new();
//! let compiled = ctx.compile_template(&template)?;
//!
//! let mut state = State::new(&mut ctx, 42);
//! state.row_num = 1;
//! let row = compiled.tables[0].row.eval(&mut state)?;
//! assert_eq!(row[0].to_string(), "1");
//! # Ok::<(), rowforge::ForgeError>(())
//! ```
//!
//! Crate layout mirrors the pipeline: `rowforge-parser` turns source into
//! the `rowforge-ast` tree, `rowforge-eval` compiles and evaluates it over
//! the `rowforge-types` value model. This crate re-exports the surface and
//! adds the row [`Writer`] interface with a CSV reference implementation.

mod writer;

pub use rowforge_ast::{Column, Expr, Name, QName, Table, Template};
pub use rowforge_error::{ForgeError, Result};
pub use rowforge_eval::{
    Compiled, CompiledTable, CompiledTemplate, CompileContext, Function, Registry, Row, State,
};
pub use rowforge_parser::{parse, parse_expr};
pub use rowforge_types::{Kind, Value};
pub use writer::{CsvWriter, Writer};
