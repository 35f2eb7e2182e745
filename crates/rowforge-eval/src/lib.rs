//! Expression compiler, evaluator, and function registry for RowForge.
//!
//! The compiler lowers a parsed template into an executable tree:
//! function and operator references are resolved against the registry,
//! variables are interned into stable slots on the compile context, and
//! any call whose arguments are all constants is folded at compile time
//! (unless the function is non-deterministic, in which case it compiles
//! into a sampler node instead).
//!
//! Evaluation walks the compiled tree against a per-row [`State`]. The
//! only effects are reading the row counters, reading/writing variable
//! slots, and drawing from the state's PRNG.

mod compiled;
mod context;
pub mod functions;
mod state;

pub use compiled::{Compiled, CompiledTable, CompiledTemplate, CompiledWhen, Row};
pub use context::CompileContext;
pub use functions::{Function, Registry};
pub use state::State;
