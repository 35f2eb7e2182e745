//! Polymorphic value model for the RowForge template engine.
//!
//! Every expression in a template evaluates to a [`Value`]: a tagged union
//! over NULL, booleans, byte strings, integers (with a 64-bit fast path and
//! an arbitrary-precision escape hatch), floats, timestamps, intervals, and
//! arrays. Comparison, arithmetic, and conversion semantics live here so
//! that every consumer agrees on them.

mod arith;
mod value;

pub use arith::cmp;
pub use value::{format_interval, Kind, Value, NANOS_PER_MICRO, NANOS_PER_MILLI, NANOS_PER_SEC};
