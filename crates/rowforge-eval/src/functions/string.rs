//! Byte-string functions: concatenation, SQL `substring`/`overlay`, and
//! length measures.
//!
//! The CHARACTERS unit operates on code points of the (lossily decoded)
//! UTF-8 text; OCTETS operates on raw bytes. USING defaults to CHARACTERS.

use rowforge_ast::StringUnit;
use rowforge_error::{ForgeError, Result};
use rowforge_types::Value;

use crate::compiled::Compiled;
use crate::context::CompileContext;
use crate::functions::Function;

fn constant(value: Value) -> Result<Compiled> {
    Ok(Compiled::Constant(value))
}

/// `||`: concatenates byte strings or arrays; NULL propagates.
#[derive(Debug)]
pub struct ConcatFunc;

impl Function for ConcatFunc {
    fn name(&self) -> &'static str {
        "||"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        if args[0].is_null() || args[1].is_null() {
            return constant(Value::Null);
        }
        match (&args[0], &args[1]) {
            (Value::Bytes(a), Value::Bytes(b)) => {
                let mut out = Vec::with_capacity(a.len() + b.len());
                out.extend_from_slice(a);
                out.extend_from_slice(b);
                constant(Value::Bytes(out))
            }
            (Value::Array(a), Value::Array(b)) => {
                let mut out = Vec::with_capacity(a.len() + b.len());
                out.extend(a.iter().cloned());
                out.extend(b.iter().cloned());
                constant(Value::Array(out))
            }
            _ => Err(ForgeError::binary_op(
                "||",
                args[0].describe(),
                args[1].describe(),
            )),
        }
    }
}

/// The input decomposed into its indexing units.
enum Units {
    Chars(Vec<char>),
    Octets(Vec<u8>),
}

impl Units {
    fn new(input: &[u8], unit: Option<StringUnit>) -> Self {
        match unit.unwrap_or(StringUnit::Characters) {
            StringUnit::Characters => {
                Self::Chars(String::from_utf8_lossy(input).chars().collect())
            }
            StringUnit::Octets => Self::Octets(input.to_vec()),
        }
    }

    fn len(&self) -> i64 {
        match self {
            Self::Chars(c) => c.len() as i64,
            Self::Octets(b) => b.len() as i64,
        }
    }

    /// Take the half-open 1-based window `[start, end)`, clamped to the
    /// input.
    fn window(&self, start: i64, end: i64) -> Value {
        let n = self.len();
        let lo = start.max(1) - 1;
        let hi = end.clamp(1, n + 1) - 1;
        if lo >= hi {
            return Value::bytes(Vec::new());
        }
        let (lo, hi) = (lo as usize, hi as usize);
        match self {
            Self::Chars(c) => Value::bytes(c[lo..hi].iter().collect::<String>().into_bytes()),
            Self::Octets(b) => Value::bytes(b[lo..hi].to_vec()),
        }
    }
}

/// `substring(input [FROM s] [FOR n] [USING unit])` with SQL windowing:
/// the result is the intersection of `[s, s+n)` with the input, so a
/// negative start eats into the length rather than erroring.
#[derive(Debug)]
pub struct SubstringFunc {
    pub unit: Option<StringUnit>,
}

impl Function for SubstringFunc {
    fn name(&self) -> &'static str {
        "substring"
    }

    fn num_args(&self) -> i32 {
        3
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        if args[0].is_null() {
            return constant(Value::Null);
        }
        let units = Units::new(args[0].as_bytes()?, self.unit);

        let from = match &args[1] {
            Value::Null => 1,
            v => v.as_i64()?,
        };
        let end = match &args[2] {
            Value::Null => units.len() + 1,
            v => {
                let len = v.as_i64()?;
                if len < 0 {
                    return Err(ForgeError::Function(format!(
                        "substring length cannot be negative, got {len}"
                    )));
                }
                from.saturating_add(len)
            }
        };
        constant(units.window(from, end))
    }
}

/// `overlay(input PLACING p FROM s [FOR n] [USING unit])`: replaces the
/// window `[s, s+n)` with `p`; `n` defaults to `p`'s length.
#[derive(Debug)]
pub struct OverlayFunc {
    pub unit: Option<StringUnit>,
}

impl Function for OverlayFunc {
    fn name(&self) -> &'static str {
        "overlay"
    }

    fn num_args(&self) -> i32 {
        4
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        if args[0].is_null() || args[1].is_null() || args[2].is_null() {
            return constant(Value::Null);
        }
        let units = Units::new(args[0].as_bytes()?, self.unit);
        let placing = args[1].as_bytes()?;
        let from = args[2].as_i64()?;

        let replaced = match &args[3] {
            Value::Null => Units::new(placing, self.unit).len(),
            v => {
                let len = v.as_i64()?;
                if len < 0 {
                    return Err(ForgeError::Function(format!(
                        "overlay length cannot be negative, got {len}"
                    )));
                }
                len
            }
        };

        let head = units.window(1, from);
        let tail = units.window(from.saturating_add(replaced), units.len() + 1);
        let mut out = Vec::new();
        out.extend_from_slice(head.as_bytes()?);
        out.extend_from_slice(placing);
        out.extend_from_slice(tail.as_bytes()?);
        constant(Value::Bytes(out))
    }
}

/// `char_length`: code points of the UTF-8 text.
#[derive(Debug)]
pub struct CharLengthFunc;

impl Function for CharLengthFunc {
    fn name(&self) -> &'static str {
        "char_length"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        if args[0].is_null() {
            return constant(Value::Null);
        }
        let count = String::from_utf8_lossy(args[0].as_bytes()?).chars().count();
        constant(Value::Int(count as i64))
    }
}

/// `octet_length`: raw byte count.
#[derive(Debug)]
pub struct OctetLengthFunc;

impl Function for OctetLengthFunc {
    fn name(&self) -> &'static str {
        "octet_length"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        if args[0].is_null() {
            return constant(Value::Null);
        }
        constant(Value::Int(args[0].as_bytes()?.len() as i64))
    }
}
