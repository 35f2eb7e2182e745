//! `encode.*` / `decode.*`: hex and base64 transcoding of byte strings.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rowforge_error::{ForgeError, Result};
use rowforge_types::Value;

use crate::compiled::Compiled;
use crate::context::CompileContext;
use crate::functions::Function;

fn constant(value: Value) -> Result<Compiled> {
    Ok(Compiled::Constant(value))
}

/// `encode.hex`: bytes → lowercase hex text.
#[derive(Debug)]
pub struct HexEncodeFunc;

impl Function for HexEncodeFunc {
    fn name(&self) -> &'static str {
        "encode.hex"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        constant(Value::bytes(hex::encode(args[0].as_bytes()?).into_bytes()))
    }
}

/// `decode.hex`: hex text → bytes. ASCII whitespace between digit pairs
/// is ignored, so `X'C2BF 3F'` literals decode.
#[derive(Debug)]
pub struct HexDecodeFunc;

impl Function for HexDecodeFunc {
    fn name(&self) -> &'static str {
        "decode.hex"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let cleaned: Vec<u8> = args[0]
            .as_bytes()?
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let decoded = hex::decode(cleaned)
            .map_err(|e| ForgeError::Function(format!("invalid hex input: {e}")))?;
        constant(Value::Bytes(decoded))
    }
}

/// `encode.base64`: bytes → standard-alphabet base64 with padding.
#[derive(Debug)]
pub struct Base64EncodeFunc;

impl Function for Base64EncodeFunc {
    fn name(&self) -> &'static str {
        "encode.base64"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        constant(Value::bytes(BASE64.encode(args[0].as_bytes()?).into_bytes()))
    }
}

/// `decode.base64`.
#[derive(Debug)]
pub struct Base64DecodeFunc;

impl Function for Base64DecodeFunc {
    fn name(&self) -> &'static str {
        "decode.base64"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let decoded = BASE64
            .decode(args[0].as_bytes()?)
            .map_err(|e| ForgeError::Function(format!("invalid base64 input: {e}")))?;
        constant(Value::Bytes(decoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(func: &dyn Function, arg: Value) -> Value {
        let mut ctx = CompileContext::new();
        match func.compile(&mut ctx, vec![arg]).unwrap() {
            Compiled::Constant(v) => v,
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn test_hex() {
        assert_eq!(
            run(&HexEncodeFunc, Value::bytes(vec![0xca, 0xfe])),
            Value::bytes(*b"cafe")
        );
        assert_eq!(
            run(&HexDecodeFunc, Value::bytes(*b"C2BF 3F")),
            Value::bytes(vec![0xc2, 0xbf, 0x3f])
        );
        let mut ctx = CompileContext::new();
        assert!(HexDecodeFunc
            .compile(&mut ctx, vec![Value::bytes(*b"zz")])
            .is_err());
    }

    #[test]
    fn test_base64() {
        assert_eq!(
            run(&Base64EncodeFunc, Value::bytes(*b"hello")),
            Value::bytes(*b"aGVsbG8=")
        );
        assert_eq!(
            run(&Base64DecodeFunc, Value::bytes(*b"aGVsbG8=")),
            Value::bytes(*b"hello")
        );
    }
}
