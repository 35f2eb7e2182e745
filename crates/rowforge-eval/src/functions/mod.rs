//! The function registry: name → function object.
//!
//! Three tables resolve references during compilation: unary operators,
//! binary operators, and generic functions keyed by qualified unique name
//! (`rand.regex`, `encode.hex`, …). Function objects declare their arity
//! and a `compile` rule; pure functions fold to a `Constant`, samplers
//! compile to a `Random` node that draws per row.

pub mod arith;
pub mod compare;
pub mod encoding;
pub mod logic;
pub mod random;
pub mod series;
pub mod string;
pub mod time;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rowforge_ast::Op;
use rowforge_error::Result;
use rowforge_types::Value;
use tracing::trace;

use crate::compiled::Compiled;
use crate::context::CompileContext;

/// A compilable function: operators, builtins, and generator samplers all
/// implement this.
///
/// `compile` receives already-evaluated argument values. Pure computations
/// return a `Constant`, which is what makes constant folding work; a
/// non-deterministic function must return a non-constant node even when
/// every argument is constant.
pub trait Function: fmt::Debug + Send + Sync {
    /// Name used in error messages and logs.
    fn name(&self) -> &'static str;

    /// Fixed arity, or -1 for variadic.
    fn num_args(&self) -> i32;

    /// Compile or evaluate the call for the given argument values.
    fn compile(&self, ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled>;
}

/// Resolves operator and function references for the compiler.
pub struct Registry {
    unary: HashMap<Op, Arc<dyn Function>>,
    binary: HashMap<Op, Arc<dyn Function>>,
    generic: HashMap<&'static str, Arc<dyn Function>>,
}

impl Registry {
    /// The registry with every builtin installed.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            unary: HashMap::new(),
            binary: HashMap::new(),
            generic: HashMap::new(),
        };
        registry.install_builtins();
        registry
    }

    pub fn unary_op(&self, op: Op) -> Option<Arc<dyn Function>> {
        self.unary.get(&op).cloned()
    }

    pub fn binary_op(&self, op: Op) -> Option<Arc<dyn Function>> {
        self.binary.get(&op).cloned()
    }

    /// Look up a generic function by its qualified unique name.
    pub fn generic(&self, unique_name: &str) -> Option<Arc<dyn Function>> {
        self.generic.get(unique_name).cloned()
    }

    pub fn register_unary(&mut self, op: Op, func: impl Function + 'static) {
        trace!(op = %op, func = func.name(), "register unary operator");
        self.unary.insert(op, Arc::new(func));
    }

    pub fn register_binary(&mut self, op: Op, func: impl Function + 'static) {
        trace!(op = %op, func = func.name(), "register binary operator");
        self.binary.insert(op, Arc::new(func));
    }

    pub fn register(&mut self, name: &'static str, func: impl Function + 'static) {
        trace!(name, "register function");
        self.generic.insert(name, Arc::new(func));
    }

    fn install_builtins(&mut self) {
        use self::arith::{ArithFunc, ArithOp, IdentityFunc, NegFunc};
        use self::compare::{CompareFunc, IsFunc, IsNotFunc};
        use self::encoding::{Base64DecodeFunc, Base64EncodeFunc, HexDecodeFunc, HexEncodeFunc};
        use self::logic::{AndFunc, BitNotFunc, BitwiseFunc, LastFunc, NotFunc, OrFunc};
        use self::random::{
            RandBoolFunc, RandFiniteF32Func, RandFiniteF64Func, RandLogNormalFunc, RandRangeFunc,
            RandRegexFunc, RandShuffleFunc, RandU31TimestampFunc, RandUniformFunc, RandUuidFunc,
            RandZipfFunc,
        };
        use self::series::{
            CoalesceFunc, DebugPanicFunc, GenerateSeriesFunc, GreatestFunc, LeastFunc, RoundFunc,
        };
        use self::string::{CharLengthFunc, ConcatFunc, OctetLengthFunc};

        self.register_unary(Op::Sub, NegFunc);
        self.register_unary(Op::Add, IdentityFunc);
        self.register_unary(Op::Not, NotFunc);
        self.register_unary(Op::BitNot, BitNotFunc);

        self.register_binary(Op::Lt, CompareFunc::new("<", true, false, false));
        self.register_binary(Op::Le, CompareFunc::new("<=", true, true, false));
        self.register_binary(Op::Eq, CompareFunc::new("=", false, true, false));
        self.register_binary(Op::Ne, CompareFunc::new("<>", true, false, true));
        self.register_binary(Op::Gt, CompareFunc::new(">", false, false, true));
        self.register_binary(Op::Ge, CompareFunc::new(">=", false, true, true));
        self.register_binary(Op::Is, IsFunc);
        self.register_binary(Op::IsNot, IsNotFunc);
        self.register_binary(Op::And, AndFunc);
        self.register_binary(Op::Or, OrFunc);
        self.register_binary(Op::BitAnd, BitwiseFunc::new(Op::BitAnd));
        self.register_binary(Op::BitOr, BitwiseFunc::new(Op::BitOr));
        self.register_binary(Op::BitXor, BitwiseFunc::new(Op::BitXor));
        self.register_binary(Op::Add, ArithFunc::new(ArithOp::Add));
        self.register_binary(Op::Sub, ArithFunc::new(ArithOp::Sub));
        self.register_binary(Op::Mul, ArithFunc::new(ArithOp::Mul));
        self.register_binary(Op::FloatDiv, ArithFunc::new(ArithOp::FloatDiv));
        self.register_binary(Op::Concat, ConcatFunc);
        self.register_binary(Op::Semicolon, LastFunc);

        self.register("generate_series", GenerateSeriesFunc);
        self.register("encode.hex", HexEncodeFunc);
        self.register("encode.base64", Base64EncodeFunc);
        self.register("decode.hex", HexDecodeFunc);
        self.register("decode.base64", Base64DecodeFunc);
        // `X'…'` literals desugar to this spelling.
        self.register("hex.decode", HexDecodeFunc);
        self.register("debug.panic", DebugPanicFunc);
        self.register("least", LeastFunc);
        self.register("greatest", GreatestFunc);
        self.register("round", RoundFunc);
        self.register("div", ArithFunc::new(ArithOp::Div));
        self.register("mod", ArithFunc::new(ArithOp::Mod));
        self.register("coalesce", CoalesceFunc);
        self.register("rand.range", RandRangeFunc { inclusive: false });
        self.register("rand.range_inclusive", RandRangeFunc { inclusive: true });
        self.register("rand.uniform", RandUniformFunc { inclusive: false });
        self.register("rand.uniform_inclusive", RandUniformFunc { inclusive: true });
        self.register("rand.zipf", RandZipfFunc);
        self.register("rand.log_normal", RandLogNormalFunc);
        self.register("rand.bool", RandBoolFunc);
        self.register("rand.finite_f32", RandFiniteF32Func);
        self.register("rand.finite_f64", RandFiniteF64Func);
        self.register("rand.u31_timestamp", RandU31TimestampFunc);
        self.register("rand.uuid", RandUuidFunc);
        self.register("rand.regex", RandRegexFunc);
        self.register("rand.shuffle", RandShuffleFunc);
        self.register("char_length", CharLengthFunc);
        self.register("octet_length", OctetLengthFunc);
    }
}

/// The shared builtin registry. Contexts hold an `Arc` to this; custom
/// registries can be built with [`Registry::with_builtins`] and extended.
pub(crate) fn default_registry() -> Arc<Registry> {
    static REGISTRY: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::with_builtins()));
    Arc::clone(&REGISTRY)
}
