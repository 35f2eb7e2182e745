//! The `rand.*` generator surface.
//!
//! Each function validates its (already evaluated) arguments at compile
//! time and returns a [`Sampler`] node rather than a `Constant`, so a
//! random call is never folded even when its arguments are. The sampler
//! draws from the per-row state's PRNG at evaluation time.

use chrono::TimeZone;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use rowforge_error::{ForgeError, Result};
use rowforge_types::Value;

use crate::compiled::Compiled;
use crate::context::CompileContext;
use crate::functions::Function;
use crate::state::State;

/// Largest population for which `rand.zipf` precomputes its cumulative
/// weight table.
pub const MAX_ZIPF_N: i64 = 1 << 20;

/// A compiled random generator.
#[derive(Debug)]
pub enum Sampler {
    /// Uniform integer in `[lo, hi)` or `[lo, hi]`.
    Int { lo: i64, hi: i64, inclusive: bool },
    /// Uniform float in `[lo, hi)` or `[lo, hi]`.
    Float { lo: f64, hi: f64, inclusive: bool },
    /// Zipf-distributed rank in `[1, n]` via an inverse-CDF table.
    Zipf { cdf: Vec<f64> },
    /// `exp(normal(mean, std_dev))` via a Box-Muller draw.
    LogNormal { mean: f64, std_dev: f64 },
    /// Fair coin.
    Bool,
    /// A finite `f32`, drawn by rejecting NaN and infinite bit patterns.
    FiniteF32,
    /// A finite `f64`, same rejection scheme.
    FiniteF64,
    /// A timestamp with seconds uniform in `[0, 2^31)` from the epoch.
    U31Timestamp,
    /// A version-4 UUID from PRNG bytes.
    Uuid,
    /// A string matching the compiled pattern.
    Regex(Box<rand_regex::Regex>),
    /// A fresh permutation of the given elements.
    Shuffle(Vec<Value>),
}

impl Sampler {
    /// Draw one value.
    pub fn sample(&self, state: &mut State<'_>) -> Result<Value> {
        match self {
            Self::Int { lo, hi, inclusive } => {
                let value = if *inclusive {
                    state.rng.gen_range(*lo..=*hi)
                } else {
                    state.rng.gen_range(*lo..*hi)
                };
                Ok(Value::Int(value))
            }
            Self::Float { lo, hi, inclusive } => {
                let value = if *inclusive {
                    state.rng.gen_range(*lo..=*hi)
                } else {
                    state.rng.gen_range(*lo..*hi)
                };
                Ok(Value::Float(value))
            }
            Self::Zipf { cdf } => {
                let u: f64 = state.rng.gen();
                let rank = match cdf.binary_search_by(|w| {
                    w.partial_cmp(&u).unwrap_or(std::cmp::Ordering::Equal)
                }) {
                    Ok(i) | Err(i) => i,
                };
                Ok(Value::Int(rank.min(cdf.len() - 1) as i64 + 1))
            }
            Self::LogNormal { mean, std_dev } => {
                // Box-Muller transform; u1 is kept away from zero.
                let u1: f64 = state.rng.gen_range(f64::MIN_POSITIVE..1.0);
                let u2: f64 = state.rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
                Ok(Value::Float((mean + std_dev * z).exp()))
            }
            Self::Bool => Ok(Value::Bool(state.rng.gen_bool(0.5))),
            Self::FiniteF32 => loop {
                let f = f32::from_bits(state.rng.gen::<u32>());
                if f.is_finite() {
                    return Ok(Value::Float(f64::from(f)));
                }
            },
            Self::FiniteF64 => loop {
                let f = f64::from_bits(state.rng.gen::<u64>());
                if f.is_finite() {
                    return Ok(Value::Float(f));
                }
            },
            Self::U31Timestamp => {
                let secs = i64::from(state.rng.gen::<u32>() >> 1);
                let tz = state.ctx().time_zone;
                let ts = tz
                    .timestamp_opt(secs, 0)
                    .single()
                    .ok_or_else(|| ForgeError::Function("timestamp out of range".to_owned()))?;
                Ok(Value::Timestamp(ts))
            }
            Self::Uuid => {
                let mut bytes = [0u8; 16];
                state.rng.fill_bytes(&mut bytes);
                bytes[6] = (bytes[6] & 0x0f) | 0x40;
                bytes[8] = (bytes[8] & 0x3f) | 0x80;
                let rendered = uuid::Uuid::from_bytes(bytes).to_string();
                Ok(Value::bytes(rendered.into_bytes()))
            }
            Self::Regex(regex) => {
                let s: String = state.rng.sample(&**regex);
                Ok(Value::bytes(s.into_bytes()))
            }
            Self::Shuffle(elems) => {
                let mut shuffled = elems.clone();
                shuffled.shuffle(&mut state.rng);
                Ok(Value::Array(shuffled))
            }
        }
    }
}

fn random(sampler: Sampler) -> Result<Compiled> {
    Ok(Compiled::Random(sampler))
}

/// `rand.range(lo, hi)` / `rand.range_inclusive(lo, hi)`.
#[derive(Debug)]
pub struct RandRangeFunc {
    pub inclusive: bool,
}

impl Function for RandRangeFunc {
    fn name(&self) -> &'static str {
        if self.inclusive {
            "rand.range_inclusive"
        } else {
            "rand.range"
        }
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let lo = args[0].as_i64()?;
        let hi = args[1].as_i64()?;
        let empty = if self.inclusive { lo > hi } else { lo >= hi };
        if empty {
            return Err(ForgeError::Function(format!(
                "{}: empty range [{lo}, {hi}{}",
                self.name(),
                if self.inclusive { "]" } else { ")" },
            )));
        }
        random(Sampler::Int {
            lo,
            hi,
            inclusive: self.inclusive,
        })
    }
}

/// `rand.uniform(lo, hi)` / `rand.uniform_inclusive(lo, hi)`.
#[derive(Debug)]
pub struct RandUniformFunc {
    pub inclusive: bool,
}

impl Function for RandUniformFunc {
    fn name(&self) -> &'static str {
        if self.inclusive {
            "rand.uniform_inclusive"
        } else {
            "rand.uniform"
        }
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let lo = args[0].as_f64()?;
        let hi = args[1].as_f64()?;
        let empty = !lo.is_finite() || !hi.is_finite() || {
            if self.inclusive {
                lo > hi
            } else {
                lo >= hi
            }
        };
        if empty {
            return Err(ForgeError::Function(format!(
                "{}: invalid range [{lo}, {hi}{}",
                self.name(),
                if self.inclusive { "]" } else { ")" },
            )));
        }
        random(Sampler::Float {
            lo,
            hi,
            inclusive: self.inclusive,
        })
    }
}

/// `rand.zipf(n, s)`: ranks 1..=n with weight `1 / rank^s`.
#[derive(Debug)]
pub struct RandZipfFunc;

impl Function for RandZipfFunc {
    fn name(&self) -> &'static str {
        "rand.zipf"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let n = args[0].as_i64()?;
        let exponent = args[1].as_f64()?;
        if n <= 0 || n > MAX_ZIPF_N {
            return Err(ForgeError::Function(format!(
                "rand.zipf population must be in 1..={MAX_ZIPF_N}, got {n}"
            )));
        }
        if !exponent.is_finite() || exponent < 0.0 {
            return Err(ForgeError::Function(format!(
                "rand.zipf exponent must be non-negative, got {exponent}"
            )));
        }
        let mut cdf = Vec::with_capacity(n as usize);
        let mut total = 0.0;
        for rank in 1..=n {
            total += 1.0 / (rank as f64).powf(exponent);
            cdf.push(total);
        }
        for w in &mut cdf {
            *w /= total;
        }
        random(Sampler::Zipf { cdf })
    }
}

/// `rand.log_normal(mean, std_dev)` of the underlying normal.
#[derive(Debug)]
pub struct RandLogNormalFunc;

impl Function for RandLogNormalFunc {
    fn name(&self) -> &'static str {
        "rand.log_normal"
    }

    fn num_args(&self) -> i32 {
        2
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let mean = args[0].as_f64()?;
        let std_dev = args[1].as_f64()?;
        if !mean.is_finite() || !std_dev.is_finite() || std_dev < 0.0 {
            return Err(ForgeError::Function(format!(
                "rand.log_normal requires finite mean and non-negative deviation, \
                 got ({mean}, {std_dev})"
            )));
        }
        random(Sampler::LogNormal { mean, std_dev })
    }
}

macro_rules! nullary_sampler {
    ($(#[$doc:meta])* $ty:ident, $name:literal, $sampler:expr) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $ty;

        impl Function for $ty {
            fn name(&self) -> &'static str {
                $name
            }

            fn num_args(&self) -> i32 {
                0
            }

            fn compile(&self, _ctx: &mut CompileContext, _args: Vec<Value>) -> Result<Compiled> {
                random($sampler)
            }
        }
    };
}

nullary_sampler!(
    /// `rand.bool()`: a fair coin.
    RandBoolFunc,
    "rand.bool",
    Sampler::Bool
);
nullary_sampler!(
    /// `rand.finite_f32()`.
    RandFiniteF32Func,
    "rand.finite_f32",
    Sampler::FiniteF32
);
nullary_sampler!(
    /// `rand.finite_f64()`.
    RandFiniteF64Func,
    "rand.finite_f64",
    Sampler::FiniteF64
);
nullary_sampler!(
    /// `rand.u31_timestamp()`: uniform over 1970..2038.
    RandU31TimestampFunc,
    "rand.u31_timestamp",
    Sampler::U31Timestamp
);
nullary_sampler!(
    /// `rand.uuid()`: a version-4 UUID.
    RandUuidFunc,
    "rand.uuid",
    Sampler::Uuid
);

/// `rand.regex(pattern)`: a string matching the pattern, with repetition
/// operators capped at 100.
#[derive(Debug)]
pub struct RandRegexFunc;

const REGEX_MAX_REPEAT: u32 = 100;

impl Function for RandRegexFunc {
    fn name(&self) -> &'static str {
        "rand.regex"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let pattern = std::str::from_utf8(args[0].as_bytes()?)
            .map_err(|_| ForgeError::Function("rand.regex pattern must be UTF-8".to_owned()))?;
        let regex = rand_regex::Regex::compile(pattern, REGEX_MAX_REPEAT)
            .map_err(|e| ForgeError::Function(format!("rand.regex: invalid pattern: {e}")))?;
        random(Sampler::Regex(Box::new(regex)))
    }
}

/// `rand.shuffle(array)`: a fresh permutation per row.
#[derive(Debug)]
pub struct RandShuffleFunc;

impl Function for RandShuffleFunc {
    fn name(&self) -> &'static str {
        "rand.shuffle"
    }

    fn num_args(&self) -> i32 {
        1
    }

    fn compile(&self, _ctx: &mut CompileContext, args: Vec<Value>) -> Result<Compiled> {
        let elems = args[0].as_array()?.to_vec();
        random(Sampler::Shuffle(elems))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_n(func: &dyn Function, args: Vec<Value>, n: usize) -> Vec<Value> {
        let mut ctx = CompileContext::new();
        let compiled = func.compile(&mut ctx, args).unwrap();
        let mut state = State::new(&mut ctx, 42);
        (0..n).map(|_| compiled.eval(&mut state).unwrap()).collect()
    }

    #[test]
    fn test_range_bounds() {
        for value in sample_n(
            &RandRangeFunc { inclusive: false },
            vec![Value::Int(0), Value::Int(10)],
            200,
        ) {
            let i = value.as_i64().unwrap();
            assert!((0..10).contains(&i));
        }
        for value in sample_n(
            &RandRangeFunc { inclusive: true },
            vec![Value::Int(3), Value::Int(3)],
            5,
        ) {
            assert_eq!(value, Value::Int(3));
        }
    }

    #[test]
    fn test_empty_range_errors() {
        let mut ctx = CompileContext::new();
        assert!(RandRangeFunc { inclusive: false }
            .compile(&mut ctx, vec![Value::Int(5), Value::Int(5)])
            .is_err());
        assert!(RandUniformFunc { inclusive: false }
            .compile(&mut ctx, vec![Value::Float(1.0), Value::Float(0.0)])
            .is_err());
    }

    #[test]
    fn test_zipf_ranks_in_population() {
        for value in sample_n(
            &RandZipfFunc,
            vec![Value::Int(4), Value::Float(0.8)],
            200,
        ) {
            let rank = value.as_i64().unwrap();
            assert!((1..=4).contains(&rank), "rank {rank}");
        }
    }

    #[test]
    fn test_uuid_shape() {
        let values = sample_n(&RandUuidFunc, vec![], 3);
        for value in values {
            let s = String::from_utf8(value.as_bytes().unwrap().to_vec()).unwrap();
            let parsed = uuid::Uuid::parse_str(&s).unwrap();
            assert_eq!(parsed.get_version_num(), 4);
        }
    }

    #[test]
    fn test_regex_matches_pattern() {
        let values = sample_n(
            &RandRegexFunc,
            vec![Value::bytes(*b"[0-9a-z]{4}")],
            20,
        );
        for value in values {
            let s = String::from_utf8(value.as_bytes().unwrap().to_vec()).unwrap();
            assert_eq!(s.len(), 4);
            assert!(s.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let arr = Value::array((1..=6).map(Value::Int).collect());
        let values = sample_n(&RandShuffleFunc, vec![arr], 10);
        for value in values {
            let mut items: Vec<i64> = value
                .as_array()
                .unwrap()
                .iter()
                .map(|v| v.as_i64().unwrap())
                .collect();
            items.sort_unstable();
            assert_eq!(items, vec![1, 2, 3, 4, 5, 6]);
        }
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let mut ctx = CompileContext::new();
        let compiled = RandRangeFunc { inclusive: false }
            .compile(&mut ctx, vec![Value::Int(0), Value::Int(1_000_000)])
            .unwrap();
        let first: Vec<Value> = {
            let mut state = State::new(&mut ctx, 7);
            (0..10).map(|_| compiled.eval(&mut state).unwrap()).collect()
        };
        let second: Vec<Value> = {
            let mut state = State::new(&mut ctx, 7);
            (0..10).map(|_| compiled.eval(&mut state).unwrap()).collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn test_u31_timestamp_in_range() {
        for value in sample_n(&RandU31TimestampFunc, vec![], 20) {
            let ts = value.as_timestamp().unwrap();
            let secs = ts.timestamp();
            assert!((0..(1_i64 << 31)).contains(&secs));
        }
    }
}
