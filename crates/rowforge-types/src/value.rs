//! The [`Value`] union: construction, conversion, and string forms.

use std::fmt;

use chrono::{DateTime, FixedOffset, Timelike};
use num_bigint::BigInt;
use rowforge_error::{ForgeError, Result};

/// Nanoseconds in one microsecond.
pub const NANOS_PER_MICRO: i64 = 1_000;
/// Nanoseconds in one millisecond.
pub const NANOS_PER_MILLI: i64 = 1_000_000;
/// Nanoseconds in one second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// The kind tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Bytes,
    Int,
    Float,
    Timestamp,
    Interval,
    Array,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
            Self::Int => "int",
            Self::Float => "float",
            Self::Timestamp => "timestamp",
            Self::Interval => "interval",
            Self::Array => "array",
        };
        f.write_str(name)
    }
}

/// A dynamically-typed template value.
///
/// Integers keep a 64-bit fast path: `BigInt` is only ever used for values
/// outside the `i64` range. [`Value::bigint`] maintains that invariant, so
/// structural equality of two numerically equal integers is stable.
///
/// Intervals are signed nanosecond counts; timestamps are civil instants
/// with an explicit UTC offset.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// TRUE or FALSE.
    Bool(bool),
    /// An opaque byte string. String literals produce this kind.
    Bytes(Vec<u8>),
    /// A 64-bit signed integer.
    Int(i64),
    /// An integer outside the 64-bit range.
    BigInt(Box<BigInt>),
    /// A 64-bit IEEE 754 floating-point number.
    Float(f64),
    /// A civil instant with nanosecond resolution and a UTC offset.
    Timestamp(DateTime<FixedOffset>),
    /// A signed duration in nanoseconds.
    Interval(i64),
    /// An ordered sequence of values.
    Array(Vec<Value>),
}

impl Value {
    /// Returns the kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Null => Kind::Null,
            Self::Bool(_) => Kind::Bool,
            Self::Bytes(_) => Kind::Bytes,
            Self::Int(_) | Self::BigInt(_) => Kind::Int,
            Self::Float(_) => Kind::Float,
            Self::Timestamp(_) => Kind::Timestamp,
            Self::Interval(_) => Kind::Interval,
            Self::Array(_) => Kind::Array,
        }
    }

    /// Returns true if this is NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Build a byte-string value.
    #[must_use]
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(b.into())
    }

    /// Build an integer value, downgrading to the 64-bit fast path when the
    /// magnitude allows. All arithmetic goes through this so the `BigInt`
    /// variant never holds an `i64`-representable value.
    #[must_use]
    pub fn bigint(i: BigInt) -> Self {
        match i64::try_from(&i) {
            Ok(small) => Self::Int(small),
            Err(_) => Self::BigInt(Box::new(i)),
        }
    }

    /// Build an array value. An empty input list materializes as a
    /// single-NULL array; a genuinely empty array cannot be constructed.
    #[must_use]
    pub fn array(elems: Vec<Value>) -> Self {
        if elems.is_empty() {
            Self::Array(vec![Self::Null])
        } else {
            Self::Array(elems)
        }
    }

    /// Parse a numeric literal: decimal `i64` first, then arbitrary
    /// precision (decimal or `0x` hex), then IEEE 754. The first parse that
    /// succeeds wins.
    pub fn number_from_literal(s: &str) -> Result<Self> {
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Self::Int(i));
        }
        if let Some(big) = parse_bigint_literal(s) {
            return Ok(Self::bigint(big));
        }
        match s.parse::<f64>() {
            Ok(f) => Ok(Self::Float(f)),
            Err(_) => Err(ForgeError::Convert {
                from: format!("literal({s})"),
                to: "number",
            }),
        }
    }

    /// Renders `kind(string form)` for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}({})", self.kind(), self)
    }

    // -----------------------------------------------------------------------
    // Conversions
    // -----------------------------------------------------------------------

    /// Extract a boolean.
    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(convert_error(other, "bool")),
        }
    }

    /// Extract a byte-string reference.
    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Self::Bytes(b) => Ok(b),
            other => Err(convert_error(other, "bytes")),
        }
    }

    /// Reports whether this value is an integer representable as `i64`.
    #[must_use]
    pub const fn is_int64(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Extract a 64-bit integer. Out-of-range big integers fail.
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(convert_error(other, "i64")),
        }
    }

    /// Extract an arbitrary-precision integer, lifting the fast path.
    pub fn as_bigint(&self) -> Result<BigInt> {
        match self {
            Self::Int(i) => Ok(BigInt::from(*i)),
            Self::BigInt(b) => Ok((**b).clone()),
            other => Err(convert_error(other, "bigint")),
        }
    }

    /// Extract a float, lifting either integer representation (precision
    /// loss accepted for large magnitudes).
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i) => Ok(*i as f64),
            Self::BigInt(b) => Ok(bigint_to_f64(b)),
            other => Err(convert_error(other, "f64")),
        }
    }

    /// Extract a timestamp.
    pub fn as_timestamp(&self) -> Result<DateTime<FixedOffset>> {
        match self {
            Self::Timestamp(t) => Ok(*t),
            other => Err(convert_error(other, "timestamp")),
        }
    }

    /// Extract an interval in nanoseconds.
    pub fn as_interval(&self) -> Result<i64> {
        match self {
            Self::Interval(d) => Ok(*d),
            other => Err(convert_error(other, "interval")),
        }
    }

    /// Extract an array slice.
    pub fn as_array(&self) -> Result<&[Value]> {
        match self {
            Self::Array(a) => Ok(a),
            other => Err(convert_error(other, "array")),
        }
    }

    /// The sign of a numeric or interval value: -1, 0, or +1.
    /// Non-numeric kinds report +1.
    #[must_use]
    pub fn sign(&self) -> i32 {
        match self {
            Self::Int(i) => num_sign(*i),
            Self::BigInt(b) => match b.sign() {
                num_bigint::Sign::Minus => -1,
                num_bigint::Sign::NoSign => 0,
                num_bigint::Sign::Plus => 1,
            },
            Self::Float(f) => {
                if *f < 0.0 {
                    -1
                } else if *f > 0.0 {
                    1
                } else {
                    0
                }
            }
            Self::Interval(d) => num_sign(*d),
            _ => 1,
        }
    }
}

pub(crate) fn convert_error(from: &Value, to: &'static str) -> ForgeError {
    ForgeError::Convert {
        from: from.describe(),
        to,
    }
}

fn num_sign(i: i64) -> i32 {
    match i.cmp(&0) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

fn parse_bigint_literal(s: &str) -> Option<BigInt> {
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else {
        (s, 10)
    };
    BigInt::parse_bytes(digits.as_bytes(), radix)
}

fn bigint_to_f64(b: &BigInt) -> f64 {
    // `to_string().parse()` would also work; this avoids the detour for the
    // common case where the magnitude still fits f64's exponent range.
    let (sign, digits) = b.to_u64_digits();
    let mut f = 0.0f64;
    for d in digits.iter().rev() {
        f = f * 18_446_744_073_709_551_616.0 + *d as f64;
    }
    if sign == num_bigint::Sign::Minus {
        -f
    } else {
        f
    }
}

// ---------------------------------------------------------------------------
// String forms
// ---------------------------------------------------------------------------

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Bool(true) => f.write_str("TRUE"),
            Self::Bool(false) => f.write_str("FALSE"),
            Self::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Self::Int(i) => write!(f, "{i}"),
            Self::BigInt(b) => write!(f, "{b}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Timestamp(t) => f.write_str(&format_timestamp(*t)),
            Self::Interval(d) => f.write_str(&format_interval(*d)),
            Self::Array(elems) => {
                f.write_str("[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS.fff` in its own offset,
/// truncating the fraction to milliseconds and trimming trailing zeros
/// (the fraction disappears entirely on whole seconds).
fn format_timestamp(t: DateTime<FixedOffset>) -> String {
    let mut out = t.format("%Y-%m-%d %H:%M:%S").to_string();
    let millis = t.nanosecond() / 1_000_000;
    if millis > 0 {
        let mut frac = format!(".{millis:03}");
        while frac.ends_with('0') {
            frac.pop();
        }
        out.push_str(&frac);
    }
    out
}

/// Format a nanosecond interval in compact `1h2m3s` style.
///
/// Sub-second magnitudes use a single unit (`ns`, `µs`, or `ms`) with a
/// trimmed decimal fraction; anything from one second up spells seconds,
/// then minutes and hours as the magnitude requires.
#[must_use]
pub fn format_interval(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_owned();
    }
    let neg = nanos < 0;
    let u = nanos.unsigned_abs();

    let core = if u < NANOS_PER_SEC as u64 {
        let (scale, unit) = if u < NANOS_PER_MICRO as u64 {
            (1, "ns")
        } else if u < NANOS_PER_MILLI as u64 {
            (NANOS_PER_MICRO as u64, "µs")
        } else {
            (NANOS_PER_MILLI as u64, "ms")
        };
        with_fraction(u / scale, u % scale, scale, unit)
    } else {
        let total_secs = u / NANOS_PER_SEC as u64;
        let frac_nanos = u % NANOS_PER_SEC as u64;
        let secs = with_fraction(total_secs % 60, frac_nanos, NANOS_PER_SEC as u64, "s");
        let mins = (total_secs / 60) % 60;
        let hours = total_secs / 3600;
        if hours > 0 {
            format!("{hours}h{mins}m{secs}")
        } else if mins > 0 {
            format!("{mins}m{secs}")
        } else {
            secs
        }
    };

    if neg {
        format!("-{core}")
    } else {
        core
    }
}

fn with_fraction(int_part: u64, rem: u64, scale: u64, unit: &str) -> String {
    if rem == 0 {
        return format!("{int_part}{unit}");
    }
    let width = (scale.ilog10()) as usize;
    let mut frac = format!("{rem:0width$}");
    while frac.ends_with('0') {
        frac.pop();
    }
    format!("{int_part}.{frac}{unit}")
}
