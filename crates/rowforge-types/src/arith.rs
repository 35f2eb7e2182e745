//! Comparison and arithmetic over [`Value`]s.
//!
//! All numeric operations keep the 64-bit fast path and fall through to
//! arbitrary precision on overflow, so the result of `a op b` is the same
//! number regardless of which representation the operands arrived in.
//! NULL propagates through every operation.

use std::cmp::Ordering;

use chrono::Duration;
use num_bigint::BigInt;
use rowforge_error::{ForgeError, Result};

use crate::value::Value;

/// Compare two values, returning `(ordering, is_null)`.
///
/// If either operand is NULL the ordering is meaningless and `is_null` is
/// true. Numerics cross-compare by promotion: integer against integer
/// exactly, anything against a float through `f64`. Arrays compare
/// lexicographically, propagating NULL from the first undecided element.
pub fn cmp(a: &Value, b: &Value) -> Result<(Ordering, bool)> {
    if a.is_null() || b.is_null() {
        return Ok((Ordering::Equal, true));
    }
    let result = match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Ok(x.cmp(y)),
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Int(x), Value::BigInt(y)) => Ok(BigInt::from(*x).cmp(y)),
        (Value::BigInt(x), Value::Int(y)) => Ok((**x).cmp(&BigInt::from(*y))),
        (Value::BigInt(x), Value::BigInt(y)) => Ok(x.cmp(y)),
        (Value::Int(_) | Value::BigInt(_) | Value::Float(_), Value::Float(_))
        | (Value::Float(_), Value::Int(_) | Value::BigInt(_)) => {
            Ok(float_cmp(a.as_f64()?, b.as_f64()?))
        }
        (Value::Timestamp(x), Value::Timestamp(y)) => Ok(x.cmp(y)),
        (Value::Interval(x), Value::Interval(y)) => Ok(x.cmp(y)),
        (Value::Array(x), Value::Array(y)) => {
            for (ex, ey) in x.iter().zip(y.iter()) {
                let (ord, is_null) = cmp(ex, ey)?;
                if is_null {
                    return Ok((Ordering::Equal, true));
                }
                if ord != Ordering::Equal {
                    return Ok((ord, false));
                }
            }
            Ok(x.len().cmp(&y.len()))
        }
        _ => Err(ForgeError::Compare {
            left: a.describe(),
            right: b.describe(),
        }),
    };
    match result {
        Ok(ord) => Ok((ord, false)),
        Err(ForgeError::Compare { left, right }) => Err(ForgeError::Compare { left, right }),
        Err(_) => Err(ForgeError::Compare {
            left: a.describe(),
            right: b.describe(),
        }),
    }
}

fn float_cmp(x: f64, y: f64) -> Ordering {
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

impl Value {
    /// `a + b`: numeric addition, timestamp ± interval, interval + interval.
    pub fn add(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        let result = match (self, other) {
            (Value::Int(x), Value::Int(y)) => Ok(match x.checked_add(*y) {
                Some(sum) => Value::Int(sum),
                None => Value::bigint(BigInt::from(*x) + BigInt::from(*y)),
            }),
            (Value::Int(_) | Value::BigInt(_), Value::Int(_) | Value::BigInt(_)) => {
                Ok(Value::bigint(self.as_bigint()? + other.as_bigint()?))
            }
            (Value::Int(_) | Value::BigInt(_) | Value::Float(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_) | Value::BigInt(_)) => {
                Ok(Value::Float(self.as_f64()? + other.as_f64()?))
            }
            (Value::Timestamp(t), Value::Interval(d))
            | (Value::Interval(d), Value::Timestamp(t)) => {
                Ok(Value::Timestamp(*t + Duration::nanoseconds(*d)))
            }
            (Value::Interval(x), Value::Interval(y)) => x
                .checked_add(*y)
                .map(Value::Interval)
                .ok_or_else(|| ForgeError::binary_op("add", self.describe(), other.describe())),
            _ => Err(ForgeError::binary_op(
                "add",
                self.describe(),
                other.describe(),
            )),
        };
        result.map_err(|e| e.into_binary_op("add", self.describe(), other.describe()))
    }

    /// `a - b`: numeric subtraction, timestamp − interval,
    /// interval − interval. Subtracting a timestamp from an interval peels
    /// the interval off the timestamp, mirroring addition's symmetry.
    pub fn sub(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        let result = match (self, other) {
            (Value::Int(x), Value::Int(y)) => Ok(match x.checked_sub(*y) {
                Some(diff) => Value::Int(diff),
                None => Value::bigint(BigInt::from(*x) - BigInt::from(*y)),
            }),
            (Value::Int(_) | Value::BigInt(_), Value::Int(_) | Value::BigInt(_)) => {
                Ok(Value::bigint(self.as_bigint()? - other.as_bigint()?))
            }
            (Value::Int(_) | Value::BigInt(_) | Value::Float(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_) | Value::BigInt(_)) => {
                Ok(Value::Float(self.as_f64()? - other.as_f64()?))
            }
            (Value::Timestamp(t), Value::Interval(d))
            | (Value::Interval(d), Value::Timestamp(t)) => {
                Ok(Value::Timestamp(*t - Duration::nanoseconds(*d)))
            }
            (Value::Interval(x), Value::Interval(y)) => x
                .checked_sub(*y)
                .map(Value::Interval)
                .ok_or_else(|| ForgeError::binary_op("sub", self.describe(), other.describe())),
            _ => Err(ForgeError::binary_op(
                "sub",
                self.describe(),
                other.describe(),
            )),
        };
        result.map_err(|e| e.into_binary_op("sub", self.describe(), other.describe()))
    }

    /// `a * b`: numeric multiplication; a number times an interval scales
    /// the interval.
    pub fn mul(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        let result = match (self, other) {
            (Value::Int(x), Value::Int(y)) => Ok(match x.checked_mul(*y) {
                Some(prod) => Value::Int(prod),
                None => Value::bigint(BigInt::from(*x) * BigInt::from(*y)),
            }),
            (Value::Int(_) | Value::BigInt(_), Value::Int(_) | Value::BigInt(_)) => {
                Ok(Value::bigint(self.as_bigint()? * other.as_bigint()?))
            }
            (Value::Int(_) | Value::BigInt(_) | Value::Float(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_) | Value::BigInt(_)) => {
                Ok(Value::Float(self.as_f64()? * other.as_f64()?))
            }
            (Value::Int(x), Value::Interval(d)) | (Value::Interval(d), Value::Int(x)) => x
                .checked_mul(*d)
                .map(Value::Interval)
                .ok_or_else(|| ForgeError::binary_op("mul", self.describe(), other.describe())),
            (Value::Float(x), Value::Interval(d)) | (Value::Interval(d), Value::Float(x)) => {
                Ok(Value::Interval((x * *d as f64) as i64))
            }
            _ => Err(ForgeError::binary_op(
                "mul",
                self.describe(),
                other.describe(),
            )),
        };
        result.map_err(|e| e.into_binary_op("mul", self.describe(), other.describe()))
    }

    /// `div(a, b)`: flooring division for integer operands, float division
    /// otherwise. Division by zero is an error.
    pub fn div(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        let result = match (self, other) {
            (Value::Int(x), Value::Int(y)) => {
                if *y == 0 {
                    Err(ForgeError::DivideByZero)
                } else {
                    Ok(match floor_div_i64(*x, *y) {
                        Some(q) => Value::Int(q),
                        // Only i64::MIN / -1 overflows.
                        None => Value::bigint(-BigInt::from(i64::MIN)),
                    })
                }
            }
            (Value::Int(_) | Value::BigInt(_), Value::Int(_) | Value::BigInt(_)) => {
                let x = self.as_bigint()?;
                let y = other.as_bigint()?;
                if y == BigInt::from(0) {
                    Err(ForgeError::DivideByZero)
                } else {
                    Ok(Value::bigint(floor_div_big(&x, &y)))
                }
            }
            (Value::Int(_) | Value::BigInt(_) | Value::Float(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_) | Value::BigInt(_)) => {
                let y = other.as_f64()?;
                if y == 0.0 {
                    Err(ForgeError::DivideByZero)
                } else {
                    Ok(Value::Float(self.as_f64()? / y))
                }
            }
            _ => Err(ForgeError::binary_op(
                "div",
                self.describe(),
                other.describe(),
            )),
        };
        result.map_err(|e| e.into_binary_op("div", self.describe(), other.describe()))
    }

    /// `a / b`: always float division for numbers; an interval divided by a
    /// number scales the interval down.
    pub fn float_div(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        let result = match (self, other) {
            (Value::Int(_) | Value::BigInt(_) | Value::Float(_), _) => {
                let x = self.as_f64()?;
                let y = other.as_f64()?;
                if y == 0.0 {
                    Err(ForgeError::DivideByZero)
                } else {
                    Ok(Value::Float(x / y))
                }
            }
            (Value::Interval(d), _) => {
                let y = other.as_f64()?;
                if y == 0.0 {
                    Err(ForgeError::DivideByZero)
                } else {
                    Ok(Value::Interval((*d as f64 / y) as i64))
                }
            }
            _ => Err(ForgeError::binary_op(
                "float_div",
                self.describe(),
                other.describe(),
            )),
        };
        result.map_err(|e| e.into_binary_op("float_div", self.describe(), other.describe()))
    }

    /// `mod(a, b)`: flooring remainder for integers (result takes the
    /// divisor's sign), truncated remainder for floats.
    pub fn rem(&self, other: &Value) -> Result<Value> {
        if self.is_null() || other.is_null() {
            return Ok(Value::Null);
        }
        let result = match (self, other) {
            (Value::Int(x), Value::Int(y)) => {
                if *y == 0 {
                    Err(ForgeError::DivideByZero)
                } else {
                    Ok(Value::Int(floor_rem_i64(*x, *y)))
                }
            }
            (Value::Int(_) | Value::BigInt(_), Value::Int(_) | Value::BigInt(_)) => {
                let x = self.as_bigint()?;
                let y = other.as_bigint()?;
                if y == BigInt::from(0) {
                    Err(ForgeError::DivideByZero)
                } else {
                    let r = &x - floor_div_big(&x, &y) * &y;
                    Ok(Value::bigint(r))
                }
            }
            (Value::Int(_) | Value::BigInt(_) | Value::Float(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_) | Value::BigInt(_)) => {
                let y = other.as_f64()?;
                if y == 0.0 {
                    Err(ForgeError::DivideByZero)
                } else {
                    Ok(Value::Float(self.as_f64()? % y))
                }
            }
            _ => Err(ForgeError::binary_op(
                "mod",
                self.describe(),
                other.describe(),
            )),
        };
        result.map_err(|e| e.into_binary_op("mod", self.describe(), other.describe()))
    }

    /// `-a`: negation. Negating `i64::MIN` promotes to the big-integer
    /// representation of `2^63`.
    pub fn neg(&self) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        match self {
            Value::Int(i) => Ok(match i.checked_neg() {
                Some(n) => Value::Int(n),
                None => Value::bigint(-BigInt::from(i64::MIN)),
            }),
            Value::BigInt(b) => Ok(Value::bigint(-(**b).clone())),
            Value::Float(f) => Ok(Value::Float(-f)),
            Value::Interval(d) => d
                .checked_neg()
                .map(Value::Interval)
                .ok_or_else(|| ForgeError::unary_op("neg", self.describe())),
            _ => Err(ForgeError::unary_op("neg", self.describe())),
        }
    }
}

fn floor_div_i64(x: i64, y: i64) -> Option<i64> {
    let q = x.checked_div(y)?;
    let r = x % y;
    if r != 0 && (r < 0) != (y < 0) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

fn floor_rem_i64(x: i64, y: i64) -> i64 {
    // i64::MIN % -1 overflows in the hardware remainder; the result is 0.
    let Some(r) = x.checked_rem(y) else {
        return 0;
    };
    if r != 0 && (r < 0) != (y < 0) {
        r + y
    } else {
        r
    }
}

fn floor_div_big(x: &BigInt, y: &BigInt) -> BigInt {
    let q = x / y;
    let r = x - &q * y;
    let zero = BigInt::from(0);
    if r != zero && (r < zero) != (*y < zero) {
        q - BigInt::from(1)
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::value::NANOS_PER_SEC;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    fn big(s: &str) -> Value {
        Value::bigint(s.parse::<BigInt>().unwrap())
    }

    #[test]
    fn test_cmp_null_short_circuits() {
        let (_, is_null) = cmp(&Value::Null, &int(1)).unwrap();
        assert!(is_null);
        let (_, is_null) = cmp(&int(1), &Value::Null).unwrap();
        assert!(is_null);
    }

    #[test]
    fn test_cmp_numeric_promotion() {
        assert_eq!(cmp(&int(1), &int(2)).unwrap(), (Ordering::Less, false));
        assert_eq!(
            cmp(&int(1), &Value::Float(1.0)).unwrap(),
            (Ordering::Equal, false)
        );
        assert_eq!(
            cmp(&big("99999999999999999999"), &int(5)).unwrap(),
            (Ordering::Greater, false)
        );
        assert_eq!(
            cmp(&big("99999999999999999999"), &Value::Float(1e30)).unwrap(),
            (Ordering::Less, false)
        );
    }

    #[test]
    fn test_cmp_bool_and_bytes() {
        assert_eq!(
            cmp(&Value::Bool(false), &Value::Bool(true)).unwrap(),
            (Ordering::Less, false)
        );
        assert_eq!(
            cmp(&Value::bytes(*b"ab"), &Value::bytes(*b"b")).unwrap(),
            (Ordering::Less, false)
        );
    }

    #[test]
    fn test_cmp_arrays_lexicographic() {
        let a = Value::array(vec![int(1), int(2)]);
        let b = Value::array(vec![int(1), int(3)]);
        assert_eq!(cmp(&a, &b).unwrap(), (Ordering::Less, false));

        let shorter = Value::array(vec![int(1)]);
        assert_eq!(cmp(&shorter, &a).unwrap(), (Ordering::Less, false));

        let with_null = Value::array(vec![int(1), Value::Null]);
        let (_, is_null) = cmp(&with_null, &a).unwrap();
        assert!(is_null);
    }

    #[test]
    fn test_cmp_cross_kind_fails() {
        assert!(cmp(&Value::Bool(true), &int(1)).is_err());
        assert!(cmp(&Value::bytes(*b"x"), &int(1)).is_err());
    }

    #[test]
    fn test_add_overflow_promotes() {
        let sum = int(i64::MAX).add(&int(1)).unwrap();
        let expected = BigInt::from(i64::MAX) + 1;
        assert_eq!(sum, Value::BigInt(Box::new(expected)));
    }

    #[test]
    fn test_sub_back_into_fast_path() {
        let big_val = int(i64::MAX).add(&int(1)).unwrap();
        assert_eq!(big_val.sub(&int(1)).unwrap(), int(i64::MAX));
    }

    #[test]
    fn test_big_literal_doubles() {
        let v = big("12345678901234567890");
        let doubled = v.add(&v).unwrap();
        assert_eq!(doubled, big("24691357802469135780"));
    }

    #[test]
    fn test_null_propagates_through_arithmetic() {
        assert_eq!(Value::Null.add(&int(1)).unwrap(), Value::Null);
        assert_eq!(int(1).mul(&Value::Null).unwrap(), Value::Null);
        assert_eq!(Value::Null.neg().unwrap(), Value::Null);
    }

    #[test]
    fn test_div_floors_and_rejects_zero() {
        assert_eq!(int(7).div(&int(2)).unwrap(), int(3));
        assert_eq!(int(-7).div(&int(2)).unwrap(), int(-4));
        assert_eq!(int(7).div(&int(-2)).unwrap(), int(-4));
        assert!(matches!(
            int(1).div(&int(0)),
            Err(ForgeError::BinaryOp { .. })
        ));
    }

    #[test]
    fn test_rem_takes_divisor_sign() {
        assert_eq!(int(7).rem(&int(3)).unwrap(), int(1));
        assert_eq!(int(-7).rem(&int(3)).unwrap(), int(2));
        assert_eq!(int(7).rem(&int(-3)).unwrap(), int(-2));
    }

    #[test]
    fn test_div_rem_min_by_negative_one() {
        // The one (x, y) pair whose hardware quotient/remainder overflow.
        assert_eq!(
            int(i64::MIN).div(&int(-1)).unwrap(),
            Value::bigint(-BigInt::from(i64::MIN))
        );
        assert_eq!(int(i64::MIN).rem(&int(-1)).unwrap(), int(0));
    }

    #[test]
    fn test_float_div_always_floats() {
        assert_eq!(int(7).float_div(&int(2)).unwrap(), Value::Float(3.5));
        assert!(int(1).float_div(&int(0)).is_err());
    }

    #[test]
    fn test_interval_arithmetic() {
        let hour = Value::Interval(3600 * NANOS_PER_SEC);
        let double = hour.mul(&int(2)).unwrap();
        assert_eq!(double, Value::Interval(7200 * NANOS_PER_SEC));

        let half = hour.float_div(&int(2)).unwrap();
        assert_eq!(half, Value::Interval(1800 * NANOS_PER_SEC));

        let sum = hour.add(&hour).unwrap();
        assert_eq!(sum, Value::Interval(7200 * NANOS_PER_SEC));
    }

    #[test]
    fn test_timestamp_plus_interval() {
        let t = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .unwrap();
        let ts = Value::Timestamp(t);
        let hour = Value::Interval(3600 * NANOS_PER_SEC);
        let later = ts.add(&hour).unwrap();
        assert_eq!(later.to_string(), "2020-01-01 01:00:00");
        let earlier = ts.sub(&hour).unwrap();
        assert_eq!(earlier.to_string(), "2019-12-31 23:00:00");
    }

    #[test]
    fn test_timestamp_minus_timestamp_is_undefined() {
        let t = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .unwrap();
        let ts = Value::Timestamp(t);
        assert!(ts.sub(&ts).is_err());
    }

    #[test]
    fn test_neg_min_promotes() {
        let negated = int(i64::MIN).neg().unwrap();
        assert_eq!(negated, Value::bigint(-BigInt::from(i64::MIN)));
        // And negating back lands on the fast path again.
        assert_eq!(negated.neg().unwrap(), int(i64::MIN));
    }

    proptest! {
        // Fast-path results must agree with the big-integer path.
        #[test]
        fn prop_fast_path_matches_big_path(x in any::<i32>(), y in any::<i32>()) {
            let (x, y) = (i64::from(x), i64::from(y));
            let fast = int(x).add(&int(y)).unwrap();
            let slow = Value::bigint(BigInt::from(x) + BigInt::from(y));
            prop_assert_eq!(fast, slow);

            let fast = int(x).mul(&int(y)).unwrap();
            let slow = Value::bigint(BigInt::from(x) * BigInt::from(y));
            prop_assert_eq!(fast, slow);
        }

        #[test]
        fn prop_floor_div_identity(x in any::<i64>(), y in any::<i64>()) {
            prop_assume!(y != 0);
            let q = int(x).div(&int(y)).unwrap();
            let r = int(x).rem(&int(y)).unwrap();
            // x == q*y + r, with r between 0 (inclusive) and y (exclusive).
            let recomposed = q.mul(&int(y)).unwrap().add(&r).unwrap();
            prop_assert_eq!(recomposed, int(x));
        }

        #[test]
        fn prop_cmp_antisymmetric(x in any::<i64>(), y in any::<i64>()) {
            let (ord, _) = cmp(&int(x), &int(y)).unwrap();
            let (rev, _) = cmp(&int(y), &int(x)).unwrap();
            prop_assert_eq!(ord, rev.reverse());
        }
    }
}
