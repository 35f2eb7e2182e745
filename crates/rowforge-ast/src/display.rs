//! Template-syntax pretty-printing via `fmt::Display` for AST nodes.
//!
//! The printed form is re-parseable: `parse(expr.to_string())` produces a
//! semantically equal expression. Byte strings that are not valid UTF-8
//! fall back to the `X'…'` hex form.

use std::fmt;

use rowforge_types::{Value, NANOS_PER_MICRO};

use crate::{back_quote, single_quote, Expr, IntervalUnit, Name, Op, QName, StringUnit, When};

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.orig)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Assign => ":=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Concat => "||",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::FloatDiv => "/",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::BitNot => "~",
            Self::Semicolon => ";",
            Self::Or => "OR",
            Self::And => "AND",
            Self::Not => "NOT",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
        };
        f.write_str(s)
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Week => "WEEK",
            Self::Day => "DAY",
            Self::Hour => "HOUR",
            Self::Minute => "MINUTE",
            Self::Second => "SECOND",
            Self::Millisecond => "MILLISECOND",
            Self::Microsecond => "MICROSECOND",
        };
        f.write_str(s)
    }
}

impl fmt::Display for StringUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Characters => f.write_str("CHARACTERS"),
            Self::Octets => f.write_str("OCTETS"),
        }
    }
}

impl fmt::Display for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WHEN {} THEN {}", self.cond, self.then)
    }
}

/// Print a constant in re-parseable literal syntax.
fn write_constant(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => f.write_str(&single_quote(s)),
            Err(_) => write!(f, "X'{}'", hex::encode(b)),
        },
        Value::Interval(d) => write!(f, "INTERVAL {} MICROSECOND", d / NANOS_PER_MICRO),
        _ => write!(f, "{value}"),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowNum => f.write_str("rownum"),
            Self::SubRowNum => f.write_str("subrownum"),
            Self::CurrentTimestamp => f.write_str("current_timestamp"),
            Self::Constant(value) => write_constant(f, value),
            Self::GetVariable(name) => write!(f, "@{}", back_quote(name)),
            Self::SetVariable { name, value } => {
                write!(f, "@{} := {value}", back_quote(name))
            }
            Self::Unary { op, expr } => write!(f, "{op} {expr}"),
            Self::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            Self::Paren(inner) => write!(f, "({inner})"),
            Self::Func { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::Case {
                value,
                whens,
                else_,
            } => {
                f.write_str("CASE")?;
                if let Some(value) = value {
                    write!(f, " {value}")?;
                }
                for when in whens {
                    write!(f, " {when}")?;
                }
                if let Some(else_) = else_ {
                    write!(f, " ELSE {else_}")?;
                }
                f.write_str(" END")
            }
            Self::Timestamp {
                with_time_zone,
                value,
            } => {
                if *with_time_zone {
                    write!(f, "TIMESTAMP WITH TIME ZONE {value}")
                } else {
                    write!(f, "TIMESTAMP {value}")
                }
            }
            Self::Interval { unit, value } => write!(f, "INTERVAL {value} {unit}"),
            Self::Array(elems) => {
                f.write_str("ARRAY[")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_str("]")
            }
            Self::Subscript { base, index } => write!(f, "{base}[{index}]"),
            Self::Substring {
                input,
                from,
                for_,
                unit,
            } => {
                write!(f, "substring({input}")?;
                if let Some(from) = from {
                    write!(f, " FROM {from}")?;
                }
                if let Some(for_) = for_ {
                    write!(f, " FOR {for_}")?;
                }
                if let Some(unit) = unit {
                    write!(f, " USING {unit}")?;
                }
                f.write_str(")")
            }
            Self::Overlay {
                input,
                placing,
                from,
                for_,
                unit,
            } => {
                write!(f, "overlay({input} PLACING {placing} FROM {from}")?;
                if let Some(for_) = for_ {
                    write!(f, " FOR {for_}")?;
                }
                if let Some(unit) = unit {
                    write!(f, " USING {unit}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_primaries() {
        assert_eq!(Expr::RowNum.to_string(), "rownum");
        assert_eq!(Expr::SubRowNum.to_string(), "subrownum");
        assert_eq!(Expr::CurrentTimestamp.to_string(), "current_timestamp");
        assert_eq!(Expr::Constant(Value::Null).to_string(), "NULL");
        assert_eq!(Expr::Constant(Value::Bool(true)).to_string(), "TRUE");
        assert_eq!(
            Expr::Constant(Value::bytes(*b"it's")).to_string(),
            "'it''s'"
        );
        assert_eq!(
            Expr::Constant(Value::bytes(vec![0x58, 0xb3, 0x8e, 0x4e])).to_string(),
            "X'58b38e4e'"
        );
        assert_eq!(
            Expr::Constant(Value::Interval(2_000_000)).to_string(),
            "INTERVAL 2000 MICROSECOND"
        );
    }

    #[test]
    fn test_display_variables() {
        assert_eq!(Expr::GetVariable("x".into()).to_string(), "@`x`");
        assert_eq!(
            Expr::SetVariable {
                name: "x".into(),
                value: Box::new(Expr::Constant(Value::Int(1))),
            }
            .to_string(),
            "@`x` := 1"
        );
        assert_eq!(Expr::GetVariable("a`b".into()).to_string(), "@`a``b`");
    }

    #[test]
    fn test_display_compound() {
        let expr = Expr::Binary {
            op: Op::Add,
            left: Box::new(Expr::Constant(Value::Int(123))),
            right: Box::new(Expr::Binary {
                op: Op::Mul,
                left: Box::new(Expr::Constant(Value::Int(456))),
                right: Box::new(Expr::Paren(Box::new(Expr::Binary {
                    op: Op::Sub,
                    left: Box::new(Expr::Constant(Value::Int(789))),
                    right: Box::new(Expr::Constant(Value::Int(123))),
                }))),
            }),
        };
        assert_eq!(expr.to_string(), "123 + 456 * (789 - 123)");
    }

    #[test]
    fn test_display_case() {
        let expr = Expr::Case {
            value: Some(Box::new(Expr::GetVariable("x".into()))),
            whens: vec![When {
                cond: Expr::Constant(Value::Int(1)),
                then: Expr::Constant(Value::bytes(*b"1")),
            }],
            else_: Some(Box::new(Expr::Constant(Value::bytes(*b"3")))),
        };
        assert_eq!(
            expr.to_string(),
            "CASE @`x` WHEN 1 THEN '1' ELSE '3' END"
        );
    }

    #[test]
    fn test_display_func_and_array() {
        let expr = Expr::Func {
            name: QName::new(&["rand", "regex"]),
            args: vec![Expr::Constant(Value::bytes(*b"[a-z]+"))],
        };
        assert_eq!(expr.to_string(), "rand.regex('[a-z]+')");

        let expr = Expr::Array(vec![
            Expr::Constant(Value::bytes(*b"X")),
            Expr::Constant(Value::bytes(*b"Y")),
        ]);
        assert_eq!(expr.to_string(), "ARRAY['X', 'Y']");
    }

    #[test]
    fn test_display_substring_overlay() {
        let expr = Expr::Substring {
            input: Box::new(Expr::Constant(Value::bytes(*b"input"))),
            from: Some(Box::new(Expr::Constant(Value::Int(2)))),
            for_: Some(Box::new(Expr::Constant(Value::Int(3)))),
            unit: Some(StringUnit::Octets),
        };
        assert_eq!(
            expr.to_string(),
            "substring('input' FROM 2 FOR 3 USING OCTETS)"
        );

        let expr = Expr::Overlay {
            input: Box::new(Expr::Constant(Value::bytes(*b"input"))),
            placing: Box::new(Expr::Constant(Value::bytes(*b"rep"))),
            from: Box::new(Expr::Constant(Value::Int(2))),
            for_: None,
            unit: None,
        };
        assert_eq!(expr.to_string(), "overlay('input' PLACING 'rep' FROM 2)");
    }
}
