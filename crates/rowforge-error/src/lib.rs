//! Error types for the RowForge template engine.
//!
//! One structured enum covers every failure the engine can surface:
//! lexing/parsing, value conversion and arithmetic, compilation, and
//! evaluation. Variants carry the data needed to render a human message
//! at the boundary; rendering itself is the caller's concern.

use thiserror::Error;

/// Primary error type for RowForge operations.
#[derive(Error, Debug)]
pub enum ForgeError {
    // === Template syntax ===
    /// Syntax error from the template parser. `near` holds up to ten bytes
    /// of source following the offending token, empty at end of input.
    #[error("{}", syntax_message(.line, .column, .near, .cause))]
    Syntax {
        line: u32,
        column: u32,
        near: String,
        cause: String,
    },

    // === Value model ===
    /// A value could not be converted to the requested representation.
    #[error("cannot convert {from} to {to}")]
    Convert { from: String, to: &'static str },

    /// Two values of incomparable kinds were compared.
    #[error("cannot compare {left} with {right}")]
    Compare { left: String, right: String },

    /// A binary operation is not defined for its operand kinds.
    #[error("cannot perform {op} on {left} and {right}")]
    BinaryOp {
        op: &'static str,
        left: String,
        right: String,
        #[source]
        cause: Option<Box<ForgeError>>,
    },

    /// A unary operation is not defined for its operand kind.
    #[error("cannot perform {op} on {value}")]
    UnaryOp {
        op: &'static str,
        value: String,
        #[source]
        cause: Option<Box<ForgeError>>,
    },

    /// Integer or interval division by zero.
    #[error("division by zero")]
    DivideByZero,

    // === Compilation ===
    /// A function name did not resolve in the registry.
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },

    /// An operator has no registered implementation.
    #[error("unknown operator: {op}")]
    UnknownOperator { op: String },

    /// A function was called with the wrong number of arguments.
    #[error("wrong number of arguments for function {name}: expected {expected}, got {actual}")]
    WrongArity {
        name: String,
        expected: i32,
        actual: usize,
    },

    // === Evaluation ===
    /// A time zone name did not resolve.
    #[error("unknown time zone: {name}")]
    UnknownTimeZone { name: String },

    /// A timestamp literal did not match `YYYY-MM-DD HH:MM:SS[.fff]`.
    #[error("invalid timestamp: {input:?}")]
    InvalidTimestamp { input: String },

    /// Function-specific evaluation failure (bad argument domain,
    /// oversized result, malformed encoded input, and the like).
    #[error("{0}")]
    Function(String),

    // === Output ===
    /// File I/O failure while writing generated rows.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    /// Create a binary-operation error without an underlying cause.
    #[must_use]
    pub fn binary_op(op: &'static str, left: String, right: String) -> Self {
        Self::BinaryOp {
            op,
            left,
            right,
            cause: None,
        }
    }

    /// Create a unary-operation error without an underlying cause.
    #[must_use]
    pub fn unary_op(op: &'static str, value: String) -> Self {
        Self::UnaryOp {
            op,
            value,
            cause: None,
        }
    }

    /// Wrap an error as the cause of a binary operation, unless it is
    /// already a binary-operation error (the innermost context wins).
    #[must_use]
    pub fn into_binary_op(self, op: &'static str, left: String, right: String) -> Self {
        match self {
            err @ Self::BinaryOp { .. } => err,
            err => Self::BinaryOp {
                op,
                left,
                right,
                cause: Some(Box::new(err)),
            },
        }
    }

    /// Wrap an error as the cause of a unary operation, unless it is
    /// already a unary-operation error.
    #[must_use]
    pub fn into_unary_op(self, op: &'static str, value: String) -> Self {
        match self {
            err @ Self::UnaryOp { .. } => err,
            err => Self::UnaryOp {
                op,
                value,
                cause: Some(Box::new(err)),
            },
        }
    }
}

fn syntax_message(line: &u32, column: &u32, near: &str, cause: &str) -> String {
    if near.is_empty() {
        format!("syntax error on line {line} at column {column}: {cause}")
    } else {
        format!("syntax error on line {line} at column {column} near {near:?}: {cause}")
    }
}

/// Convenience alias used across all RowForge crates.
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_with_near_context() {
        let err = ForgeError::Syntax {
            line: 3,
            column: 7,
            near: "@@x".to_owned(),
            cause: "expected identifier".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "syntax error on line 3 at column 7 near \"@@x\": expected identifier"
        );
    }

    #[test]
    fn test_syntax_error_at_eof() {
        let err = ForgeError::Syntax {
            line: 1,
            column: 9,
            near: String::new(),
            cause: "unexpected EOF".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "syntax error on line 1 at column 9: unexpected EOF"
        );
    }

    #[test]
    fn test_binary_op_wrapping_keeps_innermost() {
        let inner = ForgeError::binary_op("add", "bool(TRUE)".into(), "int(1)".into());
        let wrapped = inner.into_binary_op("mul", "x".into(), "y".into());
        assert_eq!(
            wrapped.to_string(),
            "cannot perform add on bool(TRUE) and int(1)"
        );
    }

    #[test]
    fn test_convert_error_message() {
        let err = ForgeError::Convert {
            from: "bytes(abc)".to_owned(),
            to: "i64",
        };
        assert_eq!(err.to_string(), "cannot convert bytes(abc) to i64");
    }
}
