// ABOUTME: Error types surfaced by the evaluator and the top-level driver

use crate::reader::ReadError;
use crate::value::Value;
use thiserror::Error;

// ===== Arity shape strings shared by the builtin modules =====
pub const ARITY_ZERO: &str = "0";
pub const ARITY_ONE: &str = "1";
pub const ARITY_TWO: &str = "2";
pub const ARITY_AT_LEAST_ONE: &str = "at least 1";
pub const ARITY_AT_LEAST_TWO: &str = "at least 2";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("unbound variable: {0}")]
    UnboundVariable(String),

    /// Wrong kind of value at an operation, e.g. applying a non-procedure
    /// or taking the car of a non-pair.
    #[error("expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("expected {expected} argument{}, got {got}", if *.expected == "1" { "" } else { "s" })]
    ArityMismatch { expected: String, got: usize },

    /// Malformed special form: `define` with no name, a non-symbol formal,
    /// a dotted body, and friends.
    #[error("syntax error: {0}")]
    SyntaxError(String),

    /// Carries the written form of the failed assertion's call site, or the
    /// failing value when the call has no syntactic site.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// `gc` was invoked while the evaluator still has live host-stack frames,
    /// whose intermediate values the marker cannot see.
    #[error("gc called while evaluation is in progress")]
    CannotCollectHere,
}

impl EvalError {
    /// Type mismatch naming the offending value's kind.
    pub fn type_error(expected: &'static str, got: &Value) -> Self {
        EvalError::TypeError {
            expected,
            got: got.type_name(),
        }
    }

    /// Arity mismatch with the expected shape ("2", "at least 1", ...).
    pub fn arity_error(expected: impl Into<String>, got: usize) -> Self {
        EvalError::ArityMismatch {
            expected: expected.into(),
            got,
        }
    }

    pub fn syntax(detail: impl Into<String>) -> Self {
        EvalError::SyntaxError(detail.into())
    }
}

/// Either phase of the pipeline can fail; the top-level driver reports both
/// the same way.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}
