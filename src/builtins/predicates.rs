//! Predicates: eq?, pair?, not

use crate::error::{EvalError, ARITY_ONE, ARITY_TWO};
use crate::eval::Interpreter;
use crate::value::Value;

/// Identity comparison: symbols, pairs, procedures, strings and booleans by
/// identity, numbers by numeric equality.
pub fn builtin_eq(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error(ARITY_TWO, args.len()));
    }
    Ok(Value::Bool(args[0].eq_identity(&args[1])))
}

/// True for pairs only; the empty list is not a pair.
pub fn builtin_pair(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error(ARITY_ONE, args.len()));
    }
    Ok(Value::Bool(matches!(args[0], Value::Pair(_))))
}

/// Logical negation under the truthiness rule: only `#f` negates to `#t`.
pub fn builtin_not(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error(ARITY_ONE, args.len()));
    }
    Ok(Value::Bool(!args[0].is_truthy()))
}

/// Register all predicate primitives.
pub fn register(interp: &mut Interpreter) {
    interp.define_primitive("eq?", builtin_eq);
    interp.define_primitive("pair?", builtin_pair);
    interp.define_primitive("not", builtin_not);
}
