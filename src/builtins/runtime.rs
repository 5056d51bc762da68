//! Runtime introspection and test primitives: gc, stats, assert, test-eq, test-repr

use crate::error::{EvalError, ARITY_ONE, ARITY_TWO, ARITY_ZERO};
use crate::eval::Interpreter;
use crate::printer::Printer;
use crate::value::Value;

/// Runs a collection and returns the number of cells freed. Refused while
/// any evaluation is in progress: host-stack frames may hold live handles
/// the marker cannot see.
pub fn builtin_gc(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::arity_error(ARITY_ZERO, args.len()));
    }
    if !interp.can_collect() {
        return Err(EvalError::CannotCollectHere);
    }
    let freed = interp.collect();
    Ok(Value::Number(freed as f64))
}

/// Returns `(occupied . capacity)` for the heap arena. The counts are taken
/// before the result pair itself is allocated.
pub fn builtin_stats(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::arity_error(ARITY_ZERO, args.len()));
    }
    let live = interp.heap.live() as f64;
    let capacity = interp.heap.capacity() as f64;
    let handle = interp
        .heap
        .alloc_pair(Value::Number(live), Value::Number(capacity));
    Ok(Value::Pair(handle))
}

/// Fails with `AssertionFailed` unless the argument is truthy. Applicative
/// order means only the evaluated value is visible here; the payload is its
/// written form, and the evaluator replaces it with the assertion's call
/// site, which it alone can see. The fallback payload survives only when
/// the failure has no syntactic site, e.g. through `apply`.
pub fn builtin_assert(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error(ARITY_ONE, args.len()));
    }
    if args[0].is_truthy() {
        Ok(Value::Unspecified)
    } else {
        let rendered = Printer::new(&interp.heap, &interp.symbols).write(&args[0]);
        Err(EvalError::AssertionFailed(rendered))
    }
}

/// `(test-eq actual expected)`: eq?-compares, prints PASS/FAIL, returns the
/// verdict.
pub fn builtin_test_eq(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error(ARITY_TWO, args.len()));
    }
    let passed = args[0].eq_identity(&args[1]);
    report(interp, passed, &args[0], &args[1]);
    Ok(Value::Bool(passed))
}

/// `(test-repr actual expected)`: compares written representations, so
/// structurally equal lists pass even though they are distinct pairs.
pub fn builtin_test_repr(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error(ARITY_TWO, args.len()));
    }
    let printer = Printer::new(&interp.heap, &interp.symbols);
    let passed = printer.write(&args[0]) == printer.write(&args[1]);
    report(interp, passed, &args[0], &args[1]);
    Ok(Value::Bool(passed))
}

fn report(interp: &Interpreter, passed: bool, actual: &Value, expected: &Value) {
    let printer = Printer::new(&interp.heap, &interp.symbols);
    if passed {
        println!("PASS: {}", printer.write(actual));
    } else {
        println!(
            "FAIL: expected {}, got {}",
            printer.write(expected),
            printer.write(actual)
        );
    }
}

/// Register all runtime primitives.
pub fn register(interp: &mut Interpreter) {
    interp.define_primitive("gc", builtin_gc);
    interp.define_primitive("stats", builtin_stats);
    interp.define_primitive("assert", builtin_assert);
    interp.define_primitive("test-eq", builtin_test_eq);
    interp.define_primitive("test-repr", builtin_test_repr);
}
