//! Pair and list primitives: cons, car, cdr, set-car!, set-cdr!, list, apply
//!
//! Pairs are heap cells with destructive update; `set-cdr!` can and does
//! build cycles, which is the collector's problem, not ours.

use crate::error::{EvalError, ARITY_AT_LEAST_TWO, ARITY_ONE, ARITY_TWO};
use crate::eval::Interpreter;
use crate::value::{PairHandle, Value};

fn pair_arg(args: &[Value], index: usize) -> Result<PairHandle, EvalError> {
    match args[index] {
        Value::Pair(handle) => Ok(handle),
        ref other => Err(EvalError::type_error("pair", other)),
    }
}

/// Allocates a fresh pair.
pub fn builtin_cons(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error(ARITY_TWO, args.len()));
    }
    let handle = interp.heap.alloc_pair(args[0].clone(), args[1].clone());
    Ok(Value::Pair(handle))
}

/// First slot of a pair.
pub fn builtin_car(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error(ARITY_ONE, args.len()));
    }
    let handle = pair_arg(args, 0)?;
    Ok(interp.heap.pair(handle).first.clone())
}

/// Rest slot of a pair.
pub fn builtin_cdr(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error(ARITY_ONE, args.len()));
    }
    let handle = pair_arg(args, 0)?;
    Ok(interp.heap.pair(handle).rest.clone())
}

/// Destructively replaces a pair's first slot.
pub fn builtin_set_car(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error(ARITY_TWO, args.len()));
    }
    let handle = pair_arg(args, 0)?;
    interp.heap.pair_mut(handle).first = args[1].clone();
    Ok(Value::Unspecified)
}

/// Destructively replaces a pair's rest slot.
pub fn builtin_set_cdr(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 2 {
        return Err(EvalError::arity_error(ARITY_TWO, args.len()));
    }
    let handle = pair_arg(args, 0)?;
    interp.heap.pair_mut(handle).rest = args[1].clone();
    Ok(Value::Unspecified)
}

/// Builds a fresh proper list of the arguments.
pub fn builtin_list(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    let mut result = Value::Nil;
    for value in args.iter().rev() {
        result = Value::Pair(interp.heap.alloc_pair(value.clone(), result));
    }
    Ok(result)
}

/// `(apply proc arg... args)`: calls `proc` with the leading arguments
/// followed by the elements of the final list.
pub fn builtin_apply(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() < 2 {
        return Err(EvalError::arity_error(ARITY_AT_LEAST_TWO, args.len()));
    }
    let callee = args[0].clone();
    let (last, init) = match args[1..].split_last() {
        Some(split) => split,
        None => return Err(EvalError::arity_error(ARITY_AT_LEAST_TWO, args.len())),
    };
    let mut call_args = init.to_vec();
    call_args.extend(proper_list(interp, last)?);
    interp.apply_procedure(callee, call_args)
}

/// Spread a proper list into a Vec; an improper tail is a type error.
fn proper_list(interp: &Interpreter, value: &Value) -> Result<Vec<Value>, EvalError> {
    let mut items = Vec::new();
    let mut rest = value.clone();
    loop {
        match rest {
            Value::Nil => return Ok(items),
            Value::Pair(handle) => {
                let cell = interp.heap.pair(handle);
                items.push(cell.first.clone());
                rest = cell.rest.clone();
            }
            other => return Err(EvalError::type_error("list", &other)),
        }
    }
}

/// Register all list primitives.
pub fn register(interp: &mut Interpreter) {
    interp.define_primitive("cons", builtin_cons);
    interp.define_primitive("car", builtin_car);
    interp.define_primitive("cdr", builtin_cdr);
    interp.define_primitive("set-car!", builtin_set_car);
    interp.define_primitive("set-cdr!", builtin_set_cdr);
    interp.define_primitive("list", builtin_list);
    interp.define_primitive("apply", builtin_apply);
}
