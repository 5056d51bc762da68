//! Output primitives: display, newline

use crate::error::{EvalError, ARITY_ONE, ARITY_ZERO};
use crate::eval::Interpreter;
use crate::printer::Printer;
use crate::value::Value;
use std::io::Write;

/// Prints a value for human consumption (strings without quotes).
pub fn builtin_display(interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if args.len() != 1 {
        return Err(EvalError::arity_error(ARITY_ONE, args.len()));
    }
    let rendered = Printer::new(&interp.heap, &interp.symbols).display(&args[0]);
    print!("{}", rendered);
    let _ = std::io::stdout().flush();
    Ok(Value::Unspecified)
}

/// Prints a newline.
pub fn builtin_newline(_interp: &mut Interpreter, args: &[Value]) -> Result<Value, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::arity_error(ARITY_ZERO, args.len()));
    }
    println!();
    Ok(Value::Unspecified)
}

/// Register all output primitives.
pub fn register(interp: &mut Interpreter) {
    interp.define_primitive("display", builtin_display);
    interp.define_primitive("newline", builtin_newline);
}
