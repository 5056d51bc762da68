//! # Primitive Procedures
//!
//! Native operations installed into the top-level environment, organized by
//! category. The evaluator knows nothing about any of these; it only calls
//! whatever `Procedure::Primitive` cells it finds.
//!
//! ## Categories
//!
//! - **[arithmetic]** (8): +, -, *, /, remainder, =, <, > - Numeric operations
//! - **[predicates]** (3): eq?, pair?, not - Value tests
//! - **[lists]** (7): cons, car, cdr, set-car!, set-cdr!, list, apply - Pair surgery
//! - **[io]** (2): display, newline - Output
//! - **[runtime]** (5): gc, stats, assert, test-eq, test-repr - Heap and test hooks
//!
//! Each category is a sub-module with its own `register` function binding the
//! primitives in the environment.

pub mod arithmetic;
pub mod io;
pub mod lists;
pub mod predicates;
pub mod runtime;

use crate::eval::Interpreter;

/// Register every primitive category.
pub fn register_builtins(interp: &mut Interpreter) {
    arithmetic::register(interp);
    predicates::register(interp);
    lists::register(interp);
    io::register(interp);
    runtime::register(interp);
}
