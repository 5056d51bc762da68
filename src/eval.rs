// ABOUTME: Trampolining tree-walker with proper tail calls

use crate::builtins;
use crate::config::DEFAULT_HEAP_CAPACITY;
use crate::env::Frame;
use crate::error::{Error, EvalError};
use crate::heap::Heap;
use crate::printer::Printer;
use crate::reader::{ReadError, Reader};
use crate::symbol::{SymbolId, SymbolTable};
use crate::value::{Lambda, Primitive, PrimitiveFn, Procedure, Value};
use std::rc::Rc;

/// One step of the evaluation state machine. `Eval` is a pending tail
/// evaluation, `Apply` a pending application of an already-evaluated
/// operator to already-evaluated operands, carrying the application's
/// source form (if it has one) for diagnostics. Neither ever escapes the
/// driver loop, so tail calls stay unobservable to user code.
enum Step {
    Done(Value),
    Eval(Value, Rc<Frame>),
    Apply(Value, Vec<Value>, Option<Value>),
}

/// Interned spellings of the special form heads, resolved once so dispatch
/// is an id comparison.
struct Specials {
    quote: SymbolId,
    if_: SymbolId,
    define: SymbolId,
    set_bang: SymbolId,
    lambda: SymbolId,
    begin: SymbolId,
    cond: SymbolId,
    else_: SymbolId,
    and: SymbolId,
    or: SymbolId,
}

impl Specials {
    fn intern(symbols: &mut SymbolTable) -> Self {
        Specials {
            quote: symbols.intern("quote"),
            if_: symbols.intern("if"),
            define: symbols.intern("define"),
            set_bang: symbols.intern("set!"),
            lambda: symbols.intern("lambda"),
            begin: symbols.intern("begin"),
            cond: symbols.intern("cond"),
            else_: symbols.intern("else"),
            and: symbols.intern("and"),
            or: symbols.intern("or"),
        }
    }
}

/// The interpreter instance: one heap, one symbol table, one top-level
/// frame. Strictly single-threaded; evaluation runs to completion or to an
/// error.
pub struct Interpreter {
    pub heap: Heap,
    pub symbols: SymbolTable,
    global: Rc<Frame>,
    specials: Specials,
    /// Values the collector must treat as roots while host code still holds
    /// them (pending top-level datums, mostly).
    temp_roots: Vec<Value>,
    /// Nested `eval` driver invocations currently on the host stack.
    eval_depth: usize,
    /// Compound procedure applications currently in progress. A chain of
    /// tail calls counts once.
    active_calls: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_heap_capacity(DEFAULT_HEAP_CAPACITY)
    }

    pub fn with_heap_capacity(capacity: usize) -> Self {
        let mut symbols = SymbolTable::new();
        let specials = Specials::intern(&mut symbols);
        let mut interp = Interpreter {
            heap: Heap::with_capacity(capacity),
            symbols,
            global: Frame::new(),
            specials,
            temp_roots: Vec::new(),
            eval_depth: 0,
            active_calls: 0,
        };
        builtins::register_builtins(&mut interp);
        interp
    }

    /// The top-level frame; a permanent GC root.
    pub fn global(&self) -> Rc<Frame> {
        self.global.clone()
    }

    /// Install a native operation into the top-level environment.
    pub fn define_primitive(&mut self, name: &'static str, func: PrimitiveFn) {
        let sym = self.symbols.intern(name);
        let handle = self
            .heap
            .alloc_procedure(Procedure::Primitive(Primitive { name, func }));
        self.global.define(sym, Value::Procedure(handle));
    }

    /// Read every top-level datum in `source` onto the heap.
    pub fn read(&mut self, source: &str) -> Result<Vec<Value>, ReadError> {
        Reader::new(&mut self.heap, &mut self.symbols).read_all(source)
    }

    /// Evaluate already-read top-level datums in order, handing each result
    /// to `report` as it completes. The whole batch stays rooted until the
    /// last datum finishes, so a `gc` in an early datum cannot reclaim its
    /// still-pending siblings.
    pub fn eval_batch<F>(&mut self, datums: Vec<Value>, mut report: F) -> Result<(), EvalError>
    where
        F: FnMut(&mut Interpreter, Value),
    {
        let mark = self.temp_roots.len();
        self.temp_roots.extend(datums.iter().cloned());
        for datum in datums {
            match self.eval(datum, self.global.clone()) {
                Ok(value) => report(self, value),
                Err(e) => {
                    self.temp_roots.truncate(mark);
                    return Err(e);
                }
            }
        }
        self.temp_roots.truncate(mark);
        Ok(())
    }

    /// Read and evaluate every top-level datum of `source` in order,
    /// returning the value of the last one.
    pub fn run_source(&mut self, source: &str) -> Result<Value, Error> {
        let datums = self.read(source)?;
        let mut result = Value::Unspecified;
        self.eval_batch(datums, |_, value| result = value)?;
        Ok(result)
    }

    /// True when every live handle is reachable from explicit roots: no
    /// nested evaluation on the host stack and no procedure application in
    /// progress.
    pub fn can_collect(&self) -> bool {
        self.eval_depth <= 1 && self.active_calls == 0
    }

    /// Run a collection rooted at the top-level frame and the temporary
    /// roots; returns the number of cells freed.
    pub fn collect(&mut self) -> usize {
        let root_frames = [self.global.clone()];
        self.heap.collect(&root_frames, &self.temp_roots)
    }

    /// Evaluate an expression in an environment.
    pub fn eval(&mut self, expr: Value, env: Rc<Frame>) -> Result<Value, EvalError> {
        self.run(Step::Eval(expr, env))
    }

    /// Apply a procedure to already-evaluated arguments (the entry point for
    /// the `apply` primitive and host callers). There is no source form to
    /// attach to diagnostics here.
    pub fn apply_procedure(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, EvalError> {
        self.run(Step::Apply(callee, args, None))
    }

    /// The trampoline. Loops until a step produces a value: pending tail
    /// evaluations and pending applications re-enter the loop instead of
    /// growing the host stack, so arbitrarily long tail-call chains run in
    /// constant stack space.
    fn run(&mut self, initial: Step) -> Result<Value, EvalError> {
        self.eval_depth += 1;
        let mut entered_call = false;
        let mut state = initial;
        let result = loop {
            state = match state {
                Step::Done(value) => break Ok(value),
                Step::Eval(expr, env) => match self.eval_step(expr, env) {
                    Ok(next) => next,
                    Err(e) => break Err(e),
                },
                Step::Apply(callee, args, source) => {
                    if !entered_call {
                        if let Value::Procedure(handle) = &callee {
                            if matches!(self.heap.procedure(*handle), Procedure::Compound(_)) {
                                entered_call = true;
                                self.active_calls += 1;
                            }
                        }
                    }
                    match self.apply_step(callee, args, source) {
                        Ok(next) => next,
                        Err(e) => break Err(e),
                    }
                }
            };
        };
        if entered_call {
            self.active_calls -= 1;
        }
        self.eval_depth -= 1;
        result
    }

    /// Perform one application: run a primitive to completion, or bind a
    /// compound procedure's formals and hand its final body expression back
    /// to the trampoline.
    fn apply_step(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        source: Option<Value>,
    ) -> Result<Step, EvalError> {
        let handle = match callee {
            Value::Procedure(handle) => handle,
            other => return Err(EvalError::type_error("procedure", &other)),
        };
        match self.heap.procedure(handle).clone() {
            Procedure::Primitive(prim) => match (prim.func)(self, &args) {
                Ok(value) => Ok(Step::Done(value)),
                // The assert primitive only sees its evaluated argument; the
                // application site is known here, so the diagnostic names it.
                Err(EvalError::AssertionFailed(detail)) => {
                    let detail = match &source {
                        Some(call) => Printer::new(&self.heap, &self.symbols).write(call),
                        None => detail,
                    };
                    Err(EvalError::AssertionFailed(detail))
                }
                Err(e) => Err(e),
            },
            Procedure::Compound(lambda) => {
                let frame = self.bind_formals(&lambda, args)?;
                match lambda.body.split_last() {
                    Some((last, init)) => {
                        for expr in init {
                            self.eval(expr.clone(), frame.clone())?;
                        }
                        Ok(Step::Eval(last.clone(), frame))
                    }
                    // Unreachable: lambda construction rejects empty bodies.
                    None => Ok(Step::Done(Value::Unspecified)),
                }
            }
        }
    }

    /// Build the application frame: formals bound positionally, a rest
    /// formal bound to a fresh proper list of the surplus.
    fn bind_formals(&mut self, lambda: &Lambda, args: Vec<Value>) -> Result<Rc<Frame>, EvalError> {
        let required = lambda.formals.len();
        let got = args.len();
        if got < required || (lambda.rest_formal.is_none() && got > required) {
            return Err(EvalError::arity_error(arity_shape(lambda), got));
        }

        let frame = Frame::with_parent(lambda.env.clone());
        let mut args = args.into_iter();
        for &formal in &lambda.formals {
            if let Some(arg) = args.next() {
                frame.define(formal, arg);
            }
        }
        if let Some(rest) = lambda.rest_formal {
            let surplus: Vec<Value> = args.collect();
            let mut tail = Value::Nil;
            for value in surplus.into_iter().rev() {
                tail = Value::Pair(self.heap.alloc_pair(value, tail));
            }
            frame.define(rest, tail);
        }
        Ok(frame)
    }

    fn eval_step(&mut self, expr: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        match expr {
            // Self-evaluating forms.
            Value::Number(_)
            | Value::Bool(_)
            | Value::Str(_)
            | Value::Nil
            | Value::Procedure(_)
            | Value::Unspecified => Ok(Step::Done(expr)),

            Value::Symbol(sym) => match env.get(sym) {
                Some(value) => Ok(Step::Done(value)),
                None => Err(self.unbound(sym)),
            },

            Value::Pair(handle) => {
                let (head, tail) = {
                    let cell = self.heap.pair(handle);
                    (cell.first.clone(), cell.rest.clone())
                };

                match head {
                    Value::Symbol(sym) => {
                        if sym == self.specials.quote {
                            return self.eval_quote(tail);
                        }
                        if sym == self.specials.if_ {
                            return self.eval_if(tail, env);
                        }
                        if sym == self.specials.define {
                            return self.eval_define(tail, env);
                        }
                        if sym == self.specials.set_bang {
                            return self.eval_set(tail, env);
                        }
                        if sym == self.specials.lambda {
                            return self.eval_lambda(tail, env);
                        }
                        if sym == self.specials.begin {
                            return self.eval_begin(tail, env);
                        }
                        if sym == self.specials.cond {
                            return self.eval_cond(tail, env);
                        }
                        if sym == self.specials.and {
                            return self.eval_and(tail, env);
                        }
                        if sym == self.specials.or {
                            return self.eval_or(tail, env);
                        }
                        self.eval_application(Value::Symbol(sym), tail, Value::Pair(handle), env)
                    }
                    operator => self.eval_application(operator, tail, Value::Pair(handle), env),
                }
            }
        }
    }

    /// Applicative order: operator first, then operands left to right.
    fn eval_application(
        &mut self,
        operator: Value,
        operands: Value,
        source: Value,
        env: Rc<Frame>,
    ) -> Result<Step, EvalError> {
        let callee = self.eval(operator, env.clone())?;
        let mut args = Vec::new();
        let mut rest = operands;
        loop {
            match rest {
                Value::Nil => break,
                Value::Pair(handle) => {
                    let (first, next) = {
                        let cell = self.heap.pair(handle);
                        (cell.first.clone(), cell.rest.clone())
                    };
                    args.push(self.eval(first, env.clone())?);
                    rest = next;
                }
                _ => return Err(EvalError::syntax("operands must form a proper list")),
            }
        }
        Ok(Step::Apply(callee, args, Some(source)))
    }

    fn eval_quote(&mut self, tail: Value) -> Result<Step, EvalError> {
        let mut items = self.list_elements(&tail, "quote")?;
        if items.len() != 1 {
            return Err(EvalError::syntax("quote: expected exactly one form"));
        }
        Ok(Step::Done(items.remove(0)))
    }

    fn eval_if(&mut self, tail: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        let mut items = self.list_elements(&tail, "if")?;
        if items.len() < 2 || items.len() > 3 {
            return Err(EvalError::syntax("if: expected a test and one or two branches"));
        }
        let condition = self.eval(items.remove(0), env.clone())?;
        if condition.is_truthy() {
            Ok(Step::Eval(items.remove(0), env))
        } else if items.len() == 2 {
            Ok(Step::Eval(items.remove(1), env))
        } else {
            Ok(Step::Done(Value::Unspecified))
        }
    }

    /// `(define sym expr)` and the `(define (name . formals) body...)` sugar.
    fn eval_define(&mut self, tail: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        let mut items = self.list_elements(&tail, "define")?;
        if items.is_empty() {
            return Err(EvalError::syntax("define: expected a name"));
        }
        match items.remove(0) {
            Value::Symbol(sym) => {
                if items.len() != 1 {
                    return Err(EvalError::syntax("define: expected exactly one value"));
                }
                let value = self.eval(items.remove(0), env.clone())?;
                env.define(sym, value);
                Ok(Step::Done(Value::Unspecified))
            }
            Value::Pair(header) => {
                let (name_value, formals_decl) = {
                    let cell = self.heap.pair(header);
                    (cell.first.clone(), cell.rest.clone())
                };
                let name = match name_value {
                    Value::Symbol(sym) => sym,
                    other => {
                        return Err(EvalError::syntax(format!(
                            "define: procedure name must be a symbol, got {}",
                            other.type_name()
                        )))
                    }
                };
                let procedure = self.make_lambda(&formals_decl, items, env.clone())?;
                env.define(name, procedure);
                Ok(Step::Done(Value::Unspecified))
            }
            other => Err(EvalError::syntax(format!(
                "define: expected a symbol or a procedure header, got {}",
                other.type_name()
            ))),
        }
    }

    fn eval_set(&mut self, tail: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        let mut items = self.list_elements(&tail, "set!")?;
        if items.len() != 2 {
            return Err(EvalError::syntax("set!: expected a name and a value"));
        }
        let sym = match items.remove(0) {
            Value::Symbol(sym) => sym,
            other => {
                return Err(EvalError::syntax(format!(
                    "set!: expected a symbol, got {}",
                    other.type_name()
                )))
            }
        };
        let value = self.eval(items.remove(0), env.clone())?;
        if env.set(sym, value) {
            Ok(Step::Done(Value::Unspecified))
        } else {
            Err(self.unbound(sym))
        }
    }

    fn eval_lambda(&mut self, tail: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        let mut items = self.list_elements(&tail, "lambda")?;
        if items.len() < 2 {
            return Err(EvalError::syntax("lambda: expected formals and a body"));
        }
        let formals_decl = items.remove(0);
        let procedure = self.make_lambda(&formals_decl, items, env)?;
        Ok(Step::Done(procedure))
    }

    /// Allocate a compound procedure capturing `env`.
    fn make_lambda(
        &mut self,
        formals_decl: &Value,
        body: Vec<Value>,
        env: Rc<Frame>,
    ) -> Result<Value, EvalError> {
        if body.is_empty() {
            return Err(EvalError::syntax("procedure body must be non-empty"));
        }
        let (formals, rest_formal) = self.parse_formals(formals_decl)?;
        let handle = self.heap.alloc_procedure(Procedure::Compound(Lambda {
            formals,
            rest_formal,
            body,
            env,
        }));
        Ok(Value::Procedure(handle))
    }

    /// Formals are a proper list (fixed arity), a single symbol (everything
    /// collected into a list), or an improper list (fixed prefix plus rest).
    fn parse_formals(
        &self,
        formals: &Value,
    ) -> Result<(Vec<SymbolId>, Option<SymbolId>), EvalError> {
        if let Value::Symbol(sym) = formals {
            return Ok((Vec::new(), Some(*sym)));
        }
        let mut fixed = Vec::new();
        let mut rest = formals.clone();
        loop {
            match rest {
                Value::Nil => return Ok((fixed, None)),
                Value::Symbol(sym) => return Ok((fixed, Some(sym))),
                Value::Pair(handle) => {
                    let cell = self.heap.pair(handle);
                    match cell.first {
                        Value::Symbol(sym) => fixed.push(sym),
                        ref other => {
                            return Err(EvalError::syntax(format!(
                                "lambda: formal must be a symbol, got {}",
                                other.type_name()
                            )))
                        }
                    }
                    rest = cell.rest.clone();
                }
                other => {
                    return Err(EvalError::syntax(format!(
                        "lambda: malformed formals, got {}",
                        other.type_name()
                    )))
                }
            }
        }
    }

    fn eval_begin(&mut self, tail: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        let mut items = self.list_elements(&tail, "begin")?;
        match items.len() {
            0 => Ok(Step::Done(Value::Unspecified)),
            n => {
                for expr in items.drain(..n - 1) {
                    self.eval(expr, env.clone())?;
                }
                Ok(Step::Eval(items.remove(0), env))
            }
        }
    }

    /// Clauses are `(test body...)` or a final `(else body...)`. A clause
    /// with no body yields the test's value.
    fn eval_cond(&mut self, tail: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        let clauses = self.list_elements(&tail, "cond")?;
        let count = clauses.len();
        for (index, clause) in clauses.into_iter().enumerate() {
            let mut parts = self.list_elements(&clause, "cond")?;
            if parts.is_empty() {
                return Err(EvalError::syntax("cond: empty clause"));
            }
            let test = parts.remove(0);
            let is_else = matches!(&test, Value::Symbol(sym) if *sym == self.specials.else_);
            if is_else {
                if index != count - 1 {
                    return Err(EvalError::syntax("cond: else must be the final clause"));
                }
                if parts.is_empty() {
                    return Err(EvalError::syntax("cond: else clause needs a body"));
                }
                return self.eval_sequence_tail(parts, env);
            }
            let value = self.eval(test, env.clone())?;
            if value.is_truthy() {
                if parts.is_empty() {
                    return Ok(Step::Done(value));
                }
                return self.eval_sequence_tail(parts, env);
            }
        }
        Ok(Step::Done(Value::Unspecified))
    }

    /// Evaluate all but the last expression, handing the last back as the
    /// tail step.
    fn eval_sequence_tail(
        &mut self,
        mut exprs: Vec<Value>,
        env: Rc<Frame>,
    ) -> Result<Step, EvalError> {
        let count = exprs.len();
        for expr in exprs.drain(..count - 1) {
            self.eval(expr, env.clone())?;
        }
        Ok(Step::Eval(exprs.remove(0), env))
    }

    fn eval_and(&mut self, tail: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        let mut items = self.list_elements(&tail, "and")?;
        if items.is_empty() {
            return Ok(Step::Done(Value::Bool(true)));
        }
        let count = items.len();
        for expr in items.drain(..count - 1) {
            let value = self.eval(expr, env.clone())?;
            if !value.is_truthy() {
                return Ok(Step::Done(value));
            }
        }
        Ok(Step::Eval(items.remove(0), env))
    }

    fn eval_or(&mut self, tail: Value, env: Rc<Frame>) -> Result<Step, EvalError> {
        let mut items = self.list_elements(&tail, "or")?;
        if items.is_empty() {
            return Ok(Step::Done(Value::Bool(false)));
        }
        let count = items.len();
        for expr in items.drain(..count - 1) {
            let value = self.eval(expr, env.clone())?;
            if value.is_truthy() {
                return Ok(Step::Done(value));
            }
        }
        Ok(Step::Eval(items.remove(0), env))
    }

    /// Collect a proper list into a Vec, or fail with a syntax error naming
    /// the form (this is what rejects dotted bodies and operand lists).
    fn list_elements(&self, list: &Value, form: &str) -> Result<Vec<Value>, EvalError> {
        let mut items = Vec::new();
        let mut rest = list.clone();
        loop {
            match rest {
                Value::Nil => return Ok(items),
                Value::Pair(handle) => {
                    let cell = self.heap.pair(handle);
                    items.push(cell.first.clone());
                    rest = cell.rest.clone();
                }
                _ => {
                    return Err(EvalError::syntax(format!(
                        "{form}: expected a proper list"
                    )))
                }
            }
        }
    }

    fn unbound(&self, sym: SymbolId) -> EvalError {
        EvalError::UnboundVariable(self.symbols.name(sym).to_string())
    }
}

fn arity_shape(lambda: &Lambda) -> String {
    if lambda.rest_formal.is_some() {
        format!("at least {}", lambda.formals.len())
    } else {
        lambda.formals.len().to_string()
    }
}
