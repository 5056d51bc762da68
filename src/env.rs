// ABOUTME: Chained binding frames implementing lexical scope

use crate::symbol::SymbolId;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One lexical scope: bindings plus a reference to the enclosing frame.
/// Frames are reference-counted host objects; the collector reaches them
/// through the procedures that capture them.
#[derive(Debug)]
pub struct Frame {
    bindings: RefCell<HashMap<SymbolId, Value>>,
    parent: Option<Rc<Frame>>,
}

impl Frame {
    /// Creates a top-level frame with no parent.
    pub fn new() -> Rc<Self> {
        Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a child frame; lookups fall through to `parent`.
    pub fn with_parent(parent: Rc<Frame>) -> Rc<Self> {
        Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Binds in THIS frame, shadowing any outer binding of the same symbol.
    pub fn define(&self, sym: SymbolId, value: Value) {
        self.bindings.borrow_mut().insert(sym, value);
    }

    /// Innermost-first search along the parent chain.
    pub fn get(&self, sym: SymbolId) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(&sym) {
            return Some(value.clone());
        }
        if let Some(ref parent) = self.parent {
            return parent.get(sym);
        }
        None
    }

    /// Overwrites the innermost binding of `sym`; returns false if no frame
    /// in the chain binds it.
    pub fn set(&self, sym: SymbolId, value: Value) -> bool {
        if self.bindings.borrow().contains_key(&sym) {
            self.bindings.borrow_mut().insert(sym, value);
            return true;
        }
        if let Some(ref parent) = self.parent {
            return parent.set(sym, value);
        }
        false
    }

    pub fn parent(&self) -> Option<Rc<Frame>> {
        self.parent.clone()
    }

    /// Snapshot of the values bound in this frame alone, for the collector.
    pub fn values(&self) -> Vec<Value> {
        self.bindings.borrow().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;

    #[test]
    fn test_define_and_get() {
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");
        let frame = Frame::new();
        frame.define(x, Value::Number(42.0));

        match frame.get(x) {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            _ => panic!("Expected Number(42.0)"),
        }
    }

    #[test]
    fn test_unbound_symbol() {
        let mut symbols = SymbolTable::new();
        let frame = Frame::new();
        assert!(frame.get(symbols.intern("missing")).is_none());
    }

    #[test]
    fn test_shadowing() {
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");

        let parent = Frame::new();
        parent.define(x, Value::Number(42.0));

        let child = Frame::with_parent(parent.clone());
        child.define(x, Value::Number(100.0));

        match child.get(x) {
            Some(Value::Number(n)) => assert_eq!(n, 100.0),
            _ => panic!("Expected Number(100.0)"),
        }
        // The outer binding is untouched.
        match parent.get(x) {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            _ => panic!("Expected Number(42.0)"),
        }
    }

    #[test]
    fn test_parent_lookup() {
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");

        let parent = Frame::new();
        parent.define(x, Value::Number(42.0));
        let child = Frame::with_parent(parent);

        match child.get(x) {
            Some(Value::Number(n)) => assert_eq!(n, 42.0),
            _ => panic!("Expected Number(42.0)"),
        }
    }

    #[test]
    fn test_set_finds_innermost_binding() {
        let mut symbols = SymbolTable::new();
        let x = symbols.intern("x");

        let parent = Frame::new();
        parent.define(x, Value::Number(1.0));
        let child = Frame::with_parent(parent.clone());

        // No binding in the child, so the parent's slot is overwritten.
        assert!(child.set(x, Value::Number(2.0)));
        match parent.get(x) {
            Some(Value::Number(n)) => assert_eq!(n, 2.0),
            _ => panic!("Expected Number(2.0)"),
        }
    }

    #[test]
    fn test_set_unbound_fails() {
        let mut symbols = SymbolTable::new();
        let frame = Frame::new();
        assert!(!frame.set(symbols.intern("nope"), Value::Nil));
    }

    #[test]
    fn test_multiple_levels() {
        let mut symbols = SymbolTable::new();
        let a = symbols.intern("a");
        let b = symbols.intern("b");
        let c = symbols.intern("c");

        let grandparent = Frame::new();
        grandparent.define(a, Value::Number(1.0));
        let parent = Frame::with_parent(grandparent);
        parent.define(b, Value::Number(2.0));
        let child = Frame::with_parent(parent);
        child.define(c, Value::Number(3.0));

        for (sym, expected) in [(a, 1.0), (b, 2.0), (c, 3.0)] {
            match child.get(sym) {
                Some(Value::Number(n)) => assert_eq!(n, expected),
                _ => panic!("Expected binding"),
            }
        }
    }
}
