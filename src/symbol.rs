// ABOUTME: Process-wide symbol interning; one identity per spelling

use std::collections::HashMap;
use std::rc::Rc;

/// The canonical identity of an interned symbol. Comparing ids compares
/// symbols; the spelling lives in the table for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

#[derive(Debug, Default)]
pub struct SymbolTable {
    names: Vec<Rc<str>>,
    ids: HashMap<Rc<str>, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, creating it on first sight. Interned
    /// spellings are never reclaimed.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = SymbolId(self.names.len() as u32);
        let spelling: Rc<str> = Rc::from(name);
        self.names.push(spelling.clone());
        self.ids.insert(spelling, id);
        id
    }

    pub fn name(&self, id: SymbolId) -> &str {
        &self.names[id.0 as usize]
    }
}
