// scope.rs
//
// Scope tree and ordered symbol tables, as the binder populates them.
// Lookup walks parents with the language's rule that class scopes are
// invisible to nested function scopes.

use rustc_hash::FxHashMap;

use marten_syntax::NodeId;

use crate::declarations::SymbolRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Class,
    Function,
    ListComprehension,
}

/// Name-to-symbol table preserving declaration order, so diagnostic sweeps
/// are deterministic.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolRef>,
    index: FxHashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: SymbolRef) {
        match self.index.get(&symbol.name) {
            Some(&slot) => self.entries[slot] = symbol,
            None => {
                self.index.insert(symbol.name.clone(), self.entries.len());
                self.entries.push(symbol);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SymbolRef> {
        self.index.get(name).map(|&slot| &self.entries[slot])
    }

    /// Symbols in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolRef> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// The node that owns this scope (module, class/function suite, lambda)
    pub node: NodeId,
    pub symbols: SymbolTable,
}

#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: ScopeKind, parent: Option<ScopeId>, node: NodeId) -> ScopeId {
        let id = ScopeId::new(self.scopes.len() as u32);
        self.scopes.push(Scope {
            kind,
            parent,
            node,
            symbols: SymbolTable::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index() as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index() as usize]
    }

    /// Resolve a name starting at `from`, walking parent scopes. Class
    /// scopes only participate when they are the starting scope.
    pub fn lookup(&self, from: ScopeId, name: &str) -> Option<(ScopeId, &SymbolRef)> {
        let mut current = Some(from);
        let mut first = true;
        while let Some(id) = current {
            let scope = self.get(id);
            let skip = scope.kind == ScopeKind::Class && !first;
            if !skip && let Some(symbol) = scope.symbols.get(name) {
                return Some((id, symbol));
            }
            current = scope.parent;
            first = false;
        }
        None
    }

    /// The nearest enclosing scope of the given kind, including `from`.
    pub fn nearest_of_kind(&self, from: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
        let mut current = Some(from);
        while let Some(id) = current {
            if self.get(id).kind == kind {
                return Some(id);
            }
            current = self.get(id).parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declarations::{Symbol, SymbolId};
    use std::sync::Arc;

    fn symbol(id: u32, name: &str) -> SymbolRef {
        Arc::new(Symbol::new(SymbolId::new(id), name))
    }

    #[test]
    fn lookup_walks_parents() {
        let mut arena = ScopeArena::new();
        let module = arena.add(ScopeKind::Module, None, NodeId::new(0));
        let func = arena.add(ScopeKind::Function, Some(module), NodeId::new(1));
        arena.get_mut(module).symbols.insert(symbol(0, "x"));

        let (found_in, sym) = arena.lookup(func, "x").unwrap();
        assert_eq!(found_in, module);
        assert_eq!(sym.name, "x");
    }

    #[test]
    fn class_scope_invisible_to_nested_functions() {
        let mut arena = ScopeArena::new();
        let module = arena.add(ScopeKind::Module, None, NodeId::new(0));
        let class = arena.add(ScopeKind::Class, Some(module), NodeId::new(1));
        let method = arena.add(ScopeKind::Function, Some(class), NodeId::new(2));
        arena.get_mut(class).symbols.insert(symbol(0, "attr"));

        assert!(arena.lookup(method, "attr").is_none());
        assert!(arena.lookup(class, "attr").is_some());
    }

    #[test]
    fn table_preserves_insertion_order() {
        let mut table = SymbolTable::new();
        table.insert(symbol(0, "b"));
        table.insert(symbol(1, "a"));
        let names: Vec<_> = table.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
