// module.rs
//
// Per-module analysis inputs: the parse tree plus the binder's decorations,
// the import lookup seam, and the accessed-symbol set shared across passes.

use rustc_hash::{FxHashMap, FxHashSet};

use marten_syntax::{NodeId, ParseTree};

use crate::declarations::SymbolId;
use crate::diagnostics::DiagnosticSettings;
use crate::flow::FlowMap;
use crate::scope::{ScopeArena, ScopeId};

/// File-level facts that gate checks.
#[derive(Debug, Default)]
pub struct FileInfo {
    pub file_path: String,
    pub is_stub_file: bool,
    pub settings: DiagnosticSettings,
}

/// A module parse tree decorated with binder output. Immutable during
/// analysis; the checker and evaluator only read it.
#[derive(Debug)]
pub struct BoundModule {
    pub tree: ParseTree,
    pub root: NodeId,
    pub scopes: ScopeArena,
    pub module_scope: ScopeId,
    /// Scope entry points: the module node, class/function suite nodes,
    /// lambda nodes, and parameter name nodes map to their scope.
    pub scope_of_node: FxHashMap<NodeId, ScopeId>,
    pub flow: FlowMap,
    /// Yield expressions recorded per function-definition node. A function
    /// is a generator iff its entry here is non-empty.
    pub yields_of_function: FxHashMap<NodeId, Vec<NodeId>>,
    pub file_info: FileInfo,
}

impl BoundModule {
    /// The scope a node evaluates in: its own entry, or the nearest
    /// decorated ancestor's. Decorators and parameter defaults hang off
    /// the definition node rather than the suite, so they naturally land
    /// in the enclosing scope.
    pub fn scope_for_node(&self, node: NodeId) -> ScopeId {
        if let Some(scope) = self.scope_of_node.get(&node) {
            return *scope;
        }
        for ancestor in self.tree.ancestors(node) {
            if let Some(scope) = self.scope_of_node.get(&ancestor) {
                return *scope;
            }
        }
        self.module_scope
    }

    pub fn is_generator_function(&self, function_node: NodeId) -> bool {
        self.yields_of_function
            .get(&function_node)
            .is_some_and(|yields| !yields.is_empty())
    }
}

/// Binder output for an imported module, as seen through the import lookup.
#[derive(Debug, Default)]
pub struct ModuleSymbols {
    pub symbols: crate::scope::SymbolTable,
}

/// The sole cross-module interface: resolve a dotted module path to its
/// binder output. Expected to be pure during a pass; its answer may change
/// between passes, which the fixpoint loop treats as normal input change.
pub trait ImportLookup {
    fn lookup(&self, path: &str) -> Option<&ModuleSymbols>;
}

impl ImportLookup for FxHashMap<String, ModuleSymbols> {
    fn lookup(&self, path: &str) -> Option<&ModuleSymbols> {
        self.get(path)
    }
}

/// An import lookup that resolves nothing.
#[derive(Debug, Default)]
pub struct NoImports;

impl ImportLookup for NoImports {
    fn lookup(&self, _path: &str) -> Option<&ModuleSymbols> {
        None
    }
}

/// Symbol ids touched during this and all prior passes. Grows
/// monotonically; drives the unused-symbol sweep after convergence.
#[derive(Debug, Default)]
pub struct AccessedSymbolSet {
    ids: FxHashSet<SymbolId>,
}

impl AccessedSymbolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, id: SymbolId) {
        self.ids.insert(id);
    }

    pub fn contains(&self, id: SymbolId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeKind;
    use marten_syntax::{NodeKind, Span};

    #[test]
    fn scope_for_node_walks_ancestors() {
        let mut tree = ParseTree::new();
        let inner = tree.add(Span::default(), NodeKind::Pass);
        let suite = tree.add(
            Span::default(),
            NodeKind::Suite {
                statements: vec![inner],
            },
        );
        let root = tree.add(Span::default(), NodeKind::Module { body: vec![suite] });
        tree.set_parent(inner, suite);
        tree.set_parent(suite, root);

        let mut scopes = ScopeArena::new();
        let module_scope = scopes.add(ScopeKind::Module, None, root);
        let func_scope = scopes.add(ScopeKind::Function, Some(module_scope), suite);

        let mut scope_of_node = FxHashMap::default();
        scope_of_node.insert(root, module_scope);
        scope_of_node.insert(suite, func_scope);

        let module = BoundModule {
            tree,
            root,
            scopes,
            module_scope,
            scope_of_node,
            flow: FlowMap::default(),
            yields_of_function: FxHashMap::default(),
            file_info: FileInfo::default(),
        };

        assert_eq!(module.scope_for_node(inner), func_scope);
        assert_eq!(module.scope_for_node(root), module_scope);
    }

    #[test]
    fn accessed_set_grows_monotonically() {
        let mut set = AccessedSymbolSet::new();
        assert!(set.is_empty());
        set.mark(SymbolId::new(3));
        set.mark(SymbolId::new(3));
        assert_eq!(set.len(), 1);
        assert!(set.contains(SymbolId::new(3)));
    }
}
