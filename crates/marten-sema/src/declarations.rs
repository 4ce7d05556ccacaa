// declarations.rs
//
// The symbol and declaration model the binder populates. Each symbol owns
// the list of declarations that introduced its name; the evaluator computes
// types from them on demand.

use std::sync::Arc;

use bitflags::bitflags;

use marten_syntax::{NodeId, Span};

use crate::module::ImportLookup;
use crate::types::{ClassType, Type};

/// Stable integer identity for a symbol, unique within a checker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(u32);

impl SymbolId {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SymbolFlags: u8 {
        /// Excluded from protocol matching and from unused reporting
        const IGNORED_FOR_PROTOCOL_MATCH = 1 << 0;
        /// Declared inside a class scope
        const CLASS_MEMBER = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasInfo {
    /// The dotted module path being imported
    pub module_path: Vec<String>,
    /// For `from m import x`, the member name; `None` for whole-module imports
    pub imported_name: Option<String>,
    /// True when the binding uses an `as` alias
    pub uses_local_name: bool,
}

impl AliasInfo {
    pub fn dotted_path(&self) -> String {
        self.module_path.join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationKind {
    Alias(AliasInfo),
    Variable,
    Parameter,
    Function,
    Method,
    Class,
}

/// One introduction of a name: a particular assignment, parameter,
/// definition, or import.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: DeclarationKind,
    /// The node that introduced the name (the name node for targets, the
    /// def/class node for definitions)
    pub node: NodeId,
    pub span: Span,
    /// Explicit annotation node, when the declaration carried one
    pub annotation: Option<NodeId>,
    /// Pre-resolved declared type. Synthetic modules (builtins, typing)
    /// fill this in; source declarations leave it to annotation evaluation.
    pub declared_type: Option<Type>,
}

impl Declaration {
    /// Whether this declaration carries an explicit type.
    pub fn is_typed(&self) -> bool {
        self.annotation.is_some() || self.declared_type.is_some()
    }
}

#[derive(Debug)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub flags: SymbolFlags,
    pub declarations: Vec<Declaration>,
}

pub type SymbolRef = Arc<Symbol>;

impl Symbol {
    pub fn new(id: SymbolId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            flags: SymbolFlags::empty(),
            declarations: Vec::new(),
        }
    }

    /// The declaration consumers resolve the name through: the first one,
    /// preferring non-alias declarations when both exist.
    pub fn primary_declaration(&self) -> Option<&Declaration> {
        self.declarations
            .iter()
            .find(|d| !matches!(d.kind, DeclarationKind::Alias(_)))
            .or_else(|| self.declarations.first())
    }

    pub fn has_only_alias_declarations(&self) -> bool {
        !self.declarations.is_empty()
            && self
                .declarations
                .iter()
                .all(|d| matches!(d.kind, DeclarationKind::Alias(_)))
    }
}

/// The most recent declaration that carried an explicit type.
pub fn last_typed_declaration(symbol: &Symbol) -> Option<&Declaration> {
    symbol.declarations.iter().rev().find(|d| d.is_typed())
}

/// Follow an import alias to its ultimate definition. Chains of aliases
/// (re-exports) resolve transitively; cycles terminate at the repeat.
pub fn resolve_alias_declaration<'a>(
    decl: &'a Declaration,
    lookup: &'a dyn ImportLookup,
) -> Option<(&'a SymbolRef, &'a Declaration)> {
    let mut current = decl;
    let mut hops = 0;
    loop {
        let DeclarationKind::Alias(info) = &current.kind else {
            return None;
        };
        let name = info.imported_name.as_deref()?;
        let module = lookup.lookup(&info.dotted_path())?;
        let symbol = module.symbols.get(name)?;
        let target = symbol.primary_declaration()?;
        if !matches!(target.kind, DeclarationKind::Alias(_)) || hops > 16 {
            return Some((symbol, target));
        }
        current = target;
        hops += 1;
    }
}

/// Search the class's bases (depth-first over the MRO approximation) for a
/// member, returning the symbol and the class it was found on.
pub fn symbol_from_base_classes<'a>(
    class: &'a ClassType,
    name: &str,
) -> Option<(&'a SymbolRef, &'a Arc<ClassType>)> {
    for base in &class.bases {
        let Type::Class(base_class) = base else {
            continue;
        };
        if let Some(symbol) = base_class.member(name) {
            // The borrow of `symbol` lives inside `base_class`, which this
            // function returns alongside it.
            return Some((symbol, base_class));
        }
        if let Some(found) = symbol_from_base_classes(base_class, name) {
            return Some(found);
        }
    }
    None
}

/// Member search including the class's own table.
pub fn lookup_class_member<'a>(
    class: &'a Arc<ClassType>,
    name: &str,
) -> Option<(&'a SymbolRef, &'a Arc<ClassType>)> {
    if let Some(symbol) = class.member(name) {
        return Some((symbol, class));
    }
    symbol_from_base_classes(class, name)
}
