// well_known.rs
//
// Resolution of canonical builtins/typing names through the import lookup.
// These modules come from the same binder pipeline as user code (or from a
// synthetic provider in tests); their symbols carry pre-resolved types.

use std::sync::Arc;

use crate::declarations::last_typed_declaration;
use crate::module::ImportLookup;
use crate::types::{ClassType, Type};

pub const BUILTINS_MODULE: &str = "builtins";
pub const TYPING_MODULE: &str = "typing";

/// The declared type of a module member, if the module resolves and the
/// member carries one.
pub fn module_member_type(
    lookup: &dyn ImportLookup,
    module: &str,
    name: &str,
) -> Option<Type> {
    let module = lookup.lookup(module)?;
    let symbol = module.symbols.get(name)?;
    let decl = last_typed_declaration(symbol).or_else(|| symbol.primary_declaration())?;
    decl.declared_type.clone()
}

pub fn builtin_type(lookup: &dyn ImportLookup, name: &str) -> Option<Type> {
    module_member_type(lookup, BUILTINS_MODULE, name)
}

pub fn builtin_class(lookup: &dyn ImportLookup, name: &str) -> Option<Arc<ClassType>> {
    match builtin_type(lookup, name)? {
        Type::Class(class) => Some(class),
        _ => None,
    }
}

/// The instance form of a builtin class, e.g. `int` the type of `3`.
pub fn builtin_object(lookup: &dyn ImportLookup, name: &str) -> Option<Type> {
    builtin_class(lookup, name).map(Type::Object)
}

/// Resolve a name from the canonical typing module (`Iterator`,
/// `Generator`, `NoReturn`, ...).
pub fn typing_type(lookup: &dyn ImportLookup, name: &str) -> Option<Type> {
    module_member_type(lookup, TYPING_MODULE, name)
}

pub fn typing_class(lookup: &dyn ImportLookup, name: &str) -> Option<Arc<ClassType>> {
    match typing_type(lookup, name)? {
        Type::Class(class) => Some(class),
        _ => None,
    }
}

/// Reserved double-underscore names (`__init__`, `__all__`, ...).
pub fn is_dunder_name(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

/// Private by convention: double leading underscore, not a dunder.
pub fn is_private_name(name: &str) -> bool {
    name.starts_with("__") && !is_dunder_name(name)
}

/// Protected by convention: single leading underscore (privates included).
pub fn is_protected_name(name: &str) -> bool {
    name.starts_with('_') && !is_dunder_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dunder_detection() {
        assert!(is_dunder_name("__init__"));
        assert!(!is_dunder_name("__x"));
        assert!(!is_dunder_name("____"));
        assert!(!is_dunder_name("_x"));
    }

    #[test]
    fn privacy_prefixes() {
        assert!(is_private_name("__secret"));
        assert!(!is_private_name("_shared"));
        assert!(is_protected_name("_shared"));
        assert!(is_protected_name("__secret"));
        assert!(!is_protected_name("__init__"));
        assert!(!is_protected_name("plain"));
    }
}
