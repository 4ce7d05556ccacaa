// expression_data.rs
//
// Per-node type cache shared by the evaluator and the walker. Entries carry
// the pass version that computed them; writes follow a monotone discipline
// so the fixpoint loop terminates: a type may be replaced or refined, but a
// strictly less informative re-computation is suppressed.

use rustc_hash::FxHashMap;

use marten_syntax::NodeId;

use crate::compatibility::{contains_unknown, is_type_same};
use crate::types::Type;

#[derive(Debug, Clone)]
pub struct CachedType {
    pub ty: Type,
    pub pass: u32,
}

/// Result of a cache write, driving the "analysis changed" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// No prior entry, or the value differed; the cache was updated
    Updated,
    /// Structurally equal to the cached value; only the pass stamp moved
    Unchanged,
    /// The new value was strictly less informative; the cached value wins
    Suppressed,
}

/// True when `new` is strictly less informative than `old` and must not
/// overwrite it: concrete degrading to Unknown, a fully-known type picking
/// up Unknown parts, or a union growing a strict superset of members.
fn is_widening(old: &Type, new: &Type) -> bool {
    if new.is_unknown() && !old.is_unknown() {
        return true;
    }
    if contains_unknown(new) && !contains_unknown(old) {
        return true;
    }
    if let Type::Union(new_members) = new {
        let old_members = old.subtypes();
        if new_members.len() > old_members.len()
            && old_members
                .iter()
                .all(|m| new_members.iter().any(|n| is_type_same(m, n)))
        {
            return true;
        }
    }
    false
}

#[derive(Debug, Default)]
pub struct TypeCache {
    entries: FxHashMap<NodeId, CachedType>,
}

impl TypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<&Type> {
        self.entries.get(&node).map(|e| &e.ty)
    }

    pub fn entry(&self, node: NodeId) -> Option<&CachedType> {
        self.entries.get(&node)
    }

    /// Write-through with the monotone rule. The cache is never cleared
    /// between passes.
    pub fn write(&mut self, node: NodeId, ty: Type, pass: u32) -> WriteOutcome {
        match self.entries.get_mut(&node) {
            None => {
                self.entries.insert(node, CachedType { ty, pass });
                WriteOutcome::Updated
            }
            Some(entry) => {
                if is_type_same(&entry.ty, &ty) {
                    entry.pass = pass;
                    return WriteOutcome::Unchanged;
                }
                if is_widening(&entry.ty, &ty) {
                    tracing::trace!(%node, kept = entry.ty.category_name(),
                        rejected = ty.category_name(), "suppressed widening write");
                    return WriteOutcome::Suppressed;
                }
                entry.ty = ty;
                entry.pass = pass;
                WriteOutcome::Updated
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassFlags, ClassId, ClassType};
    use std::sync::Arc;

    fn object(name: &str) -> Type {
        Type::Object(Arc::new(ClassType {
            id: ClassId::fresh(),
            name: name.to_string(),
            flags: ClassFlags::empty(),
            bases: Vec::new(),
            type_params: Vec::new(),
            type_args: None,
            members: Vec::new(),
        }))
    }

    #[test]
    fn first_write_updates() {
        let mut cache = TypeCache::new();
        let node = NodeId::new(0);
        assert_eq!(cache.write(node, Type::Unknown, 1), WriteOutcome::Updated);
        assert!(cache.get(node).unwrap().is_unknown());
    }

    #[test]
    fn equal_write_refreshes_pass_only() {
        let mut cache = TypeCache::new();
        let node = NodeId::new(0);
        cache.write(node, Type::None, 1);
        assert_eq!(cache.write(node, Type::None, 2), WriteOutcome::Unchanged);
        assert_eq!(cache.entry(node).unwrap().pass, 2);
    }

    #[test]
    fn unknown_never_overwrites_concrete() {
        let mut cache = TypeCache::new();
        let node = NodeId::new(0);
        let int = object("int");
        cache.write(node, int, 1);
        assert_eq!(
            cache.write(node, Type::Unknown, 2),
            WriteOutcome::Suppressed
        );
        assert!(!cache.get(node).unwrap().is_unknown());
    }

    #[test]
    fn concrete_replaces_unknown() {
        let mut cache = TypeCache::new();
        let node = NodeId::new(0);
        cache.write(node, Type::Unknown, 1);
        assert_eq!(cache.write(node, object("int"), 2), WriteOutcome::Updated);
    }

    #[test]
    fn union_may_shrink_but_not_grow() {
        let mut cache = TypeCache::new();
        let node = NodeId::new(0);
        let int = object("int");
        let s = object("str");
        let wide = Type::Union(vec![int.clone(), s.clone()]);
        let wider = Type::Union(vec![int.clone(), s.clone(), Type::None]);

        cache.write(node, wide.clone(), 1);
        assert_eq!(cache.write(node, wider, 2), WriteOutcome::Suppressed);
        assert_eq!(cache.write(node, int, 3), WriteOutcome::Updated);
    }

    #[test]
    fn incomparable_replacement_is_allowed() {
        // Early passes may legitimately revise a wrong guess sideways;
        // only information loss is suppressed.
        let mut cache = TypeCache::new();
        let node = NodeId::new(0);
        cache.write(node, Type::None, 1);
        assert_eq!(cache.write(node, object("int"), 2), WriteOutcome::Updated);
    }
}
