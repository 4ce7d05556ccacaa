// compatibility.rs
//
// Type compatibility and combination. These are pure functions over the
// lattice; diagnosable failures append human-readable reasons to a
// `DiagAddendum` which callers fold into their messages.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use marten_syntax::ParamCategory;

use crate::type_display::print_type;
use crate::types::{ClassFlags, ClassType, FunctionParam, FunctionType, Type};

/// Accumulates the reasons an assignability check failed.
#[derive(Debug, Default, Clone)]
pub struct DiagAddendum {
    lines: Vec<String>,
}

impl DiagAddendum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render for appending to a parent message. Empty renders as "".
    pub fn format(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push('\n');
            out.push_str("  ");
            out.push_str(line);
        }
        out
    }
}

impl std::fmt::Display for DiagAddendum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// Substitutions for type variables, keyed by variable name.
pub type TypeVarMap = FxHashMap<String, Type>;

fn opt_type_same(a: Option<&Type>, b: Option<&Type>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => is_type_same(a, b),
        (None, None) => true,
        _ => false,
    }
}

fn class_same(a: &ClassType, b: &ClassType) -> bool {
    if a.id != b.id {
        return false;
    }
    match (&a.type_args, &b.type_args) {
        (Some(a_args), Some(b_args)) => {
            a_args.len() == b_args.len()
                && a_args.iter().zip(b_args).all(|(x, y)| is_type_same(x, y))
        }
        (None, None) => true,
        _ => false,
    }
}

fn function_same(a: &FunctionType, b: &FunctionType) -> bool {
    a.flags == b.flags
        && a.params.len() == b.params.len()
        && a.params.iter().zip(&b.params).all(|(x, y)| {
            x.category == y.category && x.name == y.name && is_type_same(&x.ty, &y.ty)
        })
        && opt_type_same(a.declared_return.as_ref(), b.declared_return.as_ref())
        && opt_type_same(a.inferred_return.as_ref(), b.inferred_return.as_ref())
}

/// Structural equality. Classes compare nominally on identity and
/// structurally on type arguments; `Object(C)` and `Class(C)` are never
/// equal to each other.
pub fn is_type_same(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Unknown, Type::Unknown)
        | (Type::Any, Type::Any)
        | (Type::None, Type::None)
        | (Type::Never, Type::Never) => true,
        (Type::Class(a), Type::Class(b)) | (Type::Object(a), Type::Object(b)) => class_same(a, b),
        (Type::Function(a), Type::Function(b)) => function_same(a, b),
        (Type::Union(a), Type::Union(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| is_type_same(x, y))
        }
        (Type::TypeVar(a), Type::TypeVar(b)) => a.name == b.name,
        (Type::Module(a), Type::Module(b)) => a.path == b.path,
        _ => false,
    }
}

/// Canonical union of the given types: flattens nested unions, drops
/// Never (the union identity), dedupes structurally-equal members in
/// first-appearance order, and collapses singletons. Unknown and Any each
/// absorb the result because no further information can be recovered.
pub fn combine_types(types: &[Type]) -> Type {
    let mut flattened: Vec<&Type> = Vec::new();
    for ty in types {
        match ty {
            Type::Union(members) => flattened.extend(members.iter()),
            other => flattened.push(other),
        }
    }

    if flattened.iter().any(|t| t.is_unknown()) {
        return Type::Unknown;
    }
    if flattened.iter().any(|t| matches!(t, Type::Any)) {
        return Type::Any;
    }

    let mut members: Vec<Type> = Vec::new();
    for ty in flattened {
        if ty.is_never() {
            continue;
        }
        if !members.iter().any(|m| is_type_same(m, ty)) {
            members.push(ty.clone());
        }
    }

    match members.len() {
        0 => Type::Never,
        1 => members.into_iter().next().unwrap_or(Type::Never),
        _ => Type::Union(members),
    }
}

/// True if `base` is `c` or appears in `c`'s transitive base closure.
/// Cyclic base graphs terminate through the visited set.
pub fn derives_from_class_recursive(c: &ClassType, base: &ClassType) -> bool {
    fn walk(c: &ClassType, base: &ClassType, visited: &mut FxHashSet<u32>) -> bool {
        if c.id == base.id {
            return true;
        }
        if !visited.insert(c.id.index()) {
            return false;
        }
        c.bases.iter().any(|b| match b {
            Type::Class(parent) => walk(parent, base, visited),
            _ => false,
        })
    }
    walk(c, base, &mut FxHashSet::default())
}

/// True if Unknown appears anywhere in the type.
pub fn contains_unknown(ty: &Type) -> bool {
    match ty {
        Type::Unknown => true,
        Type::Union(members) => members.iter().any(contains_unknown),
        Type::Class(class) | Type::Object(class) => class
            .type_args
            .as_ref()
            .is_some_and(|args| args.iter().any(contains_unknown)),
        Type::Function(function) => {
            function.params.iter().any(|p| contains_unknown(&p.ty))
                || function
                    .declared_return
                    .as_ref()
                    .is_some_and(contains_unknown)
                || function
                    .inferred_return
                    .as_ref()
                    .is_some_and(contains_unknown)
        }
        Type::TypeVar(tv) => tv.bound.as_ref().is_some_and(contains_unknown),
        _ => false,
    }
}

/// True iff a value of `src` may be bound to a location of `dest`.
/// Appends a reason to `diag` on failure.
pub fn can_assign(dest: &Type, src: &Type, diag: &mut DiagAddendum) -> bool {
    if is_type_same(dest, src) {
        return true;
    }
    // Any and Unknown are bidirectionally assignable.
    if dest.is_any_or_unknown() || src.is_any_or_unknown() {
        return true;
    }
    // Never has no values, so it satisfies every destination.
    if src.is_never() {
        return true;
    }

    // A union source must satisfy the destination member-wise.
    if let Type::Union(members) = src {
        let mut ok = true;
        for member in members {
            let mut inner = DiagAddendum::new();
            if !can_assign(dest, member, &mut inner) {
                diag.add(format!(
                    "Type '{}' is incompatible with type '{}'",
                    print_type(member),
                    print_type(dest)
                ));
                ok = false;
            }
        }
        return ok;
    }

    // A union destination accepts anything one of its members accepts.
    if let Type::Union(members) = dest {
        let mut scratch = DiagAddendum::new();
        if members.iter().any(|m| can_assign(m, src, &mut scratch)) {
            return true;
        }
        diag.add(format!(
            "Type '{}' is incompatible with type '{}'",
            print_type(src),
            print_type(dest)
        ));
        return false;
    }

    match (dest, src) {
        (Type::Object(dest_class), Type::Object(src_class)) => {
            if !derives_from_class_recursive(src_class, dest_class) {
                diag.add(format!(
                    "'{}' is incompatible with '{}'",
                    print_type(src),
                    print_type(dest)
                ));
                return false;
            }
            // Type arguments check only applies when both sides carry the
            // same generic class; a derived class's specialization of its
            // base is accepted as-is.
            if src_class.id == dest_class.id
                && let (Some(dest_args), Some(src_args)) =
                    (&dest_class.type_args, &src_class.type_args)
            {
                for (d, s) in dest_args.iter().zip(src_args) {
                    if !can_assign(d, s, diag) {
                        diag.add(format!(
                            "Type argument '{}' is incompatible with '{}'",
                            print_type(s),
                            print_type(d)
                        ));
                        return false;
                    }
                }
            }
            true
        }
        (Type::Class(dest_class), Type::Class(src_class)) => {
            if derives_from_class_recursive(src_class, dest_class) {
                true
            } else {
                diag.add(format!(
                    "'{}' is incompatible with '{}'",
                    print_type(src),
                    print_type(dest)
                ));
                false
            }
        }
        // A class value is an instance of the `type` metaclass.
        (Type::Object(dest_class), Type::Class(_))
            if dest_class.flags.contains(ClassFlags::TYPE_CLASS) =>
        {
            true
        }
        (Type::Function(dest_fn), Type::Function(src_fn)) => {
            can_assign_function(dest_fn, src_fn, diag)
        }
        (Type::TypeVar(tv), _) => match &tv.bound {
            Some(bound) => can_assign(bound, src, diag),
            None => true,
        },
        (_, Type::TypeVar(tv)) => match &tv.bound {
            Some(bound) => can_assign(dest, bound, diag),
            None => true,
        },
        _ => {
            diag.add(format!(
                "Type '{}' is incompatible with type '{}'",
                print_type(src),
                print_type(dest)
            ));
            false
        }
    }
}

/// Function assignability: parameters contravariant, return covariant.
fn can_assign_function(dest: &FunctionType, src: &FunctionType, diag: &mut DiagAddendum) -> bool {
    let src_has_varargs = src
        .params
        .iter()
        .any(|p| p.category != ParamCategory::Simple);
    if src.params.len() < dest.params.len() && !src_has_varargs {
        diag.add(format!(
            "Function accepts too few parameters; expected {} but got {}",
            dest.params.len(),
            src.params.len()
        ));
        return false;
    }
    for (dest_param, src_param) in dest.params.iter().zip(&src.params) {
        if src_param.category != ParamCategory::Simple {
            break;
        }
        if !can_assign(&src_param.ty, &dest_param.ty, diag) {
            diag.add(format!(
                "Parameter of type '{}' is incompatible with parameter of type '{}'",
                print_type(&dest_param.ty),
                print_type(&src_param.ty)
            ));
            return false;
        }
    }
    let dest_return = dest.effective_return();
    let src_return = src.effective_return();
    if !can_assign(&dest_return, &src_return, diag) {
        diag.add(format!(
            "Function return type '{}' is incompatible with type '{}'",
            print_type(&src_return),
            print_type(&dest_return)
        ));
        return false;
    }
    true
}

/// Like `can_assign` on function types, with the parameter-name matching
/// rules appropriate to a method override.
pub fn can_override(base: &FunctionType, derived: &FunctionType, diag: &mut DiagAddendum) -> bool {
    let base_positional: Vec<&FunctionParam> = base
        .params
        .iter()
        .filter(|p| p.category == ParamCategory::Simple)
        .collect();
    let derived_positional: Vec<&FunctionParam> = derived
        .params
        .iter()
        .filter(|p| p.category == ParamCategory::Simple)
        .collect();

    if derived_positional.len() < base_positional.len() {
        let derived_has_varargs = derived
            .params
            .iter()
            .any(|p| p.category != ParamCategory::Simple);
        if !derived_has_varargs {
            diag.add(format!(
                "Positional parameter count mismatch; base method has {}, override has {}",
                base_positional.len(),
                derived_positional.len()
            ));
            return false;
        }
    }
    if derived_positional.len() > base_positional.len() {
        let extra_defaulted = derived_positional[base_positional.len()..]
            .iter()
            .all(|p| p.has_default);
        if !extra_defaulted {
            diag.add(format!(
                "Positional parameter count mismatch; base method has {}, override has {}",
                base_positional.len(),
                derived_positional.len()
            ));
            return false;
        }
    }

    for (index, (base_param, derived_param)) in base_positional
        .iter()
        .zip(&derived_positional)
        .enumerate()
    {
        let names_exempt = |name: Option<&str>| name.is_none_or(|n| n.starts_with('_'));
        let base_name = base_param.name.as_deref();
        let derived_name = derived_param.name.as_deref();
        if index > 0
            && base_name != derived_name
            && !names_exempt(base_name)
            && !names_exempt(derived_name)
        {
            diag.add(format!(
                "Parameter {} name mismatch; base parameter is named '{}', override parameter is named '{}'",
                index + 1,
                base_name.unwrap_or(""),
                derived_name.unwrap_or("")
            ));
            return false;
        }
        if !can_assign(&derived_param.ty, &base_param.ty, diag) {
            diag.add(format!(
                "Parameter {} of type '{}' cannot be assigned to type '{}'",
                index + 1,
                print_type(&base_param.ty),
                print_type(&derived_param.ty)
            ));
            return false;
        }
    }

    let base_return = base.effective_return();
    let derived_return = derived.effective_return();
    if !can_assign(&base_return, &derived_return, diag) {
        diag.add(format!(
            "Return type mismatch; base method returns type '{}', override returns type '{}'",
            print_type(&base_return),
            print_type(&derived_return)
        ));
        return false;
    }
    true
}

/// Substitute type variables. With an absent map, each variable is
/// replaced by its bound, the combination of its constraints, or Unknown.
/// Idempotent on fully-specialized types.
pub fn specialize(ty: &Type, map: Option<&TypeVarMap>) -> Type {
    match ty {
        Type::TypeVar(tv) => {
            if let Some(map) = map
                && let Some(replacement) = map.get(&tv.name)
            {
                return replacement.clone();
            }
            if let Some(bound) = &tv.bound {
                return bound.clone();
            }
            if !tv.constraints.is_empty() {
                return combine_types(&tv.constraints);
            }
            Type::Unknown
        }
        Type::Union(members) => {
            let specialized: Vec<Type> = members.iter().map(|m| specialize(m, map)).collect();
            combine_types(&specialized)
        }
        Type::Object(class) => Type::Object(specialize_class(class, map)),
        Type::Class(class) => Type::Class(specialize_class(class, map)),
        Type::Function(function) => {
            let params: SmallVec<[FunctionParam; 4]> = function
                .params
                .iter()
                .map(|p| FunctionParam {
                    category: p.category,
                    name: p.name.clone(),
                    ty: specialize(&p.ty, map),
                    has_default: p.has_default,
                })
                .collect();
            Type::Function(Arc::new(FunctionType {
                name: function.name.clone(),
                params,
                declared_return: function
                    .declared_return
                    .as_ref()
                    .map(|t| specialize(t, map)),
                inferred_return: function
                    .inferred_return
                    .as_ref()
                    .map(|t| specialize(t, map)),
                flags: function.flags,
                node: function.node,
            }))
        }
        other => other.clone(),
    }
}

fn specialize_class(class: &Arc<ClassType>, map: Option<&TypeVarMap>) -> Arc<ClassType> {
    if let Some(args) = &class.type_args {
        let specialized: Vec<Type> = args.iter().map(|a| specialize(a, map)).collect();
        return class.with_type_args(specialized);
    }
    if !class.type_params.is_empty() {
        let args: Vec<Type> = class
            .type_params
            .iter()
            .map(|p| specialize(p, map))
            .collect();
        return class.with_type_args(args);
    }
    class.clone()
}

/// An `Object` whose class is the `type` metaclass becomes the underlying
/// class; other types pass through unchanged.
pub fn transform_type_object_to_class(ty: &Type) -> Type {
    map_subtypes(ty, |subtype| {
        if let Type::Object(class) = subtype
            && class.flags.contains(ClassFlags::TYPE_CLASS)
            && let Some(args) = &class.type_args
            && let Some(first) = args.first()
        {
            return match first {
                Type::Object(inner) => Type::Class(inner.clone()),
                other @ Type::Class(_) => other.clone(),
                other => other.clone(),
            };
        }
        subtype.clone()
    })
}

/// Element types of a specialized builtin tuple, if the type is one.
pub fn specialized_tuple_element_types(ty: &Type) -> Option<Vec<Type>> {
    let class = match ty {
        Type::Object(class) | Type::Class(class) => class,
        _ => return None,
    };
    if !class.is_builtin_named("tuple") {
        return None;
    }
    class.type_args.clone()
}

/// Map `f` over union members and recombine; non-unions apply directly.
pub fn map_subtypes(ty: &Type, mut f: impl FnMut(&Type) -> Type) -> Type {
    match ty {
        Type::Union(members) => {
            let mapped: Vec<Type> = members.iter().map(|m| f(m)).collect();
            combine_types(&mapped)
        }
        other => f(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassId, TypeVarType};
    use smallvec::smallvec;

    fn class(name: &str, bases: Vec<Type>) -> Arc<ClassType> {
        Arc::new(ClassType {
            id: ClassId::fresh(),
            name: name.to_string(),
            flags: ClassFlags::BUILTIN,
            bases,
            type_params: Vec::new(),
            type_args: None,
            members: Vec::new(),
        })
    }

    fn function(params: Vec<Type>, ret: Type) -> Arc<FunctionType> {
        Arc::new(FunctionType {
            name: "f".to_string(),
            params: params
                .into_iter()
                .map(|ty| FunctionParam {
                    category: ParamCategory::Simple,
                    name: None,
                    ty,
                    has_default: false,
                })
                .collect(),
            declared_return: Some(ret),
            inferred_return: None,
            flags: crate::types::FunctionFlags::empty(),
            node: None,
        })
    }

    #[test]
    fn assign_is_reflexive_on_concrete_types() {
        let int = Type::Object(class("int", vec![]));
        let mut diag = DiagAddendum::new();
        assert!(can_assign(&int, &int, &mut diag));
        assert!(can_assign(&Type::None, &Type::None, &mut diag));
        assert!(diag.is_empty());
    }

    #[test]
    fn assign_is_transitive_through_derivation() {
        let object = class("object", vec![]);
        let base = class("int", vec![Type::Class(object.clone())]);
        let derived = class("bool", vec![Type::Class(base.clone())]);
        let mut diag = DiagAddendum::new();
        // bool -> int, int -> object, therefore bool -> object.
        assert!(can_assign(
            &Type::Object(base.clone()),
            &Type::Object(derived.clone()),
            &mut diag
        ));
        assert!(can_assign(
            &Type::Object(object.clone()),
            &Type::Object(base),
            &mut diag
        ));
        assert!(can_assign(
            &Type::Object(object),
            &Type::Object(derived),
            &mut diag
        ));
    }

    #[test]
    fn none_assigns_only_to_optional() {
        let int = Type::Object(class("int", vec![]));
        let optional = Type::Union(vec![int.clone(), Type::None]);
        let mut diag = DiagAddendum::new();
        assert!(can_assign(&optional, &Type::None, &mut diag));
        assert!(!can_assign(&int, &Type::None, &mut diag));
        assert!(!diag.is_empty());
    }

    #[test]
    fn never_assigns_to_everything() {
        let int = Type::Object(class("int", vec![]));
        let mut diag = DiagAddendum::new();
        assert!(can_assign(&int, &Type::Never, &mut diag));
        assert!(can_assign(&Type::None, &Type::Never, &mut diag));
    }

    #[test]
    fn union_source_requires_all_members() {
        let int = Type::Object(class("int", vec![]));
        let s = Type::Object(class("str", vec![]));
        let union = Type::Union(vec![int.clone(), s]);
        let mut diag = DiagAddendum::new();
        assert!(!can_assign(&int, &union, &mut diag));
        assert!(can_assign(&union, &int, &mut diag));
    }

    #[test]
    fn combine_flattens_dedupes_and_collapses() {
        let int = Type::Object(class("int", vec![]));
        let nested = Type::Union(vec![int.clone(), Type::None]);
        let combined = combine_types(&[nested, int.clone(), Type::Never]);
        match &combined {
            Type::Union(members) => assert_eq!(members.len(), 2),
            other => panic!("expected union, got {}", print_type(other)),
        }
        assert!(matches!(combine_types(&[int.clone()]), Type::Object(_)));
        assert!(combine_types(&[]).is_never());
    }

    #[test]
    fn combine_absorbs_unknown() {
        let int = Type::Object(class("int", vec![]));
        assert!(combine_types(&[int, Type::Unknown]).is_unknown());
    }

    #[test]
    fn object_and_class_are_never_equal() {
        let c = class("int", vec![]);
        assert!(!is_type_same(
            &Type::Object(c.clone()),
            &Type::Class(c.clone())
        ));
        assert!(is_type_same(&Type::Class(c.clone()), &Type::Class(c)));
    }

    #[test]
    fn function_assignability_is_contravariant_in_params() {
        let object = class("object", vec![]);
        let int = class("int", vec![Type::Class(object.clone())]);
        let takes_object = function(vec![Type::Object(object.clone())], Type::None);
        let takes_int = function(vec![Type::Object(int)], Type::None);
        let mut diag = DiagAddendum::new();
        // A function accepting object may stand in where int is expected...
        assert!(can_assign(
            &Type::Function(takes_int.clone()),
            &Type::Function(takes_object.clone()),
            &mut diag
        ));
        // ...but not the reverse.
        assert!(!can_assign(
            &Type::Function(takes_object),
            &Type::Function(takes_int),
            &mut diag
        ));
    }

    #[test]
    fn override_checks_parameter_names() {
        let base = Arc::new(FunctionType {
            name: "m".to_string(),
            params: smallvec![
                FunctionParam {
                    category: ParamCategory::Simple,
                    name: Some("self".to_string()),
                    ty: Type::Any,
                    has_default: false,
                },
                FunctionParam {
                    category: ParamCategory::Simple,
                    name: Some("value".to_string()),
                    ty: Type::Any,
                    has_default: false,
                },
            ],
            declared_return: Some(Type::None),
            inferred_return: None,
            flags: crate::types::FunctionFlags::empty(),
            node: None,
        });
        let mut renamed = FunctionType {
            name: "m".to_string(),
            params: base.params.clone(),
            declared_return: Some(Type::None),
            inferred_return: None,
            flags: crate::types::FunctionFlags::empty(),
            node: None,
        };
        renamed.params[1].name = Some("other".to_string());
        let mut diag = DiagAddendum::new();
        assert!(can_override(&base, &base, &mut diag));
        assert!(!can_override(&base, &renamed, &mut diag));
        assert!(!diag.is_empty());
    }

    #[test]
    fn specialize_replaces_type_vars_with_bounds() {
        let int = Type::Object(class("int", vec![]));
        let tv = Type::TypeVar(Arc::new(TypeVarType {
            name: "T".to_string(),
            bound: Some(int.clone()),
            constraints: Vec::new(),
        }));
        let specialized = specialize(&tv, None);
        assert!(is_type_same(&specialized, &int));
        // Idempotent on fully-specialized types.
        assert!(is_type_same(&specialize(&specialized, None), &int));
    }

    #[test]
    fn specialize_with_map_substitutes() {
        let int = Type::Object(class("int", vec![]));
        let tv = Type::TypeVar(Arc::new(TypeVarType {
            name: "T".to_string(),
            bound: None,
            constraints: Vec::new(),
        }));
        let mut map = TypeVarMap::default();
        map.insert("T".to_string(), int.clone());
        assert!(is_type_same(&specialize(&tv, Some(&map)), &int));
    }

    #[test]
    fn type_object_transforms_to_class() {
        let int = class("int", vec![]);
        let mut type_class = ClassType {
            id: ClassId::fresh(),
            name: "type".to_string(),
            flags: ClassFlags::BUILTIN | ClassFlags::TYPE_CLASS,
            bases: Vec::new(),
            type_params: Vec::new(),
            type_args: None,
            members: Vec::new(),
        };
        type_class.type_args = Some(vec![Type::Object(int.clone())]);
        let transformed = transform_type_object_to_class(&Type::Object(Arc::new(type_class)));
        match transformed {
            Type::Class(c) => assert_eq!(c.id, int.id),
            other => panic!("expected class, got {}", print_type(&other)),
        }
    }

    #[test]
    fn tuple_elements_extracted_from_specialization() {
        let int = Type::Object(class("int", vec![]));
        let tuple = class("tuple", vec![]);
        let specialized = tuple.with_type_args(vec![int.clone(), Type::None]);
        let elements = specialized_tuple_element_types(&Type::Object(specialized)).unwrap();
        assert_eq!(elements.len(), 2);
        assert!(specialized_tuple_element_types(&int).is_none());
    }

    #[test]
    fn contains_unknown_sees_through_structure() {
        let list = class("list", vec![]);
        let specialized = list.with_type_args(vec![Type::Unknown]);
        assert!(contains_unknown(&Type::Object(specialized)));
        assert!(!contains_unknown(&Type::None));
    }
}
