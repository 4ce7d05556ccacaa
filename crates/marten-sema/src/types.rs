// types.rs
//
// The type lattice's data model. Construction happens in the evaluator and
// in import providers; comparison and combination live in `compatibility`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use smallvec::SmallVec;

use marten_syntax::{NodeId, ParamCategory};

/// Stable nominal identity for a class. Classes refer to their bases by
/// `Type` value, so comparison is nominal on this id and structural on
/// type arguments; ownership cycles cannot form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

impl ClassId {
    /// Allocate a fresh identity. Ids are process-unique so classes from
    /// different modules never collide nominally.
    pub fn fresh() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassFlags: u8 {
        /// Declared in the builtins module
        const BUILTIN = 1 << 0;
        /// A TypedDict class; its suite is restricted to annotations
        const TYPED_DICT = 1 << 1;
        /// An enum class; simple assignments become members
        const ENUM_CLASS = 1 << 2;
        /// The special `type` metaclass
        const TYPE_CLASS = 1 << 3;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FunctionFlags: u16 {
        /// Contains one or more yield expressions
        const GENERATOR = 1 << 0;
        const STATIC_METHOD = 1 << 1;
        const CLASS_METHOD = 1 << 2;
        const ABSTRACT_METHOD = 1 << 3;
        /// Carries a decorator the checker does not model; shape
        /// heuristics are bypassed
        const SHAPE_EXEMPT = 1 << 4;
        /// Declared in a stub file
        const STUB = 1 << 5;
    }
}

/// Resolved types. `Class` is the class as a first-class value; `Object`
/// is an instance of it. The two are never equal.
#[derive(Debug, Clone)]
pub enum Type {
    /// Unannotated and not yet inferred; propagates through operations
    Unknown,
    /// Explicit wildcard; assignable to and from everything
    Any,
    /// The singleton absence value
    None,
    /// The empty type; no value of it can exist
    Never,
    Class(Arc<ClassType>),
    Object(Arc<ClassType>),
    Function(Arc<FunctionType>),
    /// Canonical union: no nested unions, no structural duplicates
    Union(Vec<Type>),
    TypeVar(Arc<TypeVarType>),
    /// An imported module value
    Module(Arc<ModuleType>),
}

#[derive(Debug)]
pub struct ClassType {
    pub id: ClassId,
    pub name: String,
    pub flags: ClassFlags,
    /// Base classes in declaration order; `Type::Class` entries, or
    /// Unknown when a base failed to resolve
    pub bases: Vec<Type>,
    /// Type parameters (`Type::TypeVar` entries) for generic classes
    pub type_params: Vec<Type>,
    /// Concrete arguments once specialized
    pub type_args: Option<Vec<Type>>,
    /// Member names in declaration order, resolved through the class scope.
    /// Keys are member names; values are binder symbol ids.
    pub members: Vec<(String, crate::declarations::SymbolRef)>,
}

impl ClassType {
    pub fn is_builtin_named(&self, name: &str) -> bool {
        self.flags.contains(ClassFlags::BUILTIN) && self.name == name
    }

    pub fn member(&self, name: &str) -> Option<&crate::declarations::SymbolRef> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    /// A shallow copy carrying the given type arguments. Identity is
    /// preserved; only the arguments differ.
    pub fn with_type_args(self: &Arc<Self>, args: Vec<Type>) -> Arc<ClassType> {
        Arc::new(ClassType {
            id: self.id,
            name: self.name.clone(),
            flags: self.flags,
            bases: self.bases.clone(),
            type_params: self.type_params.clone(),
            type_args: Some(args),
            members: self.members.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FunctionParam {
    pub category: ParamCategory,
    pub name: Option<String>,
    pub ty: Type,
    pub has_default: bool,
}

#[derive(Debug)]
pub struct FunctionType {
    pub name: String,
    pub params: SmallVec<[FunctionParam; 4]>,
    pub declared_return: Option<Type>,
    pub inferred_return: Option<Type>,
    pub flags: FunctionFlags,
    /// The function definition node, when the function came from source
    pub node: Option<NodeId>,
}

impl FunctionType {
    /// The return type consumers see: declared wins, then inferred,
    /// then Unknown.
    pub fn effective_return(&self) -> Type {
        self.declared_return
            .clone()
            .or_else(|| self.inferred_return.clone())
            .unwrap_or(Type::Unknown)
    }

    pub fn is_generator(&self) -> bool {
        self.flags.contains(FunctionFlags::GENERATOR)
    }

    pub fn first_param_name(&self) -> Option<&str> {
        self.params.first().and_then(|p| p.name.as_deref())
    }
}

#[derive(Debug)]
pub struct TypeVarType {
    pub name: String,
    pub bound: Option<Type>,
    pub constraints: Vec<Type>,
}

#[derive(Debug)]
pub struct ModuleType {
    pub path: String,
}

impl Type {
    pub fn class(class: Arc<ClassType>) -> Type {
        Type::Class(class)
    }

    pub fn object(class: Arc<ClassType>) -> Type {
        Type::Object(class)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_any_or_unknown(&self) -> bool {
        matches!(self, Type::Any | Type::Unknown)
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Type::Never)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Type::None)
    }

    pub fn as_class(&self) -> Option<&Arc<ClassType>> {
        match self {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<ClassType>> {
        match self {
            Type::Object(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<FunctionType>> {
        match self {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Union members, or the type itself as a single subtype.
    pub fn subtypes(&self) -> &[Type] {
        match self {
            Type::Union(members) => members,
            _ => std::slice::from_ref(self),
        }
    }

    /// A short tag for change-reason logging.
    pub fn category_name(&self) -> &'static str {
        match self {
            Type::Unknown => "unknown",
            Type::Any => "any",
            Type::None => "none",
            Type::Never => "never",
            Type::Class(_) => "class",
            Type::Object(_) => "object",
            Type::Function(_) => "function",
            Type::Union(_) => "union",
            Type::TypeVar(_) => "typevar",
            Type::Module(_) => "module",
        }
    }
}
