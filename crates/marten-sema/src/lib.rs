//! Marten semantic analysis: the type-checking pass that walks a
//! binder-decorated parse tree, drives bidirectional type inference to a
//! fixpoint, and emits settings-gated diagnostics.

pub mod checker;
pub mod compatibility;
pub mod declarations;
pub mod diagnostics;
pub mod errors;
pub mod evaluator;
pub mod expression_data;
pub mod fixpoint;
pub mod flow;
pub mod module;
pub mod scope;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod type_display;
pub mod types;
pub mod well_known;

pub use checker::Checker;
pub use compatibility::{
    DiagAddendum, TypeVarMap, can_assign, can_override, combine_types, contains_unknown,
    derives_from_class_recursive, is_type_same, map_subtypes, specialize,
    specialized_tuple_element_types, transform_type_object_to_class,
};
pub use declarations::{
    AliasInfo, Declaration, DeclarationKind, Symbol, SymbolFlags, SymbolId, SymbolRef,
};
pub use diagnostics::{
    Diagnostic, DiagnosticLevel, DiagnosticLog, DiagnosticRule, DiagnosticSettings,
    DiagnosticSink, Severity,
};
pub use errors::CheckError;
pub use evaluator::{EvalFlags, EvalMethod};
pub use expression_data::{TypeCache, WriteOutcome};
pub use fixpoint::{DEFAULT_MAX_PASSES, FixpointResult, analyze_to_fixpoint};
pub use flow::FlowFlags;
pub use module::{
    AccessedSymbolSet, BoundModule, FileInfo, ImportLookup, ModuleSymbols, NoImports,
};
pub use scope::{Scope, ScopeArena, ScopeId, ScopeKind, SymbolTable};
pub use type_display::print_type;
pub use types::{
    ClassFlags, ClassId, ClassType, FunctionFlags, FunctionParam, FunctionType, ModuleType, Type,
    TypeVarType,
};
