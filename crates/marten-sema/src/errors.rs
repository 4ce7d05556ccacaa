// errors.rs
//! Analysis diagnostics (M2xxx).

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CheckError {
    #[error("Expression of type '{returned}' cannot be assigned to return type '{declared}'{addendum}")]
    #[diagnostic(code(M2001))]
    ReturnTypeMismatch {
        returned: String,
        declared: String,
        addendum: String,
        #[label("incompatible return value")]
        span: SourceSpan,
    },

    #[error("Function with declared return type 'NoReturn' cannot include a return statement")]
    #[diagnostic(code(M2002))]
    NoReturnIncludesReturn {
        #[label("return not allowed")]
        span: SourceSpan,
    },

    #[error("Function with declared return type 'NoReturn' cannot include a yield statement")]
    #[diagnostic(code(M2003))]
    NoReturnIncludesYield {
        #[label("yield not allowed")]
        span: SourceSpan,
    },

    #[error("Function with declared return type 'NoReturn' cannot return 'None'")]
    #[diagnostic(
        code(M2004),
        help("add a raise statement or an infinite loop so the function never returns")
    )]
    NoReturnReturnsNone {
        #[label("may implicitly return None")]
        span: SourceSpan,
    },

    #[error("Function with declared return type '{declared}' must return value")]
    #[diagnostic(code(M2005))]
    MustReturnValue {
        declared: String,
        #[label("may implicitly return None")]
        span: SourceSpan,
    },

    #[error("Expression of type '{yielded}' cannot be assigned to yield type '{declared}'{addendum}")]
    #[diagnostic(code(M2006))]
    YieldTypeMismatch {
        yielded: String,
        declared: String,
        addendum: String,
        #[label("incompatible yield value")]
        span: SourceSpan,
    },

    #[error("'{found}' does not derive from BaseException")]
    #[diagnostic(code(M2007))]
    ExpectedExceptionClass {
        found: String,
        #[label("not an exception class")]
        span: SourceSpan,
    },

    #[error("Expected exception object or None, received '{found}'")]
    #[diagnostic(code(M2008))]
    ExpectedExceptionObject {
        found: String,
        #[label("not an exception object")]
        span: SourceSpan,
    },

    #[error("Expression of type '{found}' cannot be assigned to declared type '{declared}'{addendum}")]
    #[diagnostic(code(M2009))]
    TypeAssignmentMismatch {
        found: String,
        declared: String,
        addendum: String,
        #[label("incompatible assignment")]
        span: SourceSpan,
    },

    #[error("Declared type '{new_type}' for '{name}' does not match previous declared type '{previous}'")]
    #[diagnostic(code(M2010))]
    DeclaredTypeRedefined {
        name: String,
        new_type: String,
        previous: String,
        #[label("conflicting declaration")]
        span: SourceSpan,
    },

    #[error("Cannot delete {kind} '{name}'")]
    #[diagnostic(code(M2011))]
    CannotDelete {
        kind: String,
        name: String,
        #[label("not deletable")]
        span: SourceSpan,
    },

    #[error("TypedDict classes can contain only type annotations")]
    #[diagnostic(code(M2012))]
    TypedDictBodyNotAllowed {
        #[label("not allowed in a TypedDict body")]
        span: SourceSpan,
    },

    #[error("Type of parameter '{name}' is unknown")]
    #[diagnostic(code(M2013), help("add a type annotation to the parameter"))]
    UnknownParameterType {
        name: String,
        #[label("unannotated parameter")]
        span: SourceSpan,
    },

    #[error("Inferred return type of function '{name}' is unknown")]
    #[diagnostic(code(M2014), help("add a return type annotation"))]
    UnknownInferredReturnType {
        name: String,
        #[label("return type could not be inferred")]
        span: SourceSpan,
    },

    #[error("Type of lambda parameter '{name}' is unknown")]
    #[diagnostic(code(M2015))]
    UnknownLambdaParamType {
        name: String,
        #[label("unannotated parameter")]
        span: SourceSpan,
    },

    #[error("Result type of lambda expression is unknown")]
    #[diagnostic(code(M2016))]
    UnknownLambdaResultType {
        #[label("result type could not be inferred")]
        span: SourceSpan,
    },

    #[error("Function calls within default value initializer are not permitted")]
    #[diagnostic(
        code(M2017),
        help("the call runs once at definition time, not per invocation")
    )]
    CallInDefaultInitializer {
        #[label("call in default initializer")]
        span: SourceSpan,
    },

    #[error("'{source_ty}' is always {test_kind} of '{filter}'")]
    #[diagnostic(code(M2018))]
    TypeTestAlways {
        source_ty: String,
        filter: String,
        test_kind: String,
        #[label("test always succeeds")]
        span: SourceSpan,
    },

    #[error("'{source_ty}' is never {test_kind} of '{filter}'")]
    #[diagnostic(code(M2019))]
    TypeTestNever {
        source_ty: String,
        filter: String,
        test_kind: String,
        #[label("test never succeeds")]
        span: SourceSpan,
    },

    #[error("Method '{name}' overrides class '{base_class}' in an incompatible manner{addendum}")]
    #[diagnostic(code(M2020))]
    IncompatibleMethodOverride {
        name: String,
        base_class: String,
        addendum: String,
        #[label("incompatible override")]
        span: SourceSpan,
    },

    #[error("__new__ override should take a 'cls' parameter")]
    #[diagnostic(code(M2021))]
    NewClsParam {
        #[label("first parameter should be 'cls'")]
        span: SourceSpan,
    },

    #[error("__init_subclass__ override should take a 'cls' parameter")]
    #[diagnostic(code(M2022))]
    InitSubclassClsParam {
        #[label("first parameter should be 'cls'")]
        span: SourceSpan,
    },

    #[error("Static methods should not take a 'self' or 'cls' parameter")]
    #[diagnostic(code(M2023))]
    StaticClsOrSelfParam {
        #[label("remove this parameter")]
        span: SourceSpan,
    },

    #[error("Class methods should take a 'cls' parameter")]
    #[diagnostic(code(M2024))]
    ClassMethodClsParam {
        #[label("first parameter should be 'cls'")]
        span: SourceSpan,
    },

    #[error("Instance methods should take a 'self' parameter")]
    #[diagnostic(code(M2025))]
    InstanceMethodSelfParam {
        #[label("first parameter should be 'self'")]
        span: SourceSpan,
    },

    #[error("'{name}' is private and used outside of the class in which it is declared")]
    #[diagnostic(code(M2026))]
    PrivateUsedOutsideClass {
        name: String,
        #[label("private member")]
        span: SourceSpan,
    },

    #[error("'{name}' is protected and used outside of a derived class")]
    #[diagnostic(code(M2027))]
    ProtectedUsedOutsideClass {
        name: String,
        #[label("protected member")]
        span: SourceSpan,
    },

    #[error("'{name}' is private and used outside of the module in which it is declared")]
    #[diagnostic(code(M2028))]
    PrivateUsedOutsideModule {
        name: String,
        #[label("private name")]
        span: SourceSpan,
    },

    #[error("'{name}' is protected and used outside of the module in which it is declared")]
    #[diagnostic(code(M2029))]
    ProtectedUsedOutsideModule {
        name: String,
        #[label("protected name")]
        span: SourceSpan,
    },

    #[error("Import '{name}' is not accessed")]
    #[diagnostic(code(M2030))]
    UnusedImport {
        name: String,
        #[label("unused import")]
        span: SourceSpan,
    },

    #[error("Variable '{name}' is not accessed")]
    #[diagnostic(code(M2031))]
    UnusedVariable {
        name: String,
        #[label("unused variable")]
        span: SourceSpan,
    },

    #[error("Class '{name}' is not accessed")]
    #[diagnostic(code(M2032))]
    UnusedClass {
        name: String,
        #[label("unused class")]
        span: SourceSpan,
    },

    #[error("Function '{name}' is not accessed")]
    #[diagnostic(code(M2033))]
    UnusedFunction {
        name: String,
        #[label("unused function")]
        span: SourceSpan,
    },
}
