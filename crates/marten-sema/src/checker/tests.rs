// checker/tests.rs
//
// End-to-end checker tests over fixture-built modules: the literal
// diagnostic scenarios plus the fixpoint and determinism properties.

use super::Checker;
use crate::diagnostics::{DiagnosticLog, DiagnosticRule};
use crate::fixpoint::analyze_to_fixpoint;
use crate::module::{AccessedSymbolSet, BoundModule};
use crate::testing::{ModuleBuilder, TestStdlib, test_stdlib};
use crate::types::Type;

fn run(module: &BoundModule, stdlib: &TestStdlib) -> DiagnosticLog {
    let mut log = DiagnosticLog::new();
    {
        let mut checker = Checker::new(
            module,
            &stdlib.modules,
            &mut log,
            AccessedSymbolSet::new(),
            0,
        );
        let result = analyze_to_fixpoint(&mut checker, 32);
        assert!(result.converged, "analysis did not converge");
    }
    log
}

#[test]
fn return_type_mismatch_reports_error() {
    // def f() -> int: return "x"
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let ret_ann = b.name("int");
    let lit = b.str_lit("x");
    let ret = b.ret(Some(lit));
    let f = b.function(scope, "f", &[], Some(ret_ann), vec![], vec![ret]);
    b.mark_no_fallthrough(b.suite_of(f));
    let module = b.finish(vec![f]);

    let log = run(&module, &stdlib);
    assert_eq!(log.errors().count(), 1, "{:?}", log.messages());
    let message = log.errors().next().unwrap().message();
    assert!(
        message.starts_with("Expression of type 'str' cannot be assigned to return type 'int'"),
        "{message}"
    );
}

#[test]
fn noreturn_function_rejects_return_statement() {
    // def f() -> NoReturn: return
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let import = b.import_from(scope, &["typing"], "NoReturn", None);
    let ret_ann = b.name("NoReturn");
    let ret = b.ret(None);
    let f = b.function(scope, "f", &[], Some(ret_ann), vec![], vec![ret]);
    b.mark_no_fallthrough(b.suite_of(f));
    let module = b.finish(vec![import, f]);

    let log = run(&module, &stdlib);
    assert_eq!(log.errors().count(), 1, "{:?}", log.messages());
    assert_eq!(
        log.errors().next().unwrap().message(),
        "Function with declared return type 'NoReturn' cannot include a return statement"
    );
}

#[test]
fn isinstance_against_declared_type_is_reported() {
    // def f(x: int): isinstance(x, int)
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let ann = b.name("int");
    let callee = b.name("isinstance");
    let arg0 = b.name("x");
    let arg1 = b.name("int");
    let call = b.call(callee, vec![arg0, arg1]);
    let f = b.function(scope, "f", &[("x", Some(ann), None)], None, vec![], vec![call]);
    let module = b.finish(vec![f]);

    let log = run(&module, &stdlib);
    let reports = log.with_rule(DiagnosticRule::UnnecessaryIsInstance);
    assert_eq!(reports.len(), 1, "{:?}", log.messages());
    assert_eq!(reports[0].message(), "'int' is always instance of 'int'");
}

#[test]
fn isinstance_inside_assert_is_not_reported() {
    // def f(x: int): assert isinstance(x, int)
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let ann = b.name("int");
    let callee = b.name("isinstance");
    let arg0 = b.name("x");
    let arg1 = b.name("int");
    let call = b.call(callee, vec![arg0, arg1]);
    let assert_stmt = b.assert_stmt(call);
    let f = b.function(
        scope,
        "f",
        &[("x", Some(ann), None)],
        None,
        vec![],
        vec![assert_stmt],
    );
    let module = b.finish(vec![f]);

    let log = run(&module, &stdlib);
    assert!(log.with_rule(DiagnosticRule::UnnecessaryIsInstance).is_empty());
}

#[test]
fn unaccessed_import_is_reported_after_convergence() {
    // import os
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let import = b.import(scope, &["os"], None);
    let module = b.finish(vec![import]);

    let log = run(&module, &stdlib);
    let reports = log.with_rule(DiagnosticRule::UnusedImport);
    assert_eq!(reports.len(), 1, "{:?}", log.messages());
    assert_eq!(reports[0].message(), "Import 'os' is not accessed");
    assert_eq!(log.unused_code.len(), 1);
}

#[test]
fn future_import_is_exempt_from_unused_reporting() {
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let import = b.import(scope, &["__future__"], None);
    let module = b.finish(vec![import]);

    let log = run(&module, &stdlib);
    assert!(log.with_rule(DiagnosticRule::UnusedImport).is_empty());
}

#[test]
fn generated_file_imports_are_exempt() {
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("proto/messages_pb2.py");
    let scope = b.module_scope();
    let import = b.import(scope, &["os"], None);
    let module = b.finish(vec![import]);

    let log = run(&module, &stdlib);
    assert!(log.with_rule(DiagnosticRule::UnusedImport).is_empty());
}

#[test]
fn protected_member_allows_derived_class_access() {
    // class C: _x = 1
    // class D(C):
    //     def m(self, other: C): other._x
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();

    let c_scope = b.class_scope(scope);
    let x_target = b.name("_x");
    let one = b.int(1);
    let x_assign = b.assign(x_target, one);
    b.declare(
        c_scope,
        "_x",
        crate::declarations::DeclarationKind::Variable,
        x_target,
        None,
    );
    let c_class = b.class(scope, c_scope, "C", vec![], vec![x_assign]);

    let d_scope = b.class_scope(scope);
    let other_ann = b.name("C");
    let other_ref = b.name("other");
    let access = b.member(other_ref, "_x");
    let m = b.function(
        d_scope,
        "m",
        &[("self", None, None), ("other", Some(other_ann), None)],
        None,
        vec![],
        vec![access],
    );
    let d_base = b.name("C");
    let d_class = b.class(scope, d_scope, "D", vec![d_base], vec![m]);

    let module = b.finish(vec![c_class, d_class]);
    let log = run(&module, &stdlib);
    assert!(
        log.with_rule(DiagnosticRule::PrivateUsage).is_empty(),
        "{:?}",
        log.messages()
    );
}

#[test]
fn protected_member_outside_derived_class_is_reported() {
    // class C: _x = 1
    // def g(c: C): c._x
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();

    let c_scope = b.class_scope(scope);
    let x_target = b.name("_x");
    let one = b.int(1);
    let x_assign = b.assign(x_target, one);
    b.declare(
        c_scope,
        "_x",
        crate::declarations::DeclarationKind::Variable,
        x_target,
        None,
    );
    let c_class = b.class(scope, c_scope, "C", vec![], vec![x_assign]);

    let c_ann = b.name("C");
    let c_ref = b.name("c");
    let access = b.member(c_ref, "_x");
    let g = b.function(
        scope,
        "g",
        &[("c", Some(c_ann), None)],
        None,
        vec![],
        vec![access],
    );

    let module = b.finish(vec![c_class, g]);
    let log = run(&module, &stdlib);
    let reports = log.with_rule(DiagnosticRule::PrivateUsage);
    assert_eq!(reports.len(), 1, "{:?}", log.messages());
    assert_eq!(
        reports[0].message(),
        "'_x' is protected and used outside of a derived class"
    );
}

#[test]
fn typed_dict_body_rejects_plain_assignments() {
    // class D(TypedDict):
    //     x: int
    //     y = 5
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let import = b.import_from(scope, &["typing"], "TypedDict", None);

    let d_scope = b.class_scope(scope);
    let x_target = b.name("x");
    let x_ann = b.name("int");
    let x_stmt = b.type_annotation(x_target, x_ann);
    b.declare(
        d_scope,
        "x",
        crate::declarations::DeclarationKind::Variable,
        x_target,
        Some(x_ann),
    );
    let y_target = b.name("y");
    let five = b.int(5);
    let y_stmt = b.assign(y_target, five);
    b.declare(
        d_scope,
        "y",
        crate::declarations::DeclarationKind::Variable,
        y_target,
        None,
    );
    let base = b.name("TypedDict");
    let d_class = b.class(scope, d_scope, "D", vec![base], vec![x_stmt, y_stmt]);

    let module = b.finish(vec![import, d_class]);
    let log = run(&module, &stdlib);
    assert_eq!(log.errors().count(), 1, "{:?}", log.messages());
    assert_eq!(
        log.errors().next().unwrap().message(),
        "TypedDict classes can contain only type annotations"
    );
}

#[test]
fn yield_type_is_validated_against_declared_generator() {
    // def f() -> Generator[int, None, None]: yield "x"
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let import = b.import_from(scope, &["typing"], "Generator", None);

    let base = b.name("Generator");
    let arg0 = b.name("int");
    let arg1 = b.none_lit();
    let arg2 = b.none_lit();
    let ret_ann = b.subscript(base, vec![arg0, arg1, arg2]);

    let yielded = b.str_lit("x");
    let yield_stmt = b.yield_stmt(Some(yielded));
    let f = b.function(scope, "f", &[], Some(ret_ann), vec![], vec![yield_stmt]);
    b.record_yields(f, vec![yield_stmt]);
    let module = b.finish(vec![import, f]);

    let log = run(&module, &stdlib);
    assert_eq!(log.errors().count(), 1, "{:?}", log.messages());
    let message = log.errors().next().unwrap().message();
    assert!(
        message.starts_with("Expression of type 'str' cannot be assigned to yield type 'int'"),
        "{message}"
    );
}

#[test]
fn raise_requires_exception_values() {
    // raise 5
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let five = b.int(5);
    let raise = b.raise(Some(five), None);
    let module = b.finish(vec![raise]);

    let log = run(&module, &stdlib);
    assert_eq!(log.errors().count(), 1, "{:?}", log.messages());
    assert_eq!(
        log.errors().next().unwrap().message(),
        "Expected exception object or None, received 'int'"
    );
}

#[test]
fn raise_accepts_exception_instances() {
    // raise ValueError()
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let callee = b.name("ValueError");
    let call = b.call(callee, vec![]);
    let raise = b.raise(Some(call), None);
    let module = b.finish(vec![raise]);

    let log = run(&module, &stdlib);
    assert_eq!(log.errors().count(), 0, "{:?}", log.messages());
}

#[test]
fn del_of_function_is_rejected() {
    // def f(): pass
    // del f
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let body = b.pass_stmt();
    let f = b.function(scope, "f", &[], None, vec![], vec![body]);
    let f_ref = b.name("f");
    let del = b.node(marten_syntax::NodeKind::Del {
        targets: vec![f_ref],
    });
    let module = b.finish(vec![f, del]);

    let log = run(&module, &stdlib);
    assert_eq!(log.errors().count(), 1, "{:?}", log.messages());
    assert_eq!(
        log.errors().next().unwrap().message(),
        "Cannot delete function 'f'"
    );
}

#[test]
fn instance_method_requires_self_parameter() {
    // class C:
    //     def m(x): pass
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let c_scope = b.class_scope(scope);
    let body = b.pass_stmt();
    let m = b.function(c_scope, "m", &[("x", None, None)], None, vec![], vec![body]);
    let c_class = b.class(scope, c_scope, "C", vec![], vec![m]);
    let module = b.finish(vec![c_class]);

    let log = run(&module, &stdlib);
    assert!(
        log.messages()
            .iter()
            .any(|m| m == "Instance methods should take a 'self' parameter"),
        "{:?}",
        log.messages()
    );
}

#[test]
fn incompatible_override_is_reported() {
    // class B:
    //     def run(self, value: int) -> None: pass
    // class D(B):
    //     def run(self, value: str) -> None: pass
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();

    let b_scope = b.class_scope(scope);
    let int_ann = b.name("int");
    let none_ann = b.none_lit();
    let body = b.pass_stmt();
    let base_run = b.function(
        b_scope,
        "run",
        &[("self", None, None), ("value", Some(int_ann), None)],
        Some(none_ann),
        vec![],
        vec![body],
    );
    let b_class = b.class(scope, b_scope, "B", vec![], vec![base_run]);

    let d_scope = b.class_scope(scope);
    let str_ann = b.name("str");
    let none_ann2 = b.none_lit();
    let body2 = b.pass_stmt();
    let derived_run = b.function(
        d_scope,
        "run",
        &[("self", None, None), ("value", Some(str_ann), None)],
        Some(none_ann2),
        vec![],
        vec![body2],
    );
    let d_base = b.name("B");
    let d_class = b.class(scope, d_scope, "D", vec![d_base], vec![derived_run]);

    let module = b.finish(vec![b_class, d_class]);
    let log = run(&module, &stdlib);
    let reports = log.with_rule(DiagnosticRule::IncompatibleMethodOverride);
    assert_eq!(reports.len(), 1, "{:?}", log.messages());
    assert!(
        reports[0]
            .message()
            .starts_with("Method 'run' overrides class 'B' in an incompatible manner"),
        "{}",
        reports[0].message()
    );
}

#[test]
fn declared_assignment_mismatch_is_reported() {
    // x: int = "s"
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let x_name = b.name("x");
    let int_ann = b.name("int");
    let annotated = b.type_annotation(x_name, int_ann);
    let value = b.str_lit("s");
    let assign = b.assign(annotated, value);
    b.declare(
        scope,
        "x",
        crate::declarations::DeclarationKind::Variable,
        x_name,
        Some(int_ann),
    );
    let module = b.finish(vec![assign]);

    let log = run(&module, &stdlib);
    assert_eq!(log.errors().count(), 1, "{:?}", log.messages());
    let message = log.errors().next().unwrap().message();
    assert!(
        message.starts_with("Expression of type 'str' cannot be assigned to declared type 'int'"),
        "{message}"
    );
}

#[test]
fn unreachable_nodes_produce_no_diagnostics() {
    // The isinstance scenario again, with the call made unreachable.
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let ann = b.name("int");
    let callee = b.name("isinstance");
    let arg0 = b.name("x");
    let arg1 = b.name("int");
    let call = b.call(callee, vec![arg0, arg1]);
    b.mark_unreachable(call);
    let f = b.function(scope, "f", &[("x", Some(ann), None)], None, vec![], vec![call]);
    let module = b.finish(vec![f]);

    let log = run(&module, &stdlib);
    assert!(log.with_rule(DiagnosticRule::UnnecessaryIsInstance).is_empty());
}

#[test]
fn forward_reference_converges_over_passes() {
    // def g(): return f()
    // def f() -> int: return 1
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();

    let f_ref = b.name("f");
    let call = b.call(f_ref, vec![]);
    let g_ret = b.ret(Some(call));
    let g = b.function(scope, "g", &[], None, vec![], vec![g_ret]);
    b.mark_no_fallthrough(b.suite_of(g));
    let g_suite = b.suite_of(g);

    let int_ann = b.name("int");
    let one = b.int(1);
    let f_ret = b.ret(Some(one));
    let f = b.function(scope, "f", &[], Some(int_ann), vec![], vec![f_ret]);
    b.mark_no_fallthrough(b.suite_of(f));

    let module = b.finish(vec![g, f]);
    let mut log = DiagnosticLog::new();
    let mut checker = Checker::new(
        &module,
        &stdlib.modules,
        &mut log,
        AccessedSymbolSet::new(),
        0,
    );
    let result = analyze_to_fixpoint(&mut checker, 32);
    assert!(result.converged);
    assert!(result.passes >= 2, "forward reference should take passes");

    // g's inferred return settles on int once f's type is known.
    match checker.cache.get(g_suite) {
        Some(Type::Object(class)) => assert_eq!(class.name, "int"),
        other => panic!("expected inferred int return, got {other:?}"),
    }
}

#[test]
fn analysis_is_idempotent_after_convergence() {
    let stdlib = test_stdlib();
    let mut b = ModuleBuilder::new("test.py");
    let scope = b.module_scope();
    let import = b.import(scope, &["os"], None);
    let module = b.finish(vec![import]);

    let mut log = DiagnosticLog::new();
    let mut checker = Checker::new(
        &module,
        &stdlib.modules,
        &mut log,
        AccessedSymbolSet::new(),
        0,
    );
    let result = analyze_to_fixpoint(&mut checker, 32);
    assert!(result.converged);
    assert!(!checker.analyze());
    assert!(!checker.analyze());
    drop(checker);
    // The converged diagnostics flushed exactly once.
    assert_eq!(log.with_rule(DiagnosticRule::UnusedImport).len(), 1);
}

#[test]
fn identical_inputs_yield_identical_diagnostics() {
    let build = || {
        let mut b = ModuleBuilder::new("test.py");
        let scope = b.module_scope();
        let ret_ann = b.name("int");
        let lit = b.str_lit("x");
        let ret = b.ret(Some(lit));
        let import = b.import(scope, &["os"], None);
        let f = b.function(scope, "f", &[], Some(ret_ann), vec![], vec![ret]);
        b.mark_no_fallthrough(b.suite_of(f));
        b.finish(vec![import, f])
    };
    let stdlib = test_stdlib();
    let first = run(&build(), &stdlib);
    let second = run(&build(), &stdlib);
    assert_eq!(first.messages(), second.messages());
}
