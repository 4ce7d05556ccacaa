// checker/mod.rs
//
// The analysis walker: visits every statement and expression once per pass,
// querying the evaluator at the right granularity and applying the
// cross-cutting validations. The evaluator half of this struct lives in
// `evaluator.rs`; per-concern validations live in the sibling files.

mod methods;
mod privacy;
mod returns;
#[cfg(test)]
mod tests;
mod type_tests;
mod unused;

use std::sync::Arc;

use rustc_hash::FxHashSet;

use marten_syntax::{NodeId, NodeKind, Span};

use crate::declarations::DeclarationKind;
use crate::diagnostics::{Diagnostic, DiagnosticRule, DiagnosticSettings, DiagnosticSink, Severity};
use crate::errors::CheckError;
use crate::expression_data::{TypeCache, WriteOutcome};
use crate::flow;
use crate::module::{AccessedSymbolSet, BoundModule, ImportLookup};
use crate::scope::{ScopeId, ScopeKind};
use crate::types::{ClassId, ClassFlags, ClassType, Type};

/// Drives one module's analysis. Construct once, then call [`analyze`]
/// until it reports no change; the per-node type cache and the accessed
/// symbol set persist across passes.
///
/// [`analyze`]: Checker::analyze
pub struct Checker<'a> {
    pub(crate) module: &'a BoundModule,
    pub(crate) import_lookup: &'a dyn ImportLookup,
    sink: &'a mut dyn DiagnosticSink,
    pub(crate) cache: TypeCache,
    pub(crate) accessed: AccessedSymbolSet,
    pub(crate) pass_version: u32,
    did_change: bool,
    last_reason: String,
    /// Diagnostics buffered for the current pass; flushed to the sink once
    /// the analysis converges so an append-only sink never sees duplicates.
    pending: Vec<Diagnostic>,
    pending_unused: Vec<(String, Span)>,
    /// Scope-owning nodes seen this pass, in walk order; drives the
    /// unused-symbol sweep.
    pub(crate) scoped_nodes: Vec<NodeId>,
    /// Stable identities of classes found to be abstract.
    pub(crate) abstract_classes: FxHashSet<ClassId>,
    /// Stable class identities across passes, keyed by class node.
    pub(crate) class_ids: rustc_hash::FxHashMap<NodeId, ClassId>,
    finalized: bool,
}

impl<'a> Checker<'a> {
    pub fn new(
        module: &'a BoundModule,
        import_lookup: &'a dyn ImportLookup,
        sink: &'a mut dyn DiagnosticSink,
        accessed: AccessedSymbolSet,
        initial_pass_version: u32,
    ) -> Self {
        Self {
            module,
            import_lookup,
            sink,
            cache: TypeCache::new(),
            accessed,
            pass_version: initial_pass_version,
            did_change: false,
            last_reason: String::new(),
            pending: Vec::new(),
            pending_unused: Vec::new(),
            scoped_nodes: Vec::new(),
            abstract_classes: FxHashSet::default(),
            class_ids: rustc_hash::FxHashMap::default(),
            finalized: false,
        }
    }

    /// Run one analysis pass. Returns true when anything changed, meaning
    /// another pass is needed.
    pub fn analyze(&mut self) -> bool {
        self.pass_version += 1;
        self.did_change = false;
        self.pending.clear();
        self.pending_unused.clear();
        self.scoped_nodes.clear();
        tracing::debug!(pass = self.pass_version, "analysis pass");

        self.visit(self.module.root);

        if !self.did_change && !self.finalized {
            self.report_unused_symbols();
            self.flush();
            self.finalized = true;
        }
        self.did_change
    }

    /// Human-readable reason for the most recent "analysis changed"
    /// signal; debugging aid only.
    pub fn last_reanalysis_reason(&self) -> &str {
        &self.last_reason
    }

    pub fn accessed_symbols(&self) -> &AccessedSymbolSet {
        &self.accessed
    }

    pub(crate) fn settings(&self) -> &DiagnosticSettings {
        &self.module.file_info.settings
    }

    pub(crate) fn is_stub_file(&self) -> bool {
        self.module.file_info.is_stub_file
    }

    pub(crate) fn mark_changed(&mut self, reason: String) {
        if !self.did_change {
            tracing::debug!(reason = %reason, "analysis changed");
        }
        self.did_change = true;
        self.last_reason = reason;
    }

    /// Write-through to the per-node cache, raising the change signal on
    /// refinement. Returns the value that ended up cached.
    pub(crate) fn write_type(&mut self, node: NodeId, ty: Type, reason: &str) -> Type {
        match self.cache.write(node, ty.clone(), self.pass_version) {
            WriteOutcome::Updated => {
                self.mark_changed(format!("{reason} for {node} is now {}", ty.category_name()));
                ty
            }
            WriteOutcome::Unchanged => ty,
            WriteOutcome::Suppressed => self.cached_type(node),
        }
    }

    pub(crate) fn cached_type(&self, node: NodeId) -> Type {
        self.cache.get(node).cloned().unwrap_or(Type::Unknown)
    }

    pub(crate) fn add_error(&mut self, error: CheckError, span: Span) {
        self.pending.push(Diagnostic {
            severity: Severity::Error,
            rule: None,
            error,
            span,
        });
    }

    /// Emit at the severity the settings give the rule; disabled rules
    /// emit nothing.
    pub(crate) fn add_rule_diagnostic(
        &mut self,
        rule: DiagnosticRule,
        error: CheckError,
        span: Span,
    ) {
        if let Some(severity) = self.settings().level_for(rule).severity() {
            self.pending.push(Diagnostic {
                severity,
                rule: Some(rule),
                error,
                span,
            });
        }
    }

    pub(crate) fn add_unused_code(&mut self, message: String, span: Span) {
        self.pending_unused.push((message, span));
    }

    fn flush(&mut self) {
        for diagnostic in self.pending.drain(..) {
            self.sink.add_diagnostic(diagnostic);
        }
        for (message, span) in self.pending_unused.drain(..) {
            self.sink.add_unused_code_with_text_range(message, span);
        }
    }

    // ---- scope helpers ----

    pub(crate) fn enclosing_class_scope(&self, node: NodeId) -> Option<ScopeId> {
        let start = self.module.scope_for_node(node);
        self.module.scopes.nearest_of_kind(start, ScopeKind::Class)
    }

    /// The class type owning a class scope. Class scopes hang off the
    /// class suite node, whose parent is the class definition.
    pub(crate) fn class_type_of_scope(&self, scope: ScopeId) -> Option<Arc<ClassType>> {
        let suite = self.module.scopes.get(scope).node;
        let class_node = self.module.tree.parent(suite)?;
        match self.cache.get(class_node) {
            Some(Type::Class(class)) => Some(class.clone()),
            _ => None,
        }
    }

    pub(crate) fn enclosing_function(&self, node: NodeId) -> Option<NodeId> {
        self.module
            .tree
            .ancestors(node)
            .find(|a| matches!(self.module.tree.kind(*a), NodeKind::FunctionDef { .. }))
    }

    fn is_in_default_initializer(&self, node: NodeId) -> bool {
        let tree = &self.module.tree;
        let mut prev = node;
        for ancestor in tree.ancestors(node) {
            if let NodeKind::Parameter {
                default: Some(default),
                ..
            } = tree.kind(ancestor)
                && *default == prev
            {
                return true;
            }
            prev = ancestor;
        }
        false
    }

    pub(crate) fn is_inside_assert(&self, node: NodeId) -> bool {
        self.module
            .tree
            .ancestors(node)
            .any(|a| matches!(self.module.tree.kind(a), NodeKind::Assert { .. }))
    }

    // ---- the walk ----

    pub(crate) fn walk_children(&mut self, node: NodeId) {
        for child in self.module.tree.children(node) {
            self.visit(child);
        }
    }

    pub(crate) fn visit(&mut self, node: NodeId) {
        let module = self.module;
        if !flow::is_node_reachable(&module.tree, &module.flow, node) {
            return;
        }
        match module.tree.kind(node) {
            NodeKind::Module { body } => {
                self.scoped_nodes.push(node);
                for statement in body {
                    self.visit(*statement);
                }
            }
            NodeKind::ClassDef {
                arguments,
                decorators,
                suite,
                ..
            } => self.visit_class(node, arguments, decorators, *suite),
            NodeKind::FunctionDef {
                name,
                parameters,
                return_annotation,
                decorators,
                suite,
            } => self.visit_function(
                node,
                *name,
                parameters,
                return_annotation.as_ref().copied(),
                decorators,
                *suite,
            ),
            NodeKind::Lambda { parameters, .. } => self.visit_lambda(node, parameters),
            NodeKind::Call { callee, arguments } => self.visit_call(node, *callee, arguments),
            NodeKind::Return { expression } => {
                self.visit_return(node, expression.as_ref().copied());
                self.walk_children(node);
            }
            NodeKind::Yield { expression } => {
                self.visit_yield(node, expression.as_ref().copied(), false);
                self.walk_children(node);
            }
            NodeKind::YieldFrom { expression } => {
                self.visit_yield(node, Some(*expression), true);
                self.walk_children(node);
            }
            NodeKind::Raise { expression, cause } => {
                self.visit_raise(
                    node,
                    expression.as_ref().copied(),
                    cause.as_ref().copied(),
                );
                self.walk_children(node);
            }
            NodeKind::Assignment {
                target,
                value,
                annotation_comment,
            } => {
                self.visit_assignment(node, *target, *value, annotation_comment.as_ref().copied());
                self.walk_children(node);
            }
            NodeKind::AugAssignment { target, value, .. } => {
                self.get_type_of_aug_assignment_target(*target, *value);
                self.walk_children(node);
            }
            NodeKind::TypeAnnotation { target, annotation } => {
                self.visit_type_annotation(node, *target, *annotation);
                self.walk_children(node);
            }
            NodeKind::Del { targets } => {
                let targets = targets.clone();
                for target in targets {
                    self.visit_del_target(target);
                }
            }
            NodeKind::MemberAccess { object, member } => {
                self.get_type(node);
                self.check_private_member_usage(*object, *member);
                // The member name is consumed by the check; walk the left
                // side only.
                self.visit(*object);
            }
            NodeKind::Import { entries } => {
                for entry in entries {
                    self.get_type_of_import_as_target(*entry);
                }
            }
            NodeKind::ImportFrom { entries, .. } => {
                let entries = entries.clone();
                for entry in entries {
                    self.get_type_of_import_from_target(entry);
                }
            }
            NodeKind::Name { .. } => self.check_private_name_usage(node),
            NodeKind::For {
                target, iterable, ..
            } => {
                self.get_type_of_for_target(*target, *iterable);
                self.walk_children(node);
            }
            NodeKind::While { test, .. } | NodeKind::If { test, .. } => {
                self.get_type(*test);
                self.walk_children(node);
            }
            NodeKind::Assert { test, message } => {
                self.get_type(*test);
                if let Some(message) = message {
                    self.get_type(*message);
                }
                self.walk_children(node);
            }
            NodeKind::With { items, .. } => {
                for item in items {
                    self.get_type_of_with_item_target(*item);
                }
                self.walk_children(node);
            }
            NodeKind::FormatString { expressions } => {
                for expression in expressions {
                    self.get_type(*expression);
                }
                self.walk_children(node);
            }
            NodeKind::StringList {
                type_annotation, ..
            } => {
                if let Some(annotation) = type_annotation {
                    // A quoted type inside Literal[...] is a value, not a
                    // forward reference; leave it alone.
                    if !self.is_annotation_literal_value(node) {
                        self.get_type_of_annotation(*annotation);
                    }
                }
            }
            NodeKind::ExceptHandler {
                type_expression,
                name,
                ..
            } => {
                self.get_type_of_except_target(
                    type_expression.as_ref().copied(),
                    name.as_ref().copied(),
                );
                self.walk_children(node);
            }
            NodeKind::Error { child } => {
                // Evaluate so completion providers still see a type, but
                // do not descend into the damaged subtree.
                if let Some(child) = child {
                    self.get_type(*child);
                }
            }
            _ => self.walk_children(node),
        }
    }

    fn visit_class(
        &mut self,
        node: NodeId,
        arguments: &[NodeId],
        decorators: &[NodeId],
        suite: NodeId,
    ) {
        let class = self.get_type_of_class(node);
        self.scoped_nodes.push(suite);

        self.visit(suite);
        // Decorators may reference the class name, so they walk after the
        // suite, followed by the base class argument expressions.
        for decorator in decorators {
            self.visit(*decorator);
        }
        for argument in arguments {
            self.visit(*argument);
        }

        if let Some(class) = class {
            self.validate_class_members(node, &class);
            if class.flags.contains(ClassFlags::TYPED_DICT) {
                self.validate_typed_dict_suite(suite);
            }
        }
    }

    /// TypedDict suites may contain only annotations, docstrings,
    /// ellipses, and pass statements.
    fn validate_typed_dict_suite(&mut self, suite: NodeId) {
        let NodeKind::Suite { statements } = self.module.tree.kind(suite) else {
            return;
        };
        for statement in statements.clone() {
            let allowed = match self.module.tree.kind(statement) {
                NodeKind::TypeAnnotation { .. } | NodeKind::Pass => true,
                NodeKind::Literal(value) => matches!(
                    value,
                    marten_syntax::LiteralValue::Str(_) | marten_syntax::LiteralValue::Ellipsis
                ),
                NodeKind::StringList { .. } => true,
                _ => false,
            };
            if !allowed {
                let span = self.module.tree.span(statement);
                self.add_error(
                    CheckError::TypedDictBodyNotAllowed { span: span.into() },
                    span,
                );
            }
        }
    }

    fn visit_function(
        &mut self,
        node: NodeId,
        name: NodeId,
        parameters: &[NodeId],
        return_annotation: Option<NodeId>,
        decorators: &[NodeId],
        suite: NodeId,
    ) {
        let function = self.get_type_of_function(node);

        if let Some(function) = &function {
            for param in &function.params {
                if param.ty.is_unknown()
                    && let Some(param_name) = &param.name
                {
                    let span = self.module.tree.span(node);
                    self.add_rule_diagnostic(
                        DiagnosticRule::UnknownParameterType,
                        CheckError::UnknownParameterType {
                            name: param_name.clone(),
                            span: span.into(),
                        },
                        span,
                    );
                }
            }

            let in_class = self
                .enclosing_class_scope(node)
                .map(|scope| self.module.scope_for_node(node) == scope)
                .unwrap_or(false);
            if in_class {
                self.validate_method_shape(node, function);
            }
        }

        // Defaults, annotations, and decorators evaluate in the enclosing
        // scope; parameter names and the body evaluate in the function's.
        for parameter in parameters {
            self.visit(*parameter);
        }
        if let Some(annotation) = return_annotation {
            self.visit(annotation);
        }
        for decorator in decorators {
            self.visit(*decorator);
        }

        self.scoped_nodes.push(suite);
        self.visit(suite);
        self.visit(name);

        if let Some(function) = function {
            self.validate_function_return(node, &function, suite);
        }
    }

    fn visit_lambda(&mut self, node: NodeId, parameters: &[NodeId]) {
        self.scoped_nodes.push(node);
        for parameter in parameters {
            self.visit(*parameter);
        }
        let ty = self.get_type(node);
        if let Some(function) = ty.as_function() {
            let span = self.module.tree.span(node);
            for param in &function.params {
                if param.ty.is_unknown()
                    && let Some(param_name) = &param.name
                {
                    self.add_rule_diagnostic(
                        DiagnosticRule::UnknownLambdaType,
                        CheckError::UnknownLambdaParamType {
                            name: param_name.clone(),
                            span: span.into(),
                        },
                        span,
                    );
                }
            }
            let result = function.effective_return();
            if result.is_unknown() || crate::compatibility::contains_unknown(&result) {
                self.add_rule_diagnostic(
                    DiagnosticRule::UnknownLambdaType,
                    CheckError::UnknownLambdaResultType { span: span.into() },
                    span,
                );
            }
        }
        let NodeKind::Lambda { expression, .. } = self.module.tree.kind(node) else {
            return;
        };
        self.visit(*expression);
    }

    fn visit_call(&mut self, node: NodeId, callee: NodeId, arguments: &[NodeId]) {
        self.get_type(node);
        self.check_unnecessary_type_test(node, callee, arguments);
        if self.is_in_default_initializer(node) && !self.is_stub_file() {
            let span = self.module.tree.span(node);
            self.add_rule_diagnostic(
                DiagnosticRule::CallInDefaultInitializer,
                CheckError::CallInDefaultInitializer { span: span.into() },
                span,
            );
        }
        self.walk_children(node);
    }

    fn visit_assignment(
        &mut self,
        _node: NodeId,
        target: NodeId,
        value: NodeId,
        annotation_comment: Option<NodeId>,
    ) {
        self.get_type_of_assignment_target(target, value);

        if let Some(comment) = annotation_comment {
            let declared = self.get_type_of_annotation(comment);
            if let Some(previous) = self.declared_type_for_expression(target)
                && !crate::compatibility::is_type_same(&previous, &declared)
            {
                let name = self
                    .module
                    .tree
                    .name_value(target)
                    .unwrap_or("<target>")
                    .to_string();
                let span = self.module.tree.span(comment);
                self.add_error(
                    CheckError::DeclaredTypeRedefined {
                        name,
                        new_type: crate::type_display::print_type(&declared),
                        previous: crate::type_display::print_type(&previous),
                        span: span.into(),
                    },
                    span,
                );
            }
        }
    }

    fn visit_type_annotation(&mut self, node: NodeId, target: NodeId, annotation: NodeId) {
        let mut declared = self.get_type_of_annotation(annotation);

        if matches!(self.module.tree.kind(target), NodeKind::Name { .. }) {
            declared = self.transform_type_for_possible_enum_class(target, declared);
        }

        // When the annotation is the left side of an assignment the
        // assignment handler owns the target's cached type.
        let is_assignment_lhs = self
            .module
            .tree
            .parent(node)
            .is_some_and(|parent| {
                matches!(
                    self.module.tree.kind(parent),
                    NodeKind::Assignment { target, .. } if *target == node
                )
            });
        if !is_assignment_lhs {
            self.write_type(target, declared.clone(), "annotated target");
        }

        if let Some(previous) = self.previous_declared_type(target, annotation)
            && !crate::compatibility::is_type_same(&previous, &declared)
        {
            let name = self
                .module
                .tree
                .name_value(target)
                .unwrap_or("<target>")
                .to_string();
            let span = self.module.tree.span(annotation);
            self.add_error(
                CheckError::DeclaredTypeRedefined {
                    name,
                    new_type: crate::type_display::print_type(&declared),
                    previous: crate::type_display::print_type(&previous),
                    span: span.into(),
                },
                span,
            );
        }
    }

    /// The declared type established by a *different* declaration of the
    /// same target, for consistency checking.
    fn previous_declared_type(&mut self, target: NodeId, annotation_node: NodeId) -> Option<Type> {
        let symbol = self.resolve_symbol_for_target(target)?;
        let mut previous = None;
        for decl in &symbol.declarations {
            if decl.annotation == Some(annotation_node) {
                continue;
            }
            if decl.is_typed() {
                previous = Some(decl.clone());
            }
        }
        let previous = previous?;
        self.declared_type_of_declaration(&previous)
    }

    fn visit_del_target(&mut self, target: NodeId) {
        self.get_type_with_method(target, crate::evaluator::EvalMethod::Del);
        if let Some(symbol) = self.resolve_symbol_for_target(target) {
            self.accessed.mark(symbol.id);
            if let Some(decl) = crate::declarations::last_typed_declaration(&symbol)
                .or_else(|| symbol.primary_declaration())
            {
                let kind = match decl.kind {
                    DeclarationKind::Function => Some("function"),
                    DeclarationKind::Method => Some("method"),
                    DeclarationKind::Class => Some("class"),
                    _ => None,
                };
                if let Some(kind) = kind {
                    let span = self.module.tree.span(target);
                    self.add_error(
                        CheckError::CannotDelete {
                            kind: kind.to_string(),
                            name: symbol.name.clone(),
                            span: span.into(),
                        },
                        span,
                    );
                }
            }
        }
        self.walk_children(target);
    }

    fn visit_raise(&mut self, _node: NodeId, expression: Option<NodeId>, cause: Option<NodeId>) {
        if let Some(cause) = cause {
            self.get_type(cause);
        }
        let Some(expression) = expression else {
            return;
        };
        let ty = self.get_type(expression);
        let Some(base_exception) =
            crate::well_known::builtin_class(self.import_lookup, "BaseException")
        else {
            return;
        };
        let span = self.module.tree.span(expression);
        for subtype in ty.subtypes() {
            match subtype {
                Type::Any | Type::Unknown | Type::None | Type::Never => {}
                Type::Class(class) => {
                    if !crate::compatibility::derives_from_class_recursive(class, &base_exception)
                    {
                        self.add_error(
                            CheckError::ExpectedExceptionClass {
                                found: crate::type_display::print_type(subtype),
                                span: span.into(),
                            },
                            span,
                        );
                    }
                }
                Type::Object(class) => {
                    if !crate::compatibility::derives_from_class_recursive(class, &base_exception)
                    {
                        self.add_error(
                            CheckError::ExpectedExceptionObject {
                                found: crate::type_display::print_type(subtype),
                                span: span.into(),
                            },
                            span,
                        );
                    }
                }
                other => {
                    self.add_error(
                        CheckError::ExpectedExceptionObject {
                            found: crate::type_display::print_type(other),
                            span: span.into(),
                        },
                        span,
                    );
                }
            }
        }
    }
}
