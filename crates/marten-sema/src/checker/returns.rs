// checker/returns.rs
//
// Return and yield contract validation, plus return-type inference for
// unannotated functions. Runs after the function body has been walked, so
// the cache already holds the types of every reachable return and yield.

use std::sync::Arc;

use marten_syntax::{LiteralValue, NodeId, NodeKind};

use crate::checker::Checker;
use crate::compatibility::{DiagAddendum, can_assign, combine_types, contains_unknown, specialize};
use crate::diagnostics::DiagnosticRule;
use crate::errors::CheckError;
use crate::flow;
use crate::type_display::print_type;
use crate::types::{FunctionFlags, FunctionType, Type};
use crate::well_known;

/// The declared type a `return` statement checks against. For generators
/// this is the return channel of `Generator[Y, S, R]`; a generator
/// declared as a bare iterator has no usable return channel.
fn declared_return_channel(function: &FunctionType) -> Option<Type> {
    let declared = function.declared_return.as_ref()?;
    if !function.is_generator() {
        return Some(declared.clone());
    }
    if declared.is_never() {
        return Some(Type::Never);
    }
    match declared {
        Type::Object(class) if class.name == "Generator" => class
            .type_args
            .as_ref()
            .and_then(|args| args.get(2).cloned())
            .or(Some(Type::Any)),
        _ => Some(Type::Any),
    }
}

/// The declared yield type: `Y` of `Generator[Y, S, R]` or `Iterator[Y]`.
fn declared_yield_type(declared: &Type) -> Option<Type> {
    match declared {
        Type::Object(class)
            if matches!(class.name.as_str(), "Generator" | "Iterator" | "Iterable") =>
        {
            class
                .type_args
                .as_ref()
                .and_then(|args| args.first().cloned())
        }
        _ => None,
    }
}

impl<'a> Checker<'a> {
    pub(crate) fn visit_return(&mut self, node: NodeId, expression: Option<NodeId>) {
        let returned = match expression {
            Some(expression) => self.get_type(expression),
            None => Type::None,
        };
        let Some(function_node) = self.enclosing_function(node) else {
            return;
        };
        let function_ty = self.cached_type(function_node);
        let Some(function) = function_ty.as_function() else {
            return;
        };
        let function = function.clone();

        let Some(declared) = declared_return_channel(&function) else {
            return;
        };
        let span = expression
            .map(|e| self.module.tree.span(e))
            .unwrap_or_else(|| self.module.tree.span(node));
        if declared.is_never() {
            self.add_error(
                CheckError::NoReturnIncludesReturn { span: span.into() },
                span,
            );
            return;
        }
        let specialized = specialize(&declared, None);
        let mut diag = DiagAddendum::new();
        if !can_assign(&specialized, &returned, &mut diag) {
            self.add_error(
                CheckError::ReturnTypeMismatch {
                    returned: print_type(&returned),
                    declared: print_type(&specialized),
                    addendum: diag.format(),
                    span: span.into(),
                },
                span,
            );
        }
    }

    pub(crate) fn visit_yield(
        &mut self,
        node: NodeId,
        expression: Option<NodeId>,
        is_yield_from: bool,
    ) {
        let yielded = match expression {
            Some(expression) => self.get_type(expression),
            None => Type::None,
        };

        // A plain yield's own type is `Iterator[T]`; `yield from` passes
        // its operand type through raw.
        if is_yield_from {
            self.write_type(node, yielded.clone(), "yield-from type");
        } else {
            let wrapped = match well_known::typing_class(self.import_lookup, "Iterator") {
                Some(iterator) => Type::Object(iterator.with_type_args(vec![yielded.clone()])),
                None => Type::Unknown,
            };
            self.write_type(node, wrapped, "yield type");
        }

        let Some(function_node) = self.enclosing_function(node) else {
            return;
        };
        let function_ty = self.cached_type(function_node);
        let Some(function) = function_ty.as_function() else {
            return;
        };
        let function = function.clone();
        let Some(declared) = &function.declared_return else {
            return;
        };

        let span = expression
            .map(|e| self.module.tree.span(e))
            .unwrap_or_else(|| self.module.tree.span(node));
        if declared.is_never() {
            self.add_error(
                CheckError::NoReturnIncludesYield { span: span.into() },
                span,
            );
            return;
        }
        let Some(declared_yield) = declared_yield_type(declared) else {
            return;
        };
        let value = if is_yield_from {
            self.iterable_element_type(&yielded)
        } else {
            yielded
        };
        let mut diag = DiagAddendum::new();
        if !can_assign(&declared_yield, &value, &mut diag) {
            self.add_error(
                CheckError::YieldTypeMismatch {
                    yielded: print_type(&value),
                    declared: print_type(&declared_yield),
                    addendum: diag.format(),
                    span: span.into(),
                },
                span,
            );
        }
    }

    pub(crate) fn validate_function_return(
        &mut self,
        node: NodeId,
        function: &Arc<FunctionType>,
        suite: NodeId,
    ) {
        let module = self.module;
        let never_returns = !flow::is_after_node_reachable(&module.tree, &module.flow, node);
        let implicitly_returns_none =
            flow::is_after_node_reachable(&module.tree, &module.flow, suite);
        let name_span = match module.tree.kind(node) {
            NodeKind::FunctionDef { name, .. } => module.tree.span(*name),
            _ => module.tree.span(node),
        };

        if let Some(declared) = &function.declared_return {
            if function.is_generator() {
                return;
            }
            if declared.is_never() {
                if !never_returns
                    && implicitly_returns_none
                    && !self.is_stub_like_body(suite)
                {
                    self.add_error(
                        CheckError::NoReturnReturnsNone {
                            span: name_span.into(),
                        },
                        name_span,
                    );
                }
            } else if !never_returns
                && implicitly_returns_none
                && !function.flags.contains(FunctionFlags::ABSTRACT_METHOD)
                && !self.is_stub_like_body(suite)
                && !self.is_stub_file()
            {
                let specialized = specialize(declared, None);
                let mut diag = DiagAddendum::new();
                if !can_assign(&specialized, &Type::None, &mut diag) {
                    self.add_error(
                        CheckError::MustReturnValue {
                            declared: print_type(&specialized),
                            span: name_span.into(),
                        },
                        name_span,
                    );
                }
            }
            return;
        }

        if self.is_stub_file() {
            return;
        }

        // No annotation: infer the return type and write it to the suite
        // node, where the next pass's function type will pick it up.
        let inferred = if function.is_generator() {
            self.infer_generator_return_type(node)
        } else if never_returns && !function.flags.contains(FunctionFlags::ABSTRACT_METHOD) {
            Type::Never
        } else {
            self.infer_return_type_from_returns(suite, implicitly_returns_none)
        };

        let cached = self.write_type(suite, inferred, "inferred return type");
        if cached.is_unknown() || contains_unknown(&cached) {
            self.add_rule_diagnostic(
                DiagnosticRule::UnknownParameterType,
                CheckError::UnknownInferredReturnType {
                    name: function.name.clone(),
                    span: name_span.into(),
                },
                name_span,
            );
        }
    }

    fn infer_generator_return_type(&mut self, node: NodeId) -> Type {
        let module = self.module;
        let yields = module
            .yields_of_function
            .get(&node)
            .cloned()
            .unwrap_or_default();
        let mut yield_types = Vec::new();
        for yield_node in yields {
            if !flow::is_node_reachable(&module.tree, &module.flow, yield_node) {
                continue;
            }
            let ty = match module.tree.kind(yield_node) {
                NodeKind::Yield { expression } => match expression {
                    Some(expression) => self.cached_type(*expression),
                    None => Type::None,
                },
                NodeKind::YieldFrom { expression } => {
                    let operand = self.cached_type(*expression);
                    self.iterable_element_type(&operand)
                }
                _ => continue,
            };
            yield_types.push(ty);
        }
        let element = if yield_types.is_empty() {
            Type::None
        } else {
            combine_types(&yield_types)
        };
        match well_known::typing_class(self.import_lookup, "Generator") {
            Some(generator) => {
                Type::Object(generator.with_type_args(vec![element, Type::Any, Type::None]))
            }
            None => Type::Unknown,
        }
    }

    fn infer_return_type_from_returns(
        &mut self,
        suite: NodeId,
        implicitly_returns_none: bool,
    ) -> Type {
        let module = self.module;
        let mut return_types = Vec::new();
        let mut returns = Vec::new();
        collect_return_nodes(module, suite, &mut returns);
        for return_node in returns {
            if !flow::is_node_reachable(&module.tree, &module.flow, return_node) {
                continue;
            }
            let NodeKind::Return { expression } = module.tree.kind(return_node) else {
                continue;
            };
            let ty = match expression {
                Some(expression) => self.cached_type(*expression),
                None => Type::None,
            };
            return_types.push(ty);
        }
        if implicitly_returns_none {
            return_types.push(Type::None);
        }
        if return_types.is_empty() {
            Type::None
        } else {
            combine_types(&return_types)
        }
    }

    /// A body that is only docstrings, ellipses, and pass statements, as
    /// stubs and protocol declarations write them.
    pub(crate) fn is_stub_like_body(&self, suite: NodeId) -> bool {
        let NodeKind::Suite { statements } = self.module.tree.kind(suite) else {
            return false;
        };
        statements.iter().all(|s| match self.module.tree.kind(*s) {
            NodeKind::Literal(LiteralValue::Str(_)) | NodeKind::Literal(LiteralValue::Ellipsis) => {
                true
            }
            NodeKind::StringList { .. } | NodeKind::Pass => true,
            _ => false,
        })
    }
}

/// Return statements lexically inside the suite, not crossing into nested
/// functions, lambdas, or classes.
fn collect_return_nodes(
    module: &crate::module::BoundModule,
    node: NodeId,
    out: &mut Vec<NodeId>,
) {
    for child in module.tree.children(node) {
        match module.tree.kind(child) {
            NodeKind::Return { .. } => out.push(child),
            NodeKind::FunctionDef { .. } | NodeKind::Lambda { .. } | NodeKind::ClassDef { .. } => {}
            _ => collect_return_nodes(module, child, out),
        }
    }
}
