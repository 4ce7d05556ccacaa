// checker/methods.rs
//
// Method-shape validation for functions declared inside classes, override
// compatibility against base classes, and abstract-class marking.
// Decorators the checker does not model suppress the shape heuristics,
// since they may rebind the callable.

use std::sync::Arc;

use marten_syntax::{NodeId, ParamCategory};

use crate::checker::Checker;
use crate::compatibility::{DiagAddendum, can_override};
use crate::declarations::symbol_from_base_classes;
use crate::diagnostics::DiagnosticRule;
use crate::errors::CheckError;
use crate::types::{ClassType, FunctionFlags, FunctionType, Type};
use crate::well_known::is_dunder_name;

impl<'a> Checker<'a> {
    pub(crate) fn validate_method_shape(&mut self, node: NodeId, function: &Arc<FunctionType>) {
        let span = self.module.tree.span(node);
        let first_param = function.params.first();
        let first_name = function.first_param_name();

        match function.name.as_str() {
            "__new__" => {
                if !matches!(first_name, Some("cls") | Some("mcs") | Some("metacls")) {
                    self.add_error(CheckError::NewClsParam { span: span.into() }, span);
                }
                return;
            }
            "__init_subclass__" => {
                if first_name != Some("cls") {
                    self.add_error(CheckError::InitSubclassClsParam { span: span.into() }, span);
                }
                return;
            }
            _ => {}
        }

        if function.flags.contains(FunctionFlags::STATIC_METHOD) {
            if matches!(first_name, Some("self") | Some("cls")) {
                self.add_error(CheckError::StaticClsOrSelfParam { span: span.into() }, span);
            }
            return;
        }

        if function.flags.contains(FunctionFlags::CLASS_METHOD) {
            let exempt = first_name.is_some_and(|name| {
                name.starts_with('_') || (name == "metacls" && self.is_stub_file())
            });
            if first_name != Some("cls") && !exempt {
                self.add_error(CheckError::ClassMethodClsParam { span: span.into() }, span);
            }
            return;
        }

        // A decorator could rebind the callable, so the instance-method
        // heuristic only applies to undecorated functions.
        if function.flags.contains(FunctionFlags::SHAPE_EXEMPT) {
            return;
        }

        let shape_ok = match (first_param, first_name) {
            (Some(param), Some(name)) => {
                param.category == ParamCategory::Simple
                    && (name == "self"
                        || name.starts_with('_')
                        // The metaclass-register idiom in stubs takes the
                        // class as its first parameter.
                        || (name == "cls" && self.is_stub_file()))
            }
            _ => false,
        };
        if !shape_ok {
            self.add_error(CheckError::InstanceMethodSelfParam { span: span.into() }, span);
        }
    }

    /// Override validation across the class, plus abstract marking: a
    /// class with any unimplemented abstract method is itself abstract.
    pub(crate) fn validate_class_members(&mut self, node: NodeId, class: &Arc<ClassType>) {
        let mut is_abstract = false;

        for (member_name, symbol) in class.members.clone() {
            if is_dunder_name(&member_name) {
                continue;
            }
            let symbol = symbol.clone();
            let effective = self.effective_type_of_symbol(&symbol);
            let Some(derived_fn) = effective.as_function() else {
                continue;
            };
            if derived_fn.flags.contains(FunctionFlags::ABSTRACT_METHOD) {
                is_abstract = true;
            }

            let Some((base_symbol, base_class)) = symbol_from_base_classes(class, &member_name)
                .map(|(s, c)| (s.clone(), c.clone()))
            else {
                continue;
            };
            let derived_fn = derived_fn.clone();
            let base_effective = self.effective_type_of_symbol(&base_symbol);
            let Some(base_fn) = base_effective.as_function() else {
                continue;
            };

            let mut diag = DiagAddendum::new();
            if !can_override(base_fn, &derived_fn, &mut diag) {
                let span = symbol
                    .primary_declaration()
                    .map(|d| d.span)
                    .unwrap_or_else(|| self.module.tree.span(node));
                self.add_rule_diagnostic(
                    DiagnosticRule::IncompatibleMethodOverride,
                    CheckError::IncompatibleMethodOverride {
                        name: member_name.clone(),
                        base_class: base_class.name.clone(),
                        addendum: diag.format(),
                        span: span.into(),
                    },
                    span,
                );
            }
        }

        // Inherited abstract methods count unless this class overrides
        // them.
        if !is_abstract {
            is_abstract = self.has_unimplemented_inherited_abstract(class);
        }
        if is_abstract {
            self.abstract_classes.insert(class.id);
        }
    }

    fn has_unimplemented_inherited_abstract(&mut self, class: &Arc<ClassType>) -> bool {
        let mut inherited: Vec<(String, crate::declarations::SymbolRef)> = Vec::new();
        for base in &class.bases {
            if let Type::Class(base_class) = base {
                for (name, symbol) in &base_class.members {
                    if class.member(name).is_none() {
                        inherited.push((name.clone(), symbol.clone()));
                    }
                }
            }
        }
        for (_, symbol) in inherited {
            let effective = self.effective_type_of_symbol(&symbol);
            if let Some(function) = effective.as_function()
                && function.flags.contains(FunctionFlags::ABSTRACT_METHOD)
            {
                return true;
            }
        }
        false
    }

    pub fn is_abstract_class(&self, class: &ClassType) -> bool {
        self.abstract_classes.contains(&class.id)
    }
}
