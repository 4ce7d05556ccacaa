// checker/type_tests.rs
//
// Detects isinstance/issubclass calls whose outcome is statically known:
// the tested type is always or never matched by the filter classes. Tests
// inside assert statements are deliberate narrowing and are left alone.

use std::sync::Arc;

use marten_syntax::{NodeId, NodeKind};

use crate::checker::Checker;
use crate::compatibility::{
    combine_types, derives_from_class_recursive, is_type_same, specialized_tuple_element_types,
    transform_type_object_to_class,
};
use crate::diagnostics::DiagnosticRule;
use crate::errors::CheckError;
use crate::type_display::print_type;
use crate::types::{ClassType, Type};

impl<'a> Checker<'a> {
    pub(crate) fn check_unnecessary_type_test(
        &mut self,
        node: NodeId,
        callee: NodeId,
        arguments: &[NodeId],
    ) {
        let module = self.module;
        let is_instance_check = match module.tree.name_value(callee) {
            Some("isinstance") => true,
            Some("issubclass") => false,
            _ => return,
        };
        if arguments.len() != 2 {
            return;
        }
        // Keyword arguments disqualify the special form.
        let mut positional = [NodeId::default(); 2];
        for (slot, argument) in arguments.iter().enumerate() {
            match module.tree.kind(*argument) {
                NodeKind::Argument { name: None, value } => positional[slot] = *value,
                NodeKind::Argument { .. } => return,
                _ => positional[slot] = *argument,
            }
        }
        if self.is_inside_assert(node) {
            return;
        }

        let arg0_type = transform_type_object_to_class(&self.cached_type(positional[0]));
        let arg1_type = self.cached_type(positional[1]);

        // Any or Unknown anywhere silences the check.
        if arg0_type
            .subtypes()
            .iter()
            .any(|t| t.is_any_or_unknown())
            || arg1_type.is_any_or_unknown()
        {
            return;
        }

        let Some(filter_classes) = filter_class_list(&arg1_type) else {
            return;
        };
        if filter_classes.is_empty() {
            return;
        }

        let mut filtered: Vec<Type> = Vec::new();
        for subtype in arg0_type.subtypes() {
            let subject = match (is_instance_check, subtype) {
                (true, Type::Object(class)) => class,
                (false, Type::Class(class)) => class,
                // A subtype the filter model cannot reason about aborts
                // silently rather than risking a wrong report.
                _ => return,
            };
            for filter in &filter_classes {
                if derives_from_class_recursive(subject, filter) {
                    filtered.push(subtype.clone());
                } else if derives_from_class_recursive(filter, subject) {
                    filtered.push(if is_instance_check {
                        Type::Object(filter.clone())
                    } else {
                        Type::Class(filter.clone())
                    });
                }
            }
        }

        let combined = combine_types(&filtered);
        let test_kind = if is_instance_check {
            "instance"
        } else {
            "subclass"
        };
        let filter_text = filter_classes
            .iter()
            .map(|c| c.name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let span = module.tree.span(node);

        if combined.is_never() {
            self.add_rule_diagnostic(
                DiagnosticRule::UnnecessaryIsInstance,
                CheckError::TypeTestNever {
                    source_ty: print_type(&arg0_type),
                    filter: filter_text,
                    test_kind: test_kind.to_string(),
                    span: span.into(),
                },
                span,
            );
        } else if is_type_same(&combined, &arg0_type) {
            self.add_rule_diagnostic(
                DiagnosticRule::UnnecessaryIsInstance,
                CheckError::TypeTestAlways {
                    source_ty: print_type(&arg0_type),
                    filter: filter_text,
                    test_kind: test_kind.to_string(),
                    span: span.into(),
                },
                span,
            );
        }
    }
}

/// The classes the second argument filters by: a single class, or the
/// class entries of a tuple of classes. Anything else disqualifies the
/// check.
fn filter_class_list(arg1_type: &Type) -> Option<Vec<Arc<ClassType>>> {
    match arg1_type {
        Type::Class(class) => Some(vec![class.clone()]),
        Type::Object(class) if class.is_builtin_named("tuple") => {
            let elements = specialized_tuple_element_types(arg1_type)?;
            let mut classes = Vec::new();
            for element in elements {
                match element {
                    Type::Class(class) => classes.push(class),
                    _ => return None,
                }
            }
            Some(classes)
        }
        _ => None,
    }
}
