// checker/privacy.rs
//
// Private and protected name-usage checks. Private names (double leading
// underscore) are confined to their declaring class or module; protected
// names (single underscore) additionally admit derived classes. Stub files
// are exempt entirely.

use marten_syntax::NodeId;

use crate::checker::Checker;
use crate::compatibility::derives_from_class_recursive;
use crate::declarations::{DeclarationKind, lookup_class_member, resolve_alias_declaration};
use crate::diagnostics::DiagnosticRule;
use crate::errors::CheckError;
use crate::scope::ScopeKind;
use crate::types::Type;
use crate::well_known::{is_private_name, is_protected_name};

impl<'a> Checker<'a> {
    /// Privacy check for a member access; the owner class comes from the
    /// already-evaluated left side.
    pub(crate) fn check_private_member_usage(&mut self, object: NodeId, member: NodeId) {
        if self.is_stub_file() {
            return;
        }
        let module = self.module;
        let Some(name) = module.tree.name_value(member) else {
            return;
        };
        if !is_protected_name(name) {
            return;
        }
        let object_ty = self.cached_type(object);
        let class = match &object_ty {
            Type::Object(class) | Type::Class(class) => class.clone(),
            _ => return,
        };
        let Some((_, defining_class)) =
            lookup_class_member(&class, name).map(|(s, c)| (s.clone(), c.clone()))
        else {
            return;
        };

        let site_class = self
            .enclosing_class_scope(member)
            .and_then(|scope| self.class_type_of_scope(scope));
        let private = is_private_name(name);
        let allowed = match &site_class {
            Some(site) if site.id == defining_class.id => true,
            // Protected access is granted to derived classes; private
            // access is not.
            Some(site) if !private => derives_from_class_recursive(site, &defining_class),
            _ => false,
        };
        if allowed {
            return;
        }

        let span = module.tree.span(member);
        let error = if private {
            CheckError::PrivateUsedOutsideClass {
                name: name.to_string(),
                span: span.into(),
            }
        } else {
            CheckError::ProtectedUsedOutsideClass {
                name: name.to_string(),
                span: span.into(),
            }
        };
        self.add_rule_diagnostic(DiagnosticRule::PrivateUsage, error, span);
    }

    /// Privacy check for a bare name. Lexical scoping keeps same-module
    /// references inside their declaring scope, so the reportable case is
    /// a name imported from another module's private surface.
    pub(crate) fn check_private_name_usage(&mut self, node: NodeId) {
        if self.is_stub_file() {
            return;
        }
        let module = self.module;
        let Some(name) = module.tree.name_value(node) else {
            return;
        };
        if !is_protected_name(name) {
            return;
        }
        let scope = module.scope_for_node(node);
        let Some((found_scope, symbol)) = module.scopes.lookup(scope, name) else {
            return;
        };
        let symbol = symbol.clone();

        if let Some(primary) = symbol.primary_declaration()
            && matches!(primary.kind, DeclarationKind::Alias(_))
        {
            // The name's definition lives in another module.
            if resolve_alias_declaration(primary, self.import_lookup).is_some() {
                let span = module.tree.span(node);
                let error = if is_private_name(name) {
                    CheckError::PrivateUsedOutsideModule {
                        name: name.to_string(),
                        span: span.into(),
                    }
                } else {
                    CheckError::ProtectedUsedOutsideModule {
                        name: name.to_string(),
                        span: span.into(),
                    }
                };
                self.add_rule_diagnostic(DiagnosticRule::PrivateUsage, error, span);
            }
            return;
        }

        // A reference resolved through the scope chain that is somehow not
        // textually contained in its declaring scope is outside its
        // privacy domain.
        let declaring = module.scopes.get(found_scope);
        if declaring.kind == ScopeKind::Module {
            return;
        }
        let scope_span = module.tree.span(declaring.node);
        if !scope_span.contains(module.tree.span(node)) {
            let span = module.tree.span(node);
            let error = if is_private_name(name) {
                CheckError::PrivateUsedOutsideClass {
                    name: name.to_string(),
                    span: span.into(),
                }
            } else {
                CheckError::ProtectedUsedOutsideClass {
                    name: name.to_string(),
                    span: span.into(),
                }
            };
            self.add_rule_diagnostic(DiagnosticRule::PrivateUsage, error, span);
        }
    }
}
