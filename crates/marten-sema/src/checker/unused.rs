// checker/unused.rs
//
// Unused-symbol sweep, run once the analysis has converged so the
// accessed-symbol set is complete. Imports are always reportable; other
// symbols only when their names are private by convention.

use marten_syntax::Span;

use crate::checker::Checker;
use crate::declarations::{AliasInfo, Declaration, DeclarationKind, SymbolFlags, SymbolRef};
use crate::diagnostics::DiagnosticRule;
use crate::errors::CheckError;
use crate::well_known::{is_dunder_name, is_protected_name};

/// Generated protobuf bindings re-export everything; their imports are
/// never reportable.
const GENERATED_CODE_SUFFIX: &str = "_pb2.py";

impl<'a> Checker<'a> {
    pub(crate) fn report_unused_symbols(&mut self) {
        let module = self.module;
        for scoped_node in self.scoped_nodes.clone() {
            let Some(scope_id) = module.scope_of_node.get(&scoped_node) else {
                continue;
            };
            let symbols: Vec<SymbolRef> = module
                .scopes
                .get(*scope_id)
                .symbols
                .iter()
                .cloned()
                .collect();
            for symbol in symbols {
                if self.accessed.contains(symbol.id) {
                    continue;
                }
                if symbol
                    .flags
                    .contains(SymbolFlags::IGNORED_FOR_PROTOCOL_MATCH)
                {
                    continue;
                }
                if symbol.name == "_" || is_dunder_name(&symbol.name) {
                    continue;
                }
                let Some(decl) = symbol.primary_declaration() else {
                    continue;
                };
                let decl = decl.clone();
                match &decl.kind {
                    DeclarationKind::Alias(info) => {
                        let info = info.clone();
                        self.report_unused_import(&symbol, &decl, &info);
                    }
                    DeclarationKind::Variable | DeclarationKind::Parameter => {
                        if is_protected_name(&symbol.name) {
                            self.report_unused(
                                DiagnosticRule::UnusedVariable,
                                CheckError::UnusedVariable {
                                    name: symbol.name.clone(),
                                    span: decl.span.into(),
                                },
                                decl.span,
                            );
                        }
                    }
                    DeclarationKind::Class => {
                        if is_protected_name(&symbol.name) {
                            self.report_unused(
                                DiagnosticRule::UnusedClass,
                                CheckError::UnusedClass {
                                    name: symbol.name.clone(),
                                    span: decl.span.into(),
                                },
                                decl.span,
                            );
                        }
                    }
                    DeclarationKind::Function | DeclarationKind::Method => {
                        if is_protected_name(&symbol.name) {
                            self.report_unused(
                                DiagnosticRule::UnusedFunction,
                                CheckError::UnusedFunction {
                                    name: symbol.name.clone(),
                                    span: decl.span.into(),
                                },
                                decl.span,
                            );
                        }
                    }
                }
            }
        }
    }

    fn report_unused_import(&mut self, symbol: &SymbolRef, decl: &Declaration, info: &AliasInfo) {
        if info.module_path.first().map(String::as_str) == Some("__future__") {
            return;
        }
        if self
            .module
            .file_info
            .file_path
            .ends_with(GENERATED_CODE_SUFFIX)
        {
            return;
        }
        // `import a.b.c` reports the full dotted path over the merged
        // range of the name parts; aliased and from-imports report the
        // bound name.
        let display = if info.uses_local_name || info.imported_name.is_some() {
            symbol.name.clone()
        } else {
            info.dotted_path()
        };
        self.report_unused(
            DiagnosticRule::UnusedImport,
            CheckError::UnusedImport {
                name: display,
                span: decl.span.into(),
            },
            decl.span,
        );
    }

    fn report_unused(&mut self, rule: DiagnosticRule, error: CheckError, span: Span) {
        let message = error.to_string();
        self.add_rule_diagnostic(rule, error, span);
        self.add_unused_code(message, span);
    }
}
