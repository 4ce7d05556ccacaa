// diagnostics.rs
//
// Severity model, per-rule settings, and the sink the host supplies.
// Settings decide whether a rule runs at all and at what severity; the
// message catalog lives in `errors`.

use marten_syntax::Span;

use crate::errors::CheckError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// Configured level for a rule: disabled, or enabled at a severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagnosticLevel {
    #[default]
    None,
    Warning,
    Error,
}

impl DiagnosticLevel {
    pub fn severity(self) -> Option<Severity> {
        match self {
            DiagnosticLevel::None => None,
            DiagnosticLevel::Warning => Some(Severity::Warning),
            DiagnosticLevel::Error => Some(Severity::Error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticRule {
    UnknownParameterType,
    UnknownLambdaType,
    UnusedImport,
    UnusedVariable,
    UnusedClass,
    UnusedFunction,
    PrivateUsage,
    UnnecessaryIsInstance,
    CallInDefaultInitializer,
    IncompatibleMethodOverride,
}

impl DiagnosticRule {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticRule::UnknownParameterType => "reportUnknownParameterType",
            DiagnosticRule::UnknownLambdaType => "reportUnknownLambdaType",
            DiagnosticRule::UnusedImport => "reportUnusedImport",
            DiagnosticRule::UnusedVariable => "reportUnusedVariable",
            DiagnosticRule::UnusedClass => "reportUnusedClass",
            DiagnosticRule::UnusedFunction => "reportUnusedFunction",
            DiagnosticRule::PrivateUsage => "reportPrivateUsage",
            DiagnosticRule::UnnecessaryIsInstance => "reportUnnecessaryIsInstance",
            DiagnosticRule::CallInDefaultInitializer => "reportCallInDefaultInitializer",
            DiagnosticRule::IncompatibleMethodOverride => "reportIncompatibleMethodOverride",
        }
    }
}

impl std::fmt::Display for DiagnosticRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-module rule configuration, injected through `FileInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticSettings {
    pub report_unknown_parameter_type: DiagnosticLevel,
    pub report_unknown_lambda_type: DiagnosticLevel,
    pub report_unused_import: DiagnosticLevel,
    pub report_unused_variable: DiagnosticLevel,
    pub report_unused_class: DiagnosticLevel,
    pub report_unused_function: DiagnosticLevel,
    pub report_private_usage: DiagnosticLevel,
    pub report_unnecessary_isinstance: DiagnosticLevel,
    pub report_call_in_default_initializer: DiagnosticLevel,
    pub report_incompatible_method_override: DiagnosticLevel,
}

impl Default for DiagnosticSettings {
    fn default() -> Self {
        Self {
            report_unknown_parameter_type: DiagnosticLevel::None,
            report_unknown_lambda_type: DiagnosticLevel::None,
            report_unused_import: DiagnosticLevel::Warning,
            report_unused_variable: DiagnosticLevel::Warning,
            report_unused_class: DiagnosticLevel::Warning,
            report_unused_function: DiagnosticLevel::Warning,
            report_private_usage: DiagnosticLevel::Warning,
            report_unnecessary_isinstance: DiagnosticLevel::Warning,
            report_call_in_default_initializer: DiagnosticLevel::None,
            report_incompatible_method_override: DiagnosticLevel::Error,
        }
    }
}

impl DiagnosticSettings {
    /// Everything enabled as an error; the strictest configuration.
    pub fn strict() -> Self {
        Self {
            report_unknown_parameter_type: DiagnosticLevel::Error,
            report_unknown_lambda_type: DiagnosticLevel::Error,
            report_unused_import: DiagnosticLevel::Error,
            report_unused_variable: DiagnosticLevel::Error,
            report_unused_class: DiagnosticLevel::Error,
            report_unused_function: DiagnosticLevel::Error,
            report_private_usage: DiagnosticLevel::Error,
            report_unnecessary_isinstance: DiagnosticLevel::Error,
            report_call_in_default_initializer: DiagnosticLevel::Error,
            report_incompatible_method_override: DiagnosticLevel::Error,
        }
    }

    pub fn level_for(&self, rule: DiagnosticRule) -> DiagnosticLevel {
        match rule {
            DiagnosticRule::UnknownParameterType => self.report_unknown_parameter_type,
            DiagnosticRule::UnknownLambdaType => self.report_unknown_lambda_type,
            DiagnosticRule::UnusedImport => self.report_unused_import,
            DiagnosticRule::UnusedVariable => self.report_unused_variable,
            DiagnosticRule::UnusedClass => self.report_unused_class,
            DiagnosticRule::UnusedFunction => self.report_unused_function,
            DiagnosticRule::PrivateUsage => self.report_private_usage,
            DiagnosticRule::UnnecessaryIsInstance => self.report_unnecessary_isinstance,
            DiagnosticRule::CallInDefaultInitializer => self.report_call_in_default_initializer,
            DiagnosticRule::IncompatibleMethodOverride => {
                self.report_incompatible_method_override
            }
        }
    }
}

/// A severity-tagged diagnostic bound for the sink.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// The rule that produced this, for rule-gated checks; `None` for
    /// unconditional errors.
    pub rule: Option<DiagnosticRule>,
    pub error: CheckError,
    pub span: Span,
}

impl Diagnostic {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

/// Where diagnostics go. The checker batches per pass and flushes once the
/// analysis converges, so an append-only sink never sees duplicates.
pub trait DiagnosticSink {
    fn add_diagnostic(&mut self, diagnostic: Diagnostic);
    /// Dead-code hinting: a text range the editor may dim.
    fn add_unused_code_with_text_range(&mut self, message: String, span: Span);
}

/// The default collecting sink.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    pub diagnostics: Vec<Diagnostic>,
    pub unused_code: Vec<(String, Span)>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(|d| d.message()).collect()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn with_rule(&self, rule: DiagnosticRule) -> Vec<&Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.rule == Some(rule))
            .collect()
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    fn add_unused_code_with_text_range(&mut self, message: String, span: Span) {
        self.unused_code.push((message, span));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_level_has_no_severity() {
        assert_eq!(DiagnosticLevel::None.severity(), None);
        assert_eq!(DiagnosticLevel::Error.severity(), Some(Severity::Error));
    }

    #[test]
    fn settings_route_rules() {
        let mut settings = DiagnosticSettings::default();
        settings.report_unused_import = DiagnosticLevel::Error;
        assert_eq!(
            settings.level_for(DiagnosticRule::UnusedImport),
            DiagnosticLevel::Error
        );
    }

    #[test]
    fn rule_names_match_config_keys() {
        assert_eq!(
            DiagnosticRule::UnnecessaryIsInstance.as_str(),
            "reportUnnecessaryIsInstance"
        );
    }
}
