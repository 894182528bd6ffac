//! Error reporting and diagnostics for the phi symbol core.
//!
//! Every failure in the workspace (registration, unification, inference,
//! composition, execution) converts into a [`Diagnostic`] with a stable
//! code. Diagnostics mention symbols by name and types by their canonical
//! rendering, never by internal ids.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A symbol with this name is already registered.
    DuplicateSymbol,
    /// A dependency (or the level bucket) does not exist in the table.
    UnknownDependency,
    /// A dependency does not sit strictly below the dependent.
    LevelViolation,
    /// A declared type is not well formed.
    MalformedType,
    /// A query named a symbol that is not registered.
    UnknownSymbol,
    /// Unification met two different type variants.
    KindMismatch,
    /// Unification met two containers of different sizes.
    DimensionMismatch,
    /// Unification would build an infinite type.
    OccursCheck,
    /// Inference could not reconcile an expected and an actual type.
    TypeMismatch,
    /// Undefined variable or name.
    UnboundVariable,
    /// A literal cannot be typed (e.g. a ragged matrix).
    MalformedLiteral,
    /// The constraint solver ran past its budget.
    SolverBudget,
    /// φ: output of the first operation does not feed the second.
    Composition,
    /// ψ: a transformation changed an operation's signature.
    ContractViolation,
    /// A symbol's declared type is not a function type.
    NotAnOperation,
    /// An executable rejected its input or failed.
    Execution,
}

impl Category {
    pub const ALL: [Category; 16] = [
        Category::DuplicateSymbol,
        Category::UnknownDependency,
        Category::LevelViolation,
        Category::MalformedType,
        Category::UnknownSymbol,
        Category::KindMismatch,
        Category::DimensionMismatch,
        Category::OccursCheck,
        Category::TypeMismatch,
        Category::UnboundVariable,
        Category::MalformedLiteral,
        Category::SolverBudget,
        Category::Composition,
        Category::ContractViolation,
        Category::NotAnOperation,
        Category::Execution,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::DuplicateSymbol => "duplicate_symbol",
            Category::UnknownDependency => "unknown_dependency",
            Category::LevelViolation => "level_violation",
            Category::MalformedType => "malformed_type",
            Category::UnknownSymbol => "unknown_symbol",
            Category::KindMismatch => "kind_mismatch",
            Category::DimensionMismatch => "dimension_mismatch",
            Category::OccursCheck => "occurs_check",
            Category::TypeMismatch => "type_mismatch",
            Category::UnboundVariable => "unbound_variable",
            Category::MalformedLiteral => "malformed_literal",
            Category::SolverBudget => "solver_budget",
            Category::Composition => "composition",
            Category::ContractViolation => "contract_violation",
            Category::NotAnOperation => "not_an_operation",
            Category::Execution => "execution",
        }
    }

    /// Stable code. `E01xx` registry, `E02xx` types, `E03xx` composition.
    pub fn code(self) -> &'static str {
        match self {
            Category::DuplicateSymbol => "E0101",
            Category::UnknownDependency => "E0102",
            Category::LevelViolation => "E0103",
            Category::MalformedType => "E0104",
            Category::UnknownSymbol => "E0105",
            Category::KindMismatch => "E0201",
            Category::DimensionMismatch => "E0202",
            Category::OccursCheck => "E0203",
            Category::TypeMismatch => "E0204",
            Category::UnboundVariable => "E0205",
            Category::MalformedLiteral => "E0206",
            Category::SolverBudget => "E0207",
            Category::Composition => "E0301",
            Category::ContractViolation => "E0302",
            Category::NotAnOperation => "E0303",
            Category::Execution => "E0304",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::DuplicateSymbol => "A symbol with the same name is already registered.",
            Category::UnknownDependency => {
                "A dependency or level bucket named by a definition does not exist."
            }
            Category::LevelViolation => {
                "A dependency's level is not strictly lower than the dependent's level."
            }
            Category::MalformedType => "A declared type or scheme is not well formed.",
            Category::UnknownSymbol => "A query referenced a symbol that is not registered.",
            Category::KindMismatch => "Two types of different kinds cannot be unified.",
            Category::DimensionMismatch => "Two containers have different dimensions.",
            Category::OccursCheck => "Unification would construct an infinite type.",
            Category::TypeMismatch => "Expression type does not match expected type.",
            Category::UnboundVariable => "A referenced variable or symbol is undefined.",
            Category::MalformedLiteral => "A literal has no consistent type.",
            Category::SolverBudget => "The constraint solver exceeded its budget.",
            Category::Composition => "An operation's output cannot feed the next operation.",
            Category::ContractViolation => "A transformation altered an operation's signature.",
            Category::NotAnOperation => "A symbol without a function type was used as an operation.",
            Category::Execution => "An executable rejected its input or failed.",
        }
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. E0103).
    pub code: String,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Symbol the diagnostic is about, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Secondary facts (e.g. "`add` is at level 0").
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Suggested fix, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    fn new(severity: Severity, category: Category, message: impl Into<String>) -> Self {
        Self {
            code: category.code().to_string(),
            severity,
            category,
            message: message.into(),
            subject: None,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{prefix}[{}]: {}", self.code, self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

/// Conversion implemented by every error type in the workspace.
pub trait IntoDiagnostic {
    fn to_diagnostic(&self) -> Diagnostic;
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }
}

impl From<Diagnostic> for DiagnosticError {
    fn from(diag: Diagnostic) -> Self {
        Self::single(diag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_builder() {
        let diag = Diagnostic::error(
            Category::LevelViolation,
            "`add2` (level 0) cannot depend on `double` (level 1)",
        )
        .about("add2")
        .with_note("dependencies must sit on a strictly lower level")
        .with_help("raise `add2` above level 1");

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code, "E0103");
        assert_eq!(diag.subject.as_deref(), Some("add2"));
        assert_eq!(diag.notes.len(), 1);
        assert!(diag.help.unwrap().contains("level 1"));
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::error(Category::TypeMismatch, "expected Number, found String")
            .with_help("convert the argument first");
        assert_eq!(
            diag.to_string(),
            "error[E0204]: expected Number, found String\n  help: convert the argument first"
        );
    }

    #[test]
    fn diagnostic_serializes_without_empty_fields() {
        let diag = Diagnostic::warning(Category::UnknownSymbol, "no symbol `x`");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["code"], "E0105");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["category"], "unknown_symbol");
        assert!(json.get("notes").is_none());
        assert!(json.get("help").is_none());
    }

    #[test]
    fn error_wraps_first_diagnostic() {
        let err = DiagnosticError::multiple(vec![
            Diagnostic::error(Category::DuplicateSymbol, "`add` is already registered"),
            Diagnostic::error(Category::UnknownDependency, "unknown `mul`"),
        ]);
        assert_eq!(err.to_string(), "error[E0101]: `add` is already registered");
        assert_eq!(err.diagnostics().len(), 2);
    }

    #[test]
    fn category_metadata_is_stable_and_unique() {
        let mut codes = std::collections::BTreeSet::new();
        for cat in Category::all() {
            assert!(!cat.as_str().is_empty());
            assert!(!cat.description().is_empty());
            assert!(
                codes.insert(cat.code()),
                "duplicate diagnostic code detected: {}",
                cat.code()
            );
        }
    }
}
