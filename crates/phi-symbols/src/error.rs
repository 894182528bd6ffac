use phi_diag::{Category, Diagnostic, IntoDiagnostic};
use phi_types::WellFormednessError;

use crate::definition::MAX_LEVEL;

/// A definition was rejected. The table is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("symbol `{name}` is already registered")]
    DuplicateSymbol { name: String },
    #[error("`{name}` depends on unknown symbol `{dependency}`")]
    UnknownDependency { name: String, dependency: String },
    #[error("`{name}` has level {level}, but levels range over 0..={max}", max = MAX_LEVEL)]
    LevelOutOfRange { name: String, level: u8 },
    #[error(
        "`{name}` (level {level}) cannot depend on `{dependency}` (level {dependency_level})"
    )]
    LevelViolation {
        name: String,
        level: u8,
        dependency: String,
        dependency_level: u8,
    },
    #[error("`{name}` has a malformed type: {source}")]
    MalformedType {
        name: String,
        source: WellFormednessError,
    },
}

impl RegistrationError {
    /// Name of the rejected symbol.
    pub fn name(&self) -> &str {
        match self {
            RegistrationError::DuplicateSymbol { name }
            | RegistrationError::UnknownDependency { name, .. }
            | RegistrationError::LevelOutOfRange { name, .. }
            | RegistrationError::LevelViolation { name, .. }
            | RegistrationError::MalformedType { name, .. } => name,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            RegistrationError::DuplicateSymbol { .. } => Category::DuplicateSymbol,
            // An out-of-range level names a bucket that does not exist.
            RegistrationError::UnknownDependency { .. }
            | RegistrationError::LevelOutOfRange { .. } => Category::UnknownDependency,
            RegistrationError::LevelViolation { .. } => Category::LevelViolation,
            RegistrationError::MalformedType { .. } => Category::MalformedType,
        }
    }
}

impl IntoDiagnostic for RegistrationError {
    fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.category(), self.to_string()).about(self.name());
        match self {
            RegistrationError::DuplicateSymbol { .. } => {
                diag.with_help("symbols cannot be replaced; choose a new name")
            }
            RegistrationError::UnknownDependency { dependency, .. } => {
                diag.with_help(format!("register `{dependency}` first"))
            }
            RegistrationError::LevelOutOfRange { .. } => {
                diag.with_note(format!("valid levels are 0 through {MAX_LEVEL}"))
            }
            RegistrationError::LevelViolation {
                name,
                dependency_level,
                ..
            } => {
                let diag =
                    diag.with_note("dependencies must sit on a strictly lower level");
                if *dependency_level < MAX_LEVEL {
                    diag.with_help(format!("raise `{name}` above level {dependency_level}"))
                } else {
                    diag
                }
            }
            RegistrationError::MalformedType { .. } => diag,
        }
    }
}

/// A query named a symbol that is not registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown symbol `{name}`")]
    UnknownSymbol { name: String },
}

impl IntoDiagnostic for QueryError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            QueryError::UnknownSymbol { name } => {
                Diagnostic::error(Category::UnknownSymbol, self.to_string()).about(name.clone())
            }
        }
    }
}
