use std::fmt;

use phi_compose::{ComposeError, Operation, phi};
use phi_diag::{Category, Diagnostic, IntoDiagnostic};
use phi_infer::{Expr, InferError, InferOptions, Inference, TypeEnv, infer_with_options};
use phi_symbols::{QueryError, SymbolTable};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhiError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("cannot compose an empty list of symbols")]
    EmptyPipeline,
}

impl IntoDiagnostic for PhiError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            PhiError::Query(err) => err.to_diagnostic(),
            PhiError::Compose(err) => err.to_diagnostic(),
            PhiError::EmptyPipeline => Diagnostic::error(Category::Composition, self.to_string())
                .with_help("name at least one operation"),
        }
    }
}

/// Bind every registered symbol to its declared scheme.
pub fn type_env(table: &SymbolTable) -> TypeEnv {
    TypeEnv::from_bindings(
        table
            .iter()
            .map(|definition| (definition.name.clone(), definition.scheme.clone())),
    )
}

/// Infer `expr` with the symbols of `table` in scope.
pub fn infer_with_symbols(
    expr: &Expr,
    table: &SymbolTable,
    options: InferOptions,
) -> Result<Inference, InferError> {
    infer_with_options(expr, &type_env(table), options)
}

/// Lift the symbol `name` to an [`Operation`].
pub fn operation(table: &SymbolTable, name: &str) -> Result<Operation, PhiError> {
    let definition = table.get(name).ok_or_else(|| QueryError::UnknownSymbol {
        name: name.to_string(),
    })?;
    Ok(Operation::from_symbol(definition)?)
}

/// Compose the named symbols left to right with [`phi`].
pub fn compose_symbols<I, S>(table: &SymbolTable, names: I) -> Result<Operation, PhiError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut names = names.into_iter();
    let first = names.next().ok_or(PhiError::EmptyPipeline)?;
    let mut composed = operation(table, first.as_ref())?;
    for name in names {
        let next = operation(table, name.as_ref())?;
        composed = phi(&composed, &next)?;
    }
    Ok(composed)
}

/// Symbols of one level that can run together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStage {
    pub level: u8,
    pub symbols: Vec<String>,
}

/// Everything needed to run a set of targets, grouped into stages of
/// ascending level. Every dependency of a symbol sits in an earlier stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub stages: Vec<PlanStage>,
}

impl ExecutionPlan {
    /// Flattened execution order.
    pub fn order(&self) -> Vec<&str> {
        self.stages
            .iter()
            .flat_map(|stage| stage.symbols.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stages.iter().map(|stage| stage.symbols.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "level {}: {}", stage.level, stage.symbols.join(", "))?;
        }
        Ok(())
    }
}

pub fn execution_plan<I, S>(table: &SymbolTable, targets: I) -> Result<ExecutionPlan, QueryError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let stages = table
        .execution_batches(targets)?
        .into_iter()
        .map(|batch| PlanStage {
            level: batch.level,
            symbols: batch.symbols.into_iter().map(str::to_string).collect(),
        })
        .collect();
    Ok(ExecutionPlan { stages })
}
