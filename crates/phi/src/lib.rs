//! The phi symbol core.
//!
//! Re-exports the workspace crates and adds the glue between them: a type
//! environment built from a symbol table, operation lookup and composition
//! by name, and execution plans.

mod pipeline;

pub use phi_compose::{ComposeError, Operation, Origin, conforms, phi, psi};
pub use phi_diag::{Category, Diagnostic, DiagnosticError, IntoDiagnostic, Severity};
pub use phi_infer::{
    Constraint, Expr, InferError, InferOptions, Inference, Literal, Reason, SolveOptions, TypeEnv,
    Unifier, UnifyError, compatible, infer, infer_scheme, infer_with_options, unify,
};
pub use phi_symbols::{
    Complexity, ExecError, Executable, ExecutionBatch, LEVEL_COUNT, MAX_LEVEL, QueryError,
    RegistrationError, RegistrationEvent, RegistrationLog, RegistrationOutcome, SharedSymbolTable,
    SymbolDefinition, SymbolMetadata, SymbolTable, Value,
};
pub use phi_types::{
    ScalarKind, Substitution, Type, TypeScheme, TypeVar, alpha_equivalent, canonicalize,
};

pub use pipeline::{
    ExecutionPlan, PhiError, PlanStage, compose_symbols, execution_plan, infer_with_symbols,
    operation, type_env,
};
