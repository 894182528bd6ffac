//! Tracing types for inference observability.
//!
//! These types capture step-by-step traces of unification and type
//! inference. All tracing is opt-in via `Unifier::enable_tracing()` or
//! `InferOptions::tracing`; nothing is recorded when it is off.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Unification trace
// ---------------------------------------------------------------------------

/// A single step in a unification trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnifyStep {
    pub step: usize,
    pub action: UnifyAction,
    pub left: String,
    pub right: String,
    pub detail: String,
}

/// What action was taken during a unification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifyAction {
    /// Types are already identical.
    Identity,
    /// Structural recursion into compound types (e.g. Vector<3, a> ~ Vector<3, b> → a ~ b).
    Decompose,
    /// Type variable bound to a type (e.g. ?0 := Number).
    Bind,
    /// Occurs check fired; infinite type prevented.
    OccursCheck,
    /// Unification failed.
    Error,
}

// ---------------------------------------------------------------------------
// Inference trace
// ---------------------------------------------------------------------------

/// A single step in an inference trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InferStep {
    pub expr: String,
    /// Type assigned at generation time, before solving.
    #[serde(rename = "type")]
    pub ty: String,
    pub rule: InferRule,
    pub detail: String,
}

/// Which inference rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InferRule {
    Literal,
    VarLookup,
    Application,
    Lambda,
    Let,
    Compose,
    Ascription,
}
