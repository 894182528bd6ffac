//! Hindley-Milner unification and inference for the phi symbol core.
//!
//! This crate implements:
//! - Structural unification with occurs check over [`phi_types::Type`]
//! - The explicit composition compatibility relation ([`compat`])
//! - A persistent type environment with generalization and instantiation
//! - Constraint-based inference over a small expression language
//!
//! Constraints carry a [`Reason`] so that a failed solve can say why the two
//! types were required to agree. Nothing in this crate holds global state:
//! every inference owns its fresh-variable counter and substitution.

pub mod compat;
pub mod env;
pub mod trace;
pub mod typeck;

use std::fmt;

use phi_diag::{Category, Diagnostic, IntoDiagnostic};
use phi_types::{Substitution, SubstitutionError, Type, TypeVar};

pub use compat::{SCALAR_WIDENINGS, compatible, widens};
pub use env::{FreshVars, FreshVarsExhausted, TypeEnv, instantiate};
pub use typeck::{
    Expr, InferError, InferOptions, Inference, InferenceContext, Literal, infer,
    infer_scheme, infer_with_options,
};

// ---------------------------------------------------------------------------
// Unification errors
// ---------------------------------------------------------------------------

/// Why two types failed to unify. Carries the innermost offending pair.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnifyError {
    #[error("kind mismatch: expected {expected}, found {actual}")]
    KindMismatch { expected: Type, actual: Type },
    #[error("dimension mismatch: expected {expected}, found {actual}")]
    DimensionMismatch { expected: Type, actual: Type },
    #[error("occurs check: cannot construct infinite type {var} = {ty}")]
    OccursCheck { var: TypeVar, ty: Type },
}

/// Discriminant of [`UnifyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnifyErrorKind {
    KindMismatch,
    DimensionMismatch,
    OccursCheck,
}

impl UnifyError {
    pub fn kind(&self) -> UnifyErrorKind {
        match self {
            UnifyError::KindMismatch { .. } => UnifyErrorKind::KindMismatch,
            UnifyError::DimensionMismatch { .. } => UnifyErrorKind::DimensionMismatch,
            UnifyError::OccursCheck { .. } => UnifyErrorKind::OccursCheck,
        }
    }

    pub fn category(&self) -> Category {
        match self.kind() {
            UnifyErrorKind::KindMismatch => Category::KindMismatch,
            UnifyErrorKind::DimensionMismatch => Category::DimensionMismatch,
            UnifyErrorKind::OccursCheck => Category::OccursCheck,
        }
    }
}

impl IntoDiagnostic for UnifyError {
    fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.category(), self.to_string());
        match self {
            UnifyError::KindMismatch { .. } => diag,
            UnifyError::DimensionMismatch { .. } => {
                diag.with_note("container sizes are part of the type and never coerce")
            }
            UnifyError::OccursCheck { .. } => {
                diag.with_help("a value cannot contain or be applied to itself")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Why a constraint was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Callee must be a function accepting the argument.
    Application,
    /// First operand of a composition must be a function.
    ComposeFirst,
    /// Second operand must accept the first operand's output.
    ComposeSecond,
    /// Expression type must match an explicit annotation.
    Ascription,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Reason::Application => "function argument must match parameter type",
            Reason::ComposeFirst => "first operand of a composition must be a function",
            Reason::ComposeSecond => "composed operation must accept the previous output",
            Reason::Ascription => "expression must match its annotation",
        };
        f.write_str(text)
    }
}

/// A pending equality between an expected and an actual type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub expected: Type,
    pub actual: Type,
    pub reason: Reason,
}

impl Constraint {
    pub fn new(expected: Type, actual: Type, reason: Reason) -> Self {
        Self {
            expected,
            actual,
            reason,
        }
    }
}

/// Constraints in emission order.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Take all pending constraints, oldest first.
    pub fn drain(&mut self) -> Vec<Constraint> {
        std::mem::take(&mut self.constraints)
    }
}

// ---------------------------------------------------------------------------
// Unifier
// ---------------------------------------------------------------------------

/// Solver limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolveOptions {
    /// Upper bound on constraints solved by one unifier.
    pub max_constraints: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_constraints: 1_000_000,
        }
    }
}

/// Accumulates a substitution by unifying types and solving constraints.
#[derive(Debug, Clone, Default)]
pub struct Unifier {
    pub substitution: Substitution,
    options: SolveOptions,
    /// Constraints solved so far, checked against the budget.
    solved: usize,
    /// When true, unification steps are recorded for observability tools.
    tracing: bool,
    unify_trace: Vec<trace::UnifyStep>,
}

impl Unifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SolveOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Unify two types under the current substitution and fold the result
    /// into it. Returns the substitution contributed by this call.
    pub fn unify(&mut self, expected: &Type, actual: &Type) -> Result<Substitution, UnifyError> {
        let expected = self.substitution.apply(expected);
        let actual = self.substitution.apply(actual);
        let step = self.unify_terms(&expected, &actual)?;
        self.substitution = self.substitution.then(&step);
        Ok(step)
    }

    /// Solve constraints in emission order, stopping at the first failure.
    pub fn solve(&mut self, constraints: Vec<Constraint>) -> Result<(), InferError> {
        for constraint in constraints {
            if self.solved >= self.options.max_constraints {
                return Err(InferError::BudgetExceeded {
                    limit: self.options.max_constraints,
                });
            }
            self.solved += 1;
            if let Err(cause) = self.unify(&constraint.expected, &constraint.actual) {
                return Err(InferError::TypeMismatch {
                    expected: self.substitution.apply(&constraint.expected),
                    actual: self.substitution.apply(&constraint.actual),
                    reason: constraint.reason,
                    cause,
                });
            }
        }
        Ok(())
    }

    /// Enable step-by-step unification tracing.
    pub fn enable_tracing(&mut self) {
        self.tracing = true;
    }

    /// Get the unification trace (empty if tracing was not enabled).
    pub fn unify_trace(&self) -> &[trace::UnifyStep] {
        &self.unify_trace
    }

    pub(crate) fn take_unify_trace(&mut self) -> Vec<trace::UnifyStep> {
        std::mem::take(&mut self.unify_trace)
    }

    /// Most general unifier of two already-substituted types.
    fn unify_terms(&mut self, expected: &Type, actual: &Type) -> Result<Substitution, UnifyError> {
        if expected == actual {
            self.push_unify_step(
                trace::UnifyAction::Identity,
                expected,
                actual,
                "types already equal".into(),
            );
            return Ok(Substitution::empty());
        }

        match (expected, actual) {
            (Type::Var(var), other) | (other, Type::Var(var)) => {
                self.bind(var, other, expected, actual)
            }

            (
                Type::Vector { len: n1, element: e1 },
                Type::Vector { len: n2, element: e2 },
            ) => {
                if n1 != n2 {
                    return Err(self.dimension_mismatch(expected, actual));
                }
                self.decompose(expected, actual, "vector elements");
                self.unify_terms(e1, e2)
            }
            (
                Type::Matrix {
                    rows: r1,
                    cols: c1,
                    element: e1,
                },
                Type::Matrix {
                    rows: r2,
                    cols: c2,
                    element: e2,
                },
            ) => {
                if (r1, c1) != (r2, c2) {
                    return Err(self.dimension_mismatch(expected, actual));
                }
                self.decompose(expected, actual, "matrix elements");
                self.unify_terms(e1, e2)
            }
            (
                Type::Tensor {
                    shape: s1,
                    element: e1,
                },
                Type::Tensor {
                    shape: s2,
                    element: e2,
                },
            ) => {
                if s1 != s2 {
                    return Err(self.dimension_mismatch(expected, actual));
                }
                self.decompose(expected, actual, "tensor elements");
                self.unify_terms(e1, e2)
            }
            (Type::Sequence(e1), Type::Sequence(e2)) => {
                self.decompose(expected, actual, "sequence elements");
                self.unify_terms(e1, e2)
            }
            (Type::Function(i1, o1), Type::Function(i2, o2)) => {
                self.decompose(expected, actual, "input, then output");
                self.unify_pair(i1, o1, i2, o2)
            }
            (
                Type::Strategy {
                    state: s1,
                    action: a1,
                },
                Type::Strategy {
                    state: s2,
                    action: a2,
                },
            ) => {
                self.decompose(expected, actual, "state, then action");
                self.unify_pair(s1, a1, s2, a2)
            }

            _ => {
                self.push_unify_step(
                    trace::UnifyAction::Error,
                    expected,
                    actual,
                    format!(
                        "cannot unify {} with {}",
                        expected.variant_name(),
                        actual.variant_name()
                    ),
                );
                Err(UnifyError::KindMismatch {
                    expected: expected.clone(),
                    actual: actual.clone(),
                })
            }
        }
    }

    /// Unify the first components, push that result into the second
    /// components, unify those, and compose.
    fn unify_pair(
        &mut self,
        first_l: &Type,
        second_l: &Type,
        first_r: &Type,
        second_r: &Type,
    ) -> Result<Substitution, UnifyError> {
        let s1 = self.unify_terms(first_l, first_r)?;
        let s2 = self.unify_terms(&s1.apply(second_l), &s1.apply(second_r))?;
        Ok(s1.then(&s2))
    }

    fn bind(
        &mut self,
        var: &TypeVar,
        ty: &Type,
        expected: &Type,
        actual: &Type,
    ) -> Result<Substitution, UnifyError> {
        match Substitution::singleton(var.clone(), ty.clone()) {
            Ok(subst) => {
                self.push_unify_step(
                    trace::UnifyAction::Bind,
                    expected,
                    actual,
                    format!("{var} := {ty}"),
                );
                Ok(subst)
            }
            Err(SubstitutionError::Occurs { var, ty }) => {
                self.push_unify_step(
                    trace::UnifyAction::OccursCheck,
                    expected,
                    actual,
                    format!("{var} occurs in {ty}"),
                );
                Err(UnifyError::OccursCheck { var, ty })
            }
            Err(other) => unreachable!("singleton substitution rejected: {other}"),
        }
    }

    fn decompose(&mut self, expected: &Type, actual: &Type, detail: &str) {
        self.push_unify_step(
            trace::UnifyAction::Decompose,
            expected,
            actual,
            detail.to_string(),
        );
    }

    fn dimension_mismatch(&mut self, expected: &Type, actual: &Type) -> UnifyError {
        self.push_unify_step(
            trace::UnifyAction::Error,
            expected,
            actual,
            "dimensions differ".into(),
        );
        UnifyError::DimensionMismatch {
            expected: expected.clone(),
            actual: actual.clone(),
        }
    }

    fn push_unify_step(
        &mut self,
        action: trace::UnifyAction,
        left: &Type,
        right: &Type,
        detail: String,
    ) {
        if self.tracing {
            let step_num = self.unify_trace.len() + 1;
            self.unify_trace.push(trace::UnifyStep {
                step: step_num,
                action,
                left: left.to_string(),
                right: right.to_string(),
                detail,
            });
        }
    }
}

/// Most general unifier of two types.
///
/// Identical types yield the empty substitution. The result `s` satisfies
/// `s.apply(left) == s.apply(right)`.
pub fn unify(left: &Type, right: &Type) -> Result<Substitution, UnifyError> {
    Unifier::new().unify(left, right)
}
