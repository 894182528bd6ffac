//! Constraint-based type inference for operation expressions.
//!
//! Inference walks an [`Expr`], assigning fresh variables to unknown
//! positions and emitting [`Constraint`]s in order. Constraints are solved
//! by the [`Unifier`] in emission order; a `let` solves everything pending
//! before generalizing its value so that bound names are polymorphic.

use std::fmt;

use phi_diag::{Category, Diagnostic, IntoDiagnostic};
use phi_types::{Substitution, Type, TypeScheme, WellFormednessError};

use crate::env::{FreshVars, FreshVarsExhausted, TypeEnv, instantiate};
use crate::trace::{InferRule, InferStep, UnifyStep};
use crate::{Constraint, ConstraintSet, Reason, SolveOptions, Unifier, UnifyError};

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Literal constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Number(f64),
    Text(String),
    Vector(Vec<f64>),
    /// Rows of a matrix; every row must have the same length.
    Matrix(Vec<Vec<f64>>),
}

/// Inference input: a small lambda calculus with composition.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Literal),
    Var(String),
    App(Box<Expr>, Box<Expr>),
    Lambda(String, Box<Expr>),
    Let(String, Box<Expr>, Box<Expr>),
    /// `first` then `second`.
    Compose(Box<Expr>, Box<Expr>),
    Ascribe(Box<Expr>, Type),
}

impl Expr {
    pub fn lit(literal: Literal) -> Self {
        Expr::Lit(literal)
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn app(callee: Expr, arg: Expr) -> Self {
        Expr::App(Box::new(callee), Box::new(arg))
    }

    pub fn lambda(param: impl Into<String>, body: Expr) -> Self {
        Expr::Lambda(param.into(), Box::new(body))
    }

    pub fn let_in(name: impl Into<String>, value: Expr, body: Expr) -> Self {
        Expr::Let(name.into(), Box::new(value), Box::new(body))
    }

    pub fn compose(first: Expr, second: Expr) -> Self {
        Expr::Compose(Box::new(first), Box::new(second))
    }

    pub fn ascribe(expr: Expr, ty: Type) -> Self {
        Expr::Ascribe(Box::new(expr), ty)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Number(n) => write!(f, "{n:?}"),
            Literal::Text(s) => write!(f, "{s:?}"),
            Literal::Vector(items) => write!(f, "{items:?}"),
            Literal::Matrix(rows) => write!(f, "{rows:?}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit(lit) => write!(f, "{lit}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::App(callee, arg) => write!(f, "{callee}({arg})"),
            Expr::Lambda(param, body) => write!(f, "(\\{param} -> {body})"),
            Expr::Let(name, value, body) => write!(f, "let {name} = {value} in {body}"),
            Expr::Compose(first, second) => write!(f, "({first} >> {second})"),
            Expr::Ascribe(expr, ty) => write!(f, "({expr} : {ty})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferError {
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: Type,
        actual: Type,
        reason: Reason,
        #[source]
        cause: UnifyError,
    },
    #[error("unbound variable `{name}`")]
    UnboundVariable { name: String },
    #[error("malformed literal: {detail}")]
    MalformedLiteral { detail: String },
    #[error("malformed annotation `{ty}`: {source}")]
    MalformedAnnotation {
        ty: Type,
        source: WellFormednessError,
    },
    #[error("constraint solver exceeded its budget of {limit} constraints")]
    BudgetExceeded { limit: usize },
    #[error("{0}")]
    FreshVarsExhausted(#[from] FreshVarsExhausted),
}

impl IntoDiagnostic for InferError {
    fn to_diagnostic(&self) -> Diagnostic {
        match self {
            InferError::TypeMismatch { reason, cause, .. } => {
                Diagnostic::error(Category::TypeMismatch, self.to_string())
                    .with_note(reason.to_string())
                    .with_note(cause.to_string())
            }
            InferError::UnboundVariable { name } => {
                Diagnostic::error(Category::UnboundVariable, self.to_string())
                    .about(name.clone())
                    .with_help(format!("register `{name}` or bind it with `let`"))
            }
            InferError::MalformedLiteral { .. } => {
                Diagnostic::error(Category::MalformedLiteral, self.to_string())
            }
            InferError::MalformedAnnotation { .. } => {
                Diagnostic::error(Category::MalformedType, self.to_string())
            }
            InferError::BudgetExceeded { .. } => {
                Diagnostic::error(Category::SolverBudget, self.to_string())
                    .with_help("raise `SolveOptions::max_constraints`")
            }
            InferError::FreshVarsExhausted(_) => {
                Diagnostic::error(Category::SolverBudget, self.to_string())
                    .with_note("the environment already uses the highest fresh variable id")
            }
        }
    }
}

/// Options for a single inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InferOptions {
    /// Record unification and inference traces.
    pub tracing: bool,
    pub solve: SolveOptions,
}

impl InferOptions {
    pub fn traced() -> Self {
        Self {
            tracing: true,
            ..Self::default()
        }
    }
}

/// Result of a successful inference.
#[derive(Debug, Clone)]
pub struct Inference {
    /// Principal type, with the final substitution applied.
    pub ty: Type,
    pub substitution: Substitution,
    /// Number of constraints emitted.
    pub constraints: usize,
    pub unify_trace: Vec<UnifyStep>,
    pub infer_trace: Vec<InferStep>,
}

// ---------------------------------------------------------------------------
// Inference context
// ---------------------------------------------------------------------------

/// State for one top-level inference: fresh-variable counter, pending
/// constraints and the unifier that solves them.
#[derive(Debug)]
pub struct InferenceContext {
    unifier: Unifier,
    constraints: ConstraintSet,
    fresh: FreshVars,
    emitted: usize,
    tracing: bool,
    infer_trace: Vec<InferStep>,
}

impl InferenceContext {
    /// Fresh variables start past every fresh variable in `env`.
    pub fn new(env: &TypeEnv, options: InferOptions) -> Self {
        let mut unifier = Unifier::with_options(options.solve);
        if options.tracing {
            unifier.enable_tracing();
        }
        Self {
            unifier,
            constraints: ConstraintSet::new(),
            fresh: FreshVars::after(env),
            emitted: 0,
            tracing: options.tracing,
            infer_trace: Vec::new(),
        }
    }

    pub fn fresh_type(&mut self) -> Result<Type, InferError> {
        Ok(self.fresh.next_type()?)
    }

    pub fn constrain(&mut self, expected: Type, actual: Type, reason: Reason) {
        self.emitted += 1;
        self.constraints
            .push(Constraint::new(expected, actual, reason));
    }

    /// Solve all pending constraints.
    pub fn solve(&mut self) -> Result<(), InferError> {
        let constraints = self.constraints.drain();
        self.unifier.solve(constraints)
    }

    /// Generate constraints for `expr`. Only `let` solves eagerly; call
    /// [`InferenceContext::finish`] to solve the rest.
    pub fn infer_expr(&mut self, expr: &Expr, env: &TypeEnv) -> Result<Type, InferError> {
        match expr {
            Expr::Lit(lit) => {
                let ty = literal_type(lit)?;
                self.push_infer_step(expr, &ty, InferRule::Literal, String::new());
                Ok(ty)
            }

            Expr::Var(name) => {
                let scheme = env
                    .lookup(name)
                    .ok_or_else(|| InferError::UnboundVariable { name: name.clone() })?;
                let ty = instantiate(scheme, &mut self.fresh)?;
                let detail = format!("{name} : {scheme}");
                self.push_infer_step(expr, &ty, InferRule::VarLookup, detail);
                Ok(ty)
            }

            Expr::App(callee, arg) => {
                let callee_ty = self.infer_expr(callee, env)?;
                let arg_ty = self.infer_expr(arg, env)?;
                let result = self.fresh_type()?;
                let detail = format!("{callee_ty} ~ {arg_ty} -> {result}");
                self.constrain(
                    callee_ty,
                    Type::function(arg_ty, result.clone()),
                    Reason::Application,
                );
                self.push_infer_step(expr, &result, InferRule::Application, detail);
                Ok(result)
            }

            Expr::Lambda(param, body) => {
                let param_ty = self.fresh_type()?;
                let inner = env.extend(param.clone(), TypeScheme::mono(param_ty.clone()));
                let body_ty = self.infer_expr(body, &inner)?;
                let ty = Type::function(param_ty, body_ty);
                self.push_infer_step(expr, &ty, InferRule::Lambda, String::new());
                Ok(ty)
            }

            Expr::Let(name, value, body) => {
                let value_ty = self.infer_expr(value, env)?;
                self.solve()?;
                let subst = &self.unifier.substitution;
                let env = env.apply_subst(subst);
                let scheme = env.generalize(&subst.apply(&value_ty));
                let detail = format!("{name} : {scheme}");
                let body_ty = self.infer_expr(body, &env.extend(name.clone(), scheme))?;
                self.push_infer_step(expr, &body_ty, InferRule::Let, detail);
                Ok(body_ty)
            }

            Expr::Compose(first, second) => {
                let first_ty = self.infer_expr(first, env)?;
                let second_ty = self.infer_expr(second, env)?;
                let input = self.fresh_type()?;
                let middle = self.fresh_type()?;
                let output = self.fresh_type()?;
                self.constrain(
                    first_ty,
                    Type::function(input.clone(), middle.clone()),
                    Reason::ComposeFirst,
                );
                self.constrain(
                    second_ty,
                    Type::function(middle, output.clone()),
                    Reason::ComposeSecond,
                );
                let ty = Type::function(input, output);
                self.push_infer_step(expr, &ty, InferRule::Compose, String::new());
                Ok(ty)
            }

            Expr::Ascribe(inner, annotation) => {
                annotation
                    .check_well_formed()
                    .map_err(|source| InferError::MalformedAnnotation {
                        ty: annotation.clone(),
                        source,
                    })?;
                // Named variables in an annotation stand for unknown types.
                let expected =
                    instantiate(&TypeScheme::closed(annotation.clone()), &mut self.fresh)?;
                let actual = self.infer_expr(inner, env)?;
                self.constrain(expected.clone(), actual, Reason::Ascription);
                let detail = format!("annotated {annotation}");
                self.push_infer_step(expr, &expected, InferRule::Ascription, detail);
                Ok(expected)
            }
        }
    }

    /// Solve remaining constraints and resolve `ty` into the final result.
    pub fn finish(mut self, ty: Type) -> Result<Inference, InferError> {
        self.solve()?;
        let unify_trace = self.unifier.take_unify_trace();
        let substitution = self.unifier.substitution;
        Ok(Inference {
            ty: substitution.apply(&ty),
            substitution,
            constraints: self.emitted,
            unify_trace,
            infer_trace: self.infer_trace,
        })
    }

    fn push_infer_step(&mut self, expr: &Expr, ty: &Type, rule: InferRule, detail: String) {
        if self.tracing {
            self.infer_trace.push(InferStep {
                expr: expr.to_string(),
                ty: ty.to_string(),
                rule,
                detail,
            });
        }
    }
}

fn literal_type(lit: &Literal) -> Result<Type, InferError> {
    Ok(match lit {
        Literal::Bool(_) => Type::BOOL,
        Literal::Int(_) => Type::INT,
        Literal::Number(_) => Type::NUMBER,
        Literal::Text(_) => Type::STRING,
        Literal::Vector(items) => Type::vector(items.len(), Type::NUMBER),
        Literal::Matrix(rows) => {
            let cols = rows.first().map_or(0, Vec::len);
            if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != cols)
            {
                return Err(InferError::MalformedLiteral {
                    detail: format!(
                        "matrix row {index} has {} columns, expected {cols}",
                        row.len()
                    ),
                });
            }
            Type::matrix(rows.len(), cols, Type::NUMBER)
        }
    })
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Infer the principal type of `expr` under `env`.
pub fn infer(expr: &Expr, env: &TypeEnv) -> Result<Type, InferError> {
    infer_with_options(expr, env, InferOptions::default()).map(|inference| inference.ty)
}

pub fn infer_with_options(
    expr: &Expr,
    env: &TypeEnv,
    options: InferOptions,
) -> Result<Inference, InferError> {
    let mut ctx = InferenceContext::new(env, options);
    let ty = ctx.infer_expr(expr, env)?;
    ctx.finish(ty)
}

/// Infer and generalize over the variables not free in `env`.
pub fn infer_scheme(expr: &Expr, env: &TypeEnv) -> Result<TypeScheme, InferError> {
    let inference = infer_with_options(expr, env, InferOptions::default())?;
    Ok(env
        .apply_subst(&inference.substitution)
        .generalize(&inference.ty))
}
