//! Type representations for the phi symbol core.
//!
//! This crate defines the semantic types shared by the symbol table, the
//! inference engine and the composition checker. Rendering through
//! `Display` is canonical: the same text appears in error messages,
//! diagnostics and traces, so tests can assert on it exactly.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

/// Base kind of a `Scalar` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    Int,
    Number,
    String,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 4] = [
        ScalarKind::Bool,
        ScalarKind::Int,
        ScalarKind::Number,
        ScalarKind::String,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScalarKind::Bool => "Bool",
            ScalarKind::Int => "Int",
            ScalarKind::Number => "Number",
            ScalarKind::String => "String",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Type variables
// ---------------------------------------------------------------------------

/// A type variable.
///
/// Authors declare `Named` variables; the inference engine mints `Fresh`
/// ones. Declared types may never contain fresh variables, so minted
/// variables cannot capture an author's variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeVar {
    /// Rendered `'name`.
    Named(String),
    /// Rendered `?n`.
    Fresh(u32),
}

impl TypeVar {
    pub fn named(name: impl Into<String>) -> Self {
        TypeVar::Named(name.into())
    }
}

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeVar::Named(name) => write!(f, "'{name}"),
            TypeVar::Fresh(id) => write!(f, "?{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A semantic type.
///
/// Dimensions are fixed at construction. Nothing in this crate mutates a
/// type in place: every operation returns fresh data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Scalar(ScalarKind),
    Vector {
        len: usize,
        element: Box<Type>,
    },
    Matrix {
        rows: usize,
        cols: usize,
        element: Box<Type>,
    },
    Tensor {
        shape: Vec<usize>,
        element: Box<Type>,
    },
    /// `input -> output`.
    Function(Box<Type>, Box<Type>),
    Var(TypeVar),
    Sequence(Box<Type>),
    /// Strategy over a game state and the action it selects.
    Strategy {
        state: Box<Type>,
        action: Box<Type>,
    },
}

impl Type {
    pub const BOOL: Type = Type::Scalar(ScalarKind::Bool);
    pub const INT: Type = Type::Scalar(ScalarKind::Int);
    pub const NUMBER: Type = Type::Scalar(ScalarKind::Number);
    pub const STRING: Type = Type::Scalar(ScalarKind::String);

    pub fn var(name: impl Into<String>) -> Self {
        Type::Var(TypeVar::named(name))
    }

    pub fn fresh(id: u32) -> Self {
        Type::Var(TypeVar::Fresh(id))
    }

    pub fn vector(len: usize, element: Type) -> Self {
        Type::Vector {
            len,
            element: Box::new(element),
        }
    }

    pub fn matrix(rows: usize, cols: usize, element: Type) -> Self {
        Type::Matrix {
            rows,
            cols,
            element: Box::new(element),
        }
    }

    pub fn tensor(shape: impl Into<Vec<usize>>, element: Type) -> Self {
        Type::Tensor {
            shape: shape.into(),
            element: Box::new(element),
        }
    }

    pub fn function(input: Type, output: Type) -> Self {
        Type::Function(Box::new(input), Box::new(output))
    }

    pub fn sequence(element: Type) -> Self {
        Type::Sequence(Box::new(element))
    }

    pub fn strategy(state: Type, action: Type) -> Self {
        Type::Strategy {
            state: Box::new(state),
            action: Box::new(action),
        }
    }

    /// Name of the outermost variant, used in kind-mismatch reports.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Type::Scalar(_) => "Scalar",
            Type::Vector { .. } => "Vector",
            Type::Matrix { .. } => "Matrix",
            Type::Tensor { .. } => "Tensor",
            Type::Function(..) => "Function",
            Type::Var(_) => "Var",
            Type::Sequence(_) => "Sequence",
            Type::Strategy { .. } => "Strategy",
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function(..))
    }

    /// Split a function type into `(input, output)`.
    pub fn as_function(&self) -> Option<(&Type, &Type)> {
        match self {
            Type::Function(input, output) => Some((input, output)),
            _ => None,
        }
    }

    /// True when the type mentions no type variables.
    pub fn is_ground(&self) -> bool {
        self.vars_in_order().is_empty()
    }

    /// Does `var` appear anywhere inside this type?
    pub fn occurs(&self, var: &TypeVar) -> bool {
        match self {
            Type::Scalar(_) => false,
            Type::Var(v) => v == var,
            Type::Vector { element, .. }
            | Type::Matrix { element, .. }
            | Type::Tensor { element, .. }
            | Type::Sequence(element) => element.occurs(var),
            Type::Function(a, b)
            | Type::Strategy {
                state: a,
                action: b,
            } => a.occurs(var) || b.occurs(var),
        }
    }

    pub fn free_type_vars(&self) -> BTreeSet<TypeVar> {
        self.vars_in_order().into_iter().collect()
    }

    /// Variables in order of first occurrence (left to right, outside in).
    pub fn vars_in_order(&self) -> Vec<TypeVar> {
        let mut out = Vec::new();
        collect_vars(self, &mut out);
        out
    }

    /// Highest fresh variable id mentioned by this type.
    pub fn max_fresh(&self) -> Option<u32> {
        self.vars_in_order()
            .into_iter()
            .filter_map(|var| match var {
                TypeVar::Fresh(id) => Some(id),
                TypeVar::Named(_) => None,
            })
            .max()
    }

    /// Replace variables simultaneously.
    ///
    /// Unlike [`Substitution::apply`] the map need not be idempotent, which
    /// is what renamings (instantiation, canonicalization) require.
    pub fn replace_vars(&self, replacements: &BTreeMap<TypeVar, Type>) -> Type {
        match self {
            Type::Scalar(_) => self.clone(),
            Type::Var(var) => replacements
                .get(var)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Type::Vector { len, element } => Type::vector(*len, element.replace_vars(replacements)),
            Type::Matrix {
                rows,
                cols,
                element,
            } => Type::matrix(*rows, *cols, element.replace_vars(replacements)),
            Type::Tensor { shape, element } => {
                Type::tensor(shape.clone(), element.replace_vars(replacements))
            }
            Type::Function(input, output) => Type::function(
                input.replace_vars(replacements),
                output.replace_vars(replacements),
            ),
            Type::Sequence(element) => Type::sequence(element.replace_vars(replacements)),
            Type::Strategy { state, action } => Type::strategy(
                state.replace_vars(replacements),
                action.replace_vars(replacements),
            ),
        }
    }

    /// Check that an author-declared type is well formed.
    pub fn check_well_formed(&self) -> Result<(), WellFormednessError> {
        match self {
            Type::Scalar(_) => Ok(()),
            Type::Var(TypeVar::Fresh(id)) => {
                Err(WellFormednessError::FreshVariable(TypeVar::Fresh(*id)))
            }
            Type::Var(TypeVar::Named(name)) => check_var_name(name),
            Type::Tensor { shape, element } => {
                if shape.is_empty() {
                    return Err(WellFormednessError::EmptyTensorShape);
                }
                element.check_well_formed()
            }
            Type::Vector { element, .. }
            | Type::Matrix { element, .. }
            | Type::Sequence(element) => element.check_well_formed(),
            Type::Function(a, b)
            | Type::Strategy {
                state: a,
                action: b,
            } => {
                a.check_well_formed()?;
                b.check_well_formed()
            }
        }
    }
}

fn collect_vars(ty: &Type, out: &mut Vec<TypeVar>) {
    match ty {
        Type::Scalar(_) => {}
        Type::Var(v) => {
            if !out.contains(v) {
                out.push(v.clone());
            }
        }
        Type::Vector { element, .. }
        | Type::Matrix { element, .. }
        | Type::Tensor { element, .. }
        | Type::Sequence(element) => collect_vars(element, out),
        Type::Function(a, b)
        | Type::Strategy {
            state: a,
            action: b,
        } => {
            collect_vars(a, out);
            collect_vars(b, out);
        }
    }
}

fn check_var_name(name: &str) -> Result<(), WellFormednessError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(WellFormednessError::InvalidVariableName(name.to_string()))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Scalar(kind) => write!(f, "{kind}"),
            Type::Vector { len, element } => write!(f, "Vector<{len}, {element}>"),
            Type::Matrix {
                rows,
                cols,
                element,
            } => write!(f, "Matrix<{rows}, {cols}, {element}>"),
            Type::Tensor { shape, element } => {
                write!(f, "Tensor<[")?;
                for (i, dim) in shape.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{dim}")?;
                }
                write!(f, "], {element}>")
            }
            Type::Function(input, output) => {
                if input.is_function() {
                    write!(f, "({input}) -> {output}")
                } else {
                    write!(f, "{input} -> {output}")
                }
            }
            Type::Var(var) => write!(f, "{var}"),
            Type::Sequence(element) => write!(f, "Sequence<{element}>"),
            Type::Strategy { state, action } => write!(f, "Strategy<{state}, {action}>"),
        }
    }
}

/// A declared type failed the well-formedness check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WellFormednessError {
    #[error("declared types cannot mention inference variable `{0}`")]
    FreshVariable(TypeVar),
    #[error("type variable name `{0}` is not an identifier")]
    InvalidVariableName(String),
    #[error("tensor shape must have at least one dimension")]
    EmptyTensorShape,
}

// ---------------------------------------------------------------------------
// Type schemes
// ---------------------------------------------------------------------------

/// A type universally quantified over `vars`: `forall vars. ty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeScheme {
    pub vars: Vec<TypeVar>,
    pub ty: Type,
}

impl TypeScheme {
    /// Create a monomorphic scheme (no quantified variables).
    pub fn mono(ty: Type) -> Self {
        Self {
            vars: Vec::new(),
            ty,
        }
    }

    pub fn poly(vars: Vec<TypeVar>, ty: Type) -> Self {
        Self { vars, ty }
    }

    /// Quantify over every variable of `ty`.
    ///
    /// Declared symbol types are closed this way: a symbol typed
    /// `'a -> 'a` is polymorphic in `'a`.
    pub fn closed(ty: Type) -> Self {
        Self {
            vars: ty.vars_in_order(),
            ty,
        }
    }

    pub fn is_mono(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variables of the body that are not quantified.
    pub fn free_type_vars(&self) -> BTreeSet<TypeVar> {
        self.ty
            .vars_in_order()
            .into_iter()
            .filter(|var| !self.vars.contains(var))
            .collect()
    }

    pub fn max_fresh(&self) -> Option<u32> {
        let quantified = self.vars.iter().filter_map(|var| match var {
            TypeVar::Fresh(id) => Some(*id),
            TypeVar::Named(_) => None,
        });
        quantified.chain(self.ty.max_fresh()).max()
    }

    pub fn check_well_formed(&self) -> Result<(), WellFormednessError> {
        for var in &self.vars {
            match var {
                TypeVar::Fresh(_) => return Err(WellFormednessError::FreshVariable(var.clone())),
                TypeVar::Named(name) => check_var_name(name)?,
            }
        }
        self.ty.check_well_formed()
    }
}

impl From<Type> for TypeScheme {
    fn from(ty: Type) -> Self {
        TypeScheme::closed(ty)
    }
}

impl fmt::Display for TypeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.vars.is_empty() {
            return write!(f, "{}", self.ty);
        }
        write!(f, "forall")?;
        for var in &self.vars {
            write!(f, " {var}")?;
        }
        write!(f, ". {}", self.ty)
    }
}

// ---------------------------------------------------------------------------
// Substitutions
// ---------------------------------------------------------------------------

/// Maps type variables to types.
///
/// Every substitution is idempotent: no bound variable appears inside any
/// binding, so a single application is final and a variable can never be
/// reintroduced into its own binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    map: BTreeMap<TypeVar, Type>,
}

/// A binding was rejected while building a substitution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    #[error("cannot construct infinite type: {var} = {ty}")]
    Occurs { var: TypeVar, ty: Type },
    #[error("{var} is bound more than once")]
    DuplicateBinding { var: TypeVar },
    #[error("{var} is bound but also appears inside a binding")]
    NotIdempotent { var: TypeVar },
}

impl Substitution {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `[var := ty]`, occurs check included. Binding a variable to itself
    /// is the empty substitution.
    pub fn singleton(var: TypeVar, ty: Type) -> Result<Self, SubstitutionError> {
        if ty == Type::Var(var.clone()) {
            return Ok(Self::empty());
        }
        if ty.occurs(&var) {
            return Err(SubstitutionError::Occurs { var, ty });
        }
        let mut map = BTreeMap::new();
        map.insert(var, ty);
        Ok(Self { map })
    }

    /// Build a substitution from explicit bindings, enforcing unique keys,
    /// the occurs check and idempotence.
    pub fn from_bindings(
        bindings: impl IntoIterator<Item = (TypeVar, Type)>,
    ) -> Result<Self, SubstitutionError> {
        let mut map = BTreeMap::new();
        for (var, ty) in bindings {
            if ty.occurs(&var) {
                return Err(SubstitutionError::Occurs { var, ty });
            }
            if map.contains_key(&var) {
                return Err(SubstitutionError::DuplicateBinding { var });
            }
            map.insert(var, ty);
        }
        let subst = Self { map };
        match subst.first_non_idempotent() {
            Some(var) => Err(SubstitutionError::NotIdempotent { var }),
            None => Ok(subst),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn get(&self, var: &TypeVar) -> Option<&Type> {
        self.map.get(var)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&TypeVar, &Type)> {
        self.map.iter()
    }

    /// Apply this substitution to a type, replacing all bound variables.
    pub fn apply(&self, ty: &Type) -> Type {
        if self.map.is_empty() {
            return ty.clone();
        }
        self.apply_except(ty, &[])
    }

    /// Apply to a scheme body, leaving its quantified variables alone.
    pub fn apply_scheme(&self, scheme: &TypeScheme) -> TypeScheme {
        TypeScheme {
            vars: scheme.vars.clone(),
            ty: self.apply_except(&scheme.ty, &scheme.vars),
        }
    }

    fn apply_except(&self, ty: &Type, bound: &[TypeVar]) -> Type {
        match ty {
            Type::Scalar(_) => ty.clone(),
            Type::Var(var) => {
                if bound.contains(var) {
                    return ty.clone();
                }
                self.map.get(var).cloned().unwrap_or_else(|| ty.clone())
            }
            Type::Vector { len, element } => Type::Vector {
                len: *len,
                element: Box::new(self.apply_except(element, bound)),
            },
            Type::Matrix {
                rows,
                cols,
                element,
            } => Type::Matrix {
                rows: *rows,
                cols: *cols,
                element: Box::new(self.apply_except(element, bound)),
            },
            Type::Tensor { shape, element } => Type::Tensor {
                shape: shape.clone(),
                element: Box::new(self.apply_except(element, bound)),
            },
            Type::Function(input, output) => Type::Function(
                Box::new(self.apply_except(input, bound)),
                Box::new(self.apply_except(output, bound)),
            ),
            Type::Sequence(element) => {
                Type::Sequence(Box::new(self.apply_except(element, bound)))
            }
            Type::Strategy { state, action } => Type::Strategy {
                state: Box::new(self.apply_except(state, bound)),
                action: Box::new(self.apply_except(action, bound)),
            },
        }
    }

    /// Left-to-right composition: the result applies `self`, then `next`.
    ///
    /// # Panics
    ///
    /// Panics when the composite would not be idempotent. Unification
    /// only composes substitutions computed on already-substituted types,
    /// so this signals a bug in the caller rather than bad input.
    pub fn then(&self, next: &Substitution) -> Substitution {
        let mut map: BTreeMap<TypeVar, Type> = self
            .map
            .iter()
            .map(|(var, ty)| (var.clone(), next.apply(ty)))
            .collect();
        for (var, ty) in &next.map {
            map.entry(var.clone()).or_insert_with(|| ty.clone());
        }
        let composed = Substitution { map };
        if let Some(var) = composed.first_non_idempotent() {
            panic!("malformed substitution: {var} escapes into its own range");
        }
        composed
    }

    fn first_non_idempotent(&self) -> Option<TypeVar> {
        self.map.values().find_map(|ty| {
            ty.vars_in_order()
                .into_iter()
                .find(|var| self.map.contains_key(var))
        })
    }
}

impl fmt::Display for Substitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (var, ty)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var} := {ty}")?;
        }
        write!(f, "]")
    }
}

// ---------------------------------------------------------------------------
// Alpha-equivalence
// ---------------------------------------------------------------------------

/// Rename variables by first occurrence to `'a`, `'b`, ... so that types
/// differing only in variable names compare equal.
pub fn canonicalize(ty: &Type) -> Type {
    let renaming: BTreeMap<TypeVar, Type> = ty
        .vars_in_order()
        .into_iter()
        .enumerate()
        .map(|(i, var)| (var, Type::Var(TypeVar::Named(alphabetic_var_name(i)))))
        .collect();
    ty.replace_vars(&renaming)
}

/// Equal up to a consistent renaming of type variables.
pub fn alpha_equivalent(left: &Type, right: &Type) -> bool {
    canonicalize(left) == canonicalize(right)
}

/// Generate alphabetic variable names: a, b, c, ..., z, a1, b1, ...
fn alphabetic_var_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    let suffix = index / 26;
    if suffix == 0 {
        letter.to_string()
    } else {
        format!("{letter}{suffix}")
    }
}
