//! Persistent type environments, generalization and instantiation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use phi_types::{Substitution, Type, TypeScheme, TypeVar};

/// Immutable name-to-scheme bindings.
///
/// Each `extend` pushes a frame that shares its parent, so extending never
/// copies or mutates the original environment.
#[derive(Debug, Clone, Default)]
pub struct TypeEnv {
    head: Option<Arc<Frame>>,
}

#[derive(Debug)]
struct Frame {
    name: String,
    scheme: TypeScheme,
    parent: Option<Arc<Frame>>,
}

impl TypeEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings are added in order; a later name shadows an earlier one.
    pub fn from_bindings(bindings: impl IntoIterator<Item = (String, TypeScheme)>) -> Self {
        bindings
            .into_iter()
            .fold(Self::new(), |env, (name, scheme)| env.extend(name, scheme))
    }

    pub fn extend(&self, name: impl Into<String>, scheme: TypeScheme) -> TypeEnv {
        TypeEnv {
            head: Some(Arc::new(Frame {
                name: name.into(),
                scheme,
                parent: self.head.clone(),
            })),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&TypeScheme> {
        self.frames()
            .find(|frame| frame.name == name)
            .map(|frame| &frame.scheme)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Visible bindings, innermost first. Shadowed bindings are skipped.
    pub fn bindings(&self) -> Vec<(&str, &TypeScheme)> {
        let mut seen = BTreeSet::new();
        self.frames()
            .filter(|frame| seen.insert(frame.name.as_str()))
            .map(|frame| (frame.name.as_str(), &frame.scheme))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Type variables free in any visible binding.
    pub fn free_type_vars(&self) -> BTreeSet<TypeVar> {
        self.bindings()
            .into_iter()
            .flat_map(|(_, scheme)| scheme.free_type_vars())
            .collect()
    }

    /// Highest fresh variable id mentioned anywhere in the environment.
    pub fn max_fresh(&self) -> Option<u32> {
        self.frames().filter_map(|frame| frame.scheme.max_fresh()).max()
    }

    pub fn apply_subst(&self, subst: &Substitution) -> TypeEnv {
        if subst.is_empty() {
            return self.clone();
        }
        let mut frames: Vec<&Frame> = self.frames().collect();
        frames.reverse();
        frames.into_iter().fold(TypeEnv::new(), |env, frame| {
            env.extend(frame.name.clone(), subst.apply_scheme(&frame.scheme))
        })
    }

    /// Quantify the free variables of `ty` that are not free in this
    /// environment, in order of first occurrence.
    pub fn generalize(&self, ty: &Type) -> TypeScheme {
        let env_vars = self.free_type_vars();
        let vars = ty
            .vars_in_order()
            .into_iter()
            .filter(|var| !env_vars.contains(var))
            .collect();
        TypeScheme::poly(vars, ty.clone())
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::successors(self.head.as_deref(), |frame| frame.parent.as_deref())
    }
}

/// Every fresh id up to `u32::MAX` has been handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("ran out of fresh type variables")]
pub struct FreshVarsExhausted;

/// Monotonically increasing source of fresh type variables.
#[derive(Debug, Clone)]
pub struct FreshVars {
    /// `None` once `u32::MAX` has been minted.
    next: Option<u32>,
}

impl Default for FreshVars {
    fn default() -> Self {
        Self { next: Some(0) }
    }
}

impl FreshVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start past every fresh variable already present in `env`.
    pub fn after(env: &TypeEnv) -> Self {
        Self {
            next: env.max_fresh().map_or(Some(0), |id| id.checked_add(1)),
        }
    }

    pub fn next_var(&mut self) -> Result<TypeVar, FreshVarsExhausted> {
        let id = self.next.ok_or(FreshVarsExhausted)?;
        self.next = id.checked_add(1);
        Ok(TypeVar::Fresh(id))
    }

    pub fn next_type(&mut self) -> Result<Type, FreshVarsExhausted> {
        self.next_var().map(Type::Var)
    }

    /// Number of the next variable to be minted, if any remain.
    pub fn peek(&self) -> Option<u32> {
        self.next
    }
}

/// Replace every quantified variable of `scheme` with a new fresh variable.
pub fn instantiate(scheme: &TypeScheme, fresh: &mut FreshVars) -> Result<Type, FreshVarsExhausted> {
    if scheme.is_mono() {
        return Ok(scheme.ty.clone());
    }
    let mut renaming = BTreeMap::new();
    for var in &scheme.vars {
        if !renaming.contains_key(var) {
            renaming.insert(var.clone(), fresh.next_type()?);
        }
    }
    Ok(scheme.ty.replace_vars(&renaming))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_scheme() -> TypeScheme {
        TypeScheme::closed(Type::function(Type::var("a"), Type::var("a")))
    }

    #[test]
    fn extend_leaves_original_untouched() {
        let base = TypeEnv::new().extend("x", TypeScheme::mono(Type::INT));
        let extended = base.extend("y", TypeScheme::mono(Type::STRING));
        assert!(base.lookup("y").is_none());
        assert_eq!(extended.lookup("x").unwrap().ty, Type::INT);
        assert_eq!(base.len(), 1);
        assert_eq!(extended.len(), 2);
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let env = TypeEnv::new()
            .extend("x", TypeScheme::mono(Type::INT))
            .extend("x", TypeScheme::mono(Type::STRING));
        assert_eq!(env.lookup("x").unwrap().ty, Type::STRING);
        assert_eq!(env.len(), 1);
        assert_eq!(env.bindings()[0].0, "x");
    }

    #[test]
    fn free_vars_skip_quantified_and_shadowed() {
        let env = TypeEnv::from_bindings([
            ("x".to_string(), TypeScheme::mono(Type::fresh(0))),
            ("id".to_string(), identity_scheme()),
            ("x".to_string(), TypeScheme::mono(Type::fresh(1))),
        ]);
        let free: Vec<_> = env.free_type_vars().into_iter().collect();
        assert_eq!(free, vec![TypeVar::Fresh(1)]);
        // Shadowed frames still count towards fresh numbering.
        assert_eq!(env.max_fresh(), Some(1));
    }

    #[test]
    fn apply_subst_rewrites_free_vars_only() {
        let env = TypeEnv::new()
            .extend("x", TypeScheme::mono(Type::fresh(0)))
            .extend("id", identity_scheme());
        let subst = Substitution::singleton(TypeVar::Fresh(0), Type::NUMBER).unwrap();
        let applied = env.apply_subst(&subst);
        assert_eq!(applied.lookup("x").unwrap().ty, Type::NUMBER);
        assert_eq!(applied.lookup("id").unwrap(), &identity_scheme());
        assert_eq!(env.lookup("x").unwrap().ty, Type::fresh(0));
    }

    #[test]
    fn generalize_excludes_env_vars() {
        let env = TypeEnv::new().extend("x", TypeScheme::mono(Type::fresh(0)));
        let ty = Type::function(Type::fresh(1), Type::function(Type::fresh(0), Type::fresh(2)));
        let scheme = env.generalize(&ty);
        assert_eq!(scheme.vars, vec![TypeVar::Fresh(1), TypeVar::Fresh(2)]);
    }

    #[test]
    fn instantiate_mints_distinct_vars() {
        let mut fresh = FreshVars::new();
        let first = instantiate(&identity_scheme(), &mut fresh).unwrap();
        let second = instantiate(&identity_scheme(), &mut fresh).unwrap();
        assert_eq!(first, Type::function(Type::fresh(0), Type::fresh(0)));
        assert_eq!(second, Type::function(Type::fresh(1), Type::fresh(1)));
        assert_eq!(fresh.peek(), Some(2));
    }

    #[test]
    fn instantiate_keeps_free_vars() {
        let scheme = TypeScheme::poly(
            vec![TypeVar::named("a")],
            Type::function(Type::var("a"), Type::fresh(7)),
        );
        let mut fresh = FreshVars::after(&TypeEnv::new().extend("s", scheme.clone()));
        let ty = instantiate(&scheme, &mut fresh).unwrap();
        assert_eq!(ty, Type::function(Type::fresh(8), Type::fresh(7)));
    }

    #[test]
    fn fresh_vars_stop_at_the_last_id() {
        let env = TypeEnv::new().extend("x", TypeScheme::mono(Type::fresh(u32::MAX - 1)));
        let mut fresh = FreshVars::after(&env);
        assert_eq!(fresh.next_var(), Ok(TypeVar::Fresh(u32::MAX)));
        assert_eq!(fresh.peek(), None);
        assert_eq!(fresh.next_var(), Err(FreshVarsExhausted));

        let full = TypeEnv::new().extend("x", TypeScheme::mono(Type::fresh(u32::MAX)));
        let mut fresh = FreshVars::after(&full);
        assert_eq!(instantiate(&identity_scheme(), &mut fresh), Err(FreshVarsExhausted));
        assert_eq!(
            instantiate(&TypeScheme::mono(Type::INT), &mut fresh),
            Ok(Type::INT)
        );
    }
}
