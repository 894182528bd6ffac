//! Symbol definitions: a named, leveled, typed operation and its metadata.

use phi_types::{Type, TypeScheme};

use crate::complexity::Complexity;
use crate::value::Executable;

/// Highest valid level. Levels range over `0..=MAX_LEVEL`.
pub const MAX_LEVEL: u8 = 8;

/// Number of level buckets in a table.
pub const LEVEL_COUNT: usize = MAX_LEVEL as usize + 1;

/// Descriptive data that does not take part in validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMetadata {
    pub complexity: Option<Complexity>,
    pub pure: bool,
    pub tags: Vec<String>,
}

impl Default for SymbolMetadata {
    fn default() -> Self {
        Self {
            complexity: None,
            pure: true,
            tags: Vec::new(),
        }
    }
}

/// An operation offered for registration.
///
/// The declared type is closed over its variables, so `'a -> 'a` declares
/// a polymorphic symbol. Dependencies keep their declared order.
#[derive(Debug, Clone)]
pub struct SymbolDefinition {
    pub name: String,
    pub level: u8,
    pub scheme: TypeScheme,
    pub dependencies: Vec<String>,
    pub executable: Executable,
    pub metadata: SymbolMetadata,
}

impl SymbolDefinition {
    pub fn new(
        name: impl Into<String>,
        level: u8,
        ty: impl Into<TypeScheme>,
        executable: Executable,
    ) -> Self {
        Self {
            name: name.into(),
            level,
            scheme: ty.into(),
            dependencies: Vec::new(),
            executable,
            metadata: SymbolMetadata::default(),
        }
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    pub fn with_metadata(mut self, metadata: SymbolMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.metadata.complexity = Some(complexity);
        self
    }

    pub fn impure(mut self) -> Self {
        self.metadata.pure = false;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.metadata.tags.push(tag.into());
        self
    }

    /// Declared type, without its quantifier.
    pub fn ty(&self) -> &Type {
        &self.scheme.ty
    }
}
