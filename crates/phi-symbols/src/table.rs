//! The leveled symbol table.
//!
//! Every symbol sits on a level in `0..=8` and may only depend on symbols at
//! strictly lower levels. That single rule keeps the dependency graph
//! acyclic, so ordering queries never need cycle detection.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::definition::{LEVEL_COUNT, MAX_LEVEL, SymbolDefinition};
use crate::error::{QueryError, RegistrationError};
use crate::events::RegistrationLog;

/// Symbols grouped for dispatch. No symbol in a batch depends on another
/// symbol of the same batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionBatch<'a> {
    pub level: u8,
    pub symbols: Vec<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Name -> definition, in registration order.
    symbols: IndexMap<String, Arc<SymbolDefinition>>,
    /// Names per level, in registration order.
    levels: [Vec<String>; LEVEL_COUNT],
    /// Reverse edges: name -> symbols that declared it as a dependency.
    dependents: IndexMap<String, IndexSet<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert a definition. Either every index is updated or
    /// none is.
    pub fn register(&mut self, definition: SymbolDefinition) -> Result<(), RegistrationError> {
        self.validate(&definition)?;
        self.insert(definition);
        Ok(())
    }

    /// [`register`](Self::register), recording the attempt in `log`
    /// whether or not it succeeds.
    pub fn register_logged(
        &mut self,
        definition: SymbolDefinition,
        log: &mut RegistrationLog,
    ) -> Result<(), RegistrationError> {
        let result = self.validate(&definition);
        log.record(&definition, &result);
        result?;
        self.insert(definition);
        Ok(())
    }

    fn insert(&mut self, definition: SymbolDefinition) {
        let name = definition.name.clone();
        self.levels[usize::from(definition.level)].push(name.clone());
        for dependency in &definition.dependencies {
            self.dependents
                .entry(dependency.clone())
                .or_default()
                .insert(name.clone());
        }
        self.symbols.insert(name, Arc::new(definition));
    }

    fn validate(&self, definition: &SymbolDefinition) -> Result<(), RegistrationError> {
        let name = &definition.name;
        if self.symbols.contains_key(name) {
            return Err(RegistrationError::DuplicateSymbol { name: name.clone() });
        }
        if definition.level > MAX_LEVEL {
            return Err(RegistrationError::LevelOutOfRange {
                name: name.clone(),
                level: definition.level,
            });
        }
        if let Some(dependency) = definition
            .dependencies
            .iter()
            .find(|dependency| !self.symbols.contains_key(dependency.as_str()))
        {
            return Err(RegistrationError::UnknownDependency {
                name: name.clone(),
                dependency: dependency.clone(),
            });
        }
        definition
            .scheme
            .check_well_formed()
            .map_err(|source| RegistrationError::MalformedType {
                name: name.clone(),
                source,
            })?;
        for dependency in &definition.dependencies {
            let dependency_level = self.symbols[dependency.as_str()].level;
            if dependency_level >= definition.level {
                return Err(RegistrationError::LevelViolation {
                    name: name.clone(),
                    level: definition.level,
                    dependency: dependency.clone(),
                    dependency_level,
                });
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&SymbolDefinition> {
        self.symbols.get(name).map(Arc::as_ref)
    }

    /// Shared handle to a definition, for callers that outlive a borrow.
    pub fn get_shared(&self, name: &str) -> Option<Arc<SymbolDefinition>> {
        self.symbols.get(name).cloned()
    }

    pub fn get_level(&self, name: &str) -> Option<u8> {
        self.get(name).map(|definition| definition.level)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// All definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &SymbolDefinition> {
        self.symbols.values().map(Arc::as_ref)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    /// Definitions at `level`, in registration order. Empty for levels
    /// outside `0..=8`.
    pub fn symbols_at_level(&self, level: u8) -> Vec<&SymbolDefinition> {
        self.levels
            .get(usize::from(level))
            .map(|names| names.iter().filter_map(|name| self.get(name)).collect())
            .unwrap_or_default()
    }

    /// Symbols that list `name` as a direct dependency, in registration order.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.dependents
            .get(name)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Dependency queries
    // -----------------------------------------------------------------------

    /// Every transitive dependency of `name`, depth first in declared order,
    /// excluding `name` itself. Unknown names have no dependencies.
    pub fn get_all_dependencies(&self, name: &str) -> Vec<&str> {
        let Some(root) = self.get(name) else {
            return Vec::new();
        };
        let mut visited: HashSet<&str> = HashSet::from([root.name.as_str()]);
        let mut order = Vec::new();
        let mut stack: Vec<&str> = root.dependencies.iter().rev().map(String::as_str).collect();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some((key, definition)) = self.symbols.get_key_value(current) else {
                continue;
            };
            order.push(key.as_str());
            stack.extend(definition.dependencies.iter().rev().map(String::as_str));
        }
        order
    }

    /// Order in which `names` and everything they depend on can run.
    ///
    /// Dependencies always come before their dependents. Among symbols that
    /// are ready at the same time, lower levels go first, then earlier
    /// registrations.
    pub fn get_execution_order<I, S>(&self, names: I) -> Result<Vec<&str>, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let closure = self.closure(names)?;

        // In-degree counts distinct dependencies; every dependency of a
        // closure member is itself in the closure.
        let mut pending: Vec<usize> = closure
            .iter()
            .map(|&index| self.distinct_dependencies(index).len())
            .collect();
        let position = |index: usize| closure.get_index_of(&index);

        let mut ready: BTreeSet<(u8, usize)> = closure
            .iter()
            .zip(&pending)
            .filter(|&(_, &count)| count == 0)
            .map(|(&index, _)| (self.level_at(index), index))
            .collect();

        let mut order = Vec::with_capacity(closure.len());
        while let Some((_, index)) = ready.pop_first() {
            let Some((name, _)) = self.symbols.get_index(index) else {
                continue;
            };
            order.push(name.as_str());
            for dependent in self.dependents(name) {
                let Some(dependent_index) = self.symbols.get_index_of(dependent) else {
                    continue;
                };
                let Some(slot) = position(dependent_index) else {
                    continue;
                };
                pending[slot] -= 1;
                if pending[slot] == 0 {
                    ready.insert((self.level_at(dependent_index), dependent_index));
                }
            }
        }
        Ok(order)
    }

    /// [`SymbolTable::get_execution_order`] grouped by level.
    pub fn execution_batches<I, S>(&self, names: I) -> Result<Vec<ExecutionBatch<'_>>, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut batches: Vec<ExecutionBatch<'_>> = Vec::new();
        for name in self.get_execution_order(names)? {
            let level = self.symbols[name].level;
            match batches.last_mut() {
                Some(batch) if batch.level == level => batch.symbols.push(name),
                _ => batches.push(ExecutionBatch {
                    level,
                    symbols: vec![name],
                }),
            }
        }
        Ok(batches)
    }

    /// Table indices of `names` plus all transitive dependencies.
    fn closure<I, S>(&self, names: I) -> Result<IndexSet<usize>, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut closure = IndexSet::new();
        let mut stack = Vec::new();
        for name in names {
            let name = name.as_ref();
            let index = self
                .symbols
                .get_index_of(name)
                .ok_or_else(|| QueryError::UnknownSymbol {
                    name: name.to_string(),
                })?;
            stack.push(index);
        }
        while let Some(index) = stack.pop() {
            if closure.insert(index) {
                stack.extend(self.distinct_dependencies(index));
            }
        }
        Ok(closure)
    }

    fn distinct_dependencies(&self, index: usize) -> IndexSet<usize> {
        self.symbols
            .get_index(index)
            .map(|(_, definition)| {
                definition
                    .dependencies
                    .iter()
                    .filter_map(|dependency| self.symbols.get_index_of(dependency.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn level_at(&self, index: usize) -> u8 {
        self.symbols
            .get_index(index)
            .map_or(0, |(_, definition)| definition.level)
    }
}

#[cfg(test)]
mod tests {
    use phi_diag::IntoDiagnostic;
    use phi_types::Type;

    use super::*;
    use crate::complexity::Complexity;
    use crate::definition::SymbolMetadata;
    use crate::events::RegistrationOutcome;
    use crate::value::{Executable, Value};

    fn num_fn() -> Type {
        Type::function(Type::NUMBER, Type::NUMBER)
    }

    fn def(name: &str, level: u8, deps: &[&str]) -> SymbolDefinition {
        SymbolDefinition::new(name, level, num_fn(), Executable::identity())
            .depends_on(deps.iter().copied())
    }

    /// add(0), double(1, add), add2(2, add double)
    fn arithmetic() -> SymbolTable {
        let mut table = SymbolTable::new();
        table.register(def("add", 0, &[])).unwrap();
        table.register(def("double", 1, &["add"])).unwrap();
        table.register(def("add2", 2, &["add", "double"])).unwrap();
        table
    }

    #[test]
    fn register_then_get() {
        let table = arithmetic();
        let add2 = table.get("add2").unwrap();
        assert_eq!(add2.level, 2);
        assert_eq!(add2.dependencies, vec!["add", "double"]);
        assert_eq!(table.get_level("double"), Some(1));
        assert_eq!(table.len(), 3);
        assert!(table.contains("add"));
        assert!(table.get("mul").is_none());
    }

    #[test]
    fn metadata_survives_registration() {
        let mut table = SymbolTable::new();
        let metadata = SymbolMetadata {
            complexity: Some(Complexity::Linear),
            ..SymbolMetadata::default()
        };
        table
            .register(
                def("sum", 0, &[])
                    .with_metadata(metadata)
                    .with_tag("reduction")
                    .with_tag("numeric"),
            )
            .unwrap();
        let sum = table.get("sum").unwrap();
        assert_eq!(sum.metadata.complexity, Some(Complexity::Linear));
        assert!(sum.metadata.pure);
        assert_eq!(sum.metadata.tags, vec!["reduction", "numeric"]);
    }

    #[test]
    fn duplicate_is_rejected() {
        let mut table = arithmetic();
        let err = table.register(def("add", 3, &[])).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::DuplicateSymbol {
                name: "add".into()
            }
        );
        assert_eq!(table.get_level("add"), Some(0));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut table = arithmetic();
        let err = table.register(def("f", 3, &["add", "mul"])).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::UnknownDependency {
                name: "f".into(),
                dependency: "mul".into(),
            }
        );
        assert_eq!(table.len(), 3);
        assert!(table.dependents("add").iter().all(|name| *name != "f"));
    }

    #[test]
    fn level_violation_leaves_table_unchanged() {
        let mut table = arithmetic();
        let err = table.register(def("bad", 1, &["add", "double"])).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::LevelViolation {
                name: "bad".into(),
                level: 1,
                dependency: "double".into(),
                dependency_level: 1,
            }
        );
        assert_eq!(table.len(), 3);
        assert_eq!(table.symbols_at_level(1).len(), 1);
        assert_eq!(table.dependents("add"), vec!["double", "add2"]);
    }

    #[test]
    fn level_out_of_range() {
        let mut table = SymbolTable::new();
        let err = table.register(def("high", 9, &[])).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::LevelOutOfRange {
                name: "high".into(),
                level: 9
            }
        );
        assert_eq!(err.to_diagnostic().code, "E0102");
        assert!(table.is_empty());
    }

    #[test]
    fn malformed_type_is_rejected() {
        let mut table = SymbolTable::new();
        let leaky = SymbolDefinition::new(
            "leaky",
            0,
            Type::function(Type::fresh(0), Type::NUMBER),
            Executable::identity(),
        );
        let err = table.register(leaky).unwrap_err();
        assert!(matches!(err, RegistrationError::MalformedType { .. }));
        assert_eq!(err.to_diagnostic().code, "E0104");
    }

    #[test]
    fn full_chain_registers() {
        let mut table = SymbolTable::new();
        table.register(def("s0", 0, &[])).unwrap();
        for level in 1..=MAX_LEVEL {
            let prev = format!("s{}", level - 1);
            table
                .register(def(&format!("s{level}"), level, &[prev.as_str()]))
                .unwrap();
        }
        assert_eq!(table.len(), LEVEL_COUNT);
        assert_eq!(table.get_all_dependencies("s8").len(), 8);
    }

    #[test]
    fn ground_symbol_cannot_depend_upwards() {
        let mut table = SymbolTable::new();
        table.register(def("five", 5, &[])).unwrap();
        let err = table.register(def("zero", 0, &["five"])).unwrap_err();
        assert!(matches!(err, RegistrationError::LevelViolation { .. }));
    }

    #[test]
    fn duplicate_dependency_entries_are_accepted() {
        let mut table = arithmetic();
        table.register(def("twice", 3, &["add", "add"])).unwrap();
        assert_eq!(table.dependents("add"), vec!["double", "add2", "twice"]);
        let order = table.get_execution_order(["twice"]).unwrap();
        assert_eq!(order, vec!["add", "twice"]);
    }

    #[test]
    fn symbols_at_level_and_dependents() {
        let table = arithmetic();
        let names: Vec<_> = table
            .symbols_at_level(0)
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["add"]);
        assert!(table.symbols_at_level(7).is_empty());
        assert!(table.symbols_at_level(200).is_empty());
        assert_eq!(table.dependents("double"), vec!["add2"]);
        assert!(table.dependents("nope").is_empty());
    }

    #[test]
    fn all_dependencies_depth_first() {
        let mut table = SymbolTable::new();
        table.register(def("a", 0, &[])).unwrap();
        table.register(def("b", 0, &[])).unwrap();
        table.register(def("c", 1, &["a"])).unwrap();
        table.register(def("d", 2, &["c", "b"])).unwrap();
        table.register(def("e", 3, &["d", "a"])).unwrap();
        assert_eq!(table.get_all_dependencies("e"), vec!["d", "c", "a", "b"]);
        assert!(table.get_all_dependencies("a").is_empty());
        assert!(table.get_all_dependencies("missing").is_empty());
    }

    #[test]
    fn execution_order_puts_dependencies_first() {
        let table = arithmetic();
        let order = table.get_execution_order(["add2"]).unwrap();
        assert_eq!(order, vec!["add", "double", "add2"]);

        let order = table.get_execution_order(["double", "add"]).unwrap();
        assert_eq!(order, vec!["add", "double"]);
    }

    #[test]
    fn execution_order_breaks_ties_by_level_then_registration() {
        let mut table = SymbolTable::new();
        table.register(def("z", 0, &[])).unwrap();
        table.register(def("y", 1, &["z"])).unwrap();
        table.register(def("a", 0, &[])).unwrap();
        table.register(def("top", 2, &["y", "a"])).unwrap();
        let order = table.get_execution_order(["top"]).unwrap();
        assert_eq!(order, vec!["z", "a", "y", "top"]);
    }

    #[test]
    fn execution_order_unknown_symbol() {
        let table = arithmetic();
        let err = table.get_execution_order(["add", "mul"]).unwrap_err();
        assert_eq!(err, QueryError::UnknownSymbol { name: "mul".into() });
        assert_eq!(err.to_diagnostic().code, "E0105");
    }

    #[test]
    fn execution_batches_group_by_level() {
        let mut table = arithmetic();
        table.register(def("neg", 0, &[])).unwrap();
        table.register(def("both", 3, &["add2", "neg"])).unwrap();
        let batches = table.execution_batches(["both"]).unwrap();
        let shape: Vec<(u8, Vec<&str>)> = batches
            .into_iter()
            .map(|batch| (batch.level, batch.symbols))
            .collect();
        assert_eq!(
            shape,
            vec![
                (0, vec!["add", "neg"]),
                (1, vec!["double"]),
                (2, vec!["add2"]),
                (3, vec!["both"]),
            ]
        );
    }

    #[test]
    fn logged_registration_records_every_attempt() {
        let mut log = RegistrationLog::new();
        let mut table = SymbolTable::new();
        table.register_logged(def("add", 0, &[]), &mut log).unwrap();
        let _ = table.register_logged(def("bad", 0, &["add"]), &mut log);

        let events = log.events();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_accepted());
        assert_eq!(events[1].sequence, 2);
        assert_eq!(
            events[1].outcome,
            RegistrationOutcome::Rejected {
                code: "E0103".into(),
                message: "`bad` (level 0) cannot depend on `add` (level 0)".into(),
            }
        );
        assert_eq!(log.rejected().count(), 1);
        let json = serde_json::to_value(&events[1]).unwrap();
        assert_eq!(json["outcome"]["status"], "rejected");
        assert_eq!(json["outcome"]["code"], "E0103");
    }

    #[test]
    fn rejected_registration_leaves_table_unchanged() {
        let mut log = RegistrationLog::new();
        let mut table = SymbolTable::new();
        table.register_logged(def("add", 0, &[]), &mut log).unwrap();
        table.register_logged(def("double", 1, &["add"]), &mut log).unwrap();

        let names_before: Vec<String> = table.names().map(str::to_string).collect();
        let debug_before = format!("{table:?}");
        let rejected = [
            def("add", 3, &[]),
            def("bad", 1, &["double"]),
            def("far", 9, &[]),
            def("lost", 2, &["missing"]),
        ];
        for definition in rejected {
            assert!(table.register_logged(definition, &mut log).is_err());
        }

        assert_eq!(log.len(), 6);
        assert_eq!(log.rejected().count(), 4);
        assert_eq!(format!("{table:?}"), debug_before);
        assert_eq!(
            table.names().map(str::to_string).collect::<Vec<_>>(),
            names_before
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.get_level("add"), Some(0));
        assert_eq!(table.dependents("add"), vec!["double"]);
        assert_eq!(table.dependents("double"), Vec::<&str>::new());
        assert!(table.symbols_at_level(1).iter().all(|d| d.name == "double"));
    }

    #[test]
    fn registered_executable_is_shared() {
        let double = Executable::new(|v| {
            Ok(Value::Number(v.as_number().unwrap_or_default() * 2.0))
        });
        let mut table = SymbolTable::new();
        table
            .register(SymbolDefinition::new("double", 0, num_fn(), double.clone()))
            .unwrap();
        let stored = table.get("double").unwrap();
        assert!(stored.executable.ptr_eq(&double));
        assert_eq!(
            stored.executable.call(&Value::Number(2.0)).unwrap(),
            Value::Number(4.0)
        );
    }
}
