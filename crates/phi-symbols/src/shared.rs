//! A symbol table shared between threads.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::definition::SymbolDefinition;
use crate::error::{QueryError, RegistrationError};
use crate::events::{RegistrationEvent, RegistrationLog};
use crate::table::SymbolTable;

/// `Arc<RwLock<SymbolTable>>` with owned query results.
///
/// Registration holds the write lock only for validation and insertion;
/// queries share the read lock. A panic while holding the lock cannot
/// leave the table half-updated, so a poisoned lock is simply reused.
#[derive(Debug, Clone, Default)]
pub struct SharedSymbolTable {
    inner: Arc<RwLock<SymbolTable>>,
    /// Taken only while the table's write lock is held.
    log: Option<Arc<Mutex<RegistrationLog>>>,
}

impl SharedSymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table that logs every registration attempt.
    pub fn with_log() -> Self {
        Self {
            log: Some(Arc::default()),
            ..Self::default()
        }
    }

    pub fn register(&self, definition: SymbolDefinition) -> Result<(), RegistrationError> {
        let mut table = self.write();
        match &self.log {
            Some(log) => {
                let mut log = log.lock().unwrap_or_else(PoisonError::into_inner);
                table.register_logged(definition, &mut log)
            }
            None => table.register(definition),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<SymbolDefinition>> {
        self.read().get_shared(name)
    }

    pub fn get_level(&self, name: &str) -> Option<u8> {
        self.read().get_level(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains(name)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn get_all_dependencies(&self, name: &str) -> Vec<String> {
        owned_names(self.read().get_all_dependencies(name))
    }

    pub fn get_execution_order<I, S>(&self, names: I) -> Result<Vec<String>, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.read().get_execution_order(names).map(owned_names)
    }

    /// Execution batches as `(level, names)` pairs.
    pub fn execution_batches<I, S>(&self, names: I) -> Result<Vec<(u8, Vec<String>)>, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = self.read();
        let batches = table.execution_batches(names)?;
        Ok(batches
            .into_iter()
            .map(|batch| (batch.level, owned_names(batch.symbols)))
            .collect())
    }

    /// Logged attempts so far. Empty unless built with [`with_log`](Self::with_log).
    pub fn events(&self) -> Vec<RegistrationEvent> {
        self.log.as_ref().map_or_else(Vec::new, |log| {
            log.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .events()
                .to_vec()
        })
    }

    /// Run `f` against a consistent view of the table.
    pub fn read_with<R>(&self, f: impl FnOnce(&SymbolTable) -> R) -> R {
        f(&self.read())
    }

    /// Independent copy of the current table.
    pub fn snapshot(&self) -> SymbolTable {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, SymbolTable> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SymbolTable> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<SymbolTable> for SharedSymbolTable {
    fn from(table: SymbolTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
            log: None,
        }
    }
}

fn owned_names(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use std::thread;

    use phi_types::Type;

    use super::*;
    use crate::value::Executable;

    fn def(name: &str, level: u8, deps: &[&str]) -> SymbolDefinition {
        SymbolDefinition::new(
            name,
            level,
            Type::function(Type::NUMBER, Type::NUMBER),
            Executable::identity(),
        )
        .depends_on(deps.iter().copied())
    }

    #[test]
    fn concurrent_registration_and_queries() {
        let shared = SharedSymbolTable::new();
        shared.register(def("base", 0, &[])).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = shared.clone();
                thread::spawn(move || {
                    table
                        .register(def(&format!("op{i}"), 1 + (i % 8) as u8, &["base"]))
                        .unwrap();
                    table.get_execution_order([format!("op{i}")]).unwrap()
                })
            })
            .collect();

        for handle in handles {
            let order = handle.join().unwrap();
            assert_eq!(order.len(), 2);
            assert_eq!(order[0], "base");
        }
        assert_eq!(shared.len(), 9);
        assert_eq!(shared.read_with(|table| table.dependents("base").len()), 8);
    }

    #[test]
    fn concurrent_duplicates_admit_exactly_one() {
        let shared = SharedSymbolTable::new();
        let results: Vec<_> = (0..4)
            .map(|_| {
                let table = shared.clone();
                thread::spawn(move || table.register(def("same", 0, &[])).is_ok())
            })
            .map(|handle| handle.join().unwrap())
            .collect();
        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn snapshot_is_independent() {
        let shared = SharedSymbolTable::new();
        shared.register(def("a", 0, &[])).unwrap();
        let snapshot = shared.snapshot();
        shared.register(def("b", 1, &["a"])).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.get_all_dependencies("b"), vec!["a".to_string()]);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let shared = SharedSymbolTable::new();
        shared.register(def("a", 0, &[])).unwrap();
        let poisoner = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = poisoner.write();
            panic!("poison the lock");
        })
        .join();
        assert!(shared.contains("a"));
        shared.register(def("b", 1, &["a"])).unwrap();
        assert_eq!(shared.get_level("b"), Some(1));
    }

    #[test]
    fn shared_batches_and_events() {
        let shared = SharedSymbolTable::with_log();
        shared.register(def("a", 0, &[])).unwrap();
        shared.register(def("b", 0, &[])).unwrap();
        shared.register(def("c", 1, &["a", "b"])).unwrap();
        assert!(shared.register(def("d", 0, &["c"])).is_err());
        let batches = shared.execution_batches(["c"]).unwrap();
        assert_eq!(
            batches,
            vec![
                (0, vec!["a".to_string(), "b".to_string()]),
                (1, vec!["c".to_string()]),
            ]
        );
        let events = shared.events();
        assert_eq!(events.len(), 4);
        assert!(!events[3].is_accepted());
        assert_eq!(shared.len(), 3);
        assert!(shared.get("c").is_some());
        assert!(SharedSymbolTable::new().events().is_empty());
    }
}
