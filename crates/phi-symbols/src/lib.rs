//! Leveled symbol table for the phi symbol core.
//!
//! A [`SymbolTable`] owns named operation definitions, each placed on a level
//! in `0..=8`. Registration validates that every dependency already exists
//! and sits on a strictly lower level, which keeps the dependency graph
//! acyclic. The table answers dependency queries and produces deterministic
//! execution orders and per-level batches.
//!
//! There is no global registry: tables are constructed and owned explicitly,
//! and [`SharedSymbolTable`] wraps one for concurrent use.

pub mod complexity;
pub mod definition;
pub mod error;
pub mod events;
pub mod shared;
pub mod table;
pub mod value;

pub use complexity::Complexity;
pub use definition::{LEVEL_COUNT, MAX_LEVEL, SymbolDefinition, SymbolMetadata};
pub use error::{QueryError, RegistrationError};
pub use events::{RegistrationEvent, RegistrationLog, RegistrationOutcome};
pub use shared::SharedSymbolTable;
pub use table::{ExecutionBatch, SymbolTable};
pub use value::{ExecError, Executable, Value};
