//! Registration events for observability tools.
//!
//! Events go to a caller-owned [`RegistrationLog`] passed to
//! [`SymbolTable::register_logged`](crate::SymbolTable::register_logged).
//! The table itself never records anything, so a rejected registration
//! leaves it exactly as it was.

use phi_diag::IntoDiagnostic;
use serde::Serialize;

use crate::definition::SymbolDefinition;
use crate::error::RegistrationError;

/// One `register` attempt, accepted or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationEvent {
    /// 1-based position among all attempts recorded in the log.
    pub sequence: usize,
    pub name: String,
    pub level: u8,
    pub outcome: RegistrationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationOutcome {
    Accepted,
    Rejected { code: String, message: String },
}

impl RegistrationEvent {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, RegistrationOutcome::Accepted)
    }
}

/// Append-only record of registration attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RegistrationLog {
    events: Vec<RegistrationEvent>,
}

impl RegistrationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        definition: &SymbolDefinition,
        result: &Result<(), RegistrationError>,
    ) {
        let outcome = match result {
            Ok(()) => RegistrationOutcome::Accepted,
            Err(err) => RegistrationOutcome::Rejected {
                code: err.to_diagnostic().code,
                message: err.to_string(),
            },
        };
        self.events.push(RegistrationEvent {
            sequence: self.events.len() + 1,
            name: definition.name.clone(),
            level: definition.level,
            outcome,
        });
    }

    pub fn events(&self) -> &[RegistrationEvent] {
        &self.events
    }

    pub fn rejected(&self) -> impl Iterator<Item = &RegistrationEvent> {
        self.events.iter().filter(|event| !event.is_accepted())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
