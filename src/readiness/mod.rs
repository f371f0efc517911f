// ABOUTME: Normalizes heterogeneous external status reports into canonical readiness.
// ABOUTME: Exports the readiness enums, status tables, and the per-type mapper.

mod state;
mod table;

pub use state::{OperationalState, ReadinessState};
pub use table::StatusTable;

use std::collections::HashMap;

use crate::types::TypeName;

/// Result of mapping a raw status, keeping track of whether the vocabulary knew it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapped {
    pub state: ReadinessState,
    pub recognized: bool,
}

/// Maps raw status text reported by an operation into a [`ReadinessState`].
///
/// Mapping is total:
/// - a status the table maps to `absent` always yields `absent`, even with the
///   error flag set, because a resource that never existed cannot be in error;
/// - otherwise the error flag yields `error` regardless of the raw status;
/// - otherwise known statuses map through the table and unknown ones become `pending`.
///
/// Each resource type may carry its own table, overlaid on the default one.
#[derive(Debug, Clone)]
pub struct ReadinessStateMapper {
    default: StatusTable,
    per_type: HashMap<TypeName, StatusTable>,
}

impl Default for ReadinessStateMapper {
    fn default() -> Self {
        Self::new(StatusTable::builtin())
    }
}

impl ReadinessStateMapper {
    pub fn new(default: StatusTable) -> Self {
        Self {
            default,
            per_type: HashMap::new(),
        }
    }

    /// Register a vocabulary for one resource type. Entries override the default table.
    pub fn with_type_table(mut self, resource_type: TypeName, table: StatusTable) -> Self {
        let merged = self.default.merged_with(&table);
        self.per_type.insert(resource_type, merged);
        self
    }

    fn table_for(&self, resource_type: &TypeName) -> &StatusTable {
        self.per_type.get(resource_type).unwrap_or(&self.default)
    }

    pub fn map(&self, resource_type: &TypeName, raw: &str, error_present: bool) -> ReadinessState {
        self.map_detailed(resource_type, raw, error_present).state
    }

    pub fn map_detailed(&self, resource_type: &TypeName, raw: &str, error_present: bool) -> Mapped {
        map_with(self.table_for(resource_type), raw, error_present)
    }
}

/// Apply the mapping rules against a single table.
pub fn map_with(table: &StatusTable, raw: &str, error_present: bool) -> Mapped {
    let known = table.lookup(raw);

    if known == Some(ReadinessState::Absent) {
        return Mapped {
            state: ReadinessState::Absent,
            recognized: true,
        };
    }

    if error_present {
        return Mapped {
            state: ReadinessState::Error,
            recognized: known.is_some(),
        };
    }

    match known {
        Some(state) => Mapped {
            state,
            recognized: true,
        },
        None => Mapped {
            state: ReadinessState::Pending,
            recognized: false,
        },
    }
}
