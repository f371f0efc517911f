// ABOUTME: Data-driven vocabulary mapping raw status text to readiness states.
// ABOUTME: Tables are plain maps so they can be loaded from configuration per resource type.

use serde::Deserialize;
use std::collections::HashMap;

use super::state::ReadinessState;

/// Lookup table from raw status strings to canonical readiness states.
///
/// Keys are matched case-insensitively after trimming surrounding whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "HashMap<String, ReadinessState>")]
pub struct StatusTable {
    entries: HashMap<String, ReadinessState>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in vocabulary: every canonical name plus the synonyms
    /// container runtimes and cloud APIs commonly report.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for state in ReadinessState::ALL {
            table.insert(state.as_str(), state);
        }

        let synonyms = [
            ("created", ReadinessState::Initial),
            ("new", ReadinessState::Initial),
            ("provisioning", ReadinessState::Starting),
            ("restarting", ReadinessState::Starting),
            ("running", ReadinessState::Started),
            ("active", ReadinessState::Started),
            ("up", ReadinessState::Started),
            ("healthy", ReadinessState::Ok),
            ("ready", ReadinessState::Ok),
            ("in-sync", ReadinessState::Ok),
            ("exited", ReadinessState::Stopped),
            ("paused", ReadinessState::Stopped),
            ("inactive", ReadinessState::Stopped),
            ("removing", ReadinessState::Deleting),
            ("terminating", ReadinessState::Deleting),
            ("removed", ReadinessState::Deleted),
            ("terminated", ReadinessState::Deleted),
            ("failed", ReadinessState::Error),
            ("dead", ReadinessState::Error),
            ("unhealthy", ReadinessState::Error),
            ("not-found", ReadinessState::Absent),
            ("notfound", ReadinessState::Absent),
            ("missing", ReadinessState::Absent),
            ("nonexistent", ReadinessState::Absent),
        ];
        for (raw, state) in synonyms {
            table.insert(raw, state);
        }
        table
    }

    pub fn insert(&mut self, raw: &str, state: ReadinessState) {
        self.entries.insert(normalize(raw), state);
    }

    /// Look up a raw status; `None` when the vocabulary does not know it.
    pub fn lookup(&self, raw: &str) -> Option<ReadinessState> {
        self.entries.get(&normalize(raw)).copied()
    }

    /// Overlay `other` on top of this table; its entries win.
    pub fn merged_with(&self, other: &StatusTable) -> StatusTable {
        let mut merged = self.clone();
        merged
            .entries
            .extend(other.entries.iter().map(|(k, v)| (k.clone(), *v)));
        merged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, ReadinessState>> for StatusTable {
    fn from(raw: HashMap<String, ReadinessState>) -> Self {
        let mut table = StatusTable::new();
        for (key, state) in raw {
            table.insert(&key, state);
        }
        table
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
