// ABOUTME: Diagnostics accumulator for non-fatal warnings during a run.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

use serde::Serialize;

use crate::types::ResourceName;

/// Collects non-fatal warnings during orchestration.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        match &warning.resource {
            Some(resource) => tracing::warn!(resource = %resource, kind = ?warning.kind, "{}", warning.message),
            None => tracing::warn!(kind = ?warning.kind, "{}", warning.message),
        }
        self.warnings.push(warning);
    }

    /// Record several warnings at once.
    pub fn extend(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        for warning in warnings {
            self.warn(warning);
        }
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }
}

/// A non-fatal warning collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceName>,
    pub message: String,
}

impl Warning {
    fn new(kind: WarningKind, resource: &ResourceName, message: impl Into<String>) -> Self {
        Self {
            kind,
            resource: Some(resource.clone()),
            message: message.into(),
        }
    }

    /// More candidates matched than a requirement allows; the extras were dropped.
    pub fn truncated(resource: &ResourceName, message: impl Into<String>) -> Self {
        Self::new(WarningKind::Truncated, resource, message)
    }

    /// An invoker reported a status the vocabulary does not know.
    pub fn unrecognized_status(resource: &ResourceName, message: impl Into<String>) -> Self {
        Self::new(WarningKind::UnrecognizedStatus, resource, message)
    }

    /// An idempotent operation failed and was attempted again.
    pub fn retried(resource: &ResourceName, message: impl Into<String>) -> Self {
        Self::new(WarningKind::Retried, resource, message)
    }

    /// A resource was not attempted because a dependency failed.
    pub fn blocked(resource: &ResourceName, message: impl Into<String>) -> Self {
        Self::new(WarningKind::Blocked, resource, message)
    }

    /// The run was cancelled before every resource was dispatched.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Cancelled,
            resource: None,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WarningKind {
    Truncated,
    UnrecognizedStatus,
    Retried,
    Blocked,
    Cancelled,
}
