// ABOUTME: Deployment-level result of a run, consumable by a presentation layer.
// ABOUTME: Carries overall status, per-resource outcome, warnings, and run metadata.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::catalog::Priority;
use crate::diagnostics::Warning;
use crate::lifecycle::{LifecyclePhase, Operation, TargetState};
use crate::readiness::{OperationalState, ReadinessState};
use crate::types::{DeploymentName, ResourceName, TypeName};

use super::state::{ResourceState, ResourceStatus};

/// Overall outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every resource that matters reached the target.
    Complete,
    /// Some resources reached the target while others failed or were blocked.
    Partial,
    /// The primary failed, or nothing reached the target.
    Failed,
    /// Cancellation stopped the run before every resource settled.
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Complete => "complete",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final state of one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReport {
    pub name: ResourceName,
    #[serde(rename = "type")]
    pub type_name: TypeName,
    pub priority: Priority,
    pub status: ResourceStatus,
    pub phase: LifecyclePhase,
    pub readiness: ReadinessState,
    /// Scheduling view of readiness; blocked resources report `degraded`.
    pub operational: OperationalState,
    pub operations: Vec<Operation>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocked_by: Vec<ResourceName>,
}

impl ResourceReport {
    pub(crate) fn new(
        name: ResourceName,
        type_name: TypeName,
        priority: Priority,
        state: ResourceState,
    ) -> Self {
        let operational = match state.status {
            ResourceStatus::Blocked => OperationalState::Degraded,
            ResourceStatus::Failed => OperationalState::Failed,
            _ => state.readiness.operational(),
        };
        Self {
            name,
            type_name,
            priority,
            status: state.status,
            phase: state.phase,
            readiness: state.readiness,
            operational,
            operations: state.completed,
            attempts: state.attempts,
            outputs: state.outputs,
            error: state.error,
            blocked_by: state.blocked_by,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub deployment: DeploymentName,
    pub target: TargetState,
    pub status: RunStatus,
    /// In the order the run walked the graph.
    pub resources: Vec<ResourceReport>,
    pub warnings: Vec<Warning>,
    /// Hostname of the machine that ran the orchestrator.
    pub host: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DeploymentReport {
    pub fn resource(&self, name: &str) -> Option<&ResourceReport> {
        self.resources.iter().find(|r| r.name.as_str() == name)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub(crate) fn hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

/// Aggregate per-resource outcomes into an overall status.
///
/// `ignore`-priority resources never affect the result. A failed primary
/// fails the run unless the primary itself is optional.
pub(crate) fn summarize(
    resources: &[ResourceReport],
    primary: Option<&ResourceName>,
    cancelled: bool,
) -> RunStatus {
    let counted: Vec<&ResourceReport> = resources
        .iter()
        .filter(|r| r.priority != Priority::Ignore)
        .collect();

    if cancelled && counted.iter().any(|r| !r.status.is_settled() || r.status == ResourceStatus::Cancelled) {
        return RunStatus::Cancelled;
    }

    if counted.iter().all(|r| r.status == ResourceStatus::Completed) {
        return RunStatus::Complete;
    }

    let primary_failed = counted.iter().any(|r| {
        Some(&r.name) == primary
            && r.priority == Priority::Required
            && r.status == ResourceStatus::Failed
    });
    let any_completed = counted.iter().any(|r| r.status == ResourceStatus::Completed);
    let any_required_failed = counted
        .iter()
        .any(|r| r.priority == Priority::Required && r.status.is_broken());

    if primary_failed || (!any_completed && any_required_failed) {
        RunStatus::Failed
    } else {
        RunStatus::Partial
    }
}
