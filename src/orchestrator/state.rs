// ABOUTME: Per-resource mutable state tracked during one run.
// ABOUTME: Each resource owns its own lock, so resources never contend with each other.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::catalog::ResourceTemplate;
use crate::lifecycle::{LifecyclePhase, Operation};
use crate::readiness::{OperationalState, ReadinessState};
use crate::types::ResourceName;

/// Scheduling status of a resource within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceStatus {
    /// Not dispatched yet.
    #[default]
    Pending,
    Running,
    /// Reached the target, possibly without invoking anything.
    Completed,
    Failed,
    /// Not attempted because a prerequisite failed.
    Blocked,
    /// Stopped between operations because the run was cancelled.
    Cancelled,
}

impl ResourceStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ResourceStatus::Pending | ResourceStatus::Running)
    }

    /// Failed or blocked: dependents cannot rely on this resource.
    pub fn is_broken(&self) -> bool {
        matches!(self, ResourceStatus::Failed | ResourceStatus::Blocked)
    }
}

/// Live state of one resource. Only the task driving the resource writes it
/// while it runs; the scheduler writes it only before dispatch.
#[derive(Debug, Clone, Default)]
pub struct ResourceState {
    pub phase: LifecyclePhase,
    pub readiness: ReadinessState,
    pub status: ResourceStatus,
    /// Operations that completed in this run, in order.
    pub completed: Vec<Operation>,
    /// Invocations issued in this run, retries included.
    pub attempts: u32,
    pub outputs: BTreeMap<String, Value>,
    pub error: Option<String>,
    pub blocked_by: Vec<ResourceName>,
}

impl ResourceState {
    pub fn from_template(template: &ResourceTemplate) -> Self {
        Self {
            phase: template.phase,
            readiness: template.readiness,
            ..Self::default()
        }
    }
}

pub type StateCell = Arc<Mutex<ResourceState>>;

/// State cells for every resource in a run, keyed by name.
#[derive(Debug, Default)]
pub struct StateBoard {
    cells: HashMap<ResourceName, StateCell>,
}

impl StateBoard {
    pub fn insert(&mut self, name: ResourceName, state: ResourceState) {
        self.cells.insert(name, Arc::new(Mutex::new(state)));
    }

    pub fn cell(&self, name: &str) -> Option<&StateCell> {
        self.cells.get(name)
    }

    pub fn status(&self, name: &str) -> ResourceStatus {
        self.cells
            .get(name)
            .map(|cell| cell.lock().status)
            .unwrap_or_default()
    }

    /// Deleted, or reported as gone.
    pub fn is_removed(&self, name: &str) -> bool {
        self.cells.get(name).is_some_and(|cell| {
            let state = cell.lock();
            state.phase == LifecyclePhase::Deleted
                || state.readiness.operational() == OperationalState::Removed
        })
    }

    pub fn snapshot(&self, name: &str) -> Option<ResourceState> {
        self.cells.get(name).map(|cell| cell.lock().clone())
    }

    pub fn outputs(&self, name: &str) -> BTreeMap<String, Value> {
        self.cells
            .get(name)
            .map(|cell| cell.lock().outputs.clone())
            .unwrap_or_default()
    }
}
