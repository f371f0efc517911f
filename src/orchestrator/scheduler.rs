// ABOUTME: Dependency-gated dispatch loop for one run.
// ABOUTME: Spawns a task per ready resource, blocks dependents of failures, and joins results.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::catalog::{ResourceCatalog, ResourceTemplate};
use crate::config::OrchestratorConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::graph::DependencyGraph;
use crate::invoker::OperationInvoker;
use crate::lifecycle::{Direction, TargetState, Workflow};
use crate::readiness::{ReadinessState, ReadinessStateMapper};
use crate::types::ResourceName;

use super::plan::{prerequisites, walk_order};
use super::state::{ResourceState, ResourceStatus, StateBoard};
use super::task::{ResourceTask, TaskReport};

/// Whether a waiting resource may be dispatched.
enum Gate {
    Open,
    Wait,
    Blocked(Vec<ResourceName>),
}

pub(crate) struct Scheduler<'a> {
    pub catalog: &'a ResourceCatalog,
    pub config: &'a OrchestratorConfig,
    pub graph: &'a DependencyGraph,
    pub workflow: Workflow,
    pub mapper: Arc<ReadinessStateMapper>,
    pub invoker: Arc<dyn OperationInvoker>,
    /// Bounds the number of operations in flight across all resources.
    pub permits: Arc<Semaphore>,
    pub cancel: CancellationToken,
}

/// What the dispatch loop leaves behind.
pub(crate) struct Finished {
    pub order: Vec<ResourceName>,
    pub board: StateBoard,
    /// Resources never dispatched because the run was cancelled.
    pub undispatched: usize,
}

impl Scheduler<'_> {
    pub async fn run(&self, diagnostics: &mut Diagnostics) -> Finished {
        let direction = self.workflow.direction();
        let order = walk_order(self.graph, direction);
        tracing::info!(resources = order.len(), ?direction, "starting run");

        let mut board = StateBoard::default();
        for name in &order {
            if let Some(template) = self.catalog.get(name.as_str()) {
                board.insert(name.clone(), ResourceState::from_template(template));
            }
        }

        let mut tasks: JoinSet<TaskReport> = JoinSet::new();
        let mut running: HashMap<tokio::task::Id, ResourceName> = HashMap::new();
        let mut waiting = order.clone();

        loop {
            if !self.cancel.is_cancelled() {
                let (still_waiting, ready) = self.gate(waiting, &board, diagnostics);
                waiting = still_waiting;
                for task in ready {
                    let resource = task.resource.clone();
                    let span = tracing::info_span!("resource", resource = %resource);
                    let handle = tasks.spawn(task.run().instrument(span));
                    running.insert(handle.id(), resource);
                }
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };

            match joined {
                Ok((id, report)) => {
                    running.remove(&id);
                    tracing::debug!(resource = %report.resource, "resource task finished");
                    diagnostics.extend(report.warnings);
                }
                Err(join_error) => {
                    let Some(resource) = running.remove(&join_error.id()) else {
                        continue;
                    };
                    tracing::error!(resource = %resource, error = %join_error, "resource task aborted");
                    if let Some(cell) = board.cell(resource.as_str()) {
                        let mut state = cell.lock();
                        state.phase = state.phase.fail();
                        state.readiness = ReadinessState::Error;
                        state.status = ResourceStatus::Failed;
                        state.error = Some(format!("task aborted: {}", join_error));
                    }
                }
            }
        }

        Finished {
            order,
            board,
            undispatched: waiting.len(),
        }
    }

    /// Split waiting resources into those still waiting and tasks ready to
    /// spawn, marking the ones a failed prerequisite blocks.
    fn gate(
        &self,
        waiting: Vec<ResourceName>,
        board: &StateBoard,
        diagnostics: &mut Diagnostics,
    ) -> (Vec<ResourceName>, Vec<ResourceTask>) {
        let mut still_waiting = Vec::new();
        let mut ready = Vec::new();

        // Walk order is topological, so a resource blocked here is already
        // visible as blocked to its own dependents later in the same pass.
        for name in waiting {
            let (Some(template), Some(cell)) =
                (self.catalog.get(name.as_str()), board.cell(name.as_str()))
            else {
                continue;
            };

            match self.check_prerequisites(board, name.as_str()) {
                Gate::Wait => still_waiting.push(name),
                Gate::Blocked(by) => {
                    diagnostics.warn(Warning::blocked(
                        &name,
                        format!("not attempted: {} did not reach the target", join(&by)),
                    ));
                    let mut state = cell.lock();
                    state.status = ResourceStatus::Blocked;
                    state.blocked_by = by;
                }
                Gate::Open => {
                    let operations = {
                        let mut state = cell.lock();
                        state.status = ResourceStatus::Running;
                        self.workflow.operations_from(state.phase)
                    };
                    tracing::debug!(resource = %name, ?operations, "dispatching resource");
                    ready.push(ResourceTask {
                        resource: name.clone(),
                        resource_type: template.type_name.clone(),
                        idempotent: operations
                            .iter()
                            .copied()
                            .filter(|op| self.config.is_idempotent(template, *op))
                            .collect(),
                        operations,
                        inputs: self.inputs_for(template, board),
                        timeout: self.config.timeout_for(&template.type_name),
                        retry: self.config.retry.clone(),
                        cell: Arc::clone(cell),
                        invoker: Arc::clone(&self.invoker),
                        mapper: Arc::clone(&self.mapper),
                        permits: Arc::clone(&self.permits),
                        cancel: self.cancel.clone(),
                    });
                }
            }
        }

        (still_waiting, ready)
    }

    /// Prerequisites gate on their whole workflow. Broken prerequisites with
    /// `ignore` priority count as satisfied. When deploying, a removed
    /// dependency is never satisfied; check runs only observe.
    fn check_prerequisites(&self, board: &StateBoard, resource: &str) -> Gate {
        let direction = self.workflow.direction();
        let deploying =
            direction == Direction::Deploy && self.workflow.target() != TargetState::Checked;
        let mut blocked_by = Vec::new();
        for prerequisite in prerequisites(self.graph, direction, resource) {
            let status = match board.status(prerequisite.as_str()) {
                ResourceStatus::Completed if deploying && board.is_removed(prerequisite.as_str()) => {
                    ResourceStatus::Blocked
                }
                status => status,
            };
            let blocks = self
                .catalog
                .get(prerequisite.as_str())
                .is_none_or(|t| t.priority.blocks_dependents());

            match status {
                ResourceStatus::Completed => {}
                ResourceStatus::Failed | ResourceStatus::Blocked if !blocks => {}
                ResourceStatus::Failed | ResourceStatus::Blocked => {
                    blocked_by.push(prerequisite.clone())
                }
                ResourceStatus::Pending | ResourceStatus::Running | ResourceStatus::Cancelled => {
                    return Gate::Wait;
                }
            }
        }

        if blocked_by.is_empty() {
            Gate::Open
        } else {
            Gate::Blocked(blocked_by)
        }
    }

    /// The resource's own properties plus every direct dependency's outputs,
    /// keyed `"<dependency>.<output>"`. Teardown runs dependencies after their
    /// dependents, so only deploy walks carry outputs.
    fn inputs_for(&self, template: &ResourceTemplate, board: &StateBoard) -> BTreeMap<String, Value> {
        let mut inputs: BTreeMap<String, Value> = template
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        if self.workflow.direction() == Direction::Undeploy {
            return inputs;
        }
        for dependency in self.graph.dependencies_of(template.name.as_str()) {
            for (key, value) in board.outputs(dependency.as_str()) {
                inputs.insert(format!("{}.{}", dependency, key), value);
            }
        }
        inputs
    }
}

fn join(names: &[ResourceName]) -> String {
    names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
