// ABOUTME: Lifecycle orchestration: walks a deployment's graph and drives each resource to a target.
// ABOUTME: Dispatches independent resources concurrently and reports partial completion.

mod error;
mod plan;
mod report;
mod scheduler;
mod state;
mod task;

pub use error::{RunError, RunErrorKind};
pub use plan::PlannedStep;
pub use report::{DeploymentReport, ResourceReport, RunStatus};
pub use state::{ResourceState, ResourceStatus};

use chrono::Utc;
use snafu::{OptionExt, ResultExt};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::catalog::{DeploymentTemplate, ResourceCatalog};
use crate::config::OrchestratorConfig;
use crate::diagnostics::{Diagnostics, Warning};
use crate::graph::{DependencyGraph, GraphBuilder};
use crate::invoker::OperationInvoker;
use crate::lifecycle::{TargetState, Workflow};
use crate::readiness::ReadinessStateMapper;
use crate::resolve::{ConstraintMatcher, Resolution};

use error::{CancelledSnafu, GraphSnafu, ResolutionSnafu, UnknownDeploymentSnafu};
use plan::plan_steps;
use scheduler::Scheduler;

/// A deployment that passed resolution and graph validation.
#[derive(Debug, Clone)]
pub struct PreparedDeployment {
    pub deployment: DeploymentTemplate,
    pub resolution: Resolution,
    pub graph: DependencyGraph,
}

/// Drives deployments of one catalog snapshot.
///
/// The catalog is shared read-only, so several runs (even of the same
/// deployment) may proceed at once without interfering; each run keeps its
/// own per-resource state.
#[derive(Debug, Clone)]
pub struct LifecycleOrchestrator {
    catalog: Arc<ResourceCatalog>,
    config: OrchestratorConfig,
    mapper: Arc<ReadinessStateMapper>,
}

impl LifecycleOrchestrator {
    pub fn new(catalog: Arc<ResourceCatalog>, config: OrchestratorConfig) -> Self {
        let mapper = Arc::new(config.status_mapper());
        Self {
            catalog,
            config,
            mapper,
        }
    }

    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Resolve requirements and build the graph of `deployment` without
    /// executing anything.
    pub fn prepare(&self, deployment: &str) -> Result<PreparedDeployment, RunError> {
        let template = self
            .catalog
            .deployment(deployment)
            .context(UnknownDeploymentSnafu { name: deployment })?;

        let resolution = ConstraintMatcher::new(&self.catalog)
            .with_policy(self.config.truncation)
            .resolve_deployment(template)
            .context(ResolutionSnafu)?;

        let graph = GraphBuilder::new(&self.catalog)
            .build_deployment(template, &resolution)
            .context(GraphSnafu)?;

        Ok(PreparedDeployment {
            deployment: template.clone(),
            resolution,
            graph,
        })
    }

    /// The steps a run towards `target` would take, in walk order.
    pub fn plan(&self, deployment: &str, target: TargetState) -> Result<Vec<PlannedStep>, RunError> {
        let prepared = self.prepare(deployment)?;
        Ok(plan_steps(
            &self.catalog,
            &prepared.graph,
            Workflow::for_target(target),
        ))
    }

    /// Drive every resource of `deployment` towards `target`.
    ///
    /// Resolution and graph errors abort before anything is invoked.
    /// Operation failures do not: they are recorded per resource, block the
    /// resource's dependents, and yield a `partial` or `failed` report.
    pub async fn run(
        &self,
        deployment: &str,
        target: TargetState,
        invoker: Arc<dyn OperationInvoker>,
        cancel: CancellationToken,
    ) -> Result<DeploymentReport, RunError> {
        if cancel.is_cancelled() {
            return CancelledSnafu.fail();
        }

        let span = tracing::info_span!("deployment", name = %deployment, target = %target);
        self.run_prepared(deployment, target, invoker, cancel)
            .instrument(span)
            .await
    }

    async fn run_prepared(
        &self,
        deployment: &str,
        target: TargetState,
        invoker: Arc<dyn OperationInvoker>,
        cancel: CancellationToken,
    ) -> Result<DeploymentReport, RunError> {
        let started_at = Utc::now();
        let prepared = self.prepare(deployment)?;
        let mut diagnostics = Diagnostics::default();

        for truncated in prepared.resolution.truncated() {
            diagnostics.warn(Warning::truncated(
                &truncated.owner,
                format!(
                    "requirement {} matched {} candidates, kept the first {}",
                    truncated.requirement,
                    truncated.truncated_from.unwrap_or_default(),
                    truncated.targets.len()
                ),
            ));
        }

        let scheduler = Scheduler {
            catalog: &self.catalog,
            config: &self.config,
            graph: &prepared.graph,
            workflow: Workflow::for_target(target),
            mapper: Arc::clone(&self.mapper),
            invoker,
            permits: Arc::new(Semaphore::new(self.config.concurrency)),
            cancel: cancel.clone(),
        };
        let finished = scheduler.run(&mut diagnostics).await;

        let cancelled = cancel.is_cancelled();
        if cancelled && finished.undispatched > 0 {
            diagnostics.warn(Warning::cancelled(format!(
                "run cancelled with {} resource(s) never dispatched",
                finished.undispatched
            )));
        }

        let resources: Vec<ResourceReport> = finished
            .order
            .iter()
            .filter_map(|name| {
                let template = self.catalog.get(name.as_str())?;
                let state = finished.board.snapshot(name.as_str())?;
                Some(ResourceReport::new(
                    name.clone(),
                    template.type_name.clone(),
                    template.priority,
                    state,
                ))
            })
            .collect();

        let status = report::summarize(&resources, prepared.graph.primary(), cancelled);
        tracing::info!(%status, "run finished");

        Ok(DeploymentReport {
            deployment: prepared.deployment.name.clone(),
            target,
            status,
            resources,
            warnings: diagnostics.into_warnings(),
            host: report::hostname(),
            pid: std::process::id(),
            started_at,
            finished_at: Utc::now(),
        })
    }
}
