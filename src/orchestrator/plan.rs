// ABOUTME: Dry-run planning: which operations each resource would receive, and in what order.
// ABOUTME: Shares the walk order and prerequisite rules with the live scheduler.

use serde::Serialize;

use crate::catalog::ResourceCatalog;
use crate::graph::DependencyGraph;
use crate::lifecycle::{Direction, Operation, Workflow};
use crate::types::ResourceName;

/// One resource's share of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub resource: ResourceName,
    /// Empty when the resource is already at the target.
    pub operations: Vec<Operation>,
    /// Resources that must finish their own steps first.
    pub depends_on: Vec<ResourceName>,
}

/// Order in which a workflow visits the graph.
pub(crate) fn walk_order(graph: &DependencyGraph, direction: Direction) -> Vec<ResourceName> {
    let mut order = graph.topological_order().to_vec();
    if direction == Direction::Undeploy {
        order.reverse();
    }
    order
}

/// Resources that must settle before `resource` may start: its dependencies
/// when deploying, its dependents when tearing down.
pub(crate) fn prerequisites<'g>(
    graph: &'g DependencyGraph,
    direction: Direction,
    resource: &str,
) -> &'g [ResourceName] {
    match direction {
        Direction::Deploy => graph.dependencies_of(resource),
        Direction::Undeploy => graph.dependents_of(resource),
    }
}

pub(crate) fn plan_steps(
    catalog: &ResourceCatalog,
    graph: &DependencyGraph,
    workflow: Workflow,
) -> Vec<PlannedStep> {
    let direction = workflow.direction();
    walk_order(graph, direction)
        .into_iter()
        .map(|resource| {
            let operations = catalog
                .get(resource.as_str())
                .map(|template| workflow.operations_from(template.phase))
                .unwrap_or_default();
            let depends_on = prerequisites(graph, direction, resource.as_str()).to_vec();
            PlannedStep {
                resource,
                operations,
                depends_on,
            }
        })
        .collect()
}
