// ABOUTME: Dependency graph construction from resolved requirements.
// ABOUTME: Detects cycles and structural defects, and computes a deterministic topological order.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::catalog::{Bound, DeploymentTemplate, ResourceCatalog};
use crate::resolve::Resolution;
use crate::types::{DeploymentName, RequirementName, ResourceName};

/// Structural defects found while assembling a graph. Nothing executes when
/// one of these is returned.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("dependency cycle: {}", join(.0))]
    Cycle(Vec<ResourceName>),

    #[error("resource {0} is not in the catalog")]
    MissingResource(ResourceName),

    #[error("primary resource {primary} is not a member of deployment {deployment}")]
    PrimaryNotMember {
        deployment: DeploymentName,
        primary: ResourceName,
    },

    #[error(
        "deployment {deployment} does not match the closure of its primary (orphaned: [{}], missing: [{}])",
        join(.orphaned),
        join(.missing)
    )]
    ClosureMismatch {
        deployment: DeploymentName,
        orphaned: Vec<ResourceName>,
        missing: Vec<ResourceName>,
    },

    #[error("requirement {requirement} of {resource} has {count} edges, more than {max}")]
    CardinalityExceeded {
        resource: ResourceName,
        requirement: RequirementName,
        count: usize,
        max: Bound,
    },
}

fn join(names: &[ResourceName]) -> String {
    names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Directed edge from a dependent to the resource satisfying one of its requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub dependent: ResourceName,
    pub dependency: ResourceName,
    pub requirement: RequirementName,
}

/// An acyclic dependency graph with its topological order fixed at build time.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<ResourceName>,
    primary: Option<ResourceName>,
    dependencies: HashMap<ResourceName, Vec<ResourceName>>,
    dependents: HashMap<ResourceName, Vec<ResourceName>>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Dependencies before dependents; independent resources by declaration order.
    pub fn topological_order(&self) -> &[ResourceName] {
        &self.order
    }

    pub fn primary(&self) -> Option<&ResourceName> {
        self.primary.as_ref()
    }

    /// Direct dependencies of `resource`, deduplicated, in resolution order.
    pub fn dependencies_of(&self, resource: &str) -> &[ResourceName] {
        self.dependencies
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Direct dependents of `resource`.
    pub fn dependents_of(&self, resource: &str) -> &[ResourceName] {
        self.dependents
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// `resource` and everything it transitively depends on, in topological order.
    pub fn closure(&self, resource: &str) -> Vec<ResourceName> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut stack = vec![resource];
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.dependencies_of(next).iter().map(|d| d.as_str()));
            }
        }
        self.order
            .iter()
            .filter(|n| seen.contains(n.as_str()))
            .cloned()
            .collect()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.dependencies.contains_key(resource)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Turns a [`Resolution`] into a [`DependencyGraph`] over one catalog snapshot.
#[derive(Debug, Clone, Copy)]
pub struct GraphBuilder<'a> {
    catalog: &'a ResourceCatalog,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(catalog: &'a ResourceCatalog) -> Self {
        Self { catalog }
    }

    /// Build a graph over every resource in the catalog.
    pub fn build(&self, resolution: &Resolution) -> Result<DependencyGraph, GraphError> {
        let nodes: Vec<ResourceName> = self
            .catalog
            .resources()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        let edges = self.collect_edges(resolution, |_| true)?;
        let adjacency = adjacency(&nodes, &edges);

        if let Some(cycle) = find_cycle(&nodes, &adjacency) {
            return Err(GraphError::Cycle(cycle));
        }

        Ok(self.assemble(nodes, None, adjacency, edges))
    }

    /// Build the graph of one deployment.
    ///
    /// Every member must exist in the catalog, the primary must be a member,
    /// and the primary's dependency closure must equal the member set.
    pub fn build_deployment(
        &self,
        deployment: &DeploymentTemplate,
        resolution: &Resolution,
    ) -> Result<DependencyGraph, GraphError> {
        let mut nodes: Vec<ResourceName> = Vec::new();
        for member in deployment.members.iter() {
            if !self.catalog.contains(member.as_str()) {
                return Err(GraphError::MissingResource(member.clone()));
            }
            if !nodes.contains(member) {
                nodes.push(member.clone());
            }
        }
        if !self.catalog.contains(deployment.primary.as_str()) {
            return Err(GraphError::MissingResource(deployment.primary.clone()));
        }
        if !deployment.contains(deployment.primary.as_str()) {
            return Err(GraphError::PrimaryNotMember {
                deployment: deployment.name.clone(),
                primary: deployment.primary.clone(),
            });
        }

        let edges = self.collect_edges(resolution, |owner| deployment.contains(owner))?;

        // Targets outside the member set still take part in cycle detection.
        let mut reached = nodes.clone();
        for edge in &edges {
            if !reached.contains(&edge.dependency) {
                reached.push(edge.dependency.clone());
            }
        }
        let adjacency = adjacency(&reached, &edges);
        if let Some(cycle) = find_cycle(&reached, &adjacency) {
            return Err(GraphError::Cycle(cycle));
        }

        let closure = reachable(&deployment.primary, &adjacency);
        let orphaned: Vec<ResourceName> = nodes
            .iter()
            .filter(|n| !closure.contains(n.as_str()))
            .cloned()
            .collect();
        let missing: Vec<ResourceName> = reached
            .iter()
            .filter(|n| closure.contains(n.as_str()) && !deployment.contains(n.as_str()))
            .cloned()
            .collect();
        if !orphaned.is_empty() || !missing.is_empty() {
            return Err(GraphError::ClosureMismatch {
                deployment: deployment.name.clone(),
                orphaned,
                missing,
            });
        }

        Ok(self.assemble(nodes, Some(deployment.primary.clone()), adjacency, edges))
    }

    fn collect_edges(
        &self,
        resolution: &Resolution,
        include_owner: impl Fn(&str) -> bool,
    ) -> Result<Vec<DependencyEdge>, GraphError> {
        let mut edges = Vec::new();
        for resolved in resolution.iter() {
            if !include_owner(resolved.owner.as_str()) {
                continue;
            }
            let owner = self
                .catalog
                .get(resolved.owner.as_str())
                .ok_or_else(|| GraphError::MissingResource(resolved.owner.clone()))?;

            if let Some(requirement) = owner.requirement(resolved.requirement.as_str()) {
                let max = requirement.cardinality.max();
                if !max.allows(resolved.targets.len()) {
                    return Err(GraphError::CardinalityExceeded {
                        resource: resolved.owner.clone(),
                        requirement: resolved.requirement.clone(),
                        count: resolved.targets.len(),
                        max,
                    });
                }
            }

            for target in &resolved.targets {
                if !self.catalog.contains(target.as_str()) {
                    return Err(GraphError::MissingResource(target.clone()));
                }
                edges.push(DependencyEdge {
                    dependent: resolved.owner.clone(),
                    dependency: target.clone(),
                    requirement: resolved.requirement.clone(),
                });
            }
        }
        Ok(edges)
    }

    fn assemble(
        &self,
        nodes: Vec<ResourceName>,
        primary: Option<ResourceName>,
        adjacency: HashMap<ResourceName, Vec<ResourceName>>,
        edges: Vec<DependencyEdge>,
    ) -> DependencyGraph {
        let mut dependencies: HashMap<ResourceName, Vec<ResourceName>> = HashMap::new();
        let mut dependents: HashMap<ResourceName, Vec<ResourceName>> = HashMap::new();
        for node in &nodes {
            dependencies.insert(
                node.clone(),
                adjacency.get(node).cloned().unwrap_or_default(),
            );
            dependents.entry(node.clone()).or_default();
        }
        for (node, deps) in &dependencies {
            for dep in deps {
                dependents.entry(dep.clone()).or_default().push(node.clone());
            }
        }
        for list in dependents.values_mut() {
            list.sort_by_key(|n| self.position(n));
        }

        let order = self.topological_sort(&nodes, &dependencies, &dependents);
        tracing::debug!(resources = order.len(), edges = edges.len(), "built dependency graph");

        DependencyGraph {
            order,
            primary,
            dependencies,
            dependents,
            edges,
        }
    }

    /// Kahn's algorithm with the ready set ordered by declaration position.
    fn topological_sort(
        &self,
        nodes: &[ResourceName],
        dependencies: &HashMap<ResourceName, Vec<ResourceName>>,
        dependents: &HashMap<ResourceName, Vec<ResourceName>>,
    ) -> Vec<ResourceName> {
        let mut remaining: HashMap<&ResourceName, usize> = nodes
            .iter()
            .map(|n| (n, dependencies.get(n).map_or(0, Vec::len)))
            .collect();

        let mut ready: BTreeSet<(usize, &ResourceName)> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(n, _)| (self.position(n), *n))
            .collect();

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(entry) = ready.pop_first() {
            let (_, node) = entry;
            order.push(node.clone());
            for dependent in dependents.get(node).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((self.position(dependent), dependent));
                    }
                }
            }
        }
        order
    }

    fn position(&self, name: &ResourceName) -> usize {
        self.catalog.position(name.as_str()).unwrap_or(usize::MAX)
    }
}

/// Deduplicated dependency lists, preserving first-seen order.
fn adjacency(
    nodes: &[ResourceName],
    edges: &[DependencyEdge],
) -> HashMap<ResourceName, Vec<ResourceName>> {
    let mut map: HashMap<ResourceName, Vec<ResourceName>> =
        nodes.iter().map(|n| (n.clone(), Vec::new())).collect();
    for edge in edges {
        let deps = map.entry(edge.dependent.clone()).or_default();
        if !deps.contains(&edge.dependency) {
            deps.push(edge.dependency.clone());
        }
    }
    map
}

fn reachable<'a>(
    start: &'a ResourceName,
    adjacency: &'a HashMap<ResourceName, Vec<ResourceName>>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(next) = stack.pop() {
        if seen.insert(next.as_str()) {
            stack.extend(adjacency.get(next).into_iter().flatten());
        }
    }
    seen
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search over `nodes` in order; returns the first cycle found.
fn find_cycle(
    nodes: &[ResourceName],
    adjacency: &HashMap<ResourceName, Vec<ResourceName>>,
) -> Option<Vec<ResourceName>> {
    let mut marks: HashMap<&ResourceName, Mark> = HashMap::new();
    let mut stack: Vec<&ResourceName> = Vec::new();
    for node in nodes {
        if !marks.contains_key(node)
            && let Some(cycle) = visit(node, adjacency, &mut marks, &mut stack)
        {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    node: &'a ResourceName,
    adjacency: &'a HashMap<ResourceName, Vec<ResourceName>>,
    marks: &mut HashMap<&'a ResourceName, Mark>,
    stack: &mut Vec<&'a ResourceName>,
) -> Option<Vec<ResourceName>> {
    marks.insert(node, Mark::Visiting);
    stack.push(node);
    for next in adjacency.get(node).into_iter().flatten() {
        match marks.get(next) {
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| *n == next).unwrap_or(0);
                return Some(stack[start..].iter().map(|n| (*n).clone()).collect());
            }
            Some(Mark::Done) => {}
            None => {
                if let Some(cycle) = visit(next, adjacency, marks, stack) {
                    return Some(cycle);
                }
            }
        }
    }
    stack.pop();
    marks.insert(node, Mark::Done);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ConstraintMatcher;

    fn names(order: &[ResourceName]) -> Vec<&str> {
        order.iter().map(|n| n.as_str()).collect()
    }

    #[test]
    fn independent_resources_follow_declaration_order() {
        let catalog = ResourceCatalog::from_yaml(
            r#"
resources:
  - name: zeta
    type: a
  - name: alpha
    type: b
  - name: mid
    type: c
"#,
        )
        .unwrap();
        let resolution = ConstraintMatcher::new(&catalog).resolve_all().unwrap();
        let graph = GraphBuilder::new(&catalog).build(&resolution).unwrap();
        assert_eq!(names(graph.topological_order()), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn self_loop_through_explicit_match_is_a_cycle() {
        let catalog = ResourceCatalog::from_yaml(
            r#"
resources:
  - name: loop
    type: a
    requirements:
      - name: me
        match: loop
"#,
        )
        .unwrap();
        let resolution = ConstraintMatcher::new(&catalog).resolve_all().unwrap();
        let err = GraphBuilder::new(&catalog).build(&resolution).unwrap_err();
        assert_eq!(err, GraphError::Cycle(vec![ResourceName::new("loop").unwrap()]));
    }

    #[test]
    fn closure_includes_transitive_dependencies() {
        let catalog = ResourceCatalog::from_yaml(
            r#"
resources:
  - name: host
    type: compute
  - name: db
    type: database
    requirements:
      - name: host
        type: compute
  - name: app
    type: webapp
    requirements:
      - name: db
        type: database
"#,
        )
        .unwrap();
        let resolution = ConstraintMatcher::new(&catalog).resolve_all().unwrap();
        let graph = GraphBuilder::new(&catalog).build(&resolution).unwrap();

        assert_eq!(names(&graph.closure("app")), vec!["host", "db", "app"]);
        assert_eq!(names(graph.dependents_of("host")), vec!["db"]);
        assert!(graph.dependencies_of("host").is_empty());
    }
}
