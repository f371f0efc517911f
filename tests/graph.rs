// ABOUTME: Integration and property tests for dependency graph construction.
// ABOUTME: Tests topological ordering, cycle detection, and deployment closure checks.

use proptest::prelude::*;
use rigging::ResourceCatalog;
use rigging::catalog::{Requirement, ResourceTemplate};
use rigging::graph::*;
use rigging::resolve::{ConstraintMatcher, Resolution, ResolvedRequirement};
use rigging::types::{RequirementName, ResourceName, TypeName};
use std::collections::HashMap;

fn names(list: &[ResourceName]) -> Vec<&str> {
    list.iter().map(|n| n.as_str()).collect()
}

fn deployment_graph(yaml: &str, deployment: &str) -> Result<DependencyGraph, GraphError> {
    let catalog = ResourceCatalog::from_yaml(yaml).unwrap();
    let template = catalog.deployment(deployment).unwrap();
    let resolution = ConstraintMatcher::new(&catalog)
        .resolve_deployment(template)
        .unwrap();
    GraphBuilder::new(&catalog).build_deployment(template, &resolution)
}

// =============================================================================
// Ordering
// =============================================================================

const CHAIN: &str = r#"
resources:
  - name: app
    type: webapp
    requirements:
      - name: db
        type: database
  - name: db
    type: database
    requirements:
      - name: host
        type: compute
  - name: host
    type: compute
  - name: monitor
    type: probe
    requirements:
      - name: host
        type: compute
deployments:
  - name: stack
    primary: app
    members: [app, db, host]
"#;

/// Test: Dependencies come before dependents regardless of declaration order.
#[test]
fn dependencies_precede_dependents() {
    let graph = deployment_graph(CHAIN, "stack").unwrap();
    assert_eq!(names(graph.topological_order()), vec!["host", "db", "app"]);
    assert_eq!(graph.primary().unwrap().as_str(), "app");
    assert_eq!(graph.len(), 3);
}

/// Test: Edge lookups in both directions.
#[test]
fn dependencies_and_dependents() {
    let catalog = ResourceCatalog::from_yaml(CHAIN).unwrap();
    let resolution = ConstraintMatcher::new(&catalog).resolve_all().unwrap();
    let graph = GraphBuilder::new(&catalog).build(&resolution).unwrap();

    assert_eq!(names(graph.dependencies_of("db")), vec!["host"]);
    assert_eq!(names(graph.dependents_of("host")), vec!["db", "monitor"]);
    assert!(graph.dependents_of("app").is_empty());
    assert_eq!(names(&graph.closure("app")), vec!["host", "db", "app"]);
    assert_eq!(graph.edges().len(), 3);
    assert!(graph.primary().is_none());
    assert!(graph.contains("monitor"));
}

// =============================================================================
// Structural defects
// =============================================================================

/// Test: A mutual dependency is reported as a cycle naming both resources.
#[test]
fn mutual_dependency_is_a_cycle() {
    let err = deployment_graph(
        r#"
resources:
  - name: a
    type: node
    requirements:
      - name: peer
        match: b
  - name: b
    type: node
    requirements:
      - name: peer
        match: a
deployments:
  - name: pair
    primary: a
    members: [a, b]
"#,
        "pair",
    )
    .unwrap_err();

    let GraphError::Cycle(cycle) = &err else {
        panic!("expected a cycle, got {:?}", err);
    };
    let mut members = names(cycle);
    members.sort();
    assert_eq!(members, vec!["a", "b"]);
    assert!(err.to_string().starts_with("dependency cycle:"));
}

/// Test: A cycle is reported ahead of closure defects in the same deployment.
#[test]
fn cycle_is_reported_before_orphans() {
    let err = deployment_graph(
        r#"
resources:
  - name: a
    type: node
    requirements:
      - name: peer
        match: b
  - name: b
    type: node
    requirements:
      - name: peer
        match: a
  - name: stray
    type: cache
deployments:
  - name: pair
    primary: a
    members: [a, b, stray]
"#,
        "pair",
    )
    .unwrap_err();
    assert!(matches!(err, GraphError::Cycle(_)));
}

/// Test: Members absent from the catalog are reported.
#[test]
fn unknown_member_is_missing_resource() {
    let err = deployment_graph(
        r#"
resources:
  - name: app
    type: webapp
deployments:
  - name: site
    primary: app
    members: [app, ghost]
"#,
        "site",
    )
    .unwrap_err();
    assert_eq!(
        err,
        GraphError::MissingResource(ResourceName::new("ghost").unwrap())
    );
}

/// Test: The primary has to be one of the members.
#[test]
fn primary_outside_members_is_rejected() {
    let err = deployment_graph(
        r#"
resources:
  - name: app
    type: webapp
  - name: host
    type: compute
deployments:
  - name: site
    primary: app
    members: [host]
"#,
        "site",
    )
    .unwrap_err();
    assert!(matches!(err, GraphError::PrimaryNotMember { .. }));
}

/// Test: Members the primary never reaches are orphaned.
#[test]
fn unreachable_member_is_orphaned() {
    let err = deployment_graph(
        r#"
resources:
  - name: host
    type: compute
  - name: stray
    type: cache
  - name: app
    type: webapp
    requirements:
      - name: host
        type: compute
deployments:
  - name: site
    primary: app
    members: [host, stray, app]
"#,
        "site",
    )
    .unwrap_err();
    let GraphError::ClosureMismatch {
        orphaned, missing, ..
    } = err
    else {
        panic!("expected a closure mismatch");
    };
    assert_eq!(names(&orphaned), vec!["stray"]);
    assert!(missing.is_empty());
}

/// Test: Dependencies left out of the member set are reported missing.
#[test]
fn dependency_outside_members_is_missing() {
    let err = deployment_graph(
        r#"
resources:
  - name: host
    type: compute
  - name: app
    type: webapp
    requirements:
      - name: host
        type: compute
deployments:
  - name: site
    primary: app
    members: [app]
"#,
        "site",
    )
    .unwrap_err();
    assert!(err.to_string().contains("missing: [host]"), "{}", err);
}

/// Test: A resolution carrying more targets than allowed is rejected.
#[test]
fn oversized_resolution_is_rejected() {
    let catalog = ResourceCatalog::from_yaml(
        r#"
resources:
  - name: h1
    type: compute
  - name: h2
    type: compute
  - name: app
    type: webapp
    requirements:
      - name: host
        type: compute
"#,
    )
    .unwrap();
    let resolution: Resolution = std::iter::once(ResolvedRequirement {
        owner: ResourceName::new("app").unwrap(),
        requirement: RequirementName::new("host").unwrap(),
        targets: vec![
            ResourceName::new("h1").unwrap(),
            ResourceName::new("h2").unwrap(),
        ],
        truncated_from: None,
    })
    .collect();

    let err = GraphBuilder::new(&catalog).build(&resolution).unwrap_err();
    assert!(matches!(err, GraphError::CardinalityExceeded { count: 2, .. }));
}

// =============================================================================
// Properties
// =============================================================================

fn node_type() -> TypeName {
    TypeName::new("node").unwrap()
}

fn resource(i: usize) -> ResourceName {
    ResourceName::new(&format!("r{}", i)).unwrap()
}

/// Build an acyclic catalog: each pair becomes an edge from the higher-ranked
/// resource to the lower-ranked one, pinned by explicit match.
fn ranked_catalog(ranks: &[usize], pairs: &[(usize, usize)]) -> (ResourceCatalog, Vec<(usize, usize)>) {
    let mut resources: Vec<ResourceTemplate> = (0..ranks.len())
        .map(|i| ResourceTemplate::new(resource(i), node_type()))
        .collect();
    let mut edges = Vec::new();

    for &(a, b) in pairs {
        if a == b {
            continue;
        }
        let (dependent, dependency) = if ranks[a] > ranks[b] { (a, b) } else { (b, a) };
        let requirement = RequirementName::new(&format!("needs-r{}", dependency)).unwrap();
        if resources[dependent].requirement(requirement.as_str()).is_some() {
            continue;
        }
        resources[dependent]
            .requirements
            .push(Requirement::new(requirement, node_type()).pinned_to(resource(dependency)));
        edges.push((dependent, dependency));
    }

    let catalog = ResourceCatalog::new(&HashMap::new(), resources, Vec::new()).unwrap();
    (catalog, edges)
}

fn ranked_dag() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize)>)> {
    (1usize..10).prop_flat_map(|n| {
        (
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            proptest::collection::vec((0..n, 0..n), 0..24),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Every resource appears once and after all of its dependencies.
    #[test]
    fn property_order_respects_every_edge((ranks, pairs) in ranked_dag()) {
        let (catalog, edges) = ranked_catalog(&ranks, &pairs);
        let resolution = ConstraintMatcher::new(&catalog).resolve_all().unwrap();
        let graph = GraphBuilder::new(&catalog).build(&resolution).unwrap();

        let order = graph.topological_order();
        prop_assert_eq!(order.len(), ranks.len());
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        prop_assert_eq!(position.len(), ranks.len());

        for (dependent, dependency) in edges {
            let dependent = resource(dependent);
            let dependency = resource(dependency);
            prop_assert!(position[dependency.as_str()] < position[dependent.as_str()]);
        }
    }

    /// PROPERTY: Building twice from the same snapshot gives the same order.
    #[test]
    fn property_order_is_deterministic((ranks, pairs) in ranked_dag()) {
        let (catalog, _) = ranked_catalog(&ranks, &pairs);
        let resolution = ConstraintMatcher::new(&catalog).resolve_all().unwrap();
        let first = GraphBuilder::new(&catalog).build(&resolution).unwrap();
        let second = GraphBuilder::new(&catalog).build(&resolution).unwrap();
        prop_assert_eq!(first.topological_order(), second.topological_order());
    }

    /// PROPERTY: The first resource in the order is the earliest-declared one
    /// without dependencies.
    #[test]
    fn property_ties_break_by_declaration_order((ranks, pairs) in ranked_dag()) {
        let (catalog, _) = ranked_catalog(&ranks, &pairs);
        let resolution = ConstraintMatcher::new(&catalog).resolve_all().unwrap();
        let graph = GraphBuilder::new(&catalog).build(&resolution).unwrap();

        let first_root = catalog
            .resources()
            .iter()
            .find(|r| r.requirements.is_empty())
            .map(|r| r.name.clone())
            .unwrap();
        prop_assert_eq!(&graph.topological_order()[0], &first_root);
    }
}
