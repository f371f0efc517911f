// ABOUTME: Error types for catalog loading and validation.
// ABOUTME: Raised before any resolution happens, when the snapshot itself is malformed.

use crate::lifecycle::LifecyclePhase;
use crate::types::{DeploymentName, RequirementName, ResourceName, TypeName};

use super::Bound;

/// Errors detected while assembling a catalog snapshot.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("duplicate resource template: {0}")]
    DuplicateResource(ResourceName),

    #[error("duplicate deployment template: {0}")]
    DuplicateDeployment(DeploymentName),

    #[error("resource {resource} declares requirement {requirement} more than once")]
    DuplicateRequirement {
        resource: ResourceName,
        requirement: RequirementName,
    },

    #[error("invalid cardinality: min {min} exceeds max {max}")]
    InvalidCardinality { min: u32, max: Bound },

    #[error("type {type_name} extends unknown type {parent}")]
    UnknownParentType { type_name: TypeName, parent: TypeName },

    #[error("type derivation cycle: {}", join(.0))]
    TypeCycle(Vec<TypeName>),

    #[error("resource {resource} cannot be loaded mid-operation (phase {phase})")]
    TransientPhase {
        resource: ResourceName,
        phase: LifecyclePhase,
    },
}

fn join(types: &[TypeName]) -> String {
    types
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}
