// ABOUTME: Immutable catalog of resource and deployment templates.
// ABOUTME: Pure data plus lookup; shared between runs as a snapshot behind an Arc.

mod deserialize;
mod error;
mod template;
mod type_model;

pub use error::CatalogError;
pub use template::{
    Bound, Cardinality, DeploymentTemplate, Priority, Property, PropertyFilter, Requirement,
    RequirementMetadata, ResourceTemplate, Visibility,
};
pub use type_model::{ROOT_TYPE, TypeDecl, TypeModel};

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::Result;
use crate::types::TypeName;

/// Already-parsed template source: types, resource templates, and deployments.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSource {
    #[serde(default)]
    pub types: HashMap<TypeName, TypeDecl>,

    #[serde(default)]
    pub resources: Vec<ResourceTemplate>,

    #[serde(default)]
    pub deployments: Vec<DeploymentTemplate>,
}

impl CatalogSource {
    pub fn into_catalog(self) -> std::result::Result<ResourceCatalog, CatalogError> {
        ResourceCatalog::new(&self.types, self.resources, self.deployments)
    }
}

/// A validated, read-only snapshot of declared templates.
///
/// Resource declaration order is preserved and used for every tie-break.
#[derive(Debug, Clone)]
pub struct ResourceCatalog {
    resources: Vec<ResourceTemplate>,
    index: HashMap<String, usize>,
    types: TypeModel,
    deployments: Vec<DeploymentTemplate>,
}

impl ResourceCatalog {
    pub fn new(
        types: &HashMap<TypeName, TypeDecl>,
        resources: Vec<ResourceTemplate>,
        deployments: Vec<DeploymentTemplate>,
    ) -> std::result::Result<Self, CatalogError> {
        let types = TypeModel::new(types)?;

        let mut index = HashMap::with_capacity(resources.len());
        for (position, resource) in resources.iter().enumerate() {
            if index
                .insert(resource.name.to_string(), position)
                .is_some()
            {
                return Err(CatalogError::DuplicateResource(resource.name.clone()));
            }

            if resource.phase.is_transient() {
                return Err(CatalogError::TransientPhase {
                    resource: resource.name.clone(),
                    phase: resource.phase,
                });
            }

            let mut seen = HashSet::new();
            for requirement in &resource.requirements {
                if !seen.insert(requirement.name.as_str()) {
                    return Err(CatalogError::DuplicateRequirement {
                        resource: resource.name.clone(),
                        requirement: requirement.name.clone(),
                    });
                }
            }
        }

        let mut deployment_names = HashSet::new();
        for deployment in &deployments {
            if !deployment_names.insert(deployment.name.as_str()) {
                return Err(CatalogError::DuplicateDeployment(deployment.name.clone()));
            }
        }

        Ok(Self {
            resources,
            index,
            types,
            deployments,
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let source: CatalogSource = serde_yaml::from_str(yaml)?;
        Ok(source.into_catalog()?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn get(&self, name: &str) -> Option<&ResourceTemplate> {
        self.index.get(name).map(|&i| &self.resources[i])
    }

    /// Declaration position of a resource.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> &[ResourceTemplate] {
        &self.resources
    }

    pub fn types(&self) -> &TypeModel {
        &self.types
    }

    pub fn deployment(&self, name: &str) -> Option<&DeploymentTemplate> {
        self.deployments.iter().find(|d| d.name.as_str() == name)
    }

    pub fn deployments(&self) -> &[DeploymentTemplate] {
        &self.deployments
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
