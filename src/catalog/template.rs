// ABOUTME: Resource, requirement, and deployment template definitions.
// ABOUTME: Plain data with serde support; validation happens when the catalog is assembled.

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lifecycle::{LifecyclePhase, Operation};
use crate::readiness::ReadinessState;
use crate::types::{DeploymentName, RequirementName, ResourceName, TypeName};

use super::deserialize::{deserialize_bound, deserialize_members, deserialize_properties};
use super::error::CatalogError;
use super::type_model::ROOT_TYPE;

/// Upper bound of a requirement's cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bound {
    Finite(u32),
    Unbounded,
}

impl Bound {
    pub fn allows(&self, count: usize) -> bool {
        match self {
            Bound::Finite(max) => count <= *max as usize,
            Bound::Unbounded => true,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::Unbounded => f.write_str("unbounded"),
        }
    }
}

/// How many resources may satisfy one requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cardinality {
    min: u32,
    max: Bound,
}

impl Cardinality {
    pub fn new(min: u32, max: Bound) -> Result<Self, CatalogError> {
        if let Bound::Finite(upper) = max
            && upper < min
        {
            return Err(CatalogError::InvalidCardinality { min, max });
        }
        Ok(Self { min, max })
    }

    /// The default when a requirement does not state its occurrences.
    pub fn exactly_one() -> Self {
        Self {
            min: 1,
            max: Bound::Finite(1),
        }
    }

    pub fn optional() -> Self {
        Self {
            min: 0,
            max: Bound::Finite(1),
        }
    }

    pub fn at_least(min: u32) -> Self {
        Self {
            min,
            max: Bound::Unbounded,
        }
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> Bound {
        self.max
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::exactly_one()
    }
}

/// One named property value. Values are opaque to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: serde_json::Value,
}

/// Equality predicate on a candidate's property, used to narrow open matching.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    pub property: String,
    pub equals: serde_json::Value,
}

impl PropertyFilter {
    pub fn matches(&self, template: &ResourceTemplate) -> bool {
        template.property(&self.property) == Some(&self.equals)
    }
}

/// Whether open matching may select a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Visible,
    /// Only reachable through an explicit match.
    Hidden,
}

/// How much a resource's failure matters to the deployment as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Failures are recorded but never block dependents or fail the run.
    Ignore,
    /// Failures block dependents but do not by themselves fail the run.
    Optional,
    #[default]
    Required,
}

impl Priority {
    /// Whether dependents must wait for (and are blocked by) this resource.
    pub fn blocks_dependents(&self) -> bool {
        !matches!(self, Priority::Ignore)
    }
}

/// Descriptive requirement metadata carried through to reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RequirementMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub badge: Option<String>,
}

/// A typed, cardinality-bounded dependency owned by one resource.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RequirementEntry")]
pub struct Requirement {
    pub name: RequirementName,
    pub target_type: TypeName,
    pub cardinality: Cardinality,
    /// Pins resolution to exactly this resource.
    pub explicit_match: Option<ResourceName>,
    /// Selection hint: every filter must hold for an open-match candidate.
    pub filter: Vec<PropertyFilter>,
    /// Selection hint: allow hidden templates in open matching.
    pub include_hidden: bool,
    pub metadata: RequirementMetadata,
}

impl Requirement {
    pub fn new(name: RequirementName, target_type: TypeName) -> Self {
        Self {
            name,
            target_type,
            cardinality: Cardinality::default(),
            explicit_match: None,
            filter: Vec::new(),
            include_hidden: false,
            metadata: RequirementMetadata::default(),
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn pinned_to(mut self, resource: ResourceName) -> Self {
        self.explicit_match = Some(resource);
        self
    }

    pub fn with_filter(mut self, property: &str, equals: serde_json::Value) -> Self {
        self.filter.push(PropertyFilter {
            property: property.to_string(),
            equals,
        });
        self
    }
}

/// Wire shape of a requirement before defaults and validation are applied.
#[derive(Debug, Deserialize)]
struct RequirementEntry {
    name: RequirementName,
    #[serde(default, rename = "type")]
    target_type: Option<TypeName>,
    #[serde(default)]
    min: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_bound")]
    max: Option<Bound>,
    #[serde(default, rename = "match")]
    explicit_match: Option<ResourceName>,
    #[serde(default, deserialize_with = "deserialize_filter")]
    filter: Vec<PropertyFilter>,
    #[serde(default)]
    include_hidden: bool,
    #[serde(flatten)]
    metadata: RequirementMetadata,
}

impl TryFrom<RequirementEntry> for Requirement {
    type Error = CatalogError;

    fn try_from(entry: RequirementEntry) -> Result<Self, Self::Error> {
        let min = entry.min.unwrap_or(1);
        // An omitted max allows a single match, or exactly `min` when more are required.
        let max = entry.max.unwrap_or(Bound::Finite(min.max(1)));
        let target_type = match entry.target_type {
            Some(t) => t,
            None => root_type(),
        };

        Ok(Requirement {
            name: entry.name,
            target_type,
            cardinality: Cardinality::new(min, max)?,
            explicit_match: entry.explicit_match,
            filter: entry.filter,
            include_hidden: entry.include_hidden,
            metadata: entry.metadata,
        })
    }
}

fn deserialize_filter<'de, D>(deserializer: D) -> Result<Vec<PropertyFilter>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let properties = deserialize_properties(deserializer)?;
    Ok(properties
        .into_iter()
        .map(|p| PropertyFilter {
            property: p.name,
            equals: p.value,
        })
        .collect())
}

pub(crate) fn root_type() -> TypeName {
    TypeName::from_static(ROOT_TYPE)
}

/// A declared resource: identity, type, properties, and requirements.
///
/// `phase` and `readiness` describe the snapshot the catalog was loaded from;
/// the orchestrator tracks live values separately and never writes them back.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceTemplate {
    pub name: ResourceName,
    #[serde(rename = "type")]
    pub type_name: TypeName,
    #[serde(default, deserialize_with = "deserialize_properties")]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub priority: Priority,
    /// Operations that are safe to retry for this resource; overrides configuration.
    #[serde(default)]
    pub idempotent: Option<Vec<Operation>>,
    #[serde(default)]
    pub phase: LifecyclePhase,
    #[serde(default)]
    pub readiness: ReadinessState,
}

impl ResourceTemplate {
    pub fn new(name: ResourceName, type_name: TypeName) -> Self {
        Self {
            name,
            type_name,
            properties: Vec::new(),
            requirements: Vec::new(),
            visibility: Visibility::default(),
            priority: Priority::default(),
            idempotent: None,
            phase: LifecyclePhase::default(),
            readiness: ReadinessState::default(),
        }
    }

    pub fn with_property(mut self, name: &str, value: serde_json::Value) -> Self {
        self.properties.push(Property {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn property(&self, name: &str) -> Option<&serde_json::Value> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn requirement(&self, name: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.name.as_str() == name)
    }
}

/// A named, primary-rooted set of resources forming one deployable unit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeploymentTemplate {
    pub name: DeploymentName,
    pub primary: ResourceName,
    #[serde(deserialize_with = "deserialize_members")]
    pub members: NonEmpty<ResourceName>,
}

impl DeploymentTemplate {
    pub fn new(name: DeploymentName, primary: ResourceName, members: NonEmpty<ResourceName>) -> Self {
        Self {
            name,
            primary,
            members,
        }
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.members.iter().any(|m| m.as_str() == resource)
    }
}
