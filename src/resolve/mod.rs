// ABOUTME: Constraint matching of requirements against a catalog snapshot.
// ABOUTME: Pure functions: explicit pins, type compatibility, visibility, filters, and cardinality.

use serde::Deserialize;
use std::fmt;

use crate::catalog::{Bound, DeploymentTemplate, Requirement, ResourceCatalog, ResourceTemplate, Visibility};
use crate::types::{RequirementName, ResourceName, TypeName};

/// What to do when more candidates match than a requirement's `max` allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TruncationPolicy {
    /// Keep the first `max` candidates by catalog declaration order, ties broken by name.
    #[default]
    FirstByDeclarationOrder,
    /// Fail with `Unsatisfiable(too-many)`.
    Reject,
}

/// Why a requirement could not be matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsatisfiableReason {
    /// The pinned resource is missing, or its type does not satisfy the requirement.
    ExplicitNotFound {
        target: ResourceName,
        found_type: Option<TypeName>,
    },
    TooFew { found: usize, min: u32 },
    TooMany { found: usize, max: Bound },
}

impl fmt::Display for UnsatisfiableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsatisfiableReason::ExplicitNotFound {
                target,
                found_type: None,
            } => write!(f, "explicit-not-found: {} does not exist", target),
            UnsatisfiableReason::ExplicitNotFound {
                target,
                found_type: Some(found),
            } => write!(
                f,
                "explicit-not-found: {} has incompatible type {}",
                target, found
            ),
            UnsatisfiableReason::TooFew { found, min } => {
                write!(f, "too-few: found {} candidate(s), need at least {}", found, min)
            }
            UnsatisfiableReason::TooMany { found, max } => {
                write!(f, "too-many: found {} candidate(s), allowed at most {}", found, max)
            }
        }
    }
}

/// A requirement that cannot be satisfied; surfaced before anything executes.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("requirement {requirement} of {resource} is unsatisfiable ({reason})")]
    Unsatisfiable {
        resource: ResourceName,
        requirement: RequirementName,
        reason: UnsatisfiableReason,
    },
}

impl ResolveError {
    pub fn requirement(&self) -> &RequirementName {
        match self {
            ResolveError::Unsatisfiable { requirement, .. } => requirement,
        }
    }

    pub fn resource(&self) -> &ResourceName {
        match self {
            ResolveError::Unsatisfiable { resource, .. } => resource,
        }
    }

    pub fn reason(&self) -> &UnsatisfiableReason {
        match self {
            ResolveError::Unsatisfiable { reason, .. } => reason,
        }
    }
}

/// Outcome of matching one requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequirement {
    pub owner: ResourceName,
    pub requirement: RequirementName,
    /// Matched resources in declaration order.
    pub targets: Vec<ResourceName>,
    /// Number of candidates before truncation, when truncation happened.
    pub truncated_from: Option<usize>,
}

/// All requirements of a set of resources, resolved against one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    resolved: Vec<ResolvedRequirement>,
}

impl Resolution {
    pub fn iter(&self) -> impl Iterator<Item = &ResolvedRequirement> {
        self.resolved.iter()
    }

    pub fn for_owner<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a ResolvedRequirement> {
        self.resolved.iter().filter(move |r| r.owner.as_str() == owner)
    }

    pub fn truncated(&self) -> impl Iterator<Item = &ResolvedRequirement> {
        self.resolved.iter().filter(|r| r.truncated_from.is_some())
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

impl FromIterator<ResolvedRequirement> for Resolution {
    fn from_iter<I: IntoIterator<Item = ResolvedRequirement>>(iter: I) -> Self {
        Self {
            resolved: iter.into_iter().collect(),
        }
    }
}

/// Finds the resources eligible to satisfy requirements.
///
/// Matching never mutates the catalog. A resource never satisfies its own
/// requirements through open matching.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintMatcher<'a> {
    catalog: &'a ResourceCatalog,
    policy: TruncationPolicy,
}

impl<'a> ConstraintMatcher<'a> {
    pub fn new(catalog: &'a ResourceCatalog) -> Self {
        Self {
            catalog,
            policy: TruncationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: TruncationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Match one requirement owned by `owner`.
    pub fn match_requirement(
        &self,
        owner: &ResourceTemplate,
        requirement: &Requirement,
    ) -> Result<ResolvedRequirement, ResolveError> {
        let unsatisfiable = |reason: UnsatisfiableReason| ResolveError::Unsatisfiable {
            resource: owner.name.clone(),
            requirement: requirement.name.clone(),
            reason,
        };
        let resolved = |targets: Vec<ResourceName>, truncated_from: Option<usize>| ResolvedRequirement {
            owner: owner.name.clone(),
            requirement: requirement.name.clone(),
            targets,
            truncated_from,
        };

        if let Some(target) = &requirement.explicit_match {
            let types = self.catalog.types();
            return match self.catalog.get(target.as_str()) {
                Some(found) if types.is_compatible(&found.type_name, &requirement.target_type) => {
                    Ok(resolved(vec![found.name.clone()], None))
                }
                found => Err(unsatisfiable(UnsatisfiableReason::ExplicitNotFound {
                    target: target.clone(),
                    found_type: found.map(|r| r.type_name.clone()),
                })),
            };
        }

        let mut candidates: Vec<(usize, &ResourceTemplate)> = self
            .catalog
            .resources()
            .iter()
            .enumerate()
            .filter(|(_, candidate)| self.is_eligible(owner, requirement, candidate))
            .collect();
        candidates.sort_by(|(a_pos, a), (b_pos, b)| a_pos.cmp(b_pos).then(a.name.cmp(&b.name)));

        let found = candidates.len();
        let cardinality = requirement.cardinality;
        if found < cardinality.min() as usize {
            return Err(unsatisfiable(UnsatisfiableReason::TooFew {
                found,
                min: cardinality.min(),
            }));
        }

        let mut truncated_from = None;
        if let Bound::Finite(max) = cardinality.max()
            && found > max as usize
        {
            match self.policy {
                TruncationPolicy::Reject => {
                    return Err(unsatisfiable(UnsatisfiableReason::TooMany {
                        found,
                        max: cardinality.max(),
                    }));
                }
                TruncationPolicy::FirstByDeclarationOrder => {
                    tracing::debug!(
                        resource = %owner.name,
                        requirement = %requirement.name,
                        found,
                        max,
                        "truncating candidates by declaration order"
                    );
                    candidates.truncate(max as usize);
                    truncated_from = Some(found);
                }
            }
        }

        let targets = candidates
            .into_iter()
            .map(|(_, candidate)| candidate.name.clone())
            .collect();
        Ok(resolved(targets, truncated_from))
    }

    fn is_eligible(
        &self,
        owner: &ResourceTemplate,
        requirement: &Requirement,
        candidate: &ResourceTemplate,
    ) -> bool {
        candidate.name != owner.name
            && (requirement.include_hidden || candidate.visibility != Visibility::Hidden)
            && self
                .catalog
                .types()
                .is_compatible(&candidate.type_name, &requirement.target_type)
            && requirement.filter.iter().all(|f| f.matches(candidate))
    }

    /// Resolve every requirement of every member of `deployment`, in
    /// declaration order. Members missing from the catalog are skipped here
    /// and reported by graph construction.
    pub fn resolve_deployment(
        &self,
        deployment: &DeploymentTemplate,
    ) -> Result<Resolution, ResolveError> {
        let mut members: Vec<&ResourceTemplate> = deployment
            .members
            .iter()
            .filter_map(|name| self.catalog.get(name.as_str()))
            .collect();
        members.sort_by_key(|m| self.catalog.position(m.name.as_str()));
        members.dedup_by(|a, b| a.name == b.name);

        let mut resolved = Vec::new();
        for member in members {
            for requirement in &member.requirements {
                resolved.push(self.match_requirement(member, requirement)?);
            }
        }
        Ok(Resolution { resolved })
    }

    /// Resolve every requirement in the catalog.
    pub fn resolve_all(&self) -> Result<Resolution, ResolveError> {
        self.catalog
            .resources()
            .iter()
            .flat_map(|owner| owner.requirements.iter().map(move |r| (owner, r)))
            .map(|(owner, requirement)| self.match_requirement(owner, requirement))
            .collect()
    }
}
