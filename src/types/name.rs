// ABOUTME: Phantom-typed, validated names for catalog entities.
// ABOUTME: Prevents accidental mixing of resource, type, requirement, and deployment names.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use thiserror::Error;

/// Marker types for phantom type parameters.
/// Using empty enums prevents instantiation and requires no trait bounds.
pub enum ResourceMarker {}
pub enum TypeMarker {}
pub enum RequirementMarker {}
pub enum DeploymentMarker {}

const MAX_LEN: usize = 253;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("name cannot be empty")]
    Empty,

    #[error("name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("name cannot start with '{0}'")]
    InvalidStart(char),

    #[error("invalid character in name: '{0}'")]
    InvalidChar(char),
}

/// A validated name that cannot be confused with names of other entity kinds.
///
/// Allowed characters are ASCII alphanumerics plus `-`, `_`, `.` and `:`, which
/// covers both template names (`dev_gcp_project`) and dotted type names
/// (`tosca.nodes.Root`). Names must start with an alphanumeric character.
#[must_use = "names identify catalog entities and should not be ignored"]
pub struct Name<T> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T> Name<T> {
    /// Wrap a crate-defined constant. Constants are checked against `new` by tests.
    pub(crate) fn from_static(value: &'static str) -> Self {
        debug_assert!(Self::new(value).is_ok(), "invalid constant name {value:?}");
        Self {
            value: value.to_string(),
            _marker: PhantomData,
        }
    }

    pub fn new(value: &str) -> Result<Self, NameError> {
        let mut chars = value.chars();
        let first = chars.next().ok_or(NameError::Empty)?;

        if value.len() > MAX_LEN {
            return Err(NameError::TooLong);
        }

        if !first.is_ascii_alphanumeric() {
            return Err(NameError::InvalidStart(first));
        }

        for c in chars {
            if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.' | ':') {
                return Err(NameError::InvalidChar(c));
            }
        }

        Ok(Self {
            value: value.to_string(),
            _marker: PhantomData,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_inner(self) -> String {
        self.value
    }
}

// Manual trait implementations that don't require T to implement the trait.
// This is necessary because T is only used as a phantom type marker.

impl<T> std::fmt::Debug for Name<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.value)
    }
}

impl<T> Clone for Name<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> PartialEq for Name<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Name<T> {}

impl<T> PartialOrd for Name<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Name<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

// Hashes exactly like the inner string so `Borrow<str>` lookups agree.
impl<T> Hash for Name<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> Borrow<str> for Name<T> {
    fn borrow(&self) -> &str {
        &self.value
    }
}

impl<T> std::fmt::Display for Name<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T> std::str::FromStr for Name<T> {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<T> Serialize for Name<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Name<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::new(&value).map_err(serde::de::Error::custom)
    }
}

pub type ResourceName = Name<ResourceMarker>;
pub type TypeName = Name<TypeMarker>;
pub type RequirementName = Name<RequirementMarker>;
pub type DeploymentName = Name<DeploymentMarker>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn accepts_template_and_type_names() {
        assert!(ResourceName::new("dev_gcp_project").is_ok());
        assert!(TypeName::new("tosca.nodes.Root").is_ok());
        assert!(TypeName::new("unfurl:nodes:DNSZone").is_ok());
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(ResourceName::new(""), Err(NameError::Empty));
        assert_eq!(ResourceName::new("-db"), Err(NameError::InvalidStart('-')));
        assert_eq!(ResourceName::new("my db"), Err(NameError::InvalidChar(' ')));
        assert_eq!(
            ResourceName::new(&"a".repeat(MAX_LEN + 1)),
            Err(NameError::TooLong)
        );
    }

    #[test]
    fn borrowed_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(ResourceName::new("db").unwrap(), 1);
        assert_eq!(map.get("db"), Some(&1));
    }

    #[test]
    fn deserialize_validates() {
        let ok: ResourceName = serde_json::from_str("\"zone\"").unwrap();
        assert_eq!(ok.as_str(), "zone");
        assert!(serde_json::from_str::<ResourceName>("\"bad name\"").is_err());
    }
}
