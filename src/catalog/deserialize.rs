// ABOUTME: Custom serde deserializers for catalog templates.
// ABOUTME: Handles ordered property maps, unbounded cardinality, and non-empty member lists.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::template::{Bound, Property};
use crate::types::ResourceName;

/// Read a property mapping, keeping declaration order.
pub fn deserialize_properties<'de, D>(deserializer: D) -> Result<Vec<Property>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mapping = serde_yaml::Mapping::deserialize(deserializer)?;
    mapping
        .into_iter()
        .map(|(key, value)| {
            let name = match key {
                serde_yaml::Value::String(s) => s,
                other => {
                    return Err(serde::de::Error::custom(format!(
                        "property names must be strings, got {:?}",
                        other
                    )));
                }
            };
            let value = serde_json::to_value(value).map_err(serde::de::Error::custom)?;
            Ok(Property { name, value })
        })
        .collect()
}

/// Accept either a number or the word `unbounded` for a cardinality maximum.
pub fn deserialize_bound<'de, D>(deserializer: D) -> Result<Option<Bound>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entry: Option<BoundEntry> = Option::deserialize(deserializer)?;
    match entry {
        None => Ok(None),
        Some(BoundEntry::Finite(n)) => Ok(Some(Bound::Finite(n))),
        Some(BoundEntry::Keyword(s)) if s.eq_ignore_ascii_case("unbounded") => {
            Ok(Some(Bound::Unbounded))
        }
        Some(BoundEntry::Keyword(s)) => Err(serde::de::Error::custom(format!(
            "invalid max occurrences: {}",
            s
        ))),
    }
}

pub fn deserialize_members<'de, D>(deserializer: D) -> Result<NonEmpty<ResourceName>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let members: Vec<ResourceName> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(members)
        .ok_or_else(|| serde::de::Error::custom("a deployment needs at least one member"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoundEntry {
    Finite(u32),
    Keyword(String),
}
