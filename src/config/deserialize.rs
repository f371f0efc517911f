// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles per-type duration maps and operation lists.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::lifecycle::Operation;
use crate::types::TypeName;

pub fn deserialize_timeouts<'de, D>(deserializer: D) -> Result<HashMap<TypeName, Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: HashMap<TypeName, humantime_serde::Serde<Duration>> =
        HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(type_name, duration)| (type_name, duration.into_inner()))
        .collect())
}

pub fn deserialize_operations<'de, D>(deserializer: D) -> Result<Vec<Operation>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let mut operations: Vec<Operation> = Vec::deserialize(deserializer)?;
    operations.sort_by_key(|op| op.as_str());
    operations.dedup();
    Ok(operations)
}
