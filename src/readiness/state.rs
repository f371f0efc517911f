// ABOUTME: Canonical readiness states and their collapsed operational view.
// ABOUTME: Operational states drive scheduling decisions in the orchestrator.

use serde::de::{self, Deserialize, Deserializer};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Canonical readiness of a resource, independent of who reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadinessState {
    #[default]
    Initial,
    Starting,
    Started,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
    Error,
    /// The resource never existed (or no longer exists) on the target system.
    Absent,
    Pending,
    Ok,
}

/// Scheduling view of a [`ReadinessState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationalState {
    Pending,
    InProgress,
    Ready,
    /// Usable in principle but held back by a failed dependency.
    Degraded,
    Failed,
    Removed,
}

impl ReadinessState {
    pub const ALL: [ReadinessState; 11] = [
        ReadinessState::Initial,
        ReadinessState::Starting,
        ReadinessState::Started,
        ReadinessState::Stopping,
        ReadinessState::Stopped,
        ReadinessState::Deleting,
        ReadinessState::Deleted,
        ReadinessState::Error,
        ReadinessState::Absent,
        ReadinessState::Pending,
        ReadinessState::Ok,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadinessState::Initial => "initial",
            ReadinessState::Starting => "starting",
            ReadinessState::Started => "started",
            ReadinessState::Stopping => "stopping",
            ReadinessState::Stopped => "stopped",
            ReadinessState::Deleting => "deleting",
            ReadinessState::Deleted => "deleted",
            ReadinessState::Error => "error",
            ReadinessState::Absent => "absent",
            ReadinessState::Pending => "pending",
            ReadinessState::Ok => "ok",
        }
    }

    /// Collapse into the smaller set used for scheduling.
    ///
    /// `Degraded` is never produced here: it is assigned by the orchestrator when a
    /// dependency fails.
    pub fn operational(&self) -> OperationalState {
        match self {
            ReadinessState::Initial | ReadinessState::Pending | ReadinessState::Stopped => {
                OperationalState::Pending
            }
            ReadinessState::Starting | ReadinessState::Stopping | ReadinessState::Deleting => {
                OperationalState::InProgress
            }
            ReadinessState::Started | ReadinessState::Ok => OperationalState::Ready,
            ReadinessState::Error => OperationalState::Failed,
            ReadinessState::Deleted | ReadinessState::Absent => OperationalState::Removed,
        }
    }
}

impl OperationalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalState::Pending => "pending",
            OperationalState::InProgress => "in-progress",
            OperationalState::Ready => "ready",
            OperationalState::Degraded => "degraded",
            OperationalState::Failed => "failed",
            OperationalState::Removed => "removed",
        }
    }
}

impl FromStr for ReadinessState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReadinessState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("unknown readiness state: {}", s))
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReadinessState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReadinessState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
