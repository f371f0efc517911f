// ABOUTME: Per-resource lifecycle phase state machine.
// ABOUTME: Validates which operations may begin from which phase and where they settle.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::Operation;

/// Orchestrator-tracked progress of a resource through its operations.
///
/// ```text
/// not-started -> configuring -> configured -> starting -> started
///             -> stopping -> stopped -> deleting -> deleted
/// ```
///
/// `error` is reachable from every non-terminal phase. `deleted` and `error` are
/// terminal within a run; a later run may retry a resource left in `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecyclePhase {
    #[default]
    NotStarted,
    Configuring,
    Configured,
    Starting,
    Started,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
    Error,
}

/// An operation was requested from a phase that does not allow it.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("cannot {operation} from phase {phase}")]
pub struct PhaseError {
    pub phase: LifecyclePhase,
    pub operation: Operation,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::NotStarted => "not-started",
            LifecyclePhase::Configuring => "configuring",
            LifecyclePhase::Configured => "configured",
            LifecyclePhase::Starting => "starting",
            LifecyclePhase::Started => "started",
            LifecyclePhase::Stopping => "stopping",
            LifecyclePhase::Stopped => "stopped",
            LifecyclePhase::Deleting => "deleting",
            LifecyclePhase::Deleted => "deleted",
            LifecyclePhase::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecyclePhase::Deleted | LifecyclePhase::Error)
    }

    /// Phases in which an operation is running.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LifecyclePhase::Configuring
                | LifecyclePhase::Starting
                | LifecyclePhase::Stopping
                | LifecyclePhase::Deleting
        )
    }

    /// Enter the in-progress phase for `operation`.
    ///
    /// Starting from `error` is allowed: that is an explicit retry.
    pub fn begin(self, operation: Operation) -> Result<LifecyclePhase, PhaseError> {
        use LifecyclePhase::*;

        let allowed = match operation {
            Operation::Check => return Ok(self),
            Operation::Configure => matches!(self, NotStarted | Configured | Stopped | Error),
            Operation::Start => matches!(self, Configured | Stopped | Error),
            Operation::Stop => matches!(self, Started | Configured | Error),
            Operation::Delete => matches!(self, Stopped | Configured | NotStarted | Error),
        };

        if allowed {
            Ok(operation.in_progress_phase(self))
        } else {
            Err(PhaseError {
                phase: self,
                operation,
            })
        }
    }

    /// Settle after `operation` completed successfully.
    pub fn complete(self, operation: Operation) -> LifecyclePhase {
        operation.completed_phase(self)
    }

    /// Move to `error`. Terminal phases stay where they are.
    pub fn fail(self) -> LifecyclePhase {
        if self == LifecyclePhase::Deleted {
            self
        } else {
            LifecyclePhase::Error
        }
    }
}

impl FromStr for LifecyclePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use LifecyclePhase::*;
        [
            NotStarted,
            Configuring,
            Configured,
            Starting,
            Started,
            Stopping,
            Stopped,
            Deleting,
            Deleted,
            Error,
        ]
        .into_iter()
        .find(|phase| phase.as_str() == s)
        .ok_or_else(|| format!("unknown lifecycle phase: {}", s))
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for LifecyclePhase {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
