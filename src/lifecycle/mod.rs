// ABOUTME: Lifecycle operations, phases, and workflows for individual resources.
// ABOUTME: Combines an operation's outcome with canonical readiness to decide the next phase.

mod phase;
mod workflow;

pub use phase::{LifecyclePhase, PhaseError};
pub use workflow::{Direction, TargetState, Workflow};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::readiness::{OperationalState, ReadinessState};

/// A configuration operation the orchestrator can ask an invoker to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Check,
    Configure,
    Start,
    Stop,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Check => "check",
            Operation::Configure => "configure",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Delete => "delete",
        }
    }

    fn in_progress_phase(&self, current: LifecyclePhase) -> LifecyclePhase {
        match self {
            Operation::Check => current,
            Operation::Configure => LifecyclePhase::Configuring,
            Operation::Start => LifecyclePhase::Starting,
            Operation::Stop => LifecyclePhase::Stopping,
            Operation::Delete => LifecyclePhase::Deleting,
        }
    }

    fn completed_phase(&self, current: LifecyclePhase) -> LifecyclePhase {
        match self {
            Operation::Check => current,
            Operation::Configure => LifecyclePhase::Configured,
            Operation::Start => LifecyclePhase::Started,
            Operation::Stop => LifecyclePhase::Stopped,
            Operation::Delete => LifecyclePhase::Deleted,
        }
    }

    /// Readiness to report while the operation is running.
    pub fn in_progress_readiness(&self, current: ReadinessState) -> ReadinessState {
        match self {
            Operation::Check => current,
            Operation::Configure | Operation::Start => ReadinessState::Starting,
            Operation::Stop => ReadinessState::Stopping,
            Operation::Delete => ReadinessState::Deleting,
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check" => Ok(Operation::Check),
            "configure" => Ok(Operation::Configure),
            "start" => Ok(Operation::Start),
            "stop" => Ok(Operation::Stop),
            "delete" => Ok(Operation::Delete),
            _ => Err(format!("unknown operation: {}", s)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resource lands once an invocation has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Succeeded {
        phase: LifecyclePhase,
        readiness: ReadinessState,
    },
    Failed {
        readiness: ReadinessState,
    },
}

/// Combine a completed operation with the canonical readiness it reported.
///
/// `phase` is the phase the resource was in before the operation began.
/// - `error` readiness fails every operation.
/// - `configure` and `start` fail when the resource turns out to be gone.
/// - `stop` and `delete` accept a resource that is already gone.
pub fn settle(
    phase: LifecyclePhase,
    operation: Operation,
    readiness: ReadinessState,
) -> Settlement {
    if readiness == ReadinessState::Error {
        return Settlement::Failed { readiness };
    }

    let removed = readiness.operational() == OperationalState::Removed;
    match operation {
        Operation::Configure | Operation::Start if removed => Settlement::Failed { readiness },
        Operation::Delete if !removed => Settlement::Succeeded {
            phase: LifecyclePhase::Deleted,
            readiness: ReadinessState::Deleted,
        },
        _ => Settlement::Succeeded {
            phase: phase.complete(operation),
            readiness,
        },
    }
}
