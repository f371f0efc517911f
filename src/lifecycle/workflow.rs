// ABOUTME: Workflow selection from a requested target state.
// ABOUTME: Determines the operation sequence and graph walking direction per resource.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{LifecyclePhase, Operation};

/// The state a run should drive every resource towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetState {
    Configured,
    Started,
    Stopped,
    Absent,
    /// Discover current status without changing anything.
    Checked,
}

/// Which way a workflow walks the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Dependencies before dependents.
    Deploy,
    /// Dependents before dependencies.
    Undeploy,
}

/// Operation sequence for one target state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workflow {
    target: TargetState,
}

impl Workflow {
    pub fn for_target(target: TargetState) -> Self {
        Self { target }
    }

    pub fn target(&self) -> TargetState {
        self.target
    }

    pub fn direction(&self) -> Direction {
        match self.target {
            TargetState::Stopped | TargetState::Absent => Direction::Undeploy,
            TargetState::Configured | TargetState::Started | TargetState::Checked => {
                Direction::Deploy
            }
        }
    }

    /// The full sequence for a resource that has not been touched yet.
    pub fn operations(&self) -> &'static [Operation] {
        match self.target {
            TargetState::Configured => &[Operation::Configure],
            TargetState::Started => &[Operation::Configure, Operation::Start],
            TargetState::Stopped => &[Operation::Stop],
            TargetState::Absent => &[Operation::Stop, Operation::Delete],
            TargetState::Checked => &[Operation::Check],
        }
    }

    /// Remaining operations for a resource currently in `phase`.
    ///
    /// Resources already at (or past) the target are skipped, so re-running a
    /// completed deployment invokes nothing. A resource left in `error` by an
    /// earlier run starts over from the beginning of the sequence. A `deleted`
    /// resource is never at a deploy target: it gets the full sequence, which
    /// the phase machine then refuses.
    pub fn operations_from(&self, phase: LifecyclePhase) -> Vec<Operation> {
        use LifecyclePhase as P;
        use Operation as Op;

        match (self.target, phase) {
            (TargetState::Checked, _) => vec![Op::Check],

            (TargetState::Configured, P::NotStarted | P::Error | P::Deleted) => {
                vec![Op::Configure]
            }
            (TargetState::Configured, _) => vec![],

            (TargetState::Started, P::NotStarted | P::Error | P::Deleted) => {
                vec![Op::Configure, Op::Start]
            }
            (TargetState::Started, P::Configured | P::Stopped) => vec![Op::Start],
            (TargetState::Started, _) => vec![],

            (TargetState::Stopped, P::Started | P::Error) => vec![Op::Stop],
            (TargetState::Stopped, _) => vec![],

            (TargetState::Absent, P::Started | P::Error) => vec![Op::Stop, Op::Delete],
            (TargetState::Absent, P::Configured | P::Stopped) => vec![Op::Delete],
            (TargetState::Absent, _) => vec![],
        }
    }
}

impl TargetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Configured => "configured",
            TargetState::Started => "started",
            TargetState::Stopped => "stopped",
            TargetState::Absent => "absent",
            TargetState::Checked => "checked",
        }
    }
}

impl FromStr for TargetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "configured" => Ok(TargetState::Configured),
            "started" => Ok(TargetState::Started),
            "stopped" => Ok(TargetState::Stopped),
            "absent" => Ok(TargetState::Absent),
            "checked" => Ok(TargetState::Checked),
            _ => Err(format!("unknown target state: {}", s)),
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
