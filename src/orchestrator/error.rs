// ABOUTME: Run error types with SNAFU pattern.
// ABOUTME: Everything that aborts a run before (or instead of) producing a report.

use snafu::Snafu;

use crate::graph::GraphError;
use crate::resolve::ResolveError;

/// Why a run produced no report.
///
/// Operation failures are not errors at this level: they are recorded per
/// resource and surface as a `partial` or `failed` report.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RunError {
    #[snafu(display("unknown deployment: {name}"))]
    UnknownDeployment { name: String },

    #[snafu(display("resolution failed: {source}"))]
    Resolution { source: ResolveError },

    #[snafu(display("invalid dependency graph: {source}"))]
    Graph { source: GraphError },

    #[snafu(display("run cancelled before any operation was dispatched"))]
    Cancelled,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    UnknownDeployment,
    /// A requirement could not be matched.
    Unsatisfiable,
    /// The resolved requirements form a cycle.
    Cycle,
    /// A referenced resource is not in the catalog.
    MissingResource,
    /// The deployment's members disagree with its primary's closure.
    InvalidDeployment,
    Cancelled,
}

impl RunError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RunErrorKind {
        match self {
            RunError::UnknownDeployment { .. } => RunErrorKind::UnknownDeployment,
            RunError::Resolution { .. } => RunErrorKind::Unsatisfiable,
            RunError::Graph { source } => match source {
                GraphError::Cycle(_) => RunErrorKind::Cycle,
                GraphError::MissingResource(_) => RunErrorKind::MissingResource,
                GraphError::PrimaryNotMember { .. }
                | GraphError::ClosureMismatch { .. }
                | GraphError::CardinalityExceeded { .. } => RunErrorKind::InvalidDeployment,
            },
            RunError::Cancelled => RunErrorKind::Cancelled,
        }
    }

    /// Returns the resolution failure if this run failed to match a requirement.
    pub fn resolve_error(&self) -> Option<&ResolveError> {
        match self {
            RunError::Resolution { source } => Some(source),
            _ => None,
        }
    }

    /// Returns the structural defect if graph construction failed.
    pub fn graph_error(&self) -> Option<&GraphError> {
        match self {
            RunError::Graph { source } => Some(source),
            _ => None,
        }
    }
}

impl From<ResolveError> for RunError {
    fn from(source: ResolveError) -> Self {
        RunError::Resolution { source }
    }
}

impl From<GraphError> for RunError {
    fn from(source: GraphError) -> Self {
        RunError::Graph { source }
    }
}
