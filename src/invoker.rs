// ABOUTME: Interface to the external collaborator that performs lifecycle operations.
// ABOUTME: The orchestrator only sees the declared outcome, never how an operation ran.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::lifecycle::Operation;
use crate::types::{ResourceName, TypeName};

/// One operation dispatched for one resource.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub resource: ResourceName,
    pub resource_type: TypeName,
    pub operation: Operation,
    /// The resource's own properties plus `"<dependency>.<output>"` entries.
    pub inputs: BTreeMap<String, Value>,
    /// 1 for the first attempt.
    pub attempt: u32,
    /// Fires when the run is cancelled. Invokers that can interrupt work
    /// should return [`InvokeError::Interrupted`]; others may finish normally.
    pub cancellation: CancellationToken,
}

impl Invocation {
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.inputs.get(key)
    }
}

/// Declared outcome of a completed operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationOutcome {
    pub raw_status: String,
    pub error_present: bool,
    pub outputs: BTreeMap<String, Value>,
}

impl InvocationOutcome {
    pub fn status(raw_status: impl Into<String>) -> Self {
        Self {
            raw_status: raw_status.into(),
            ..Self::default()
        }
    }

    pub fn with_error(mut self) -> Self {
        self.error_present = true;
        self
    }

    pub fn with_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.outputs.insert(key.into(), value);
        self
    }
}

/// Failure signals from an invoker, plus the timeout the orchestrator imposes.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum InvokeError {
    #[error("operation failed: {0}")]
    Failed(String),

    #[error("operation {0} is not supported for this resource")]
    Unsupported(Operation),

    #[error("operation interrupted")]
    Interrupted,

    #[error("operation timed out after {}", seconds(*.0))]
    Timeout(Duration),
}

impl InvokeError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, InvokeError::Failed(_) | InvokeError::Timeout(_))
    }
}

fn seconds(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}

/// Executes lifecycle operations against real infrastructure.
///
/// Implementations must be safe to call concurrently for different resources;
/// the orchestrator never issues two operations for the same resource at once.
#[async_trait]
pub trait OperationInvoker: Send + Sync {
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutcome, InvokeError>;
}
