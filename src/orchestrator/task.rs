// ABOUTME: Drives one resource through its operation sequence.
// ABOUTME: Handles permits, timeouts, retries with backoff, cancellation, and state settlement.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::RetryPolicy;
use crate::diagnostics::Warning;
use crate::invoker::{Invocation, InvocationOutcome, InvokeError, OperationInvoker};
use crate::lifecycle::{LifecyclePhase, Operation, Settlement, settle};
use crate::readiness::{ReadinessState, ReadinessStateMapper};
use crate::types::{ResourceName, TypeName};

use super::state::{ResourceStatus, StateCell};

/// Everything a spawned task needs; owned so the task is `'static`.
pub(crate) struct ResourceTask {
    pub resource: ResourceName,
    pub resource_type: TypeName,
    pub operations: Vec<Operation>,
    /// Operations of this resource that may be retried.
    pub idempotent: Vec<Operation>,
    pub inputs: BTreeMap<String, Value>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cell: StateCell,
    pub invoker: Arc<dyn OperationInvoker>,
    pub mapper: Arc<ReadinessStateMapper>,
    pub permits: Arc<Semaphore>,
    pub cancel: CancellationToken,
}

/// What a finished task hands back to the scheduler besides its state cell.
#[derive(Debug)]
pub(crate) struct TaskReport {
    pub resource: ResourceName,
    pub warnings: Vec<Warning>,
}

/// How one operation ended.
enum OperationEnd {
    Done,
    Failed,
    Cancelled,
}

impl ResourceTask {
    pub async fn run(self) -> TaskReport {
        let mut warnings = Vec::new();

        if self.operations.is_empty() {
            tracing::debug!(resource = %self.resource, "already at target, nothing to do");
        }

        for operation in self.operations.clone() {
            let span = tracing::info_span!(
                "operation",
                resource = %self.resource,
                operation = %operation
            );
            let end = self
                .run_operation(operation, &mut warnings)
                .instrument(span)
                .await;

            match end {
                OperationEnd::Done => {}
                OperationEnd::Failed => {
                    return TaskReport {
                        resource: self.resource,
                        warnings,
                    };
                }
                OperationEnd::Cancelled => {
                    self.cell.lock().status = ResourceStatus::Cancelled;
                    return TaskReport {
                        resource: self.resource,
                        warnings,
                    };
                }
            }
        }

        self.cell.lock().status = ResourceStatus::Completed;
        tracing::info!(resource = %self.resource, "resource reached target");
        TaskReport {
            resource: self.resource,
            warnings,
        }
    }

    async fn run_operation(&self, operation: Operation, warnings: &mut Vec<Warning>) -> OperationEnd {
        if self.cancel.is_cancelled() {
            return OperationEnd::Cancelled;
        }

        let (phase_before, readiness_before) = {
            let mut state = self.cell.lock();
            let before = (state.phase, state.readiness);
            match state.phase.begin(operation) {
                Ok(phase) => {
                    state.phase = phase;
                    state.readiness = operation.in_progress_readiness(state.readiness);
                    state.status = ResourceStatus::Running;
                }
                Err(err) => {
                    state.phase = state.phase.fail();
                    // A removed resource stays removed.
                    if state.phase != LifecyclePhase::Deleted {
                        state.readiness = ReadinessState::Error;
                    }
                    state.status = ResourceStatus::Failed;
                    state.error = Some(err.to_string());
                    tracing::error!(error = %err, "operation rejected by lifecycle");
                    return OperationEnd::Failed;
                }
            }
            before
        };

        let mut attempt = 1;
        loop {
            // The permit covers one invocation; backoff sleeps hold none.
            let permit = tokio::select! {
                permit = self.permits.acquire() => permit.ok(),
                _ = self.cancel.cancelled() => None,
            };
            let Some(permit) = permit else {
                self.restore(phase_before, readiness_before);
                return OperationEnd::Cancelled;
            };

            tracing::debug!(attempt, "dispatching operation");
            let result = self.invoke_once(operation, attempt).await;
            drop(permit);
            self.cell.lock().attempts += 1;

            let failure = match result {
                Ok(outcome) => match self.settle_outcome(phase_before, operation, &outcome, warnings) {
                    Ok(()) => {
                        tracing::info!(attempt, "operation completed");
                        return OperationEnd::Done;
                    }
                    Err(failure) => failure,
                },
                Err(InvokeError::Interrupted) if self.cancel.is_cancelled() => {
                    tracing::info!("operation interrupted by cancellation");
                    self.restore(phase_before, readiness_before);
                    return OperationEnd::Cancelled;
                }
                Err(err) => Failure {
                    readiness: ReadinessState::Error,
                    retryable: err.is_transient(),
                    message: err.to_string(),
                },
            };

            let idempotent = self.idempotent.contains(&operation);
            if failure.retryable && idempotent && self.retry.allows_another(attempt) {
                let delay = self.retry.backoff(attempt);
                tracing::warn!(attempt, error = %failure.message, ?delay, "retrying operation");
                warnings.push(Warning::retried(
                    &self.resource,
                    format!(
                        "{} attempt {} failed ({}), retrying",
                        operation, attempt, failure.message
                    ),
                ));

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.cancel.cancelled() => {
                        self.restore(phase_before, readiness_before);
                        return OperationEnd::Cancelled;
                    }
                }
                attempt += 1;
                continue;
            }

            tracing::error!(attempt, error = %failure.message, "operation failed");
            let mut state = self.cell.lock();
            state.phase = phase_before.fail();
            state.readiness = failure.readiness;
            state.status = ResourceStatus::Failed;
            state.error = Some(format!("{} failed: {}", operation, failure.message));
            return OperationEnd::Failed;
        }
    }

    async fn invoke_once(
        &self,
        operation: Operation,
        attempt: u32,
    ) -> Result<InvocationOutcome, InvokeError> {
        let invocation = Invocation {
            resource: self.resource.clone(),
            resource_type: self.resource_type.clone(),
            operation,
            inputs: self.inputs.clone(),
            attempt,
            cancellation: self.cancel.child_token(),
        };

        match tokio::time::timeout(self.timeout, self.invoker.invoke(&invocation)).await {
            Ok(result) => result,
            Err(_) => Err(InvokeError::Timeout(self.timeout)),
        }
    }

    /// Map the reported status and settle the resource's phase.
    fn settle_outcome(
        &self,
        phase_before: LifecyclePhase,
        operation: Operation,
        outcome: &InvocationOutcome,
        warnings: &mut Vec<Warning>,
    ) -> Result<(), Failure> {
        let mapped = self.mapper.map_detailed(
            &self.resource_type,
            &outcome.raw_status,
            outcome.error_present,
        );
        if !mapped.recognized && !outcome.error_present {
            warnings.push(Warning::unrecognized_status(
                &self.resource,
                format!(
                    "unrecognized status {:?} from {}, treating as pending",
                    outcome.raw_status, operation
                ),
            ));
        }

        match settle(phase_before, operation, mapped.state) {
            Settlement::Succeeded { phase, readiness } => {
                let mut state = self.cell.lock();
                state.phase = phase;
                state.readiness = readiness;
                state.completed.push(operation);
                for (key, value) in &outcome.outputs {
                    state.outputs.insert(key.clone(), value.clone());
                }
                Ok(())
            }
            Settlement::Failed { readiness } => Err(Failure {
                readiness,
                retryable: true,
                message: format!("reported status {:?} ({})", outcome.raw_status, readiness),
            }),
        }
    }

    fn restore(&self, phase: LifecyclePhase, readiness: ReadinessState) {
        let mut state = self.cell.lock();
        state.phase = phase;
        state.readiness = readiness;
    }
}

struct Failure {
    readiness: ReadinessState,
    retryable: bool,
    message: String,
}
