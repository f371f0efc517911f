// ABOUTME: Library root for rigging - dependency resolution and lifecycle orchestration.
// ABOUTME: Catalog -> resolve -> graph -> orchestrator, with invokers supplied by the caller.

pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod invoker;
pub mod lifecycle;
pub mod orchestrator;
pub mod readiness;
pub mod resolve;
pub mod types;

pub use catalog::ResourceCatalog;
pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use invoker::{Invocation, InvocationOutcome, InvokeError, OperationInvoker};
pub use lifecycle::TargetState;
pub use orchestrator::{DeploymentReport, LifecycleOrchestrator, RunError, RunStatus};
