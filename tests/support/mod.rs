// ABOUTME: Test support utilities.
// ABOUTME: Provides tracing setup, a scripted in-memory invoker, and catalog fixtures.

use async_trait::async_trait;
use parking_lot::Mutex;
use rigging::invoker::{Invocation, InvocationOutcome, InvokeError, OperationInvoker};
use rigging::lifecycle::Operation;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("rigging=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// The catalog used by the end-to-end scenarios: an app depending on a host,
/// a DNS zone, and a database.
#[allow(dead_code)]
pub const SITE: &str = r#"
types:
  compute: {}
  dns: {}
  database: {}
  webapp: {}
resources:
  - name: host
    type: compute
  - name: zone
    type: dns
  - name: db
    type: database
  - name: app
    type: webapp
    properties:
      domain: example.com
    requirements:
      - name: host
        type: compute
      - name: zone
        type: dns
      - name: db
        type: database
deployments:
  - name: site
    primary: app
    members: [host, zone, db, app]
"#;

/// One recorded invocation.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Call {
    pub resource: String,
    pub operation: Operation,
    pub inputs: BTreeMap<String, Value>,
    pub attempt: u32,
}

/// How the invoker answers one invocation.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Reply {
    Outcome(InvocationOutcome),
    Fail(InvokeError),
    /// Block until the run is cancelled, then report an interruption.
    Hang,
    /// Panic inside the invoker.
    Panic,
}

/// In-memory invoker answering from per-(resource, operation) scripts.
///
/// Scripted replies are consumed in order; once a script is exhausted the
/// `always` reply (if any) applies, otherwise the operation succeeds with its
/// conventional status.
#[derive(Default)]
#[allow(dead_code)]
pub struct ScriptedInvoker {
    queued: Mutex<HashMap<(String, Operation), VecDeque<Reply>>>,
    always: Mutex<HashMap<(String, Operation), Reply>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for the next invocation of `operation` on `resource`.
    pub fn then(self, resource: &str, operation: Operation, reply: Reply) -> Self {
        self.queued
            .lock()
            .entry((resource.to_string(), operation))
            .or_default()
            .push_back(reply);
        self
    }

    /// Answer every invocation of `operation` on `resource` with `reply`.
    pub fn always(self, resource: &str, operation: Operation, reply: Reply) -> Self {
        self.always
            .lock()
            .insert((resource.to_string(), operation), reply);
        self
    }

    /// Fail every invocation of `operation` on `resource`.
    pub fn failing(self, resource: &str, operation: Operation) -> Self {
        self.always(
            resource,
            operation,
            Reply::Fail(InvokeError::Failed(format!("{} {} exploded", operation, resource))),
        )
    }

    /// Sleep before answering any invocation for `resource`.
    pub fn delayed(self, resource: &str, delay: Duration) -> Self {
        self.delays.lock().insert(resource.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// `(resource, operation)` pairs in dispatch order.
    pub fn dispatched(&self) -> Vec<(String, Operation)> {
        self.calls
            .lock()
            .iter()
            .map(|c| (c.resource.clone(), c.operation))
            .collect()
    }

    pub fn calls_for(&self, resource: &str) -> Vec<Operation> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.resource == resource)
            .map(|c| c.operation)
            .collect()
    }

    /// Index of the first call for `resource`, if any.
    pub fn first_call(&self, resource: &str) -> Option<usize> {
        self.calls.lock().iter().position(|c| c.resource == resource)
    }

    /// Index of the last call for `resource`, if any.
    pub fn last_call(&self, resource: &str) -> Option<usize> {
        self.calls.lock().iter().rposition(|c| c.resource == resource)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn reply_for(&self, resource: &str, operation: Operation) -> Reply {
        let key = (resource.to_string(), operation);
        if let Some(reply) = self.queued.lock().get_mut(&key).and_then(VecDeque::pop_front) {
            return reply;
        }
        if let Some(reply) = self.always.lock().get(&key) {
            return reply.clone();
        }
        Reply::Outcome(InvocationOutcome::status(conventional_status(operation)))
    }
}

/// Status an operation reports when it succeeds.
#[allow(dead_code)]
pub fn conventional_status(operation: Operation) -> &'static str {
    match operation {
        Operation::Check | Operation::Configure => "ok",
        Operation::Start => "started",
        Operation::Stop => "stopped",
        Operation::Delete => "deleted",
    }
}

#[async_trait]
impl OperationInvoker for ScriptedInvoker {
    async fn invoke(&self, invocation: &Invocation) -> Result<InvocationOutcome, InvokeError> {
        let resource = invocation.resource.as_str().to_string();
        self.calls.lock().push(Call {
            resource: resource.clone(),
            operation: invocation.operation,
            inputs: invocation.inputs.clone(),
            attempt: invocation.attempt,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.lock().get(&resource).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self.reply_for(&resource, invocation.operation);
        let result = match reply {
            Reply::Outcome(outcome) => Ok(outcome),
            Reply::Fail(err) => Err(err),
            Reply::Hang => {
                invocation.cancellation.cancelled().await;
                Err(InvokeError::Interrupted)
            }
            Reply::Panic => panic!("invoker crashed on {} {}", invocation.operation, resource),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
