// ABOUTME: Orchestrator configuration types and parsing for rigging.yml.
// ABOUTME: Handles YAML parsing, duration fields, env overrides, and validation.

mod deserialize;
mod retry;

pub use retry::RetryPolicy;

use deserialize::{deserialize_operations, deserialize_timeouts};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::catalog::ResourceTemplate;
use crate::error::{Error, Result};
use crate::lifecycle::Operation;
use crate::readiness::{ReadinessStateMapper, StatusTable};
use crate::resolve::TruncationPolicy;
use crate::types::TypeName;

pub const CONFIG_FILENAME: &str = "rigging.yml";
pub const CONFIG_FILENAME_ALT: &str = "rigging.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".rigging/config.yml";

/// Overrides `concurrency` when set.
pub const CONCURRENCY_ENV: &str = "RIGGING_CONCURRENCY";

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of operations in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_operation_timeout", with = "humantime_serde")]
    pub operation_timeout: Duration,

    /// Per resource type timeouts, overriding `operation_timeout`.
    #[serde(default, deserialize_with = "deserialize_timeouts")]
    pub timeouts: HashMap<TypeName, Duration>,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Operations safe to repeat. Resource templates may override this list.
    #[serde(
        default = "default_idempotent_operations",
        deserialize_with = "deserialize_operations"
    )]
    pub idempotent_operations: Vec<Operation>,

    #[serde(default)]
    pub truncation: TruncationPolicy,

    /// Per resource type status vocabularies, merged over the built-in one.
    #[serde(default)]
    pub status_tables: HashMap<TypeName, StatusTable>,
}

fn default_concurrency() -> usize {
    4
}

fn default_operation_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_idempotent_operations() -> Vec<Operation> {
    vec![Operation::Check, Operation::Configure]
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            concurrency: default_concurrency(),
            operation_timeout: default_operation_timeout(),
            timeouts: HashMap::new(),
            retry: RetryPolicy::default(),
            idempotent_operations: default_idempotent_operations(),
            truncation: TruncationPolicy::default(),
            status_tables: HashMap::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "loading orchestrator configuration");
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Apply environment overrides on top of the parsed file.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(CONCURRENCY_ENV) {
            self.concurrency = value.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("{} must be a positive integer, got {:?}", CONCURRENCY_ENV, value))
            })?;
            self.validate()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::InvalidConfig("concurrency must be at least 1".to_string()));
        }
        if self.operation_timeout.is_zero() {
            return Err(Error::InvalidConfig("operation_timeout must be greater than zero".to_string()));
        }
        if let Some((type_name, _)) = self.timeouts.iter().find(|(_, t)| t.is_zero()) {
            return Err(Error::InvalidConfig(format!(
                "timeout for type {} must be greater than zero",
                type_name
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig("retry.max_attempts must be at least 1".to_string()));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(Error::InvalidConfig("retry.multiplier must be at least 1".to_string()));
        }
        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(Error::InvalidConfig(
                "retry.initial_backoff cannot exceed retry.max_backoff".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout_for(&self, resource_type: &TypeName) -> Duration {
        self.timeouts
            .get(resource_type)
            .copied()
            .unwrap_or(self.operation_timeout)
    }

    /// Whether `operation` may be retried for `resource`.
    pub fn is_idempotent(&self, resource: &ResourceTemplate, operation: Operation) -> bool {
        resource
            .idempotent
            .as_deref()
            .unwrap_or(&self.idempotent_operations)
            .contains(&operation)
    }

    pub fn status_mapper(&self) -> ReadinessStateMapper {
        self.status_tables
            .iter()
            .fold(ReadinessStateMapper::default(), |mapper, (type_name, table)| {
                mapper.with_type_table(type_name.clone(), table.clone())
            })
    }
}
