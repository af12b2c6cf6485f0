use std::fmt;
use std::str::FromStr;

use gifrev_core::worker_pool::{default_worker_count, validate_worker_count};
use gifrev_core::CoreError;
use serde::{Deserialize, Serialize};

/// What the dispatcher does when a worker's execution context dies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultPolicy {
    /// Log the fault and leave the worker busy forever. A job that was in
    /// flight on it stays registered and never gets a terminal event.
    #[default]
    Preserve,
    /// Start a fresh context in the same slot, put the in-flight job back
    /// at the head of the queue and return the worker to the pool.
    Replace,
}

impl FromStr for FaultPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "replace" => Ok(Self::Replace),
            other => Err(CoreError::Config {
                var: ENV_FAULT_POLICY,
                message: format!("expected `preserve` or `replace`, got `{other}`"),
            }),
        }
    }
}

impl fmt::Display for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preserve => f.write_str("preserve"),
            Self::Replace => f.write_str("replace"),
        }
    }
}

const ENV_WORKER_COUNT: &str = "GIFREV_WORKER_COUNT";
const ENV_FAULT_POLICY: &str = "GIFREV_FAULT_POLICY";

/// Scheduler configuration.
///
/// Defaults size the pool from the host's parallelism (fallback 2) and
/// keep faulted workers out of rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker execution contexts (at least 1).
    pub worker_count: usize,
    pub fault_policy: FaultPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                          |
    /// |-----------------------|----------------------------------|
    /// | `GIFREV_WORKER_COUNT` | host parallelism, fallback `2`   |
    /// | `GIFREV_FAULT_POLICY` | `preserve`                       |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_WORKER_COUNT) {
            let count: usize = raw.trim().parse().map_err(|_| CoreError::Config {
                var: ENV_WORKER_COUNT,
                message: format!("expected a positive integer, got `{raw}`"),
            })?;
            config.worker_count = validate_worker_count(count)?;
        }

        if let Some(raw) = lookup(ENV_FAULT_POLICY) {
            config.fault_policy = raw.parse()?;
        }

        Ok(config)
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }
}
