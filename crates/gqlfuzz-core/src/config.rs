//! Run configuration.
//!
//! [`FuzzConfig::default`] is safe for a local target; [`FuzzConfig::from_env`]
//! overlays `GQLFUZZ_*` variables on top of it.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `GQLFUZZ_SEED` | `seed` |
//! | `GQLFUZZ_WORKERS` | `workers` |
//! | `GQLFUZZ_MAX_SEQUENCE_LENGTH` | `max_sequence_length` |
//! | `GQLFUZZ_SEQUENCES_PER_TARGET` | `sequences_per_target` |
//! | `GQLFUZZ_REQUEST_TIMEOUT_MS` | `request_timeout` |
//! | `GQLFUZZ_MAX_RETRIES` | `retry.max_retries` |
//! | `GQLFUZZ_RETRY_INITIAL_MS` | `retry.initial_backoff` |
//! | `GQLFUZZ_RETRY_MAX_MS` | `retry.max_backoff` |
//! | `GQLFUZZ_TIME_BUDGET_SECS` | `time_budget` |
//! | `GQLFUZZ_STRATEGY` | `strategy` (`objective`, `exploratory`, `both`) |
//! | `GQLFUZZ_TARGETS` | `targets` (comma-separated) |
//! | `GQLFUZZ_SCOPE` | `scope` |
//! | `GQLFUZZ_CLIENT_ERRORS_ARE_FINDINGS` | `classification.client_errors_are_findings` |
//! | `GQLFUZZ_TIMEOUTS_ARE_FINDINGS` | `classification.timeouts_are_findings` |
//! | `GQLFUZZ_NULL_DATA_IS_SUCCESS` | `classification.null_data_is_success` |

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gqlfuzz_resolver::builder::DEFAULT_MAX_OUTPUT_DEPTH;
use gqlfuzz_types::env_utils::{env_bool_or, env_list, env_millis_or, env_var, env_var_or};
use gqlfuzz_types::RetryConfig;

use crate::classifier::ClassificationPolicy;
use crate::mutator::MutatorConfig;
use crate::sequence::Strategy;

/// Which job kinds a run schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStrategy {
    Objective,
    Exploratory,
    Both,
}

impl RunStrategy {
    pub fn includes(self, strategy: Strategy) -> bool {
        match (self, strategy) {
            (RunStrategy::Both, _) => true,
            (RunStrategy::Objective, Strategy::Objective) => true,
            (RunStrategy::Exploratory, Strategy::Exploratory) => true,
            _ => false,
        }
    }
}

impl FromStr for RunStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "objective" => Ok(RunStrategy::Objective),
            "exploratory" => Ok(RunStrategy::Exploratory),
            "both" => Ok(RunStrategy::Both),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzConfig {
    pub max_sequence_length: usize,
    /// Sequences per objective target, and exploratory sequences per run.
    pub sequences_per_target: usize,
    /// Deadline for a single send.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub seed: u64,
    /// Sequences in flight at once.
    pub workers: usize,
    /// Cancel the run once this much time has passed.
    pub time_budget: Option<Duration>,
    pub strategy: RunStrategy,
    /// Objective targets; empty means every operation.
    pub targets: Vec<String>,
    /// Actor label stamped on discovered objects.
    pub scope: String,
    /// Nesting followed when building selection sets.
    pub max_output_depth: usize,
    pub classification: ClassificationPolicy,
    pub mutator: MutatorConfig,
    /// Resends after pruning a non-null field from the selection.
    pub max_prune_retries: usize,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        Self {
            max_sequence_length: 10,
            sequences_per_target: 3,
            request_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            seed: 0,
            workers: 4,
            time_budget: None,
            strategy: RunStrategy::Both,
            targets: Vec::new(),
            scope: "default".to_string(),
            max_output_depth: DEFAULT_MAX_OUTPUT_DEPTH,
            classification: ClassificationPolicy::default(),
            mutator: MutatorConfig::default(),
            max_prune_retries: 3,
        }
    }
}

impl FuzzConfig {
    /// Defaults overlaid with `GQLFUZZ_*` environment variables.
    pub fn from_env() -> Self {
        let base = Self::default();
        let mut config = Self {
            seed: env_var_or("GQLFUZZ_SEED", base.seed),
            workers: env_var_or("GQLFUZZ_WORKERS", base.workers),
            max_sequence_length: env_var_or("GQLFUZZ_MAX_SEQUENCE_LENGTH", base.max_sequence_length),
            sequences_per_target: env_var_or(
                "GQLFUZZ_SEQUENCES_PER_TARGET",
                base.sequences_per_target,
            ),
            request_timeout: env_millis_or("GQLFUZZ_REQUEST_TIMEOUT_MS", base.request_timeout),
            strategy: env_var_or("GQLFUZZ_STRATEGY", base.strategy),
            ..base
        };
        config.retry.max_retries = env_var_or("GQLFUZZ_MAX_RETRIES", config.retry.max_retries);
        config.retry.initial_backoff =
            env_millis_or("GQLFUZZ_RETRY_INITIAL_MS", config.retry.initial_backoff);
        config.retry.max_backoff = env_millis_or("GQLFUZZ_RETRY_MAX_MS", config.retry.max_backoff);
        if let Some(secs) = env_var::<u64>("GQLFUZZ_TIME_BUDGET_SECS") {
            config.time_budget = Some(Duration::from_secs(secs));
        }
        let targets = env_list("GQLFUZZ_TARGETS");
        if !targets.is_empty() {
            config.targets = targets;
        }
        if let Some(scope) = env_var::<String>("GQLFUZZ_SCOPE") {
            config.scope = scope;
        }
        let policy = &mut config.classification;
        policy.client_errors_are_findings =
            env_bool_or("GQLFUZZ_CLIENT_ERRORS_ARE_FINDINGS", policy.client_errors_are_findings);
        policy.timeouts_are_findings =
            env_bool_or("GQLFUZZ_TIMEOUTS_ARE_FINDINGS", policy.timeouts_are_findings);
        policy.null_data_is_success =
            env_bool_or("GQLFUZZ_NULL_DATA_IS_SUCCESS", policy.null_data_is_success);
        config
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_strategy(mut self, strategy: RunStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Whether `operation` may be used as an objective target.
    pub fn allows_target(&self, operation: &str) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| t == operation)
    }
}
