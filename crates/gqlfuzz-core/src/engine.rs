//! The fuzzing loop.
//!
//! A run is a list of jobs (objective sequences per eligible target plus
//! exploratory sequences) executed by a bounded pool of tokio tasks. Each job
//! generates one sequence against a snapshot of the shared [`ObjectStore`]
//! and executes its steps strictly in order:
//!
//! ```text
//! PENDING -> RENDERING -> SENT -> SUCCEEDED
//!                 |          \-> FAILED
//!                 \-> FAILED (unmet dependency, never sent)
//! ```
//!
//! Transport errors and timeouts are retried with exponential backoff up to
//! `retry.max_attempts()`; server errors and schema violations are findings
//! and are never retried. A non-null violation prunes the offending field
//! from the selection and resends, up to `max_prune_retries` times.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use gqlfuzz_resolver::DependencyGraph;
use gqlfuzz_transport::{RenderedRequest, Transport, TransportError, TransportResponse};

use crate::classifier::Status;
use crate::config::FuzzConfig;
use crate::error::{GenerationError, StepError};
use crate::extract::extract_objects;
use crate::mutator::{Mutator, PriorValues};
use crate::object_store::{DynamicObject, ObjectStore};
use crate::render::{PrunedFields, Renderer};
use crate::report::{Finding, FindingLog, FuzzReport, RequestResult, RunStats, StepRecord, StepState};
use crate::sequence::{generate, Binding, Sequence, Strategy};
use crate::utils::derive_seed;

/// Cloneable handle that cancels a run.
///
/// Jobs not yet started are skipped; in-flight steps finish their current
/// send, and pending retries are abandoned.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`CancellationHandle::cancel`] has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// One unit of scheduled work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub index: usize,
    pub strategy: Strategy,
    pub target: Option<String>,
    pub seed: u64,
}

/// Jobs for a run plus the operations no objective job can reach.
#[derive(Debug, Clone, Default)]
pub struct JobPlan {
    pub jobs: Vec<Job>,
    pub excluded: Vec<String>,
}

/// Everything observed while executing one sequence.
#[derive(Debug, Clone)]
pub struct SequenceOutcome {
    pub sequence: Sequence,
    pub steps: Vec<StepRecord>,
    /// Execution stopped early because the run was cancelled.
    pub cancelled: bool,
    pub retries: usize,
    pub prune_retries: usize,
}

enum JobOutcome {
    Executed(SequenceOutcome),
    NotGenerated,
    NotStarted,
}

/// Result of sending one request with retries.
struct Delivery {
    result: Result<TransportResponse, StepError>,
    attempts: usize,
}

#[derive(Clone)]
pub struct FuzzEngine {
    graph: Arc<DependencyGraph>,
    transport: Arc<dyn Transport>,
    store: Arc<ObjectStore>,
    findings: Arc<FindingLog>,
    config: Arc<FuzzConfig>,
    cancel: CancellationHandle,
}

impl FuzzEngine {
    pub fn new(
        graph: Arc<DependencyGraph>,
        transport: Arc<dyn Transport>,
        store: Arc<ObjectStore>,
        config: FuzzConfig,
    ) -> Self {
        Self {
            graph,
            transport,
            store,
            findings: Arc::new(FindingLog::new()),
            config: Arc::new(config),
            cancel: CancellationHandle::new(),
        }
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    pub fn store(&self) -> &Arc<ObjectStore> {
        &self.store
    }

    pub fn findings(&self) -> &FindingLog {
        &self.findings
    }

    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    /// Jobs this engine would run, in scheduling order.
    pub fn plan(&self) -> JobPlan {
        let config = &self.config;
        let mut plan = JobPlan::default();
        let next_job = |plan: &mut JobPlan, strategy: Strategy, target: Option<&str>| {
            let index = plan.jobs.len();
            plan.jobs.push(Job {
                index,
                strategy,
                target: target.map(str::to_string),
                seed: derive_seed(config.seed, "job", index),
            });
        };

        if config.strategy.includes(Strategy::Objective) {
            for node in self.graph.nodes() {
                let reachable = self.graph.is_satisfiable(node.name())
                    || node.required_types().iter().all(|t| self.store.has(t));
                if !reachable {
                    plan.excluded.push(node.name().to_string());
                    continue;
                }
                if !config.allows_target(node.name()) {
                    continue;
                }
                for _ in 0..config.sequences_per_target {
                    next_job(&mut plan, Strategy::Objective, Some(node.name()));
                }
            }
        }
        if config.strategy.includes(Strategy::Exploratory) {
            for _ in 0..config.sequences_per_target {
                next_job(&mut plan, Strategy::Exploratory, None);
            }
        }
        plan
    }

    /// Run every planned job and build the report.
    pub async fn run(&self) -> FuzzReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let plan = self.plan();

        info!(
            run_id = %run_id,
            seed = self.config.seed,
            operations = self.graph.len(),
            jobs = plan.jobs.len(),
            workers = self.config.workers,
            "starting fuzz run"
        );

        let budget_task = self.config.time_budget.map(|budget| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(budget) => {
                        info!(budget_ms = budget.as_millis() as u64, "time budget exhausted, cancelling");
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        });

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut join_set: JoinSet<JobOutcome> = JoinSet::new();
        for job in plan.jobs {
            let engine = self.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return JobOutcome::NotStarted;
                };
                if engine.cancel.is_cancelled() {
                    return JobOutcome::NotStarted;
                }
                engine.run_job(&job).await
            });
        }

        let mut stats = RunStats {
            operations_excluded: plan.excluded,
            ..RunStats::default()
        };
        let mut covered: BTreeSet<String> = BTreeSet::new();
        while let Some(res) = join_set.join_next().await {
            match res {
                Ok(JobOutcome::Executed(outcome)) => {
                    stats.sequences_generated += 1;
                    if outcome.steps.iter().any(|s| s.state != StepState::Pending) {
                        stats.sequences_executed += 1;
                    }
                    stats.retries += outcome.retries;
                    stats.prune_retries += outcome.prune_retries;
                    for step in &outcome.steps {
                        if step.state != StepState::Pending {
                            covered.insert(step.operation.clone());
                        }
                        stats.record_step(step);
                    }
                }
                Ok(JobOutcome::NotGenerated) | Ok(JobOutcome::NotStarted) => {
                    stats.sequences_skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, "fuzz job failed to complete");
                    stats.sequences_skipped += 1;
                }
            }
        }
        if let Some(task) = budget_task {
            task.abort();
        }
        stats.set_coverage(covered.len(), self.graph.len());

        let report = FuzzReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            seed: self.config.seed,
            elapsed_ms: clock.elapsed().as_millis() as u64,
            cancelled: self.cancel.is_cancelled(),
            findings: self.findings.snapshot(),
            stats,
        };
        info!(
            run_id = %run_id,
            findings = report.findings.len(),
            sequences = report.stats.sequences_executed,
            coverage = report.stats.coverage_ratio,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed_ms,
            "fuzz run finished"
        );
        report
    }

    async fn run_job(&self, job: &Job) -> JobOutcome {
        let snapshot = self.store.snapshot();
        let generated = generate(
            &self.graph,
            &snapshot,
            job.target.as_deref(),
            self.config.max_sequence_length,
            job.strategy,
            job.seed,
        );
        match generated {
            Ok(sequence) => JobOutcome::Executed(self.execute_sequence(&sequence).await),
            Err(e) => {
                log_generation_error(job, &e);
                JobOutcome::NotGenerated
            }
        }
    }

    /// Execute `sequence` step by step against the transport.
    pub async fn execute_sequence(&self, sequence: &Sequence) -> SequenceOutcome {
        let schema = self.graph.schema();
        let renderer = Renderer::new(schema, self.config.max_output_depth);
        let mut mutator = Mutator::new(
            schema,
            derive_seed(sequence.seed, "mutator", 0),
            self.config.mutator.clone(),
        );
        let mut outcome = SequenceOutcome {
            sequence: sequence.clone(),
            steps: sequence
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| StepRecord::pending(i, &s.operation))
                .collect(),
            cancelled: false,
            retries: 0,
            prune_retries: 0,
        };
        let mut produced: Vec<Vec<DynamicObject>> = vec![Vec::new(); sequence.steps.len()];
        let mut rendered: Vec<RenderedRequest> = Vec::new();
        let mut pruned = PrunedFields::new();

        debug!(
            strategy = ?sequence.strategy,
            target = sequence.target.as_deref().unwrap_or("-"),
            steps = sequence.steps.len(),
            seed = sequence.seed,
            "executing sequence"
        );

        for (index, step) in sequence.steps.iter().enumerate() {
            if self.cancel.is_cancelled() {
                outcome.cancelled = true;
                break;
            }
            let record = &mut outcome.steps[index];
            transition(record, StepState::Rendering);

            let Some(node) = self.graph.node(&step.operation) else {
                record.reason = Some(StepError::Rejected {
                    message: format!("unknown operation '{}'", step.operation),
                });
                transition(record, StepState::Failed);
                continue;
            };
            let operation = &node.operation;

            // Resolve references; a required one that cannot be resolved fails the step.
            let mut resolved = Vec::new();
            let mut unmet = None;
            for bound in &step.bindings {
                let requirement = &bound.requirement;
                let value = match &bound.binding {
                    Binding::Store {
                        type_name,
                        sequence,
                    } => self
                        .store
                        .get(type_name, *sequence)
                        .and_then(|o| o.field(&requirement.field).cloned()),
                    Binding::Forward { step, type_name } => produced
                        .get(*step)
                        .and_then(|objs| {
                            objs.iter()
                                .filter(|o| &o.type_name == type_name)
                                .find_map(|o| o.field(&requirement.field).cloned())
                        }),
                    Binding::Mutate => None,
                };
                match value {
                    Some(value) => resolved.push((requirement, value)),
                    None if requirement.required => {
                        unmet = Some(StepError::UnmetDependency {
                            type_name: requirement.type_name.clone(),
                            path: requirement.path.join("."),
                            producer_step: match bound.binding {
                                Binding::Forward { step, .. } => Some(step),
                                _ => None,
                            },
                        });
                        break;
                    }
                    None => {}
                }
            }
            if let Some(reason) = unmet {
                debug!(operation = %step.operation, reason = %reason, "step not sent");
                record.reason = Some(reason);
                transition(record, StepState::Failed);
                continue;
            }

            let prior = if self.config.mutator.replay_weight > 0.0 {
                PriorValues::from_objects(schema, &self.store.recent(PriorValues::PER_TYPE))
            } else {
                PriorValues::default()
            };
            let variables = renderer.variables(operation, &mut mutator, &prior, &resolved);

            let mut prunes = 0;
            loop {
                let request = renderer.render(operation, variables.clone(), &pruned);
                record.request = Some(request.clone());
                transition(record, StepState::Sent);

                let delivery = self.send_with_retries(&request).await;
                record.attempts += delivery.attempts;
                outcome.retries += delivery.attempts.saturating_sub(1);

                let response = match delivery.result {
                    Ok(response) => response,
                    Err(reason) => {
                        let status = match reason {
                            StepError::Timeout { .. } => Status::Timeout,
                            _ => Status::ServerError,
                        };
                        record.result = Some(RequestResult {
                            status,
                            response: Value::Null,
                            objects: Vec::new(),
                        });
                        if self.config.classification.is_finding(status) {
                            self.record_finding(sequence, &rendered, &request, index, status, Value::Null, &reason);
                        }
                        record.reason = Some(reason);
                        transition(record, StepState::Failed);
                        rendered.push(request);
                        break;
                    }
                };

                record.http_status = Some(response.status);
                let classification = self
                    .config
                    .classification
                    .classify(&operation.name, &response);
                let status = classification.status;
                let payload = classification
                    .payload
                    .clone()
                    .unwrap_or_else(|| Value::String(response.body.clone()));
                let message = classification.reason.clone().unwrap_or_default();
                let reason = match status {
                    Status::ServerError => Some(StepError::ServerError {
                        status: response.status,
                    }),
                    Status::SchemaViolation => Some(StepError::SchemaViolation { message }),
                    Status::ClientError => Some(StepError::Rejected { message }),
                    Status::Timeout | Status::Success => None,
                };

                if let Some(reason) = &reason {
                    if self.config.classification.is_finding(status) {
                        self.record_finding(sequence, &rendered, &request, index, status, payload.clone(), reason);
                    }
                }

                if let Some(violation) = classification.non_null_violation {
                    if prunes < self.config.max_prune_retries && !pruned.contains(&violation) {
                        debug!(
                            operation = %operation.name,
                            type_name = %violation.0,
                            field = %violation.1,
                            "pruning non-null field and resending"
                        );
                        pruned.insert(violation);
                        prunes += 1;
                        outcome.prune_retries += 1;
                        continue;
                    }
                }

                let mut objects = Vec::new();
                if status == Status::Success {
                    let extracted = extract_objects(schema, &operation.name, &operation.return_type, &payload);
                    objects = self
                        .store
                        .insert_batch(&operation.name, &self.config.scope, extracted);
                    produced[index] = objects.clone();
                }
                record.result = Some(RequestResult {
                    status,
                    response: payload,
                    objects,
                });
                record.reason = reason;
                let terminal = if status == Status::Success {
                    StepState::Succeeded
                } else {
                    StepState::Failed
                };
                transition(record, terminal);
                rendered.push(request);
                break;
            }
        }

        outcome
    }

    /// Send with a per-attempt deadline, retrying transport failures and
    /// timeouts with exponential backoff.
    async fn send_with_retries(&self, request: &RenderedRequest) -> Delivery {
        let retry = &self.config.retry;
        let timeout = self.config.request_timeout;
        let max_attempts = retry.max_attempts();
        let mut failures = 0usize;

        loop {
            let error = match tokio::time::timeout(timeout, self.transport.send(request, timeout)).await {
                Ok(Ok(response)) => {
                    return Delivery {
                        result: Ok(response),
                        attempts: failures + 1,
                    }
                }
                Ok(Err(e)) => e,
                Err(_) => TransportError::Timeout(timeout),
            };
            failures += 1;

            let exhausted = failures >= max_attempts;
            if !exhausted {
                let delay = retry.backoff_for(failures);
                warn!(
                    operation = %request.operation_name,
                    attempt = failures,
                    error = %error,
                    backoff_ms = delay.as_millis() as u64,
                    "request failed, retrying"
                );
                let cancelled = tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = self.cancel.cancelled() => true,
                };
                if !cancelled {
                    continue;
                }
            }

            let result = Err(if error.is_timeout() {
                StepError::Timeout { attempts: failures }
            } else {
                StepError::Transport {
                    attempts: failures,
                    message: error.to_string(),
                }
            });
            return Delivery {
                result,
                attempts: failures,
            };
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_finding(
        &self,
        sequence: &Sequence,
        earlier: &[RenderedRequest],
        request: &RenderedRequest,
        step: usize,
        status: Status,
        response: Value,
        reason: &StepError,
    ) {
        warn!(
            operation = %request.operation_name,
            step,
            status = %status,
            reason = %reason,
            "recorded finding"
        );
        let mut rendered = earlier.to_vec();
        rendered.push(request.clone());
        self.findings.record(Finding {
            recorded_at: Utc::now(),
            sequence: sequence.clone(),
            rendered,
            failing_step: step,
            operation: request.operation_name.clone(),
            status,
            response,
            reason: reason.clone(),
        });
    }
}

fn transition(record: &mut StepRecord, to: StepState) {
    trace!(step = record.index, operation = %record.operation, from = ?record.state, to = ?to, "step transition");
    record.state = to;
}

fn log_generation_error(job: &Job, error: &GenerationError) {
    debug!(
        job = job.index,
        strategy = ?job.strategy,
        target = job.target.as_deref().unwrap_or("-"),
        error = %error,
        "no sequence generated"
    );
}
