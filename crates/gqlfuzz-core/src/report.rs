//! Findings, per-step records and the run report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use gqlfuzz_transport::RenderedRequest;

use crate::classifier::Status;
use crate::error::StepError;
use crate::object_store::DynamicObject;
use crate::sequence::Sequence;

/// Lifecycle of one step: `Pending -> Rendering -> Sent -> {Succeeded, Failed}`.
///
/// A step whose references cannot be resolved goes from `Rendering` straight
/// to `Failed` without being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepState {
    Pending,
    Rendering,
    Sent,
    Succeeded,
    Failed,
}

impl StepState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Succeeded | StepState::Failed)
    }
}

/// Per-operation outcome of one send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestResult {
    pub status: Status,
    /// Parsed response, or the raw body as a string when it was not JSON.
    pub response: Value,
    pub objects: Vec<DynamicObject>,
}

/// What happened to one step of an executed sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub operation: String,
    pub state: StepState,
    pub reason: Option<StepError>,
    pub http_status: Option<u16>,
    /// Sends made for this step (transport retries and prune resends included).
    pub attempts: usize,
    /// Last request sent for this step.
    pub request: Option<RenderedRequest>,
    /// `None` when the step was never sent.
    pub result: Option<RequestResult>,
}

impl StepRecord {
    pub fn pending(index: usize, operation: &str) -> Self {
        Self {
            index,
            operation: operation.to_string(),
            state: StepState::Pending,
            reason: None,
            http_status: None,
            attempts: 0,
            request: None,
            result: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.state == StepState::Succeeded
    }

    pub fn status(&self) -> Option<Status> {
        self.result.as_ref().map(|r| r.status)
    }

    /// Objects inserted into the store from this step's response.
    pub fn discovered(&self) -> usize {
        self.result.as_ref().map_or(0, |r| r.objects.len())
    }
}

/// A recorded server-side failure, with everything needed to reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub recorded_at: DateTime<Utc>,
    pub sequence: Sequence,
    /// Requests rendered for the steps up to and including the failing one.
    pub rendered: Vec<RenderedRequest>,
    pub failing_step: usize,
    pub operation: String,
    pub status: Status,
    /// Response payload, or `null` when no response arrived.
    pub response: Value,
    pub reason: StepError,
}

/// Append-only, thread-safe findings list.
#[derive(Debug, Default)]
pub struct FindingLog {
    findings: Mutex<Vec<Finding>>,
}

impl FindingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, finding: Finding) {
        self.findings.lock().push(finding);
    }

    pub fn len(&self) -> usize {
        self.findings.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every finding in recording order.
    pub fn snapshot(&self) -> Vec<Finding> {
        self.findings.lock().clone()
    }
}

/// Aggregated run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub sequences_generated: usize,
    pub sequences_executed: usize,
    /// Jobs for which no sequence could be generated, or that were not
    /// started because the run was cancelled.
    pub sequences_skipped: usize,
    pub steps_by_status: BTreeMap<Status, usize>,
    pub unmet_dependencies: usize,
    /// Operation -> HTTP status -> count.
    pub http_status_by_operation: BTreeMap<String, BTreeMap<u16, usize>>,
    pub objects_discovered: usize,
    /// Transport-level retries.
    pub retries: usize,
    /// Resends after pruning a non-null field.
    pub prune_retries: usize,
    pub operations_total: usize,
    pub operations_covered: usize,
    /// Operations that no job could reach.
    pub operations_excluded: Vec<String>,
    /// `operations_covered / operations_total`.
    pub coverage_ratio: f64,
}

impl RunStats {
    pub fn record_step(&mut self, step: &StepRecord) {
        if let Some(status) = step.status() {
            *self.steps_by_status.entry(status).or_default() += 1;
        }
        if step.reason.as_ref().is_some_and(StepError::is_unmet_dependency) {
            self.unmet_dependencies += 1;
        }
        if let Some(code) = step.http_status {
            *self
                .http_status_by_operation
                .entry(step.operation.clone())
                .or_default()
                .entry(code)
                .or_default() += 1;
        }
        self.objects_discovered += step.discovered();
    }

    pub fn set_coverage(&mut self, covered: usize, total: usize) {
        self.operations_covered = covered;
        self.operations_total = total;
        self.coverage_ratio = if total == 0 {
            0.0
        } else {
            covered as f64 / total as f64
        };
    }
}

/// Output of a fuzz run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub seed: u64,
    pub elapsed_ms: u64,
    pub cancelled: bool,
    /// Findings in recording order.
    pub findings: Vec<Finding>,
    pub stats: RunStats,
}

impl FuzzReport {
    pub fn findings_with_status(&self, status: Status) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::Strategy;

    fn finding(operation: &str) -> Finding {
        Finding {
            recorded_at: Utc::now(),
            sequence: Sequence {
                strategy: Strategy::Exploratory,
                target: None,
                seed: 0,
                steps: vec![],
            },
            rendered: vec![],
            failing_step: 0,
            operation: operation.to_string(),
            status: Status::ServerError,
            response: Value::Null,
            reason: StepError::ServerError { status: 500 },
        }
    }

    #[test]
    fn test_finding_log_is_append_only_under_concurrency() {
        let log = std::sync::Arc::new(FindingLog::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let log = std::sync::Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.record(finding(&format!("op{}-{}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.len(), 100);
    }

    #[test]
    fn test_stats_aggregate_steps() {
        let mut stats = RunStats::default();
        let mut step = StepRecord::pending(0, "createUser");
        step.state = StepState::Succeeded;
        step.http_status = Some(200);
        let user = |seq: u64| DynamicObject {
            type_name: "User".into(),
            value: serde_json::json!({"id": seq.to_string()}),
            producer: "createUser".into(),
            sequence: seq,
            scope: "default".into(),
        };
        step.result = Some(RequestResult {
            status: Status::Success,
            response: Value::Null,
            objects: vec![user(1), user(2)],
        });
        stats.record_step(&step);

        let mut unmet = StepRecord::pending(1, "deleteUser");
        unmet.state = StepState::Failed;
        unmet.reason = Some(StepError::UnmetDependency {
            type_name: "User".into(),
            path: "id".into(),
            producer_step: Some(0),
        });
        stats.record_step(&unmet);

        assert_eq!(stats.steps_by_status[&Status::Success], 1);
        assert_eq!(stats.unmet_dependencies, 1);
        assert_eq!(stats.objects_discovered, 2);
        assert_eq!(stats.http_status_by_operation["createUser"][&200], 1);

        stats.set_coverage(1, 4);
        assert!((stats.coverage_ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_serializes() {
        let report = FuzzReport {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            seed: 7,
            elapsed_ms: 3,
            cancelled: false,
            findings: vec![finding("createUser")],
            stats: RunStats::default(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["findings"][0]["status"], "SERVER_ERROR");
        assert_eq!(json["findings"][0]["reason"]["type"], "ServerError");
        let back: FuzzReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
