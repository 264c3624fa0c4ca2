//! Runtime error taxonomy.
//!
//! [`GenerationError`] means no sequence could be built for a job; the job is
//! skipped. [`StepError`] is the recorded reason a single step FAILED. Neither
//! ever aborts a run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a sequence could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GenerationError {
    #[error("unknown target operation '{0}'")]
    UnknownTarget(String),
    #[error("'{target}' requires '{type_name}' but nothing produces it and the store has none")]
    Unsatisfiable { target: String, type_name: String },
    #[error("'{target}' needs {needed} steps but the maximum sequence length is {max_length}")]
    TooLong {
        target: String,
        needed: usize,
        max_length: usize,
    },
    #[error("no operation can be placed")]
    NothingPlaceable,
    #[error("objective generation needs a target operation")]
    MissingTarget,
}

/// Reason attached to a FAILED step.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StepError {
    /// A required reference could not be resolved, so the step was not sent.
    #[error("unmet dependency on '{type_name}' (argument {path})")]
    UnmetDependency {
        type_name: String,
        path: String,
        /// Earlier step of the same sequence expected to produce the object.
        producer_step: Option<usize>,
    },
    #[error("timed out after {attempts} attempts")]
    Timeout { attempts: usize },
    #[error("transport failure after {attempts} attempts: {message}")]
    Transport { attempts: usize, message: String },
    #[error("server error (HTTP {status})")]
    ServerError { status: u16 },
    #[error("schema violation: {message}")]
    SchemaViolation { message: String },
    /// The server rejected the request (validation or business error).
    #[error("rejected: {message}")]
    Rejected { message: String },
}

impl StepError {
    pub fn is_unmet_dependency(&self) -> bool {
        matches!(self, StepError::UnmetDependency { .. })
    }
}
