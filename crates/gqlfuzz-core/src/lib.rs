//! gqlfuzz Core
//!
//! Stateful sequence fuzzing over a compiled
//! [`DependencyGraph`](gqlfuzz_resolver::DependencyGraph).
//!
//! This crate provides:
//! - [`object_store`]: the shared, append-only table of discovered objects
//! - [`mutator`]: seeded boundary, violation and replay value generation
//! - [`sequence`]: objective-driven and exploratory sequence generation
//! - [`render`]: selection sets and variables for a single step
//! - [`extract`]: typed objects pulled out of responses
//! - [`classifier`]: response status classification and the finding policy
//! - [`engine`]: the bounded-concurrency execution loop with retries and cancellation
//! - [`report`]: step records, findings and run statistics
//! - [`config`]: run configuration and `GQLFUZZ_*` overrides
//!
//! # Example
//!
//! ```ignore
//! use gqlfuzz_core::{FuzzConfig, FuzzEngine, ObjectStore};
//!
//! let engine = FuzzEngine::new(graph, transport, Arc::new(ObjectStore::new()), FuzzConfig::from_env());
//! let report = engine.run().await;
//! for finding in &report.findings {
//!     println!("{} at step {}: {}", finding.status, finding.failing_step, finding.reason);
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod mutator;
pub mod object_store;
pub mod render;
pub mod report;
pub mod sequence;
pub mod utils;

#[cfg(test)]
mod test_fixtures;

pub use classifier::{Classification, ClassificationPolicy, Status};
pub use config::{FuzzConfig, RunStrategy};
pub use engine::{CancellationHandle, FuzzEngine, Job, JobPlan, SequenceOutcome};
pub use error::{GenerationError, StepError};
pub use mutator::{MutatedValue, Mutator, MutatorConfig, PriorValues, ValueClass};
pub use object_store::{DynamicObject, ObjectStore, StoreSnapshot};
pub use render::{PrunedFields, Renderer};
pub use report::{Finding, FindingLog, FuzzReport, RequestResult, RunStats, StepRecord, StepState};
pub use sequence::{generate, ArgumentBinding, Binding, Sequence, SequenceStep, Strategy};
