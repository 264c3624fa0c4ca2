//! gqlfuzz
//!
//! Stateful fuzzing for GraphQL APIs:
//!
//! - **Compile**: load an introspection document and build the producer/consumer
//!   [`DependencyGraph`] of its operations
//! - **Fuzz**: drive a live endpoint with dependency-respecting sequences of
//!   mutated requests, tracking discovered objects and recording findings
//!
//! The member crates are re-exported; most callers only need
//! [`compile_introspection`] and [`fuzz`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gqlfuzz::{compile_introspection, fuzz, BuildOptions, FuzzConfig, HttpTransport};
//!
//! let graph = compile_introspection(&doc, &BuildOptions::default())?;
//! let transport = Arc::new(HttpTransport::new("http://localhost:4000/graphql"));
//! let report = fuzz(Arc::new(graph), transport, FuzzConfig::from_env()).await;
//! println!("{} findings, coverage {:.0}%", report.findings.len(), report.stats.coverage_ratio * 100.0);
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

pub use gqlfuzz_core as core;
pub use gqlfuzz_resolver as resolver;
pub use gqlfuzz_transport as transport;
pub use gqlfuzz_types as types;

pub use gqlfuzz_core::{
    CancellationHandle, ClassificationPolicy, DynamicObject, Finding, FuzzConfig, FuzzEngine,
    FuzzReport, GenerationError, MutatorConfig, ObjectStore, RunStats, RunStrategy, Sequence,
    Status, StepError, Strategy,
};
pub use gqlfuzz_resolver::{
    build, BuildOptions, DependencyEdge, DependencyGraph, OperationNode, SchemaInconsistencyError,
};
pub use gqlfuzz_transport::{HttpTransport, RenderedRequest, Transport, TransportError, TransportResponse};
pub use gqlfuzz_types::{RetryConfig, SchemaModel};

/// Load an introspection document and compile its dependency graph.
pub fn compile_introspection(doc: &Value, options: &BuildOptions) -> Result<DependencyGraph> {
    let schema =
        SchemaModel::from_introspection(doc).context("failed to load introspection document")?;
    let graph = build(schema, options).context("failed to compile dependency graph")?;
    info!(
        operations = graph.len(),
        edges = graph.edges().len(),
        "compiled dependency graph"
    );
    Ok(graph)
}

/// Parse an introspection document from text and compile it.
pub fn compile_introspection_str(text: &str, options: &BuildOptions) -> Result<DependencyGraph> {
    let doc: Value = serde_json::from_str(text).context("introspection document is not valid JSON")?;
    compile_introspection(&doc, options)
}

/// Serialize a compiled graph (schema and operation nodes only).
pub fn graph_to_json(graph: &DependencyGraph) -> Result<Value> {
    serde_json::to_value(graph).context("failed to serialize dependency graph")
}

/// Reload a graph written by [`graph_to_json`]; edges and indexes are rebuilt.
pub fn graph_from_json(value: Value) -> Result<DependencyGraph> {
    serde_json::from_value(value).context("failed to deserialize dependency graph")
}

/// Fuzz `graph` through `transport` with a fresh object store.
pub async fn fuzz(
    graph: Arc<DependencyGraph>,
    transport: Arc<dyn Transport>,
    config: FuzzConfig,
) -> FuzzReport {
    let engine = FuzzEngine::new(graph, transport, Arc::new(ObjectStore::new()), config);
    engine.run().await
}
