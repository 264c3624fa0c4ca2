//! gqlfuzz Resolver
//!
//! Compiles a [`SchemaModel`](gqlfuzz_types::SchemaModel) into a
//! [`DependencyGraph`] of operations linked by the object types they produce
//! and consume.
//!
//! This crate provides:
//! - [`names`]: mapping ID-typed arguments (`userId`, `deleteUser(id:)`) to the object type they identify
//! - [`unwrap`]: depth-bounded structural unwrapping of return and input shapes
//! - [`graph`]: the graph itself, its reverse indexes and its serde form
//! - [`builder`]: the pure `build(schema, options)` entry point
//!
//! # Producers and consumers
//!
//! An operation *produces* every object type reachable in its return shape
//! within `max_output_depth` levels. It *consumes* every input object type in
//! its arguments and every object type referenced by an ID-typed argument.
//! An edge `A -> B {T}` exists for every `T` in `produces(A) ∩ consumes(B)`.
//! Cycles and self-loops are normal.

pub mod builder;
pub mod graph;
pub mod names;
pub mod unwrap;

pub use builder::{build, BuildOptions};
pub use graph::{DependencyEdge, DependencyGraph, MutationIntent, OperationNode, Requirement};
pub use names::{edit_distance, IdResolver};

use thiserror::Error;

/// The schema cannot be compiled: it references types it does not define, or
/// it is otherwise structurally unusable. Fatal and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaInconsistencyError {
    #[error("{owner} references type '{type_name}' which is not defined in the schema")]
    UnknownType { owner: String, type_name: String },
    #[error("{owner} uses output type '{type_name}' in an input position")]
    OutputTypeAsInput { owner: String, type_name: String },
    #[error("operation '{0}' is declared more than once")]
    DuplicateOperation(String),
    #[error("graph node '{0}' has no matching operation in the schema")]
    UnknownOperation(String),
}
