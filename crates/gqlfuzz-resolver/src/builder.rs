//! Compile phase: `build(schema, options) -> DependencyGraph`.
//!
//! Pure and deterministic. The same schema and options always produce the
//! same nodes, edges and index order.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gqlfuzz_types::SchemaModel;

use crate::graph::{DependencyGraph, MutationIntent, OperationNode};
use crate::names::IdResolver;
use crate::unwrap::{input_shape, output_types};
use crate::SchemaInconsistencyError;

/// Default nesting depth followed in return shapes.
pub const DEFAULT_MAX_OUTPUT_DEPTH: usize = 2;
/// Default nesting depth followed in input objects.
pub const DEFAULT_MAX_INPUT_DEPTH: usize = 10;

/// Options for the graph builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Object nesting followed in return shapes (0 = direct return type only).
    pub max_output_depth: usize,
    /// Input object nesting followed in arguments.
    pub max_input_depth: usize,
    /// Scalars treated as object identities.
    pub id_scalars: Vec<String>,
    /// Maximum edit distance for fuzzy ID-name matching.
    pub max_name_distance: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            max_output_depth: DEFAULT_MAX_OUTPUT_DEPTH,
            max_input_depth: DEFAULT_MAX_INPUT_DEPTH,
            id_scalars: vec!["ID".to_string()],
            max_name_distance: 2,
        }
    }
}

impl BuildOptions {
    pub fn with_output_depth(mut self, depth: usize) -> Self {
        self.max_output_depth = depth;
        self
    }

    pub fn with_input_depth(mut self, depth: usize) -> Self {
        self.max_input_depth = depth;
        self
    }
}

/// Compile `schema` into a dependency graph.
///
/// Fails on the first type reference that points outside the schema.
pub fn build(
    schema: SchemaModel,
    options: &BuildOptions,
) -> Result<DependencyGraph, SchemaInconsistencyError> {
    let resolver = IdResolver::new(&schema, &options.id_scalars, options.max_name_distance);

    let mut nodes = Vec::with_capacity(schema.operations().len());
    for operation in schema.operations() {
        let produces = output_types(
            &schema,
            &operation.return_type,
            options.max_output_depth,
            &operation.name,
        )?;
        let shape = input_shape(
            &schema,
            operation,
            &resolver,
            &options.id_scalars,
            options.max_input_depth,
        )?;

        debug!(
            operation = %operation.name,
            produces = produces.len(),
            consumes = shape.consumes.len(),
            requirements = shape.requirements.len(),
            "compiled operation"
        );

        nodes.push(OperationNode {
            intent: MutationIntent::infer(operation),
            operation: operation.clone(),
            produces,
            consumes: shape.consumes,
            requirements: shape.requirements,
        });
    }

    let graph = DependencyGraph::from_nodes(schema, nodes)?;
    let unsatisfiable = graph
        .nodes()
        .iter()
        .filter(|n| !graph.is_satisfiable(n.name()))
        .count();
    info!(
        operations = graph.len(),
        edges = graph.edges().len(),
        roots = graph.roots().count(),
        unsatisfiable,
        "dependency graph compiled"
    );
    Ok(graph)
}
