//! The compiled dependency graph.
//!
//! Nodes are operations in declaration order. Edges and the two reverse
//! indexes (type -> producers, type -> consumers) are derived from the nodes
//! in one place, [`DependencyGraph::from_nodes`], and never mutated
//! afterwards. The serialized form carries only the schema and the nodes;
//! loading it re-derives the rest.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use gqlfuzz_types::{Operation, OperationKind, SchemaModel};
use serde::{Deserialize, Serialize};

use crate::SchemaInconsistencyError;

/// What a mutation does to the object it touches, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MutationIntent {
    Read,
    Create,
    Update,
    Delete,
    Unknown,
}

const CREATE_PREFIXES: &[&str] = &["create", "add", "insert", "register", "new"];
const UPDATE_PREFIXES: &[&str] = &["update", "edit", "set", "modify", "patch"];
const DELETE_PREFIXES: &[&str] = &["delete", "remove", "destroy", "archive"];

/// `prefix` followed by a word boundary: end of name, `_`, or an uppercase letter.
fn has_verb_prefix(name: &str, prefix: &str) -> bool {
    if name.len() < prefix.len() || !name.is_char_boundary(prefix.len()) {
        return false;
    }
    let (head, rest) = name.split_at(prefix.len());
    if !head.eq_ignore_ascii_case(prefix) {
        return false;
    }
    match rest.chars().next() {
        None => true,
        Some(c) => c == '_' || c.is_uppercase(),
    }
}

impl MutationIntent {
    pub fn infer(operation: &Operation) -> Self {
        if operation.kind == OperationKind::Query {
            return MutationIntent::Read;
        }
        let name = operation.name.as_str();
        let matches = |prefixes: &[&str]| prefixes.iter().any(|p| has_verb_prefix(name, p));
        if matches(CREATE_PREFIXES) {
            MutationIntent::Create
        } else if matches(UPDATE_PREFIXES) {
            MutationIntent::Update
        } else if matches(DELETE_PREFIXES) {
            MutationIntent::Delete
        } else {
            MutationIntent::Unknown
        }
    }

    pub fn is_destructive(self) -> bool {
        self == MutationIntent::Delete
    }
}

/// An argument path that must be bound to a discovered object's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// Top-level argument name followed by nested input field names.
    pub path: Vec<String>,
    /// Object type whose identity is expected.
    pub type_name: String,
    /// Identity field of `type_name` (usually `id`).
    pub field: String,
    /// Every segment of `path` is non-null without a default.
    pub required: bool,
    /// A list wrapper appears somewhere along `path`.
    pub list: bool,
}

/// One operation plus what it produces and consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationNode {
    pub operation: Operation,
    pub intent: MutationIntent,
    /// Produced object types with the shallowest depth they occur at.
    pub produces: BTreeMap<String, usize>,
    pub consumes: BTreeSet<String>,
    pub requirements: Vec<Requirement>,
}

impl OperationNode {
    pub fn name(&self) -> &str {
        &self.operation.name
    }

    pub fn required_requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.requirements.iter().filter(|r| r.required)
    }

    /// Distinct object types this node must have before it can be sent.
    pub fn required_types(&self) -> BTreeSet<&str> {
        self.required_requirements()
            .map(|r| r.type_name.as_str())
            .collect()
    }

    pub fn produces_type(&self, type_name: &str) -> bool {
        self.produces.contains_key(type_name)
    }
}

/// `from` produces `type_name` and `to` consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub type_name: String,
}

#[derive(Serialize, Deserialize)]
struct GraphRepr {
    schema: SchemaModel,
    nodes: Vec<OperationNode>,
}

/// Operations linked by the object types they produce and consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GraphRepr", into = "GraphRepr")]
pub struct DependencyGraph {
    schema: SchemaModel,
    nodes: Vec<OperationNode>,
    index: HashMap<String, usize>,
    edges: Vec<DependencyEdge>,
    producers: BTreeMap<String, Vec<usize>>,
    consumers: BTreeMap<String, Vec<usize>>,
}

impl From<DependencyGraph> for GraphRepr {
    fn from(graph: DependencyGraph) -> Self {
        GraphRepr {
            schema: graph.schema,
            nodes: graph.nodes,
        }
    }
}

impl TryFrom<GraphRepr> for DependencyGraph {
    type Error = SchemaInconsistencyError;

    fn try_from(repr: GraphRepr) -> Result<Self, Self::Error> {
        DependencyGraph::from_nodes(repr.schema, repr.nodes)
    }
}

impl DependencyGraph {
    /// Assemble a graph from its nodes, deriving edges and reverse indexes.
    ///
    /// Every node must name an operation of `schema` and operation names must
    /// be unique. Nodes are re-ordered by declaration index.
    pub fn from_nodes(
        schema: SchemaModel,
        mut nodes: Vec<OperationNode>,
    ) -> Result<Self, SchemaInconsistencyError> {
        nodes.sort_by_key(|n| n.operation.declaration_index);

        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if schema.operation(node.name()).is_none() {
                return Err(SchemaInconsistencyError::UnknownOperation(
                    node.name().to_string(),
                ));
            }
            if index.insert(node.name().to_string(), i).is_some() {
                return Err(SchemaInconsistencyError::DuplicateOperation(
                    node.name().to_string(),
                ));
            }
            for type_name in node.produces.keys().chain(node.consumes.iter()) {
                if !schema.contains_type(type_name) {
                    return Err(SchemaInconsistencyError::UnknownType {
                        owner: node.name().to_string(),
                        type_name: type_name.clone(),
                    });
                }
            }
        }

        let mut producers: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut consumers: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            for type_name in node.produces.keys() {
                producers.entry(type_name.clone()).or_default().push(i);
            }
            for type_name in &node.consumes {
                consumers.entry(type_name.clone()).or_default().push(i);
            }
        }

        let mut edges = BTreeSet::new();
        for (type_name, from_ids) in &producers {
            let Some(to_ids) = consumers.get(type_name) else {
                continue;
            };
            for &from in from_ids {
                for &to in to_ids {
                    edges.insert((from, to, type_name.clone()));
                }
            }
        }
        let edges = edges
            .into_iter()
            .map(|(from, to, type_name)| DependencyEdge {
                from: nodes[from].name().to_string(),
                to: nodes[to].name().to_string(),
                type_name,
            })
            .collect();

        Ok(Self {
            schema,
            nodes,
            index,
            edges,
            producers,
            consumers,
        })
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.node(name).map(|n| &n.operation)
    }

    pub fn node(&self, name: &str) -> Option<&OperationNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[OperationNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges ordered by (producer, consumer) declaration order, then type.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn edges_into<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges.iter().filter(move |e| e.to == name)
    }

    pub fn edges_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DependencyEdge> {
        self.edges.iter().filter(move |e| e.from == name)
    }

    /// Operations producing `type_name`, in declaration order.
    pub fn producers_of(&self, type_name: &str) -> Vec<&OperationNode> {
        self.indexed(&self.producers, type_name)
    }

    /// Operations consuming `type_name`, in declaration order.
    pub fn consumers_of(&self, type_name: &str) -> Vec<&OperationNode> {
        self.indexed(&self.consumers, type_name)
    }

    fn indexed(&self, map: &BTreeMap<String, Vec<usize>>, type_name: &str) -> Vec<&OperationNode> {
        map.get(type_name)
            .map(|ids| ids.iter().map(|&i| &self.nodes[i]).collect())
            .unwrap_or_default()
    }

    pub fn has_producer(&self, type_name: &str) -> bool {
        self.producers.contains_key(type_name)
    }

    /// Operations with no required object references: valid sequence roots.
    pub fn roots(&self) -> impl Iterator<Item = &OperationNode> {
        self.nodes
            .iter()
            .filter(|n| n.required_requirements().next().is_none())
    }

    /// Every required object type of `name` has at least one producer.
    pub fn is_satisfiable(&self, name: &str) -> bool {
        self.node(name).is_some_and(|n| {
            n.required_requirements()
                .all(|r| self.has_producer(&r.type_name))
        })
    }
}
