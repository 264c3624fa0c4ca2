//! Sequence generation over the dependency graph.
//!
//! Two strategies:
//!
//! - **Objective**: plan backwards from a target. Each required object type is
//!   bound from the store when the store has one; otherwise the cheapest
//!   producer (fewest additional steps, ties broken by declaration order) is
//!   planned first, recursively.
//! - **Exploratory**: breadth-first from the roots. Each layer is every
//!   not-yet-placed operation whose required types are available from the
//!   store or from earlier steps. Layer order is a seeded rotation of
//!   declaration order with destructive operations last.
//!
//! A placed step never has an unbound required reference: each one is either
//! a store slot or a forward reference to an earlier step of the same
//! sequence. Forward references are resolved by the engine at execution time.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use gqlfuzz_resolver::{DependencyGraph, OperationNode, Requirement};

use crate::error::GenerationError;
use crate::object_store::StoreSnapshot;

/// How a sequence is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Objective,
    Exploratory,
}

/// Where the value of one requirement comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Binding {
    /// An object already in the store.
    Store { type_name: String, sequence: u64 },
    /// An object the given earlier step is expected to produce.
    Forward { step: usize, type_name: String },
    /// No reference: the mutator supplies a value.
    Mutate,
}

/// A requirement together with its binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentBinding {
    pub requirement: Requirement,
    pub binding: Binding,
}

/// One operation of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    pub operation: String,
    pub bindings: Vec<ArgumentBinding>,
}

/// An ordered, dependency-respecting chain of operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    pub strategy: Strategy,
    pub target: Option<String>,
    pub seed: u64,
    pub steps: Vec<SequenceStep>,
}

impl Sequence {
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().map(|s| s.operation.as_str())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Build one sequence.
///
/// Identical `(graph, store, target, max_length, strategy, seed)` always
/// produce an identical sequence.
pub fn generate(
    graph: &DependencyGraph,
    store: &StoreSnapshot,
    target: Option<&str>,
    max_length: usize,
    strategy: Strategy,
    seed: u64,
) -> Result<Sequence, GenerationError> {
    let mut planner = Planner {
        graph,
        store,
        rng: StdRng::seed_from_u64(seed),
        max_length,
        steps: Vec::new(),
        available: BTreeMap::new(),
    };

    match strategy {
        Strategy::Objective => {
            let target = target.ok_or(GenerationError::MissingTarget)?;
            let node = graph
                .node(target)
                .ok_or_else(|| GenerationError::UnknownTarget(target.to_string()))?;
            let mut visiting = vec![node.name()];
            planner.place_objective(node, &mut visiting)?;
        }
        Strategy::Exploratory => planner.explore()?,
    }

    trace!(
        strategy = ?strategy,
        target = target.unwrap_or("-"),
        steps = planner.steps.len(),
        "generated sequence"
    );

    Ok(Sequence {
        strategy,
        target: target.map(str::to_string),
        seed,
        steps: planner.steps,
    })
}

struct Planner<'g> {
    graph: &'g DependencyGraph,
    store: &'g StoreSnapshot,
    rng: StdRng,
    max_length: usize,
    steps: Vec<SequenceStep>,
    /// Type -> latest step expected to produce it.
    available: BTreeMap<String, usize>,
}

impl<'g> Planner<'g> {
    fn in_store(&self, req: &Requirement) -> bool {
        self.store.has_field(&req.type_name, &req.field)
    }

    fn satisfied(&self, req: &Requirement) -> bool {
        self.available.contains_key(&req.type_name) || self.in_store(req)
    }

    /// First required requirement of `node` for each distinct type.
    fn required_by_type(node: &OperationNode) -> Vec<&Requirement> {
        let mut seen = BTreeSet::new();
        let mut out: Vec<&Requirement> = node
            .required_requirements()
            .filter(|r| seen.insert(r.type_name.as_str()))
            .collect();
        out.sort_by(|a, b| a.type_name.cmp(&b.type_name));
        out
    }

    fn bind(&mut self, req: &Requirement, prefer_forward: bool) -> Binding {
        let forward = self.available.get(&req.type_name).copied();
        if prefer_forward {
            if let Some(step) = forward {
                return Binding::Forward {
                    step,
                    type_name: req.type_name.clone(),
                };
            }
        }
        let candidates: Vec<u64> = self
            .store
            .objects_with_field(&req.type_name, &req.field)
            .map(|o| o.sequence)
            .collect();
        if let Some(&sequence) = candidates.choose(&mut self.rng) {
            return Binding::Store {
                type_name: req.type_name.clone(),
                sequence,
            };
        }
        match forward {
            Some(step) => Binding::Forward {
                step,
                type_name: req.type_name.clone(),
            },
            None => Binding::Mutate,
        }
    }

    fn push_step(&mut self, node: &'g OperationNode, prefer_forward: bool) {
        let bindings = node
            .requirements
            .iter()
            .map(|req| ArgumentBinding {
                requirement: req.clone(),
                binding: self.bind(req, prefer_forward),
            })
            .collect();
        let index = self.steps.len();
        self.steps.push(SequenceStep {
            operation: node.name().to_string(),
            bindings,
        });
        for type_name in node.produces.keys() {
            self.available.insert(type_name.clone(), index);
        }
    }

    // ---- Objective ----

    fn place_objective(
        &mut self,
        node: &'g OperationNode,
        visiting: &mut Vec<&'g str>,
    ) -> Result<(), GenerationError> {
        for req in Self::required_by_type(node) {
            if self.satisfied(req) {
                continue;
            }
            let producer = self.best_producer(&req.type_name, visiting).ok_or_else(|| {
                GenerationError::Unsatisfiable {
                    target: node.name().to_string(),
                    type_name: req.type_name.clone(),
                }
            })?;
            visiting.push(producer.name());
            let placed = self.place_objective(producer, visiting);
            visiting.pop();
            placed?;
        }

        if self.steps.len() >= self.max_length {
            return Err(GenerationError::TooLong {
                target: node.name().to_string(),
                needed: self.steps.len() + 1,
                max_length: self.max_length,
            });
        }
        self.push_step(node, false);
        Ok(())
    }

    /// Cheapest producer of `type_name` not already on the planning path.
    fn best_producer(&self, type_name: &str, visiting: &[&'g str]) -> Option<&'g OperationNode> {
        let budget = self.max_length.saturating_sub(self.steps.len());
        let costs = self.type_costs(budget);
        let mut best: Option<(usize, &'g OperationNode)> = None;
        // producers_of is in declaration order; strict `<` keeps the earliest on ties.
        for producer in self.graph.producers_of(type_name) {
            if visiting.contains(&producer.name()) {
                continue;
            }
            let Some(cost) = self.node_cost(producer, &costs, budget) else {
                continue;
            };
            if best.map_or(true, |(c, _)| cost < c) {
                best = Some((cost, producer));
            }
        }
        best.map(|(_, node)| node)
    }

    /// Fewest steps that make each type available on top of the current
    /// store and plan. Types missing from the map cannot be produced within
    /// `budget` steps.
    ///
    /// Fixed point over every producer. Costs only ever decrease and never
    /// drop below one.
    fn type_costs(&self, budget: usize) -> BTreeMap<&'g str, usize> {
        let mut costs: BTreeMap<&'g str, usize> = BTreeMap::new();
        loop {
            let mut changed = false;
            for node in self.graph.nodes() {
                let Some(cost) = self.node_cost(node, &costs, budget) else {
                    continue;
                };
                for type_name in node.produces.keys() {
                    let known = costs.entry(type_name.as_str()).or_insert(usize::MAX);
                    if cost < *known {
                        *known = cost;
                        changed = true;
                    }
                }
            }
            if !changed {
                return costs;
            }
        }
    }

    /// Steps needed to place `node` given the per-type `costs`, or `None` if
    /// a required type is unreachable or the total exceeds `budget`.
    fn node_cost(
        &self,
        node: &OperationNode,
        costs: &BTreeMap<&'g str, usize>,
        budget: usize,
    ) -> Option<usize> {
        if budget == 0 {
            return None;
        }
        let mut total = 1;
        for req in Self::required_by_type(node) {
            if self.satisfied(req) {
                continue;
            }
            total += *costs.get(req.type_name.as_str())?;
            if total > budget {
                return None;
            }
        }
        Some(total)
    }

    // ---- Exploratory ----

    fn explore(&mut self) -> Result<(), GenerationError> {
        let mut placed: BTreeSet<&str> = BTreeSet::new();

        while self.steps.len() < self.max_length {
            let mut layer: Vec<&'g OperationNode> = self
                .graph
                .nodes()
                .iter()
                .filter(|n| !placed.contains(n.name()))
                .filter(|n| n.required_requirements().all(|r| self.satisfied(r)))
                .collect();
            if layer.is_empty() {
                break;
            }

            let offset = self.rng.gen_range(0..layer.len());
            layer.rotate_left(offset);
            // Stable: keeps the rotated order inside each group.
            layer.sort_by_key(|n| n.intent.is_destructive());

            for node in layer {
                if self.steps.len() >= self.max_length {
                    break;
                }
                placed.insert(node.name());
                self.push_step(node, true);
            }
        }

        if self.steps.is_empty() {
            return Err(GenerationError::NothingPlaceable);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::ObjectStore;
    use crate::test_fixtures::{blog_graph, field, id, object, op};
    use gqlfuzz_resolver::{build, BuildOptions};
    use gqlfuzz_types::{OperationKind, SchemaModel, TypeRef};
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn names(seq: &Sequence) -> Vec<&str> {
        seq.operations().collect()
    }

    #[test]
    fn test_objective_plans_producer_first() {
        let graph = blog_graph();
        let store = StoreSnapshot::default();
        let seq = generate(&graph, &store, Some("deleteUser"), 10, Strategy::Objective, 1).unwrap();
        assert_eq!(names(&seq), vec!["createUser", "deleteUser"]);
        assert_eq!(
            seq.steps[1].bindings[0].binding,
            Binding::Forward {
                step: 0,
                type_name: "User".into()
            }
        );
    }

    #[test]
    fn test_objective_prefers_store() {
        let graph = blog_graph();
        let store = ObjectStore::new();
        let user = store.insert("User", json!({"id": "u1"}), "createUser", "default");
        let seq = generate(&graph, &store.snapshot(), Some("createPost"), 10, Strategy::Objective, 1)
            .unwrap();
        assert_eq!(names(&seq), vec!["createPost"]);
        assert_eq!(
            seq.steps[0].bindings[0].binding,
            Binding::Store {
                type_name: "User".into(),
                sequence: user.sequence
            }
        );
    }

    #[test]
    fn test_objective_ignores_objects_without_identity() {
        let graph = blog_graph();
        let store = ObjectStore::new();
        store.insert("User", json!({"id": null, "name": "x"}), "createUser", "default");
        let seq = generate(&graph, &store.snapshot(), Some("deleteUser"), 10, Strategy::Objective, 1)
            .unwrap();
        assert_eq!(names(&seq), vec!["createUser", "deleteUser"]);
    }

    #[test]
    fn test_objective_unsatisfiable_target() {
        let graph = blog_graph();
        let err = generate(
            &graph,
            &StoreSnapshot::default(),
            Some("revokeSession"),
            10,
            Strategy::Objective,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, GenerationError::Unsatisfiable { ref type_name, .. } if type_name == "Session"));
    }

    #[test]
    fn test_objective_too_long() {
        let graph = blog_graph();
        let err = generate(&graph, &StoreSnapshot::default(), Some("deleteUser"), 1, Strategy::Objective, 1)
            .unwrap_err();
        assert!(matches!(err, GenerationError::TooLong { .. }));
    }

    #[test]
    fn test_objective_unknown_and_missing_target() {
        let graph = blog_graph();
        let store = StoreSnapshot::default();
        assert_eq!(
            generate(&graph, &store, Some("nope"), 10, Strategy::Objective, 1).unwrap_err(),
            GenerationError::UnknownTarget("nope".into())
        );
        assert_eq!(
            generate(&graph, &store, None, 10, Strategy::Objective, 1).unwrap_err(),
            GenerationError::MissingTarget
        );
    }

    #[test]
    fn test_exploratory_respects_dependencies() {
        let graph = blog_graph();
        for seed in 0..20 {
            let seq = generate(&graph, &StoreSnapshot::default(), None, 10, Strategy::Exploratory, seed)
                .unwrap();
            let ops = names(&seq);
            assert_eq!(ops[0], "createUser", "seed {}", seed);
            assert!(!ops.contains(&"revokeSession"));
            for (i, step) in seq.steps.iter().enumerate() {
                for b in &step.bindings {
                    if let Binding::Forward { step: from, .. } = b.binding {
                        assert!(from < i);
                    }
                    if b.requirement.required {
                        assert_ne!(b.binding, Binding::Mutate);
                    }
                }
            }
            let unique: BTreeSet<_> = ops.iter().collect();
            assert_eq!(unique.len(), ops.len());
        }
    }

    #[test]
    fn test_exploratory_defers_deletes_within_layer() {
        let graph = blog_graph();
        let seq = generate(&graph, &StoreSnapshot::default(), None, 10, Strategy::Exploratory, 5).unwrap();
        let ops = names(&seq);
        assert_eq!(ops.last(), Some(&"deleteUser"));
        assert_eq!(ops.len(), 4);
    }

    #[test]
    fn test_exploratory_honours_max_length() {
        let graph = blog_graph();
        let seq = generate(&graph, &StoreSnapshot::default(), None, 2, Strategy::Exploratory, 5).unwrap();
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let graph = blog_graph();
        let store = ObjectStore::new();
        for i in 0..5 {
            store.insert("User", json!({"id": format!("u{}", i)}), "createUser", "default");
        }
        let snapshot = store.snapshot();
        for strategy in [Strategy::Objective, Strategy::Exploratory] {
            let a = generate(&graph, &snapshot, Some("createPost"), 10, strategy, 99).unwrap();
            let b = generate(&graph, &snapshot, Some("createPost"), 10, strategy, 99).unwrap();
            assert_eq!(a, b);
        }
    }

    /// Twenty mutations that both need and produce `User` (through
    /// `Post.author`) must not make planning blow up.
    #[test]
    fn test_objective_planning_with_many_cyclic_producers() {
        let types = vec![
            object("User", vec![field("id", id()), field("name", TypeRef::named("String"))]),
            object(
                "Post",
                vec![field("id", id()), field("author", TypeRef::named("User"))],
            ),
        ];
        let mut ops: Vec<_> = (0..20)
            .map(|k| {
                op(
                    &format!("updatePost{}", k),
                    OperationKind::Mutation,
                    vec![("userId", id())],
                    TypeRef::named("Post"),
                )
            })
            .collect();
        ops.push(op(
            "createUser",
            OperationKind::Mutation,
            vec![("name", TypeRef::named("String"))],
            TypeRef::named("User"),
        ));
        ops.push(op(
            "deleteUser",
            OperationKind::Mutation,
            vec![("id", id())],
            TypeRef::named("Boolean"),
        ));
        let graph = build(SchemaModel::new(types, ops), &BuildOptions::default()).unwrap();
        assert!(graph.producers_of("User").len() > 20);

        let started = Instant::now();
        let seq = generate(&graph, &StoreSnapshot::default(), Some("deleteUser"), 10, Strategy::Objective, 1)
            .unwrap();
        let elapsed = started.elapsed();
        assert_eq!(names(&seq), vec!["createUser", "deleteUser"]);
        assert!(elapsed < Duration::from_secs(1), "planning took {:?}", elapsed);

        let seq = generate(&graph, &StoreSnapshot::default(), Some("updatePost7"), 10, Strategy::Objective, 1)
            .unwrap();
        assert_eq!(names(&seq), vec!["createUser", "updatePost7"]);
    }
}
