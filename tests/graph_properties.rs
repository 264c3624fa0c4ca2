//! Structural properties of compiled graphs.

mod common;

use std::collections::BTreeSet;

use common::{assert_ok, shop_doc, user_lifecycle_doc};
use gqlfuzz::{compile_introspection, graph_from_json, graph_to_json, BuildOptions, DependencyGraph};

fn shop_graph(options: &BuildOptions) -> DependencyGraph {
    assert_ok(compile_introspection(&shop_doc(), options), "compile shop schema")
}

#[test]
fn test_one_node_per_operation() {
    let graph = shop_graph(&BuildOptions::default());
    let schema_ops: Vec<&str> = graph
        .schema()
        .operations()
        .iter()
        .map(|o| o.name.as_str())
        .collect();
    let node_ops: Vec<&str> = graph.nodes().iter().map(|n| n.name()).collect();
    assert_eq!(node_ops, schema_ops);
    assert_eq!(graph.len(), 6);
}

#[test]
fn test_edges_link_existing_producers_and_consumers() {
    let graph = shop_graph(&BuildOptions::default());
    assert!(!graph.edges().is_empty());
    for edge in graph.edges() {
        let from = graph.node(&edge.from).expect("edge source exists");
        let to = graph.node(&edge.to).expect("edge target exists");
        assert!(from.produces_type(&edge.type_name), "{:?}", edge);
        assert!(to.consumes.contains(&edge.type_name), "{:?}", edge);
    }
}

#[test]
fn test_prefixed_ids_resolve_to_types() {
    let graph = shop_graph(&BuildOptions::default());
    let place = graph.node("placeOrder").unwrap();
    let required: BTreeSet<&str> = place.required_types();
    assert_eq!(required, BTreeSet::from(["Customer", "Product"]));

    let cancel = graph.node("cancelOrder").unwrap();
    assert_eq!(cancel.required_types(), BTreeSet::from(["Order"]));

    let edge_types: BTreeSet<(&str, &str)> = graph
        .edges_into("cancelOrder")
        .map(|e| (e.from.as_str(), e.type_name.as_str()))
        .collect();
    assert!(edge_types.contains(&("placeOrder", "Order")));
    assert!(graph
        .edges_from("createProduct")
        .any(|e| e.to == "placeOrder" && e.type_name == "Product"));
}

#[test]
fn test_output_depth_bounds_produced_types() {
    for depth in 0..=3 {
        let options = BuildOptions::default().with_output_depth(depth);
        let graph = shop_graph(&options);
        for node in graph.nodes() {
            for (type_name, found_at) in &node.produces {
                assert!(
                    *found_at <= depth,
                    "{} produces {} at depth {} (limit {})",
                    node.name(),
                    type_name,
                    found_at,
                    depth
                );
            }
        }
    }

    let shallow = shop_graph(&BuildOptions::default().with_output_depth(0));
    let produced: Vec<&String> = shallow.node("placeOrder").unwrap().produces.keys().collect();
    assert_eq!(produced, vec!["Order"]);

    // Order -> items -> product is two levels down.
    let deep = shop_graph(&BuildOptions::default().with_output_depth(2));
    assert_eq!(deep.node("placeOrder").unwrap().produces.get("Product"), Some(&2));
}

#[test]
fn test_scalar_returns_produce_nothing() {
    let graph = shop_graph(&BuildOptions::default());
    assert!(graph.node("cancelOrder").unwrap().produces.is_empty());
}

#[test]
fn test_graph_reloads_from_json() {
    for doc in [user_lifecycle_doc(), shop_doc()] {
        let graph = assert_ok(compile_introspection(&doc, &BuildOptions::default()), "compile");
        let json = assert_ok(graph_to_json(&graph), "serialize graph");
        let reloaded = assert_ok(graph_from_json(json), "reload graph");
        assert_eq!(reloaded, graph);
        assert_eq!(reloaded.edges(), graph.edges());
    }
}

#[test]
fn test_reload_rejects_unknown_operation() {
    let graph = compile_introspection(&user_lifecycle_doc(), &BuildOptions::default()).unwrap();
    let mut json = graph_to_json(&graph).unwrap();
    json["nodes"][0]["operation"]["name"] = serde_json::json!("vanished");
    assert!(graph_from_json(json).is_err());
}
