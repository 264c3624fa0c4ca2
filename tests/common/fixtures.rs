//! Introspection document builders.
//!
//! Documents use the same JSON shape the canonical introspection query
//! returns, so they go through the real loader.

use serde_json::{json, Value};

/// A named type reference (`SCALAR`, `OBJECT`, `INPUT_OBJECT`, ...).
pub fn named(kind: &str, name: &str) -> Value {
    json!({"kind": kind, "name": name, "ofType": null})
}

pub fn non_null(inner: Value) -> Value {
    json!({"kind": "NON_NULL", "name": null, "ofType": inner})
}

pub fn list(inner: Value) -> Value {
    json!({"kind": "LIST", "name": null, "ofType": inner})
}

/// A field of an object type; `args` are `(name, type)` pairs.
pub fn field(name: &str, args: &[(&str, Value)], ty: Value) -> Value {
    let args: Vec<Value> = args
        .iter()
        .map(|(arg, ty)| json!({"name": arg, "type": ty, "defaultValue": null}))
        .collect();
    json!({"name": name, "args": args, "type": ty})
}

pub fn object_type(name: &str, fields: Vec<Value>) -> Value {
    json!({
        "kind": "OBJECT",
        "name": name,
        "fields": fields,
        "inputFields": null,
        "enumValues": null,
        "possibleTypes": null,
    })
}

/// Full introspection response with `Query` and `Mutation` roots.
pub fn introspection_doc(types: Vec<Value>) -> Value {
    json!({
        "data": {
            "__schema": {
                "queryType": {"name": "Query"},
                "mutationType": {"name": "Mutation"},
                "subscriptionType": null,
                "types": types,
            }
        }
    })
}

fn id() -> Value {
    non_null(named("SCALAR", "ID"))
}

/// `createUser(name: String): User` and `deleteUser(id: ID!): Boolean`,
/// plus a `ping` query so the query root is not empty.
pub fn user_lifecycle_doc() -> Value {
    introspection_doc(vec![
        object_type(
            "Query",
            vec![field("ping", &[], named("SCALAR", "String"))],
        ),
        object_type(
            "Mutation",
            vec![
                field(
                    "createUser",
                    &[("name", named("SCALAR", "String"))],
                    named("OBJECT", "User"),
                ),
                field("deleteUser", &[("id", id())], named("SCALAR", "Boolean")),
            ],
        ),
        object_type(
            "User",
            vec![
                field("id", &[], id()),
                field("name", &[], named("SCALAR", "String")),
            ],
        ),
    ])
}

/// A shop schema with nesting, lists and a cross-type reference, used for
/// graph-wide properties.
#[allow(dead_code)]
pub fn shop_doc() -> Value {
    introspection_doc(vec![
        object_type(
            "Query",
            vec![
                field("customer", &[("id", id())], named("OBJECT", "Customer")),
                field(
                    "orders",
                    &[("customerId", id())],
                    non_null(list(non_null(named("OBJECT", "Order")))),
                ),
            ],
        ),
        object_type(
            "Mutation",
            vec![
                field(
                    "createCustomer",
                    &[("email", non_null(named("SCALAR", "String")))],
                    named("OBJECT", "Customer"),
                ),
                field(
                    "placeOrder",
                    &[("customerId", id()), ("productId", id())],
                    named("OBJECT", "Order"),
                ),
                field("createProduct", &[("sku", named("SCALAR", "String"))], named("OBJECT", "Product")),
                field("cancelOrder", &[("orderId", id())], named("SCALAR", "Boolean")),
            ],
        ),
        object_type(
            "Customer",
            vec![
                field("id", &[], id()),
                field("email", &[], named("SCALAR", "String")),
                field("orders", &[], list(named("OBJECT", "Order"))),
            ],
        ),
        object_type(
            "Order",
            vec![
                field("id", &[], id()),
                field("customer", &[], named("OBJECT", "Customer")),
                field("items", &[], list(named("OBJECT", "LineItem"))),
            ],
        ),
        object_type(
            "LineItem",
            vec![
                field("id", &[], id()),
                field("product", &[], named("OBJECT", "Product")),
            ],
        ),
        object_type(
            "Product",
            vec![
                field("id", &[], id()),
                field("sku", &[], named("SCALAR", "String")),
            ],
        ),
    ])
}
