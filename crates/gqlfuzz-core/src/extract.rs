//! Pull typed objects out of a response payload.

use serde_json::Value;

use gqlfuzz_types::{SchemaModel, TypeKind, TypeRef};

/// Every object-typed JSON object under `data.<operation>`, in pre-order.
///
/// Abstract types are resolved through `__typename`. An abstract-typed value
/// whose `__typename` is missing or not a possible type is skipped together
/// with everything below it.
pub fn extract_objects(
    schema: &SchemaModel,
    operation: &str,
    return_type: &TypeRef,
    payload: &Value,
) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    if let Some(root) = payload.get("data").and_then(|d| d.get(operation)) {
        walk(schema, return_type.named_type(), root, &mut out);
    }
    out
}

fn walk(schema: &SchemaModel, declared: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Array(items) => {
            for item in items {
                walk(schema, declared, item, out);
            }
        }
        Value::Object(map) => {
            let Some(concrete) = concrete_type(schema, declared, value) else {
                return;
            };
            let Some(def) = schema.get_type(concrete) else {
                return;
            };
            out.push((concrete.to_string(), value.clone()));
            for field in &def.fields {
                let named = field.ty.named_type();
                if !schema.kind_of(named).is_some_and(TypeKind::is_composite_output) {
                    continue;
                }
                if let Some(child) = map.get(&field.name) {
                    walk(schema, named, child, out);
                }
            }
        }
        _ => {}
    }
}

fn concrete_type<'a>(schema: &'a SchemaModel, declared: &'a str, value: &'a Value) -> Option<&'a str> {
    let def = schema.get_type(declared)?;
    match def.kind {
        TypeKind::Object => Some(declared),
        TypeKind::Interface | TypeKind::Union => {
            let typename = value.get("__typename")?.as_str()?;
            def.possible_types
                .iter()
                .any(|p| p == typename)
                .then_some(typename)
        }
        _ => None,
    }
}
