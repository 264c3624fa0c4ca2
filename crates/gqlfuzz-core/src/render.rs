//! Materialize a sequence step into a GraphQL request.
//!
//! Documents always use variables, one per top-level argument, named after
//! the argument:
//!
//! ```text
//! mutation createPost($userId: ID!, $title: String) {
//!   createPost(userId: $userId, title: $title) { __typename id title author { __typename id name } }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use gqlfuzz_resolver::Requirement;
use gqlfuzz_transport::RenderedRequest;
use gqlfuzz_types::{Operation, SchemaModel, TypeKind, TypeRef};

use crate::mutator::{Mutator, PriorValues};

/// Times an object type may appear along one selection path.
pub const MAX_OBJECT_CYCLES: usize = 2;

/// `(type, field)` pairs left out of selections.
pub type PrunedFields = BTreeSet<(String, String)>;

pub struct Renderer<'a> {
    schema: &'a SchemaModel,
    max_output_depth: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(schema: &'a SchemaModel, max_output_depth: usize) -> Self {
        Self {
            schema,
            max_output_depth,
        }
    }

    pub fn render(&self, operation: &Operation, variables: Value, pruned: &PrunedFields) -> RenderedRequest {
        RenderedRequest {
            operation_name: operation.name.clone(),
            query: self.query(operation, pruned),
            variables,
        }
    }

    /// Document text for `operation`.
    pub fn query(&self, operation: &Operation, pruned: &PrunedFields) -> String {
        let mut out = format!("{} {}", operation.kind.keyword(), operation.name);
        if !operation.args.is_empty() {
            let decls: Vec<String> = operation
                .args
                .iter()
                .map(|a| format!("${}: {}", a.name, a.ty))
                .collect();
            out.push_str(&format!("({})", decls.join(", ")));
        }
        out.push_str(" { ");
        out.push_str(&operation.name);
        if !operation.args.is_empty() {
            let uses: Vec<String> = operation
                .args
                .iter()
                .map(|a| format!("{}: ${}", a.name, a.name))
                .collect();
            out.push_str(&format!("({})", uses.join(", ")));
        }
        if let Some(selection) = self.selection(&operation.return_type, pruned) {
            out.push_str(&format!(" {{ {} }}", selection));
        }
        out.push_str(" }");
        out
    }

    /// Selection set body for a return type, or `None` for leaf types.
    pub fn selection(&self, ty: &TypeRef, pruned: &PrunedFields) -> Option<String> {
        let mut seen = BTreeMap::new();
        self.select(ty.named_type(), 0, &mut seen, pruned)
    }

    fn select(
        &self,
        type_name: &str,
        depth: usize,
        seen: &mut BTreeMap<String, usize>,
        pruned: &PrunedFields,
    ) -> Option<String> {
        let def = self.schema.get_type(type_name)?;
        match def.kind {
            TypeKind::Object => {
                let count = seen.entry(type_name.to_string()).or_insert(0);
                if *count >= MAX_OBJECT_CYCLES {
                    return None;
                }
                *count += 1;

                let mut parts = vec!["__typename".to_string()];
                for field in &def.fields {
                    if field.has_required_args()
                        || pruned.contains(&(type_name.to_string(), field.name.clone()))
                    {
                        continue;
                    }
                    let named = field.ty.named_type();
                    match self.schema.kind_of(named) {
                        Some(kind) if kind.is_leaf() => parts.push(field.name.clone()),
                        Some(kind) if kind.is_composite_output() && depth < self.max_output_depth => {
                            if let Some(inner) = self.select(named, depth + 1, seen, pruned) {
                                parts.push(format!("{} {{ {} }}", field.name, inner));
                            }
                        }
                        _ => {}
                    }
                }

                if let Some(count) = seen.get_mut(type_name) {
                    *count -= 1;
                }
                Some(parts.join(" "))
            }
            TypeKind::Interface | TypeKind::Union => {
                let mut parts = vec!["__typename".to_string()];
                for possible in &def.possible_types {
                    if let Some(inner) = self.select(possible, depth, seen, pruned) {
                        parts.push(format!("... on {} {{ {} }}", possible, inner));
                    }
                }
                Some(parts.join(" "))
            }
            _ => None,
        }
    }

    /// Variables for `operation`: mutated values for every argument, with
    /// each resolved reference written at its requirement path.
    pub fn variables(
        &self,
        operation: &Operation,
        mutator: &mut Mutator<'_>,
        prior: &PriorValues,
        resolved: &[(&Requirement, Value)],
    ) -> Value {
        let mut map = Map::new();
        for arg in &operation.args {
            map.insert(arg.name.clone(), mutator.mutate(&arg.ty, prior).value);
        }
        for (requirement, value) in resolved {
            let Some((head, rest)) = requirement.path.split_first() else {
                continue;
            };
            let Some(arg) = operation.argument(head) else {
                continue;
            };
            let slot = map.entry(head.clone()).or_insert(Value::Null);
            self.place(slot, &arg.ty, rest, value, mutator, prior);
        }
        Value::Object(map)
    }

    fn place(
        &self,
        slot: &mut Value,
        ty: &TypeRef,
        rest: &[String],
        value: &Value,
        mutator: &mut Mutator<'_>,
        prior: &PriorValues,
    ) {
        match ty.unwrap_non_null() {
            TypeRef::List(inner) => {
                if rest.is_empty() {
                    *slot = Value::Array(vec![value.clone()]);
                    return;
                }
                if !slot.as_array().is_some_and(|a| !a.is_empty()) {
                    *slot = Value::Array(vec![Value::Null]);
                }
                if let Value::Array(items) = slot {
                    for item in items {
                        self.place(item, inner, rest, value, mutator, prior);
                    }
                }
            }
            TypeRef::NonNull(inner) => self.place(slot, inner, rest, value, mutator, prior),
            named @ TypeRef::Named(name) => {
                let Some((head, tail)) = rest.split_first() else {
                    *slot = value.clone();
                    return;
                };
                let Some(field) = self
                    .schema
                    .get_type(name)
                    .and_then(|t| t.input_fields.iter().find(|f| &f.name == head))
                else {
                    return;
                };
                if !slot.is_object() {
                    *slot = mutator.mutate_present(named, prior).value;
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                }
                if let Value::Object(fields) = slot {
                    let child = fields.entry(head.clone()).or_insert(Value::Null);
                    self.place(child, &field.ty, tail, value, mutator, prior);
                }
            }
        }
    }
}
