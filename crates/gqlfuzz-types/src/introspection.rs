//! Loader for standard GraphQL introspection documents.
//!
//! Accepts the JSON returned by the canonical introspection query, either the
//! full response (`{"data": {"__schema": ...}}`) or the bare `__schema`
//! wrapper. Dangling type references are *not* checked here; the graph
//! builder reports those as schema inconsistencies.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::schema::{
    Argument, FieldDef, GraphQLType, InputValueDef, Operation, OperationKind, SchemaModel,
    TypeKind, TypeRef,
};

/// Errors raised while reading an introspection document.
#[derive(Debug, Error)]
pub enum IntrospectionError {
    #[error("introspection document has no __schema object")]
    MissingSchema,
    #[error("malformed introspection document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("introspection document declares no query root type")]
    MissingQueryRoot,
    #[error("root type '{0}' is not defined in the document")]
    RootTypeNotFound(String),
    #[error("invalid type reference in {owner}")]
    InvalidTypeRef { owner: String },
    #[error("type '{name}' has unknown kind '{kind}'")]
    UnknownKind { name: String, kind: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    query_type: Option<RawRootName>,
    mutation_type: Option<RawRootName>,
    #[serde(default)]
    types: Vec<RawType>,
}

#[derive(Debug, Deserialize)]
struct RawRootName {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawType {
    kind: String,
    name: Option<String>,
    #[serde(default)]
    fields: Option<Vec<RawField>>,
    #[serde(default)]
    input_fields: Option<Vec<RawInputValue>>,
    #[serde(default)]
    enum_values: Option<Vec<RawEnumValue>>,
    #[serde(default)]
    possible_types: Option<Vec<RawTypeRef>>,
}

#[derive(Debug, Deserialize)]
struct RawField {
    name: String,
    #[serde(default)]
    args: Option<Vec<RawInputValue>>,
    #[serde(rename = "type")]
    ty: RawTypeRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInputValue {
    name: String,
    #[serde(rename = "type")]
    ty: RawTypeRef,
    #[serde(default)]
    default_value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEnumValue {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTypeRef {
    kind: String,
    name: Option<String>,
    #[serde(default)]
    of_type: Option<Box<RawTypeRef>>,
}

impl RawTypeRef {
    fn to_type_ref(&self, owner: &str) -> Result<TypeRef, IntrospectionError> {
        let invalid = || IntrospectionError::InvalidTypeRef {
            owner: owner.to_string(),
        };
        match self.kind.as_str() {
            "NON_NULL" => {
                let inner = self.of_type.as_ref().ok_or_else(invalid)?;
                Ok(TypeRef::non_null(inner.to_type_ref(owner)?))
            }
            "LIST" => {
                let inner = self.of_type.as_ref().ok_or_else(invalid)?;
                Ok(TypeRef::list(inner.to_type_ref(owner)?))
            }
            _ => self
                .name
                .as_ref()
                .map(|n| TypeRef::Named(n.clone()))
                .ok_or_else(invalid),
        }
    }
}

fn parse_kind(name: &str, kind: &str) -> Result<TypeKind, IntrospectionError> {
    match kind {
        "SCALAR" => Ok(TypeKind::Scalar),
        "ENUM" => Ok(TypeKind::Enum),
        "OBJECT" => Ok(TypeKind::Object),
        "INPUT_OBJECT" => Ok(TypeKind::InputObject),
        "INTERFACE" => Ok(TypeKind::Interface),
        "UNION" => Ok(TypeKind::Union),
        other => Err(IntrospectionError::UnknownKind {
            name: name.to_string(),
            kind: other.to_string(),
        }),
    }
}

fn convert_input_values(
    owner: &str,
    values: Option<&Vec<RawInputValue>>,
) -> Result<Vec<InputValueDef>, IntrospectionError> {
    values
        .map(|vs| vs.as_slice())
        .unwrap_or_default()
        .iter()
        .map(|v| {
            Ok(InputValueDef {
                name: v.name.clone(),
                ty: v.ty.to_type_ref(&format!("{}.{}", owner, v.name))?,
                default_value: v.default_value.clone(),
            })
        })
        .collect()
}

fn convert_type(raw: &RawType, name: &str) -> Result<GraphQLType, IntrospectionError> {
    let kind = parse_kind(name, &raw.kind)?;

    let fields = raw
        .fields
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|f| {
            let owner = format!("{}.{}", name, f.name);
            Ok(FieldDef {
                name: f.name.clone(),
                ty: f.ty.to_type_ref(&owner)?,
                args: convert_input_values(&owner, f.args.as_ref())?,
            })
        })
        .collect::<Result<Vec<_>, IntrospectionError>>()?;

    let possible_types = raw
        .possible_types
        .as_deref()
        .unwrap_or_default()
        .iter()
        .filter_map(|t| t.name.clone())
        .collect();

    Ok(GraphQLType {
        name: name.to_string(),
        kind,
        fields,
        input_fields: convert_input_values(name, raw.input_fields.as_ref())?,
        enum_values: raw
            .enum_values
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|v| v.name.clone())
            .collect(),
        possible_types,
    })
}

fn root_operations(
    root: &GraphQLType,
    kind: OperationKind,
    out: &mut Vec<Operation>,
) {
    for field in &root.fields {
        out.push(Operation {
            name: field.name.clone(),
            kind,
            args: field
                .args
                .iter()
                .map(|a| Argument {
                    name: a.name.clone(),
                    ty: a.ty.clone(),
                    required: a.is_required(),
                })
                .collect(),
            return_type: field.ty.clone(),
            declaration_index: out.len(),
        });
    }
}

impl SchemaModel {
    /// Build a schema model from an introspection JSON document.
    pub fn from_introspection(doc: &Value) -> Result<Self, IntrospectionError> {
        let schema_value = doc
            .get("data")
            .and_then(|d| d.get("__schema"))
            .or_else(|| doc.get("__schema"))
            .ok_or(IntrospectionError::MissingSchema)?;

        let raw: RawSchema = serde_json::from_value(schema_value.clone())?;

        let mut types = Vec::with_capacity(raw.types.len());
        for raw_type in &raw.types {
            let Some(name) = raw_type.name.as_deref() else {
                continue;
            };
            if name.starts_with("__") {
                continue;
            }
            types.push(convert_type(raw_type, name)?);
        }

        let query_root = raw
            .query_type
            .as_ref()
            .ok_or(IntrospectionError::MissingQueryRoot)?;

        let find_root = |root_name: &str| {
            types
                .iter()
                .find(|t| t.name == root_name)
                .ok_or_else(|| IntrospectionError::RootTypeNotFound(root_name.to_string()))
        };

        let mut operations = Vec::new();
        root_operations(find_root(&query_root.name)?, OperationKind::Query, &mut operations);
        if let Some(mutation_root) = &raw.mutation_type {
            root_operations(
                find_root(&mutation_root.name)?,
                OperationKind::Mutation,
                &mut operations,
            );
        }

        Ok(SchemaModel::new(types, operations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(kind: &str, name: &str) -> Value {
        json!({"kind": kind, "name": name, "ofType": null})
    }

    fn non_null(inner: Value) -> Value {
        json!({"kind": "NON_NULL", "name": null, "ofType": inner})
    }

    fn sample_doc() -> Value {
        json!({
            "data": {
                "__schema": {
                    "queryType": {"name": "Query"},
                    "mutationType": {"name": "Mutation"},
                    "types": [
                        {
                            "kind": "OBJECT",
                            "name": "Query",
                            "fields": [
                                {"name": "user", "args": [
                                    {"name": "id", "type": non_null(named("SCALAR", "ID")), "defaultValue": null}
                                ], "type": named("OBJECT", "User")}
                            ]
                        },
                        {
                            "kind": "OBJECT",
                            "name": "Mutation",
                            "fields": [
                                {"name": "createUser", "args": [
                                    {"name": "name", "type": named("SCALAR", "String"), "defaultValue": null}
                                ], "type": named("OBJECT", "User")}
                            ]
                        },
                        {
                            "kind": "OBJECT",
                            "name": "User",
                            "fields": [
                                {"name": "id", "args": [], "type": non_null(named("SCALAR", "ID"))},
                                {"name": "role", "args": [], "type": named("ENUM", "Role")}
                            ]
                        },
                        {
                            "kind": "ENUM",
                            "name": "Role",
                            "enumValues": [{"name": "ADMIN"}, {"name": "MEMBER"}]
                        },
                        {"kind": "OBJECT", "name": "__Type", "fields": []}
                    ]
                }
            }
        })
    }

    #[test]
    fn test_load_operations_in_declaration_order() {
        let schema = SchemaModel::from_introspection(&sample_doc()).unwrap();
        let names: Vec<_> = schema.operations().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["user", "createUser"]);
        assert_eq!(schema.operations()[0].kind, OperationKind::Query);
        assert_eq!(schema.operations()[1].kind, OperationKind::Mutation);
        assert!(schema.operations()[0].args[0].required);
        assert!(!schema.operations()[1].args[0].required);
    }

    #[test]
    fn test_meta_types_are_skipped() {
        let schema = SchemaModel::from_introspection(&sample_doc()).unwrap();
        assert!(schema.get_type("__Type").is_none());
        assert_eq!(
            schema.get_type("Role").map(|t| t.enum_values.clone()),
            Some(vec!["ADMIN".to_string(), "MEMBER".to_string()])
        );
    }

    #[test]
    fn test_bare_schema_wrapper_is_accepted() {
        let doc = sample_doc();
        let bare = json!({"__schema": doc["data"]["__schema"].clone()});
        assert!(SchemaModel::from_introspection(&bare).is_ok());
    }

    #[test]
    fn test_missing_schema() {
        let err = SchemaModel::from_introspection(&json!({"data": {}})).unwrap_err();
        assert!(matches!(err, IntrospectionError::MissingSchema));
    }

    #[test]
    fn test_non_null_without_inner_type_is_rejected() {
        let mut doc = sample_doc();
        doc["data"]["__schema"]["types"][2]["fields"][0]["type"] =
            json!({"kind": "NON_NULL", "name": null, "ofType": null});
        let err = SchemaModel::from_introspection(&doc).unwrap_err();
        assert!(matches!(err, IntrospectionError::InvalidTypeRef { .. }));
    }
}
