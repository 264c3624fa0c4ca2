//! Typed representation of a GraphQL schema.
//!
//! Every type in a schema is one of a closed set of kinds ([`TypeKind`]), and
//! every place a type is *used* (field, argument, return value) is a
//! [`TypeRef`]: a named type optionally wrapped in list / non-null layers.
//! Nothing here has behavior beyond lookup and structural helpers; the model
//! is immutable once loaded.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Built-in scalars defined by the GraphQL specification.
pub const BUILT_IN_SCALARS: [&str; 5] = ["ID", "Int", "Float", "String", "Boolean"];

/// Kind of a named GraphQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TypeKind {
    Scalar,
    Enum,
    Object,
    InputObject,
    Interface,
    Union,
}

impl TypeKind {
    /// Leaf kinds are rendered as values, never as selections or input objects.
    pub fn is_leaf(self) -> bool {
        matches!(self, TypeKind::Scalar | TypeKind::Enum)
    }

    /// Kinds that appear in output shapes and can be produced by an operation.
    pub fn is_composite_output(self) -> bool {
        matches!(
            self,
            TypeKind::Object | TypeKind::Interface | TypeKind::Union
        )
    }
}

/// Reference to a type at a use site, including list and non-null wrappers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "wrap", content = "of")]
pub enum TypeRef {
    Named(String),
    List(Box<TypeRef>),
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn non_null(inner: TypeRef) -> Self {
        TypeRef::NonNull(Box::new(inner))
    }

    /// Name of the innermost named type, with every wrapper removed.
    pub fn named_type(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::List(inner) | TypeRef::NonNull(inner) => inner.named_type(),
        }
    }

    /// Whether the outermost layer is non-null.
    pub fn is_required(&self) -> bool {
        matches!(self, TypeRef::NonNull(_))
    }

    /// Whether a list wrapper appears anywhere in the reference.
    pub fn is_list(&self) -> bool {
        match self {
            TypeRef::Named(_) => false,
            TypeRef::List(_) => true,
            TypeRef::NonNull(inner) => inner.is_list(),
        }
    }

    /// Strip a single outer non-null layer, if present.
    pub fn unwrap_non_null(&self) -> &TypeRef {
        match self {
            TypeRef::NonNull(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(name) => write!(f, "{}", name),
            TypeRef::List(inner) => write!(f, "[{}]", inner),
            TypeRef::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// Argument of an output field or input field of an input object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputValueDef {
    pub name: String,
    pub ty: TypeRef,
    /// Default value as printed by the server, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl InputValueDef {
    /// Required means non-null with no default.
    pub fn is_required(&self) -> bool {
        self.ty.is_required() && self.default_value.is_none()
    }
}

/// Output field of an object or interface type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<InputValueDef>,
}

impl FieldDef {
    pub fn has_required_args(&self) -> bool {
        self.args.iter().any(InputValueDef::is_required)
    }
}

/// A named type of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLType {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_fields: Vec<InputValueDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_types: Vec<String>,
}

impl GraphQLType {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Scalar,
            fields: Vec::new(),
            input_fields: Vec::new(),
            enum_values: Vec::new(),
            possible_types: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Whether an operation reads (query) or writes (mutation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    /// Keyword used in a GraphQL document.
    pub fn keyword(self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
        }
    }
}

/// Top-level argument of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub ty: TypeRef,
    pub required: bool,
}

/// A root query or mutation field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    pub kind: OperationKind,
    pub args: Vec<Argument>,
    pub return_type: TypeRef,
    /// Position in the schema (queries first, then mutations). Used to break
    /// ties deterministically.
    pub declaration_index: usize,
}

impl Operation {
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.args.iter().find(|a| a.name == name)
    }
}

/// The loaded schema: named types plus the root operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    types: BTreeMap<String, GraphQLType>,
    operations: Vec<Operation>,
}

impl SchemaModel {
    /// Assemble a model from already-parsed parts.
    ///
    /// Built-in scalars are added if missing and operations are re-indexed
    /// in the order given.
    pub fn new(types: impl IntoIterator<Item = GraphQLType>, operations: Vec<Operation>) -> Self {
        let mut types: BTreeMap<String, GraphQLType> =
            types.into_iter().map(|t| (t.name.clone(), t)).collect();
        for scalar in BUILT_IN_SCALARS {
            types
                .entry(scalar.to_string())
                .or_insert_with(|| GraphQLType::scalar(scalar));
        }
        let operations = operations
            .into_iter()
            .enumerate()
            .map(|(idx, mut op)| {
                op.declaration_index = idx;
                op
            })
            .collect();
        Self { types, operations }
    }

    pub fn get_type(&self, name: &str) -> Option<&GraphQLType> {
        self.types.get(name)
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<TypeKind> {
        self.types.get(name).map(|t| t.kind)
    }

    pub fn types(&self) -> impl Iterator<Item = &GraphQLType> {
        self.types.values()
    }

    /// Object type names in name order.
    pub fn object_type_names(&self) -> impl Iterator<Item = &str> {
        self.types
            .values()
            .filter(|t| t.kind == TypeKind::Object)
            .map(|t| t.name.as_str())
    }

    /// Operations in declaration order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }
}
