//! Depth-bounded structural unwrapping.
//!
//! Output shapes are walked breadth-first so each object type is recorded at
//! the shallowest depth it appears. Input shapes are walked depth-first so
//! every requirement keeps the argument path that leads to it.
//!
//! Types below the depth bound are not visited. This loses edges on very
//! deep schemas and keeps compilation linear on self-referential ones.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use gqlfuzz_types::{Operation, SchemaModel, TypeKind, TypeRef};

use crate::graph::Requirement;
use crate::names::{identity_field, IdResolver};
use crate::SchemaInconsistencyError;

fn lookup_kind(
    schema: &SchemaModel,
    owner: &str,
    type_name: &str,
) -> Result<TypeKind, SchemaInconsistencyError> {
    schema
        .kind_of(type_name)
        .ok_or_else(|| SchemaInconsistencyError::UnknownType {
            owner: owner.to_string(),
            type_name: type_name.to_string(),
        })
}

/// Object types reachable in `ty`, mapped to the shallowest depth they occur
/// at. Depth 0 is the named type of `ty` itself; interfaces and unions expand
/// to their possible types at the same depth. Fields that take required
/// arguments are not selectable and are not followed.
pub fn output_types(
    schema: &SchemaModel,
    ty: &TypeRef,
    max_depth: usize,
    owner: &str,
) -> Result<BTreeMap<String, usize>, SchemaInconsistencyError> {
    let mut found = BTreeMap::new();
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back((ty.named_type().to_string(), depth_owner(owner), 0usize));

    while let Some((name, via, depth)) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        let kind = lookup_kind(schema, &via, &name)?;
        let Some(def) = schema.get_type(&name) else {
            continue;
        };
        match kind {
            TypeKind::Object => {
                found.insert(name.clone(), depth);
                if depth < max_depth {
                    for field in def.fields.iter().filter(|f| !f.has_required_args()) {
                        queue.push_back((
                            field.ty.named_type().to_string(),
                            format!("{}.{}", name, field.name),
                            depth + 1,
                        ));
                    }
                }
            }
            // Same depth: keep the queue ordered by depth.
            TypeKind::Interface | TypeKind::Union => {
                for possible in def.possible_types.iter().rev() {
                    queue.push_front((possible.clone(), name.clone(), depth));
                }
            }
            TypeKind::Scalar | TypeKind::Enum | TypeKind::InputObject => {}
        }
    }
    Ok(found)
}

fn depth_owner(owner: &str) -> String {
    format!("return type of {}", owner)
}

/// What an operation's arguments require.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputShape {
    /// Input object types and referenced object types.
    pub consumes: BTreeSet<String>,
    /// Argument paths that must carry a discovered object's identity.
    pub requirements: Vec<Requirement>,
}

#[derive(Clone, Copy)]
struct Site {
    depth: usize,
    required: bool,
    list: bool,
}

struct InputWalker<'a> {
    schema: &'a SchemaModel,
    resolver: &'a IdResolver,
    id_scalars: &'a [String],
    max_depth: usize,
    operation: &'a Operation,
    shape: InputShape,
    path: Vec<String>,
    stack: Vec<String>,
}

impl InputWalker<'_> {
    fn owner(&self) -> String {
        format!("{}({})", self.operation.name, self.path.join("."))
    }

    fn visit(&mut self, ty: &TypeRef, context: &str, site: Site) -> Result<(), SchemaInconsistencyError> {
        let named = ty.named_type().to_string();
        let kind = lookup_kind(self.schema, &self.owner(), &named)?;
        let site = Site {
            list: site.list || ty.is_list(),
            ..site
        };

        match kind {
            TypeKind::InputObject => {
                self.shape.consumes.insert(named.clone());
                if site.depth >= self.max_depth || self.stack.contains(&named) {
                    return Ok(());
                }
                let Some(def) = self.schema.get_type(&named) else {
                    return Ok(());
                };
                self.stack.push(named.clone());
                for field in &def.input_fields {
                    self.path.push(field.name.clone());
                    let child = Site {
                        depth: site.depth + 1,
                        required: site.required && field.is_required(),
                        list: site.list,
                    };
                    self.visit(&field.ty, &named, child)?;
                    self.path.pop();
                }
                self.stack.pop();
            }
            TypeKind::Scalar if self.id_scalars.iter().any(|s| *s == named) => {
                let field_name = self.path.last().cloned().unwrap_or_default();
                let returned = Some(self.operation.return_type.named_type());
                if let Some(target) = self.resolver.resolve(&field_name, context, returned) {
                    let field = identity_field(self.schema, target, self.id_scalars)
                        .unwrap_or("id")
                        .to_string();
                    self.shape.consumes.insert(target.to_string());
                    self.shape.requirements.push(Requirement {
                        path: self.path.clone(),
                        type_name: target.to_string(),
                        field,
                        required: site.required,
                        list: site.list,
                    });
                }
            }
            TypeKind::Scalar | TypeKind::Enum => {}
            TypeKind::Object | TypeKind::Interface | TypeKind::Union => {
                return Err(SchemaInconsistencyError::OutputTypeAsInput {
                    owner: self.owner(),
                    type_name: named,
                });
            }
        }
        Ok(())
    }
}

/// Walk every argument of `operation` and collect what it consumes.
pub fn input_shape(
    schema: &SchemaModel,
    operation: &Operation,
    resolver: &IdResolver,
    id_scalars: &[String],
    max_depth: usize,
) -> Result<InputShape, SchemaInconsistencyError> {
    let mut walker = InputWalker {
        schema,
        resolver,
        id_scalars,
        max_depth,
        operation,
        shape: InputShape::default(),
        path: Vec::new(),
        stack: Vec::new(),
    };
    for arg in &operation.args {
        walker.path.push(arg.name.clone());
        let site = Site {
            depth: 0,
            required: arg.required,
            list: false,
        };
        walker.visit(&arg.ty, &operation.name, site)?;
        walker.path.pop();
    }
    Ok(walker.shape)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gqlfuzz_types::{Argument, FieldDef, GraphQLType, InputValueDef, OperationKind};

    fn object(name: &str, fields: Vec<(&str, TypeRef)>) -> GraphQLType {
        let mut ty = GraphQLType::scalar(name);
        ty.kind = TypeKind::Object;
        ty.fields = fields
            .into_iter()
            .map(|(n, t)| FieldDef {
                name: n.into(),
                ty: t,
                args: vec![],
            })
            .collect();
        ty
    }

    fn input(name: &str, fields: Vec<(&str, TypeRef)>) -> GraphQLType {
        let mut ty = GraphQLType::scalar(name);
        ty.kind = TypeKind::InputObject;
        ty.input_fields = fields
            .into_iter()
            .map(|(n, t)| InputValueDef {
                name: n.into(),
                ty: t,
                default_value: None,
            })
            .collect();
        ty
    }

    fn id() -> TypeRef {
        TypeRef::non_null(TypeRef::named("ID"))
    }

    fn op(name: &str, args: Vec<(&str, TypeRef)>, ret: TypeRef) -> Operation {
        Operation {
            name: name.into(),
            kind: OperationKind::Mutation,
            args: args
                .into_iter()
                .map(|(n, t)| Argument {
                    name: n.into(),
                    required: t.is_required(),
                    ty: t,
                })
                .collect(),
            return_type: ret,
            declaration_index: 0,
        }
    }

    fn chain_schema() -> SchemaModel {
        // A -> B -> C -> D, each with an id.
        SchemaModel::new(
            vec![
                object("A", vec![("id", id()), ("b", TypeRef::named("B"))]),
                object("B", vec![("id", id()), ("c", TypeRef::named("C"))]),
                object("C", vec![("id", id()), ("d", TypeRef::named("D"))]),
                object("D", vec![("id", id())]),
            ],
            vec![],
        )
    }

    #[test]
    fn test_output_depth_bound() {
        let schema = chain_schema();
        let ty = TypeRef::list(TypeRef::named("A"));
        let found = output_types(&schema, &ty, 2, "op").unwrap();
        assert_eq!(found.get("A"), Some(&0));
        assert_eq!(found.get("B"), Some(&1));
        assert_eq!(found.get("C"), Some(&2));
        assert!(!found.contains_key("D"));

        let shallow = output_types(&schema, &ty, 0, "op").unwrap();
        assert_eq!(shallow.len(), 1);
    }

    #[test]
    fn test_output_self_reference_terminates() {
        let schema = SchemaModel::new(
            vec![object("Node", vec![("id", id()), ("parent", TypeRef::named("Node"))])],
            vec![],
        );
        let found = output_types(&schema, &TypeRef::named("Node"), 10, "op").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_union_expands_at_same_depth() {
        let mut union = GraphQLType::scalar("Result");
        union.kind = TypeKind::Union;
        union.possible_types = vec!["A".into(), "D".into()];
        let mut types: Vec<GraphQLType> = chain_schema().types().cloned().collect();
        types.push(union);
        let schema = SchemaModel::new(types, vec![]);
        let found = output_types(&schema, &TypeRef::named("Result"), 1, "op").unwrap();
        assert_eq!(found.get("A"), Some(&0));
        assert_eq!(found.get("D"), Some(&0));
        assert_eq!(found.get("B"), Some(&1));
    }

    #[test]
    fn test_unknown_output_type_is_inconsistent() {
        let schema = SchemaModel::new(vec![object("A", vec![("ghost", TypeRef::named("Ghost"))])], vec![]);
        let err = output_types(&schema, &TypeRef::named("A"), 2, "op").unwrap_err();
        assert!(matches!(err, SchemaInconsistencyError::UnknownType { ref type_name, .. } if type_name == "Ghost"));
    }

    #[test]
    fn test_input_requirements_keep_paths() {
        let schema = SchemaModel::new(
            vec![
                object("User", vec![("id", id())]),
                object("Post", vec![("id", id())]),
                input(
                    "UpdatePostInput",
                    vec![("id", id()), ("authorId", TypeRef::named("ID"))],
                ),
            ],
            vec![],
        );
        let operation = op(
            "updatePost",
            vec![("input", TypeRef::non_null(TypeRef::named("UpdatePostInput")))],
            TypeRef::named("Post"),
        );
        let resolver = IdResolver::new(&schema, &["ID".to_string()], 2);
        let shape = input_shape(&schema, &operation, &resolver, &["ID".to_string()], 10).unwrap();

        assert!(shape.consumes.contains("UpdatePostInput"));
        assert!(shape.consumes.contains("Post"));
        assert_eq!(shape.requirements.len(), 1);
        assert_eq!(shape.requirements[0].path, vec!["input", "id"]);
        assert_eq!(shape.requirements[0].type_name, "Post");
        assert!(shape.requirements[0].required);
        // authorId resolves by prefix only when an Author type exists.
        assert!(!shape.consumes.contains("Author"));
    }

    #[test]
    fn test_optional_segment_makes_requirement_optional() {
        let schema = SchemaModel::new(
            vec![
                object("User", vec![("id", id())]),
                input("Filter", vec![("userId", id())]),
            ],
            vec![],
        );
        let operation = op("search", vec![("filter", TypeRef::named("Filter"))], TypeRef::named("Boolean"));
        let resolver = IdResolver::new(&schema, &["ID".to_string()], 2);
        let shape = input_shape(&schema, &operation, &resolver, &["ID".to_string()], 10).unwrap();
        assert_eq!(shape.requirements.len(), 1);
        assert!(!shape.requirements[0].required);
    }

    #[test]
    fn test_input_depth_bound() {
        // In0 -> In1 -> In2 { userId }
        let schema = SchemaModel::new(
            vec![
                object("User", vec![("id", id())]),
                input("In0", vec![("next", TypeRef::named("In1"))]),
                input("In1", vec![("next", TypeRef::named("In2"))]),
                input("In2", vec![("userId", id())]),
            ],
            vec![],
        );
        let operation = op("deep", vec![("arg", TypeRef::named("In0"))], TypeRef::named("Boolean"));
        let resolver = IdResolver::new(&schema, &["ID".to_string()], 2);

        let at_bound = input_shape(&schema, &operation, &resolver, &["ID".to_string()], 3).unwrap();
        assert!(at_bound.consumes.contains("User"));

        let beyond = input_shape(&schema, &operation, &resolver, &["ID".to_string()], 2).unwrap();
        assert!(beyond.consumes.contains("In2"));
        assert!(!beyond.consumes.contains("User"));
    }

    #[test]
    fn test_recursive_input_terminates() {
        let schema = SchemaModel::new(
            vec![input("Where", vec![("and", TypeRef::list(TypeRef::named("Where")))])],
            vec![],
        );
        let operation = op("find", vec![("where", TypeRef::named("Where"))], TypeRef::named("Boolean"));
        let resolver = IdResolver::new(&schema, &["ID".to_string()], 2);
        let shape = input_shape(&schema, &operation, &resolver, &["ID".to_string()], 10).unwrap();
        assert_eq!(shape.consumes.len(), 1);
    }

    #[test]
    fn test_list_of_ids_is_flagged() {
        let schema = SchemaModel::new(vec![object("User", vec![("id", id())])], vec![]);
        let operation = op(
            "deleteUsers",
            vec![("userIds", TypeRef::non_null(TypeRef::list(id())))],
            TypeRef::named("Boolean"),
        );
        let resolver = IdResolver::new(&schema, &["ID".to_string()], 2);
        let shape = input_shape(&schema, &operation, &resolver, &["ID".to_string()], 10).unwrap();
        assert!(shape.requirements[0].list);
    }
}
