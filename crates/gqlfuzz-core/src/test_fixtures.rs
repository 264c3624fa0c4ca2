//! Shared schema fixtures for unit tests.

use gqlfuzz_resolver::{build, BuildOptions, DependencyGraph};
use gqlfuzz_types::{
    Argument, FieldDef, GraphQLType, Operation, OperationKind, SchemaModel, TypeKind, TypeRef,
};

pub fn field(name: &str, ty: TypeRef) -> FieldDef {
    FieldDef {
        name: name.into(),
        ty,
        args: vec![],
    }
}

pub fn object(name: &str, fields: Vec<FieldDef>) -> GraphQLType {
    let mut ty = GraphQLType::scalar(name);
    ty.kind = TypeKind::Object;
    ty.fields = fields;
    ty
}

pub fn op(name: &str, kind: OperationKind, args: Vec<(&str, TypeRef)>, ret: TypeRef) -> Operation {
    Operation {
        name: name.into(),
        kind,
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

pub fn id() -> TypeRef {
    TypeRef::non_null(TypeRef::named("ID"))
}

/// Users, posts and sessions:
///
/// - `user(id: ID!): User` (query)
/// - `createUser(name: String): User`
/// - `createPost(userId: ID!, title: String): Post`
/// - `deleteUser(id: ID!): Boolean`
/// - `revokeSession(id: ID!): Boolean` (nothing produces `Session`)
pub fn blog_schema() -> SchemaModel {
    let types = vec![
        object(
            "User",
            vec![field("id", id()), field("name", TypeRef::named("String"))],
        ),
        object(
            "Post",
            vec![
                field("id", id()),
                field("title", TypeRef::named("String")),
                field("author", TypeRef::named("User")),
            ],
        ),
        object("Session", vec![field("id", id())]),
    ];
    let ops = vec![
        op("user", OperationKind::Query, vec![("id", id())], TypeRef::named("User")),
        op(
            "createUser",
            OperationKind::Mutation,
            vec![("name", TypeRef::named("String"))],
            TypeRef::named("User"),
        ),
        op(
            "createPost",
            OperationKind::Mutation,
            vec![("userId", id()), ("title", TypeRef::named("String"))],
            TypeRef::named("Post"),
        ),
        op(
            "deleteUser",
            OperationKind::Mutation,
            vec![("id", id())],
            TypeRef::named("Boolean"),
        ),
        op(
            "revokeSession",
            OperationKind::Mutation,
            vec![("id", id())],
            TypeRef::named("Boolean"),
        ),
    ];
    SchemaModel::new(types, ops)
}

pub fn blog_graph() -> DependencyGraph {
    build(blog_schema(), &BuildOptions::default()).expect("fixture schema compiles")
}
