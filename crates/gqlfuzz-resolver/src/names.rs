//! ID-reference resolution.
//!
//! GraphQL schemas rarely pass objects into operations; they pass IDs. An
//! argument `userId: ID!` or `deleteUser(id: ID!)` really consumes a `User`.
//! [`IdResolver`] recovers that link from names, in this order:
//!
//! 1. a name prefix (`userId`, `user_id`, `userIds` -> `User`), plural tolerant
//! 2. for a bare `id`/`ids`, the longest object name contained in the context
//!    name (`deleteUser` -> `User`, `UpdatePostInput` -> `Post`)
//! 3. for a bare `id`/`ids`, the operation's own returned object type
//! 4. for a prefix, the closest object name within `max_distance` edits,
//!    and never more than one edit per three characters of the prefix
//!
//! Only object types that expose an identity field are candidates.

use gqlfuzz_types::{SchemaModel, TypeKind};

/// Compute edit distance between two strings (case-insensitive).
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.to_lowercase().chars().collect();
    let b_chars: Vec<char> = b.to_lowercase().chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    let mut dp = vec![vec![0usize; n + 1]; m + 1];
    for (i, row) in dp.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=n {
        dp[0][j] = j;
    }
    for i in 1..=m {
        for j in 1..=n {
            let cost = if a_chars[i - 1] == b_chars[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1)
                .min(dp[i][j - 1] + 1)
                .min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[m][n]
}

/// Lowercase with `_` and `-` removed, so `user_account` == `UserAccount`.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// How an ID-typed name refers to its object.
#[derive(Debug, PartialEq, Eq)]
enum IdName {
    /// `id` / `ids`: the object must come from context.
    Bare,
    /// `userId` -> `user`; names without an id suffix use the whole name.
    Prefixed(String),
}

fn classify(name: &str) -> IdName {
    let norm = normalize(name);
    if norm == "id" || norm == "ids" {
        return IdName::Bare;
    }
    let lower = name.to_lowercase();
    // The suffix must sit on a word boundary: `userId`, `user_id`, `userIDs`.
    for suffix in ["Ids", "IDs", "Id", "ID"] {
        if let Some(prefix) = name.strip_suffix(suffix) {
            if !prefix.is_empty() {
                return IdName::Prefixed(normalize(prefix));
            }
        }
    }
    for suffix in ["_ids", "_id"] {
        if lower.ends_with(suffix) && lower.len() > suffix.len() {
            return IdName::Prefixed(normalize(&lower[..lower.len() - suffix.len()]));
        }
    }
    IdName::Prefixed(norm)
}

#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    normalized: String,
}

/// Resolves ID-typed names to object type names for one schema.
#[derive(Debug, Clone)]
pub struct IdResolver {
    candidates: Vec<Candidate>,
    max_distance: usize,
}

impl IdResolver {
    pub fn new(schema: &SchemaModel, id_scalars: &[String], max_distance: usize) -> Self {
        let candidates = schema
            .object_type_names()
            .filter(|name| identity_field(schema, name, id_scalars).is_some())
            .map(|name| Candidate {
                name: name.to_string(),
                normalized: normalize(name),
            })
            .collect();
        Self {
            candidates,
            max_distance,
        }
    }

    pub fn is_candidate(&self, type_name: &str) -> bool {
        self.candidates.iter().any(|c| c.name == type_name)
    }

    /// Resolve `field_name` (an ID-typed argument or input field) seen inside
    /// `context` (operation or input type name). `returned` is the owning
    /// operation's returned object type, if any.
    pub fn resolve(&self, field_name: &str, context: &str, returned: Option<&str>) -> Option<&str> {
        match classify(field_name) {
            IdName::Bare => self
                .contained_in(context)
                .or_else(|| returned.and_then(|r| self.lookup(r))),
            IdName::Prefixed(prefix) => self
                .by_prefix(&prefix)
                .or_else(|| self.closest(&prefix)),
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.candidates
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.name.as_str())
    }

    fn by_prefix(&self, prefix: &str) -> Option<&str> {
        let singular = prefix.strip_suffix('s');
        self.candidates
            .iter()
            .find(|c| c.normalized == prefix || Some(c.normalized.as_str()) == singular)
            .map(|c| c.name.as_str())
    }

    fn contained_in(&self, context: &str) -> Option<&str> {
        let context = normalize(context);
        // Candidates are name-ordered, so `max_by_key` keeps the last of equal
        // lengths; iterate in reverse to keep the first instead.
        self.candidates
            .iter()
            .rev()
            .filter(|c| context.contains(&c.normalized))
            .max_by_key(|c| c.normalized.len())
            .map(|c| c.name.as_str())
    }

    fn closest(&self, prefix: &str) -> Option<&str> {
        let allowed = self.max_distance.min(prefix.chars().count() / 3);
        if allowed == 0 {
            return None;
        }
        self.candidates
            .iter()
            .map(|c| (edit_distance(prefix, &c.normalized), c))
            .filter(|(d, _)| *d <= allowed)
            .min_by_key(|(d, _)| *d)
            .map(|(_, c)| c.name.as_str())
    }
}

/// The field of `type_name` that identifies an instance of it: `id` if it is
/// ID-typed, otherwise the first ID-typed field without required arguments.
pub fn identity_field<'a>(
    schema: &'a SchemaModel,
    type_name: &str,
    id_scalars: &[String],
) -> Option<&'a str> {
    let ty = schema.get_type(type_name)?;
    if ty.kind != TypeKind::Object {
        return None;
    }
    let is_id = |named: &str| id_scalars.iter().any(|s| s == named);
    ty.fields
        .iter()
        .find(|f| f.name == "id" && is_id(f.ty.named_type()))
        .or_else(|| {
            ty.fields
                .iter()
                .find(|f| is_id(f.ty.named_type()) && !f.has_required_args())
        })
        .map(|f| f.name.as_str())
}
