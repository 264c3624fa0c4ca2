//! Boundary-heavy value generation for GraphQL arguments.
//!
//! Every leaf value is drawn from one [`ValueClass`]. Well-typed values follow
//! a tiered distribution: ~40% exact boundaries, ~30% near-boundary, ~30%
//! uniform. On top of that a configurable share is type-violating (to probe
//! server-side validation), replayed from previously observed values (to
//! probe authorization and ownership checks) or null (optional positions
//! only).
//!
//! All randomness comes from one `StdRng`; the same seed, schema and prior
//! values always yield the same stream of values.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use gqlfuzz_types::{SchemaModel, TypeKind, TypeRef};

use crate::object_store::DynamicObject;

/// Input object nesting followed when building argument values.
pub const MAX_INPUT_DEPTH: usize = 10;

/// How a value was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueClass {
    Boundary,
    NearBoundary,
    Uniform,
    TypeViolation,
    Replay,
    Null,
}

/// A generated value together with the class it was drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutatedValue {
    pub value: Value,
    pub class: ValueClass,
}

impl MutatedValue {
    fn new(value: Value, class: ValueClass) -> Self {
        Self { value, class }
    }
}

/// Tuning knobs for the mutator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutatorConfig {
    /// Probability of a type-violating leaf.
    pub violation_weight: f64,
    /// Probability of replaying an observed value when one exists.
    pub replay_weight: f64,
    /// Probability of null in a nullable position.
    pub null_weight: f64,
    /// Longest generated list.
    pub max_list_len: usize,
    /// Longest generated string.
    pub max_string_len: usize,
    /// Scalars treated as identifiers.
    pub id_scalars: Vec<String>,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            violation_weight: 0.05,
            replay_weight: 0.2,
            null_weight: 0.1,
            max_list_len: 4,
            max_string_len: 64,
            id_scalars: vec!["ID".to_string()],
        }
    }
}

/// Previously observed leaf values, keyed by leaf type name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorValues {
    by_type: BTreeMap<String, Vec<Value>>,
}

impl PriorValues {
    /// Values kept per leaf type (most recent).
    pub const PER_TYPE: usize = 64;

    /// Collect leaf field values from `objects`, typically
    /// [`ObjectStore::recent`](crate::ObjectStore::recent).
    pub fn from_objects<'o>(
        schema: &SchemaModel,
        objects: impl IntoIterator<Item = &'o DynamicObject>,
    ) -> Self {
        let mut by_type: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for object in objects {
            let Some(def) = schema.get_type(&object.type_name) else {
                continue;
            };
            for field in &def.fields {
                let named = field.ty.named_type();
                if !schema.kind_of(named).is_some_and(TypeKind::is_leaf) {
                    continue;
                }
                let Some(value) = object.field(&field.name) else {
                    continue;
                };
                let bucket = by_type.entry(named.to_string()).or_default();
                match value {
                    Value::Array(items) => bucket.extend(items.iter().filter(|v| !v.is_null()).cloned()),
                    other => bucket.push(other.clone()),
                }
            }
        }
        for bucket in by_type.values_mut() {
            if bucket.len() > Self::PER_TYPE {
                bucket.drain(..bucket.len() - Self::PER_TYPE);
            }
        }
        Self { by_type }
    }

    pub fn insert(&mut self, type_name: &str, value: Value) {
        self.by_type.entry(type_name.to_string()).or_default().push(value);
    }

    pub fn of(&self, type_name: &str) -> &[Value] {
        self.by_type
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Seeded value generator over a schema.
pub struct Mutator<'a> {
    schema: &'a SchemaModel,
    rng: StdRng,
    config: MutatorConfig,
}

impl<'a> Mutator<'a> {
    pub fn new(schema: &'a SchemaModel, seed: u64, config: MutatorConfig) -> Self {
        Self {
            schema,
            rng: StdRng::seed_from_u64(seed),
            config,
        }
    }

    /// Generate a value for `ty`, replaying from `prior` where it applies.
    pub fn mutate(&mut self, ty: &TypeRef, prior: &PriorValues) -> MutatedValue {
        self.mutate_at(ty, prior, 0)
    }

    /// Like [`Mutator::mutate`] but never null at the outermost layer.
    pub fn mutate_present(&mut self, ty: &TypeRef, prior: &PriorValues) -> MutatedValue {
        self.mutate_non_null(ty.unwrap_non_null(), prior, 0)
    }

    fn mutate_at(&mut self, ty: &TypeRef, prior: &PriorValues, depth: usize) -> MutatedValue {
        match ty {
            TypeRef::NonNull(inner) => self.mutate_non_null(inner, prior, depth),
            nullable => {
                if self.rng.gen_bool(self.config.null_weight.clamp(0.0, 1.0)) {
                    MutatedValue::new(Value::Null, ValueClass::Null)
                } else {
                    self.mutate_non_null(nullable, prior, depth)
                }
            }
        }
    }

    fn mutate_non_null(&mut self, ty: &TypeRef, prior: &PriorValues, depth: usize) -> MutatedValue {
        match ty {
            TypeRef::NonNull(inner) => self.mutate_non_null(inner, prior, depth),
            TypeRef::List(inner) => self.gen_list(inner, prior, depth),
            TypeRef::Named(name) => match self.schema.kind_of(name) {
                Some(TypeKind::InputObject) => self.gen_input_object(name, prior, depth),
                Some(TypeKind::Enum) => self.gen_leaf(name, prior, LeafKind::Enum),
                _ => self.gen_leaf(name, prior, LeafKind::Scalar),
            },
        }
    }

    // ---- Composite generators ----

    fn gen_list(&mut self, inner: &TypeRef, prior: &PriorValues, depth: usize) -> MutatedValue {
        let len = self.gen_list_len();
        let items: Vec<MutatedValue> = (0..len)
            .map(|_| self.mutate_at(inner, prior, depth))
            .collect();
        let class = if items.iter().any(|i| i.class == ValueClass::TypeViolation) {
            ValueClass::TypeViolation
        } else if len == 0 || len == self.config.max_list_len {
            ValueClass::Boundary
        } else {
            items.first().map_or(ValueClass::Uniform, |i| i.class)
        };
        MutatedValue::new(Value::Array(items.into_iter().map(|i| i.value).collect()), class)
    }

    fn gen_input_object(&mut self, name: &str, prior: &PriorValues, depth: usize) -> MutatedValue {
        let Some(def) = self.schema.get_type(name) else {
            return MutatedValue::new(json!({}), ValueClass::Uniform);
        };
        let mut map = Map::new();
        let mut class = ValueClass::Uniform;
        for field in &def.input_fields {
            let required = field.is_required();
            if depth >= MAX_INPUT_DEPTH {
                if required {
                    map.insert(field.name.clone(), Value::Null);
                    class = ValueClass::TypeViolation;
                }
                continue;
            }
            // Optional fields are present about half of the time.
            if !required && self.rng.gen_bool(0.5) {
                continue;
            }
            let generated = self.mutate_at(&field.ty, prior, depth + 1);
            if generated.class == ValueClass::TypeViolation {
                class = ValueClass::TypeViolation;
            }
            map.insert(field.name.clone(), generated.value);
        }
        MutatedValue::new(Value::Object(map), class)
    }

    /// Generate a list length with edge-case weighting.
    fn gen_list_len(&mut self) -> usize {
        let max = self.config.max_list_len;
        let tier: f64 = self.rng.gen();
        if tier < 0.20 || max == 0 {
            0
        } else if tier < 0.35 {
            1
        } else if tier < 0.50 || max < 2 {
            max
        } else {
            self.rng.gen_range(2..=max)
        }
    }

    // ---- Leaf generation ----

    fn gen_leaf(&mut self, name: &str, prior: &PriorValues, kind: LeafKind) -> MutatedValue {
        let roll: f64 = self.rng.gen();
        if roll < self.config.violation_weight {
            return MutatedValue::new(self.gen_violation(name, kind), ValueClass::TypeViolation);
        }
        let observed = prior.of(name);
        if roll < self.config.violation_weight + self.config.replay_weight && !observed.is_empty() {
            if let Some(value) = observed.choose(&mut self.rng) {
                return MutatedValue::new(value.clone(), ValueClass::Replay);
            }
        }

        let tier: f64 = self.rng.gen();
        let class = if tier < 0.4 {
            ValueClass::Boundary
        } else if tier < 0.7 {
            ValueClass::NearBoundary
        } else {
            ValueClass::Uniform
        };

        let value = match kind {
            LeafKind::Enum => self.gen_enum(name, class),
            LeafKind::Scalar => match name {
                "Int" => json!(self.gen_int(class)),
                "Float" => self.gen_float(class),
                "Boolean" => json!(self.gen_bool(class)),
                _ if self.is_id_scalar(name) => self.gen_id(class),
                // Custom scalars are sent as strings.
                _ => json!(self.gen_string(class)),
            },
        };
        MutatedValue::new(value, class)
    }

    fn is_id_scalar(&self, name: &str) -> bool {
        self.config.id_scalars.iter().any(|s| s == name)
    }

    fn gen_int(&mut self, class: ValueClass) -> i64 {
        match class {
            ValueClass::Boundary => *INT_BOUNDARIES.choose(&mut self.rng).unwrap_or(&0),
            ValueClass::NearBoundary => {
                let base = *INT_BOUNDARIES.choose(&mut self.rng).unwrap_or(&0);
                let offset = self.rng.gen_range(1..=16_i64);
                let shifted = if self.rng.gen_bool(0.5) {
                    base.saturating_add(offset)
                } else {
                    base.saturating_sub(offset)
                };
                shifted.clamp(i32::MIN as i64, i32::MAX as i64)
            }
            _ => self.rng.gen_range(i32::MIN..=i32::MAX) as i64,
        }
    }

    fn gen_float(&mut self, class: ValueClass) -> Value {
        let value = match class {
            ValueClass::Boundary => *FLOAT_BOUNDARIES.choose(&mut self.rng).unwrap_or(&0.0),
            ValueClass::NearBoundary => {
                let base = *FLOAT_BOUNDARIES.choose(&mut self.rng).unwrap_or(&0.0);
                let offset = self.rng.gen_range(1..=16) as f64 * 1e-6;
                let shifted = if self.rng.gen_bool(0.5) { base + offset } else { base - offset };
                if shifted.is_finite() { shifted } else { base }
            }
            _ => self.rng.gen_range(-1.0e9..1.0e9),
        };
        json!(value)
    }

    fn gen_bool(&mut self, class: ValueClass) -> bool {
        match class {
            ValueClass::Boundary => false,
            _ => self.rng.gen_bool(0.5),
        }
    }

    fn gen_string(&mut self, class: ValueClass) -> String {
        let max = self.config.max_string_len.max(1);
        match class {
            ValueClass::Boundary => {
                let pick = self.rng.gen_range(0..STRING_PROBES.len() + 1);
                match STRING_PROBES.get(pick) {
                    Some(probe) => probe.to_string(),
                    None => "A".repeat(max),
                }
            }
            ValueClass::NearBoundary => {
                let len = if self.rng.gen_bool(0.5) {
                    max + self.rng.gen_range(1..=16)
                } else {
                    self.rng.gen_range(1..=2)
                };
                self.printable(len)
            }
            _ => {
                let len = self.rng.gen_range(0..=max);
                self.printable(len)
            }
        }
    }

    fn printable(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| self.rng.gen_range(0x20u8..=0x7E) as char)
            .collect()
    }

    fn gen_id(&mut self, class: ValueClass) -> Value {
        match class {
            ValueClass::Boundary => json!(*ID_BOUNDARIES.choose(&mut self.rng).unwrap_or(&"0")),
            ValueClass::NearBoundary => json!(self.rng.gen_range(0..1000u32).to_string()),
            _ => {
                let hex: String = (0..32)
                    .map(|_| {
                        std::char::from_digit(self.rng.gen_range(0..16u32), 16).unwrap_or('0')
                    })
                    .collect();
                json!(format!(
                    "{}-{}-{}-{}-{}",
                    &hex[0..8],
                    &hex[8..12],
                    &hex[12..16],
                    &hex[16..20],
                    &hex[20..32]
                ))
            }
        }
    }

    fn gen_enum(&mut self, name: &str, class: ValueClass) -> Value {
        let members: &[String] = self
            .schema
            .get_type(name)
            .map(|t| t.enum_values.as_slice())
            .unwrap_or_default();
        if members.is_empty() {
            return json!("UNKNOWN");
        }
        let member = match class {
            // First and last members are the enum's boundaries.
            ValueClass::Boundary => {
                if self.rng.gen_bool(0.5) {
                    &members[0]
                } else {
                    &members[members.len() - 1]
                }
            }
            _ => &members[self.rng.gen_range(0..members.len())],
        };
        json!(member)
    }

    fn gen_violation(&mut self, name: &str, kind: LeafKind) -> Value {
        let candidates: Vec<Value> = match (kind, name) {
            (LeafKind::Enum, _) => {
                let lowered = self
                    .schema
                    .get_type(name)
                    .and_then(|t| t.enum_values.first())
                    .map(|m| m.to_lowercase())
                    .unwrap_or_else(|| "invalid".to_string());
                vec![json!("NOT_A_MEMBER"), json!(lowered), json!(0)]
            }
            (_, "Int") => vec![json!("1"), json!(1.5), json!(2_147_483_648i64), json!(true)],
            (_, "Float") => vec![json!("NaN"), json!("Infinity"), json!(true), json!([])],
            (_, "Boolean") => vec![json!("true"), json!(1), json!(0)],
            _ if self.is_id_scalar(name) => vec![json!(true), json!([]), json!({}), json!(-1.5)],
            _ => vec![json!(0), json!(2.5), json!(true), json!([]), json!({})],
        };
        candidates
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy)]
enum LeafKind {
    Scalar,
    Enum,
}

// ---- Boundary value tables ----

/// GraphQL `Int` is a signed 32-bit integer.
const INT_BOUNDARIES: [i64; 15] = [
    0,
    1,
    -1,
    2,
    127,
    128,
    255,
    256,
    32767,
    -32768,
    65535,
    2_147_483_646,
    2_147_483_647,  // i32::MAX
    -2_147_483_647,
    -2_147_483_648, // i32::MIN
];

const FLOAT_BOUNDARIES: [f64; 9] = [
    0.0,
    -0.0,
    1.0,
    -1.0,
    0.1,
    f64::MIN_POSITIVE,
    1e-300,
    f64::MAX,
    f64::MIN,
];

const ID_BOUNDARIES: [&str; 7] = [
    "0",
    "1",
    "-1",
    "",
    "00000000-0000-0000-0000-000000000000",
    "9999999999999999999999",
    "null",
];

/// Edge-case and injection probes for string inputs.
const STRING_PROBES: [&str; 18] = [
    "",
    " ",
    "a",
    "0",
    "null",
    "true",
    "\u{0000}",
    "üñíçødé 日本語 🙂",
    "' OR '1'='1",
    "\" OR 1=1 --",
    "'; DROP TABLE users; --",
    "<script>alert(1)</script>",
    "{{7*7}}",
    "${jndi:ldap://127.0.0.1/a}",
    "../../../../etc/passwd",
    "%s%s%s%n",
    "; ls -la",
    "{\"$gt\": \"\"}",
];
