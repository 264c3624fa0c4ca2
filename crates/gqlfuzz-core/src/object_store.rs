//! Runtime table of objects discovered in server responses.
//!
//! Objects are grouped by type name in discovery order (most recent last).
//! Every object gets a discovery number from a single counter that is only
//! advanced under the write lock, so discovery order is global and total.
//! The store is append-only during a run; [`ObjectStore::reset`] clears it
//! between independent runs. Objects are shared behind `Arc`, so a
//! [`StoreSnapshot`] copies pointers rather than response bodies.
//!
//! # Example
//!
//! ```ignore
//! let store = ObjectStore::new();
//! store.insert_batch("createUser", "alice", vec![("User".into(), json!({"id": "1"}))]);
//! let user = store.latest("User").unwrap();
//! assert_eq!(user.id(), Some(&json!("1")));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A concrete object observed in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObject {
    pub type_name: String,
    /// The JSON object exactly as returned (nested selections included).
    pub value: Value,
    /// Operation whose response contained the object.
    pub producer: String,
    /// Global discovery number.
    pub sequence: u64,
    /// Actor label the object was discovered under.
    pub scope: String,
}

impl DynamicObject {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.value.get(name).filter(|v| !v.is_null())
    }

    pub fn id(&self) -> Option<&Value> {
        self.field("id")
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    by_type: BTreeMap<String, Vec<Arc<DynamicObject>>>,
    next_sequence: u64,
    total: usize,
}

impl StoreInner {
    fn push(&mut self, type_name: String, value: Value, producer: &str, scope: &str) -> DynamicObject {
        self.next_sequence += 1;
        let object = Arc::new(DynamicObject {
            type_name: type_name.clone(),
            value,
            producer: producer.to_string(),
            sequence: self.next_sequence,
            scope: scope.to_string(),
        });
        self.by_type.entry(type_name).or_default().push(Arc::clone(&object));
        self.total += 1;
        DynamicObject::clone(&object)
    }
}

/// Shared, append-only object store.
///
/// Thread-safe via internal RwLock.
#[derive(Debug, Default)]
pub struct ObjectStore {
    inner: RwLock<StoreInner>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one object and return it with its discovery number.
    pub fn insert(&self, type_name: &str, value: Value, producer: &str, scope: &str) -> DynamicObject {
        let mut inner = self.inner.write();
        inner.push(type_name.to_string(), value, producer, scope)
    }

    /// Insert every object of one response under a single lock acquisition.
    ///
    /// Readers see all of them or none, and their discovery numbers are
    /// contiguous.
    pub fn insert_batch(
        &self,
        producer: &str,
        scope: &str,
        objects: Vec<(String, Value)>,
    ) -> Vec<DynamicObject> {
        if objects.is_empty() {
            return Vec::new();
        }
        let mut inner = self.inner.write();
        objects
            .into_iter()
            .map(|(type_name, value)| inner.push(type_name, value, producer, scope))
            .collect()
    }

    pub fn objects_of(&self, type_name: &str) -> Vec<DynamicObject> {
        self.inner
            .read()
            .by_type
            .get(type_name)
            .map(|objects| objects.iter().map(|o| DynamicObject::clone(o)).collect())
            .unwrap_or_default()
    }

    /// Look up an object by type and discovery number.
    pub fn get(&self, type_name: &str, sequence: u64) -> Option<DynamicObject> {
        let inner = self.inner.read();
        let objects = inner.by_type.get(type_name)?;
        // Discovery numbers grow monotonically within a type.
        objects
            .binary_search_by_key(&sequence, |o| o.sequence)
            .ok()
            .map(|i| DynamicObject::clone(&objects[i]))
    }

    pub fn latest(&self, type_name: &str) -> Option<DynamicObject> {
        self.inner
            .read()
            .by_type
            .get(type_name)
            .and_then(|objects| objects.last().map(|o| DynamicObject::clone(o)))
    }

    pub fn has(&self, type_name: &str) -> bool {
        self.count(type_name) > 0
    }

    pub fn count(&self, type_name: &str) -> usize {
        self.inner
            .read()
            .by_type
            .get(type_name)
            .map_or(0, Vec::len)
    }

    /// Total number of objects across all types.
    pub fn len(&self) -> usize {
        self.inner.read().total
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last `per_type` objects of every type, oldest first within a type.
    pub fn recent(&self, per_type: usize) -> Vec<DynamicObject> {
        let inner = self.inner.read();
        inner
            .by_type
            .values()
            .flat_map(|objects| &objects[objects.len().saturating_sub(per_type)..])
            .map(|o| DynamicObject::clone(o))
            .collect()
    }

    /// Point-in-time copy used for deterministic generation.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            by_type: self.inner.read().by_type.clone(),
        }
    }

    /// Drop every object and restart discovery numbering.
    pub fn reset(&self) {
        *self.inner.write() = StoreInner::default();
    }
}

/// Immutable, type-ordered view of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    by_type: BTreeMap<String, Vec<Arc<DynamicObject>>>,
}

impl StoreSnapshot {
    pub fn objects_of(&self, type_name: &str) -> &[Arc<DynamicObject>] {
        self.by_type
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Objects of `type_name` that carry a non-null `field`.
    pub fn objects_with_field<'a>(
        &'a self,
        type_name: &str,
        field: &'a str,
    ) -> impl Iterator<Item = &'a DynamicObject> + 'a {
        self.objects_of(type_name)
            .iter()
            .map(Arc::as_ref)
            .filter(move |o| o.field(field).is_some())
    }

    pub fn has_field(&self, type_name: &str, field: &str) -> bool {
        self.objects_with_field(type_name, field).next().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DynamicObject> {
        self.by_type.values().flatten().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
