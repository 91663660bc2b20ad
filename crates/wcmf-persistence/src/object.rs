//! Persistent objects, proxies and relation values.
//!
//! A [`PersistentObject`] is a bag of attribute values plus relation values
//! keyed by role. Objects are shared as [`ObjectRef`] so that the
//! transaction's identity map and every relation pointing at an object see
//! the same instance.

use crate::object_id::ObjectId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use wcmf_core::Value;

/// Shared reference to a persistent object.
pub type ObjectRef = Arc<RwLock<PersistentObject>>;

/// Read guard for a persistent object.
pub type ObjectReadGuard<'a> = RwLockReadGuard<'a, PersistentObject>;

/// Write guard for a persistent object.
pub type ObjectWriteGuard<'a> = RwLockWriteGuard<'a, PersistentObject>;

/// Wrap an object for sharing.
pub fn object_ref(object: PersistentObject) -> ObjectRef {
    Arc::new(RwLock::new(object))
}

/// Acquire a read guard. A poisoned lock still yields the object.
pub fn read_object(object: &ObjectRef) -> ObjectReadGuard<'_> {
    object.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquire a write guard. A poisoned lock still yields the object.
pub fn write_object(object: &ObjectRef) -> ObjectWriteGuard<'_> {
    object.write().unwrap_or_else(PoisonError::into_inner)
}

/// Lifecycle state of a persistent object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectState {
    /// Created in memory, not yet inserted
    #[default]
    New,
    /// Stored, with unsaved modifications
    Dirty,
    /// Stored and unmodified since load or save
    Clean,
    /// Removed from storage
    Deleted,
}

/// Reference to an object by id only; the target is loaded on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersistentObjectProxy {
    oid: ObjectId,
}

impl PersistentObjectProxy {
    pub fn new(oid: ObjectId) -> Self {
        Self { oid }
    }

    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }
}

impl From<ObjectId> for PersistentObjectProxy {
    fn from(oid: ObjectId) -> Self {
        Self::new(oid)
    }
}

/// One endpoint of a relation value.
#[derive(Debug, Clone)]
pub enum Related {
    Object(ObjectRef),
    Proxy(PersistentObjectProxy),
}

impl Related {
    pub fn oid(&self) -> ObjectId {
        match self {
            Related::Object(object) => read_object(object).oid().clone(),
            Related::Proxy(proxy) => proxy.oid().clone(),
        }
    }

    /// The realized object, if this is not a proxy.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Related::Object(object) => Some(object),
            Related::Proxy(_) => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Related::Proxy(_))
    }
}

impl From<ObjectRef> for Related {
    fn from(object: ObjectRef) -> Self {
        Related::Object(object)
    }
}

impl From<PersistentObjectProxy> for Related {
    fn from(proxy: PersistentObjectProxy) -> Self {
        Related::Proxy(proxy)
    }
}

/// Value of a relation role.
#[derive(Debug, Clone)]
pub enum RelationValue {
    /// Single-valued role
    One(Option<Related>),
    /// Multi-valued role
    Many(Vec<Related>),
}

impl RelationValue {
    /// An empty value of the given cardinality.
    pub fn empty(multi_valued: bool) -> Self {
        if multi_valued {
            RelationValue::Many(Vec::new())
        } else {
            RelationValue::One(None)
        }
    }

    /// Build a value from loaded relatives.
    pub fn from_related(multi_valued: bool, mut related: Vec<Related>) -> Self {
        if multi_valued {
            RelationValue::Many(related)
        } else if related.is_empty() {
            RelationValue::One(None)
        } else {
            RelationValue::One(Some(related.swap_remove(0)))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Related> {
        let items: &[Related] = match self {
            RelationValue::One(Some(related)) => std::slice::from_ref(related),
            RelationValue::One(None) => &[],
            RelationValue::Many(items) => items,
        };
        items.iter()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Realized objects, skipping proxies.
    pub fn objects(&self) -> Vec<ObjectRef> {
        self.iter()
            .filter_map(Related::as_object)
            .cloned()
            .collect()
    }

    /// Ids of all relatives.
    pub fn oids(&self) -> Vec<ObjectId> {
        self.iter().map(Related::oid).collect()
    }
}

/// A loaded or created object.
#[derive(Debug, Clone)]
pub struct PersistentObject {
    oid: ObjectId,
    state: ObjectState,
    values: BTreeMap<String, Value>,
    relations: BTreeMap<String, RelationValue>,
    uninitialized: BTreeSet<String>,
}

impl PersistentObject {
    /// Create a NEW object.
    pub fn new(oid: ObjectId) -> Self {
        Self {
            oid,
            state: ObjectState::New,
            values: BTreeMap::new(),
            relations: BTreeMap::new(),
            uninitialized: BTreeSet::new(),
        }
    }

    pub fn oid(&self) -> &ObjectId {
        &self.oid
    }

    pub fn type_name(&self) -> &str {
        self.oid.type_name()
    }

    pub(crate) fn set_oid(&mut self, oid: ObjectId) {
        self.oid = oid;
    }

    pub fn state(&self) -> ObjectState {
        self.state
    }

    pub fn set_state(&mut self, state: ObjectState) {
        self.state = state;
    }

    fn touch(&mut self) {
        if self.state == ObjectState::Clean {
            self.state = ObjectState::Dirty;
        }
    }

    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Set an attribute value; a CLEAN object becomes DIRTY.
    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
        self.touch();
    }

    /// Set an attribute value without changing the state.
    pub fn set_value_silent(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn has_value(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn value_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Record that the object has a relation `role` that is not loaded yet.
    pub fn add_relation(&mut self, role: impl Into<String>) {
        let role = role.into();
        if !self.relations.contains_key(&role) {
            self.uninitialized.insert(role);
        }
    }

    /// Whether `role` is known, loaded or not.
    pub fn has_relation(&self, role: &str) -> bool {
        self.relations.contains_key(role) || self.uninitialized.contains(role)
    }

    pub fn is_relation_initialized(&self, role: &str) -> bool {
        self.relations.contains_key(role)
    }

    /// Roles recorded with [`add_relation`](Self::add_relation) and not loaded since.
    pub fn uninitialized_relations(&self) -> impl Iterator<Item = &str> {
        self.uninitialized.iter().map(String::as_str)
    }

    pub fn get_relation(&self, role: &str) -> Option<&RelationValue> {
        self.relations.get(role)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &RelationValue)> {
        self.relations.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set a relation value; a CLEAN object becomes DIRTY.
    pub fn set_relation(&mut self, role: impl Into<String>, value: RelationValue) {
        self.set_relation_silent(role, value);
        self.touch();
    }

    /// Set a relation value without changing the state.
    pub fn set_relation_silent(&mut self, role: impl Into<String>, value: RelationValue) {
        let role = role.into();
        self.uninitialized.remove(&role);
        self.relations.insert(role, value);
    }

    /// Append `related` to a role, creating a list value if needed.
    pub fn add_related(&mut self, role: impl Into<String>, related: impl Into<Related>) {
        let role = role.into();
        let related = related.into();
        let value = match self.relations.remove(&role) {
            Some(RelationValue::Many(mut items)) => {
                items.push(related);
                RelationValue::Many(items)
            }
            Some(RelationValue::One(Some(existing))) => RelationValue::Many(vec![existing, related]),
            Some(RelationValue::One(None)) | None => RelationValue::Many(vec![related]),
        };
        self.set_relation(role, value);
    }

    /// Remove a relation value without changing the state.
    pub fn clear_relation_silent(&mut self, role: &str) {
        self.relations.remove(role);
        self.uninitialized.remove(role);
    }

    /// Fill in what `other` knows and this object does not: attribute
    /// values missing here and relations initialized there only.
    pub fn merge_from(&mut self, other: &PersistentObject) {
        for (name, value) in &other.values {
            if !self.values.contains_key(name) {
                self.values.insert(name.clone(), value.clone());
            }
        }
        for (role, value) in &other.relations {
            if !self.relations.contains_key(role) {
                self.set_relation_silent(role.clone(), value.clone());
            }
        }
        for role in &other.uninitialized {
            self.add_relation(role.clone());
        }
    }

    /// Drop all relation values, releasing references to other objects.
    pub fn detach_relations(&mut self) {
        let roles: Vec<String> = self.relations.keys().cloned().collect();
        self.relations.clear();
        self.uninitialized.extend(roles);
    }
}
