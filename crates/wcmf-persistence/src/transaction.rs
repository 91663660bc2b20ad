//! Identity map and pending work of one logical transaction.
//!
//! Every object a mapper loads is registered here; if an object with the
//! same id is already known, the registered instance wins and the freshly
//! loaded one is merged into it. Objects created through the facade are
//! registered as new, and [`Transaction::take_pending`] hands the facade the
//! work to flush on commit.

use crate::object::{ObjectRef, ObjectState, read_object, write_object};
use crate::object_id::ObjectId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Objects to flush, in the order they must be processed.
#[derive(Debug, Default)]
pub struct PendingWork {
    pub new: Vec<ObjectRef>,
    pub dirty: Vec<ObjectRef>,
    pub deleted: Vec<ObjectRef>,
}

impl PendingWork {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.dirty.is_empty() && self.deleted.is_empty()
    }
}

/// Identity map plus new/dirty/deleted bookkeeping.
#[derive(Debug, Default)]
pub struct Transaction {
    objects: HashMap<ObjectId, ObjectRef>,
    new: Vec<ObjectRef>,
    dirty: Vec<ObjectRef>,
    deleted: Vec<ObjectRef>,
}

fn contains(list: &[ObjectRef], object: &ObjectRef) -> bool {
    list.iter().any(|o| Arc::ptr_eq(o, object))
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loaded object and return the instance to use for it.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn register_loaded(&mut self, object: ObjectRef) -> ObjectRef {
        let oid = read_object(&object).oid().clone();
        match self.objects.get(&oid) {
            Some(existing) if Arc::ptr_eq(existing, &object) => object,
            Some(existing) => {
                write_object(existing).merge_from(&read_object(&object));
                tracing::trace!(oid = %oid, "merged into registered instance");
                Arc::clone(existing)
            }
            None => {
                self.objects.insert(oid, Arc::clone(&object));
                object
            }
        }
    }

    /// Register an object that is to be inserted on commit.
    pub fn register_new(&mut self, object: ObjectRef) {
        let oid = read_object(&object).oid().clone();
        self.objects.insert(oid, Arc::clone(&object));
        if !contains(&self.new, &object) {
            self.new.push(object);
        }
    }

    /// Register an object that is to be updated on commit.
    pub fn register_dirty(&mut self, object: ObjectRef) {
        let oid = read_object(&object).oid().clone();
        self.objects.entry(oid).or_insert_with(|| Arc::clone(&object));
        if !contains(&self.dirty, &object) {
            self.dirty.push(object);
        }
    }

    /// Register an object that is to be deleted on commit.
    pub fn register_deleted(&mut self, object: ObjectRef) {
        if !contains(&self.deleted, &object) {
            self.deleted.push(object);
        }
    }

    pub fn get(&self, oid: &ObjectId) -> Option<ObjectRef> {
        self.objects.get(oid).cloned()
    }

    pub fn is_registered(&self, oid: &ObjectId) -> bool {
        self.objects.contains_key(oid)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Move an object registered under `old` to its current id.
    pub fn rekey(&mut self, old: &ObjectId, object: &ObjectRef) {
        let oid = read_object(object).oid().clone();
        if old == &oid {
            return;
        }
        if self
            .objects
            .get(old)
            .is_some_and(|registered| Arc::ptr_eq(registered, object))
        {
            self.objects.remove(old);
        }
        self.objects.insert(oid, Arc::clone(object));
    }

    /// Forget an object.
    pub fn detach(&mut self, oid: &ObjectId) {
        if let Some(object) = self.objects.remove(oid) {
            self.new.retain(|o| !Arc::ptr_eq(o, &object));
            self.dirty.retain(|o| !Arc::ptr_eq(o, &object));
        }
    }

    /// Take the work to flush: new objects still NEW, objects that are
    /// DIRTY (registered explicitly or modified after load) and deleted
    /// objects.
    pub fn take_pending(&mut self) -> PendingWork {
        let deleted = std::mem::take(&mut self.deleted);
        let mut seen: HashSet<*const _> = deleted.iter().map(Arc::as_ptr).collect();

        let new: Vec<ObjectRef> = std::mem::take(&mut self.new)
            .into_iter()
            .filter(|o| read_object(o).state() == ObjectState::New)
            .filter(|o| seen.insert(Arc::as_ptr(o)))
            .collect();

        let mut dirty = Vec::new();
        let explicit = std::mem::take(&mut self.dirty);
        for object in explicit.into_iter().chain(self.objects.values().cloned()) {
            if read_object(&object).state() == ObjectState::Dirty && seen.insert(Arc::as_ptr(&object)) {
                dirty.push(object);
            }
        }

        PendingWork {
            new,
            dirty,
            deleted,
        }
    }

    /// Forget all objects and detach their relation values, which releases
    /// reference cycles between them.
    pub fn clear(&mut self) {
        let objects = self
            .objects
            .drain()
            .map(|(_, o)| o)
            .chain(self.new.drain(..))
            .chain(self.dirty.drain(..))
            .chain(self.deleted.drain(..));
        for object in objects {
            write_object(&object).detach_relations();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{PersistentObject, RelationValue, object_ref};
    use wcmf_core::Value;

    fn loaded(id: i64, title: &str) -> ObjectRef {
        let mut obj = PersistentObject::new(ObjectId::new("Book", vec![Value::BigInt(id)]));
        obj.set_value_silent("title", title);
        obj.set_state(ObjectState::Clean);
        object_ref(obj)
    }

    #[test]
    fn register_loaded_returns_registered_instance() {
        let mut tx = Transaction::new();
        let first = loaded(1, "Hamlet");
        let registered = tx.register_loaded(first.clone());
        assert!(Arc::ptr_eq(&registered, &first));

        let second = loaded(1, "Reloaded");
        write_object(&second).set_value_silent("year", 1603);
        let registered = tx.register_loaded(second);
        assert!(Arc::ptr_eq(&registered, &first));

        let book = read_object(&first);
        assert_eq!(book.get_value("title"), Some(&Value::from("Hamlet")));
        assert_eq!(book.get_value("year"), Some(&Value::Int(1603)));
        assert_eq!(tx.len(), 1);
    }

    #[test]
    fn pending_work_collects_modified_objects() {
        let mut tx = Transaction::new();
        let clean = tx.register_loaded(loaded(1, "Hamlet"));
        let edited = tx.register_loaded(loaded(2, "Macbeth"));
        write_object(&edited).set_value("title", "The Scottish Play");

        let created = object_ref(PersistentObject::new(ObjectId::dummy("Book", 1)));
        tx.register_new(created.clone());
        tx.register_new(created.clone());
        tx.register_deleted(clean.clone());

        let work = tx.take_pending();
        assert_eq!(work.new.len(), 1);
        assert!(Arc::ptr_eq(&work.new[0], &created));
        assert_eq!(work.dirty.len(), 1);
        assert!(Arc::ptr_eq(&work.dirty[0], &edited));
        assert_eq!(work.deleted.len(), 1);

        assert!(tx.take_pending().dirty.len() == 1);
        write_object(&edited).set_state(ObjectState::Clean);
        assert!(tx.take_pending().is_empty());
    }

    #[test]
    fn rekey_after_insert() {
        let mut tx = Transaction::new();
        let dummy = ObjectId::dummy("Book", 1);
        let created = object_ref(PersistentObject::new(dummy.clone()));
        tx.register_new(created.clone());

        let stored = ObjectId::new("Book", vec![Value::BigInt(7)]);
        write_object(&created).set_oid(stored.clone());
        tx.rekey(&dummy, &created);
        assert!(!tx.is_registered(&dummy));
        assert!(Arc::ptr_eq(&tx.get(&stored).unwrap(), &created));
    }

    #[test]
    fn clear_detaches_relations() {
        let mut tx = Transaction::new();
        let book = tx.register_loaded(loaded(1, "Hamlet"));
        let other = loaded(2, "Macbeth");
        write_object(&book).set_relation_silent("Sequel", RelationValue::One(Some(other.into())));

        tx.clear();
        assert!(tx.is_empty());
        assert!(!read_object(&book).is_relation_initialized("Sequel"));
    }
}
