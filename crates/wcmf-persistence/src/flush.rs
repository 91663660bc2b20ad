//! Ordering of pending inserts.
//!
//! A NEW object that references another NEW object must be inserted after
//! it, so that its foreign key or link row can take the stored id:
//! - a many-to-one value makes the object depend on the referenced object
//! - a one-to-many value makes each child depend on the object
//! - a many-to-many value makes the object depend on the other end, whose
//!   link row is written when the object is saved

use crate::object::{ObjectRef, read_object};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use wcmf_schema::{RelationKind, Schema};

/// Order `objects` so that every object follows the objects it depends on.
///
/// Objects caught in a dependency cycle are released in registration order.
pub fn order_inserts(schema: &Schema, objects: &[ObjectRef]) -> Vec<ObjectRef> {
    let index: HashMap<*const _, usize> = objects
        .iter()
        .enumerate()
        .map(|(i, o)| (Arc::as_ptr(o), i))
        .collect();

    // dependents[i]: objects to insert after objects[i]
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); objects.len()];
    let mut in_degree = vec![0usize; objects.len()];
    let mut depend = |dependent: usize, dependency: usize| {
        if dependent != dependency && !dependents[dependency].contains(&dependent) {
            dependents[dependency].push(dependent);
            in_degree[dependent] += 1;
        }
    };

    for (i, object) in objects.iter().enumerate() {
        let o = read_object(object);
        let Some(ty) = schema.get(o.type_name()) else {
            continue;
        };
        for (role, value) in o.relations() {
            let Some(rel) = ty.get_relation(role) else {
                continue;
            };
            for related in value.iter().filter_map(|r| r.as_object()) {
                let Some(&j) = index.get(&Arc::as_ptr(related)) else {
                    continue;
                };
                match rel.kind {
                    RelationKind::OneToMany { .. } => depend(j, i),
                    RelationKind::ManyToOne { .. } | RelationKind::ManyToMany { .. } => {
                        depend(i, j);
                    }
                }
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..objects.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut emitted = vec![false; objects.len()];
    let mut ordered = Vec::with_capacity(objects.len());
    while ordered.len() < objects.len() {
        let next = match queue.pop_front() {
            Some(i) => i,
            None => {
                // cycle: release the earliest object still waiting
                let Some(i) = (0..objects.len()).find(|&i| !emitted[i]) else {
                    break;
                };
                tracing::debug!(oid = %read_object(&objects[i]).oid(), "insert order cycle");
                i
            }
        };
        if emitted[next] {
            continue;
        }
        emitted[next] = true;
        ordered.push(Arc::clone(&objects[next]));
        for &dependent in &dependents[next] {
            in_degree[dependent] = in_degree[dependent].saturating_sub(1);
            if in_degree[dependent] == 0 && !emitted[dependent] {
                queue.push_back(dependent);
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{PersistentObject, RelationValue, object_ref, write_object};
    use crate::object_id::ObjectId;
    use wcmf_core::SqlType;
    use wcmf_schema::{AttributeDescription, PersistentType, RelationDescription, RelationEnd};

    fn schema() -> Schema {
        let book = PersistentType::new("Book")
            .attribute(AttributeDescription::primary_key("id"))
            .relation(RelationDescription::one_to_many(
                RelationEnd::new("Book", "Book"),
                RelationEnd::new("Chapter", "Chapter").unbounded(),
                "id",
                "fk_book_id",
            ));
        let chapter = PersistentType::new("Chapter")
            .attribute(AttributeDescription::primary_key("id"))
            .attribute(AttributeDescription::new("fk_book_id", SqlType::BigInt))
            .attribute(AttributeDescription::new("fk_next_id", SqlType::BigInt))
            .relation(RelationDescription::many_to_one(
                RelationEnd::new("Chapter", "Chapter").unbounded(),
                RelationEnd::new("Book", "Book"),
                "id",
                "fk_book_id",
            ))
            .relation(RelationDescription::many_to_one(
                RelationEnd::new("Chapter", "PreviousChapter"),
                RelationEnd::new("Chapter", "NextChapter"),
                "id",
                "fk_next_id",
            ));
        Schema::new(vec![book, chapter]).unwrap()
    }

    fn new_object(type_name: &str) -> ObjectRef {
        object_ref(PersistentObject::new(ObjectId::dummy(type_name, 1)))
    }

    fn position(ordered: &[ObjectRef], object: &ObjectRef) -> usize {
        ordered.iter().position(|o| Arc::ptr_eq(o, object)).unwrap()
    }

    #[test]
    fn referenced_objects_come_first() {
        let schema = schema();
        let book = new_object("Book");
        let first = new_object("Chapter");
        let second = new_object("Chapter");
        write_object(&first).set_relation("Book", RelationValue::One(Some(book.clone().into())));
        write_object(&book).set_relation("Chapter", RelationValue::Many(vec![second.clone().into()]));

        let ordered = order_inserts(&schema, &[first.clone(), second.clone(), book.clone()]);
        assert_eq!(ordered.len(), 3);
        assert!(position(&ordered, &book) < position(&ordered, &first));
        assert!(position(&ordered, &book) < position(&ordered, &second));
    }

    #[test]
    fn cycles_keep_every_object() {
        let schema = schema();
        let a = new_object("Chapter");
        let b = new_object("Chapter");
        write_object(&a).set_relation("NextChapter", RelationValue::One(Some(b.clone().into())));
        write_object(&b).set_relation("NextChapter", RelationValue::One(Some(a.clone().into())));

        let ordered = order_inserts(&schema, &[a.clone(), b.clone()]);
        assert_eq!(ordered.len(), 2);
        assert!(Arc::ptr_eq(&ordered[0], &a));
    }
}
