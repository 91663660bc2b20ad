//! Build depth decides how far relations are resolved on load.

mod common;

use common::{oid, seeded_facade};
use std::sync::Arc;
use wcmf::prelude::*;
use wcmf::{LoadOptions, Related};

fn related_objects(object: &ObjectRef, role: &str) -> Vec<ObjectRef> {
    read_object(object)
        .get_relation(role)
        .map(RelationValue::objects)
        .unwrap_or_default()
}

#[test]
fn single_leaves_relations_unloaded() {
    let ctx = seeded_facade();
    let book = ctx.load(&oid("Book", 1), BuildDepth::Single).unwrap().unwrap();

    let book = read_object(&book);
    assert_eq!(book.state(), ObjectState::Clean);
    assert_eq!(book.get_value("title"), Some(&Value::from("Hamlet")));
    for role in ["Publisher", "Chapter", "Cover", "Author"] {
        assert!(book.has_relation(role), "{role}");
        assert!(!book.is_relation_initialized(role), "{role}");
    }
}

#[test]
fn depth_one_loads_direct_children_only() {
    let ctx = seeded_facade();
    let book = ctx.load(&oid("Book", 1), BuildDepth::Depth(1)).unwrap().unwrap();

    let chapters = related_objects(&book, "Chapter");
    assert_eq!(chapters.len(), 2);
    assert!(read_object(&book).is_relation_initialized("Cover"));
    assert!(!read_object(&book).is_relation_initialized("Publisher"));

    let authors = related_objects(&book, "Author");
    assert_eq!(authors.len(), 1);
    let author = read_object(&authors[0]);
    assert_eq!(author.get_value("name"), Some(&Value::from("Shakespeare")));
    assert!(!author.is_relation_initialized("Book"));
}

#[test]
fn depth_two_stops_after_the_second_generation() {
    let ctx = seeded_facade();
    let book = ctx.load(&oid("Book", 1), BuildDepth::Depth(2)).unwrap().unwrap();

    let authors = related_objects(&book, "Author");
    assert_eq!(authors.len(), 1);
    assert!(read_object(&authors[0]).is_relation_initialized("Book"));

    let books = related_objects(&authors[0], "Book");
    assert_eq!(books.len(), 2);
    assert!(Arc::ptr_eq(&books[0], &book));
    let macbeth = read_object(&books[1]);
    assert_eq!(macbeth.get_value("title"), Some(&Value::from("Macbeth")));
    for role in ["Chapter", "Cover", "Author"] {
        assert!(!macbeth.is_relation_initialized(role), "{role}");
    }
}

#[test]
fn infinite_depth_terminates_on_cycles() {
    let ctx = seeded_facade();
    let book = ctx.load(&oid("Book", 1), BuildDepth::Infinite).unwrap().unwrap();

    let authors = related_objects(&book, "Author");
    assert_eq!(authors.len(), 1);
    let books = related_objects(&authors[0], "Book");
    assert_eq!(books.len(), 2);
    // ordered by title, the first one is the loaded book itself
    assert!(Arc::ptr_eq(&books[0], &book));
    assert_eq!(read_object(&books[1]).get_value("title"), Some(&Value::from("Macbeth")));

    // everything is registered once
    let registered = ctx.registered(&oid("Author", 1)).unwrap();
    assert!(Arc::ptr_eq(&registered, &authors[0]));
    let tx_book = ctx.registered(&oid("Book", 1)).unwrap();
    assert!(Arc::ptr_eq(&tx_book, &book));
}

#[test]
fn single_load_returns_the_registered_instance() {
    let ctx = seeded_facade();
    let first = ctx.load(&oid("Book", 2), BuildDepth::Single).unwrap().unwrap();
    write_object(&first).set_value("title", "Macbeth (revised)");

    let second = ctx.load(&oid("Book", 2), BuildDepth::Single).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(read_object(&second).state(), ObjectState::Dirty);
}

#[test]
fn proxies_only_defers_children() {
    let ctx = seeded_facade();
    let book = ctx.load(&oid("Book", 1), BuildDepth::Single).unwrap().unwrap();

    let value = ctx.load_relation(&book, "Chapter", BuildDepth::ProxiesOnly).unwrap();
    assert_eq!(value.len(), 2);
    assert!(value.iter().all(Related::is_proxy));
    assert!(read_object(&book).is_relation_initialized("Chapter"));

    let Some(Related::Proxy(proxy)) = value.iter().next().cloned() else {
        panic!("expected a proxy");
    };
    let chapter = ctx.resolve(&proxy, BuildDepth::Single).unwrap().unwrap();
    assert_eq!(read_object(&chapter).type_name(), "app.Chapter");
    assert!(read_object(&chapter).get_value("name").is_some());
}

#[test]
fn many_to_one_relations_load_on_demand() {
    let ctx = seeded_facade();
    let chapter = ctx.load(&oid("Chapter", 1), BuildDepth::Single).unwrap().unwrap();

    let value = ctx.load_relation(&chapter, "Book", BuildDepth::Single).unwrap();
    assert!(matches!(value, RelationValue::One(Some(_))));
    assert_eq!(value.oids(), vec![oid("Book", 1)]);
}

#[test]
fn paging_reports_the_total() {
    let ctx = seeded_facade();
    let mut paging = PagingInfo::new(Some(1), false).page(2);

    let books = ctx
        .load_objects("Book", BuildDepth::Single, &[], &[], Some(&mut paging))
        .unwrap();

    assert_eq!(books.len(), 1);
    assert_eq!(paging.total_count(), 2);
    assert_eq!(read_object(&books[0]).get_value("title"), Some(&Value::from("Macbeth")));
}

#[test]
fn criteria_filter_loaded_objects() {
    let ctx = seeded_facade();
    let criteria = [Criteria::eq("Book", "title", "Macbeth")];

    let oids = ctx.get_oids("Book", &criteria, &[], None).unwrap();
    assert_eq!(oids, vec![oid("Book", 2)]);

    let first = ctx
        .load_first_object("Chapter", BuildDepth::Single, &[], &[OrderBy::desc("name")])
        .unwrap()
        .unwrap();
    assert_eq!(read_object(&first).get_value("name"), Some(&Value::from("Act II")));
}

#[test]
fn attribute_selection_limits_loaded_values() {
    let ctx = seeded_facade();
    let opts = LoadOptions::new().attributes("Book", ["title"]);

    let book = ctx
        .load_with(&oid("Book", 2), BuildDepth::Single, &opts)
        .unwrap()
        .unwrap();

    let book = read_object(&book);
    assert!(book.get_value("title").is_some());
    assert!(!book.has_value("fk_publisher_id"));
}
