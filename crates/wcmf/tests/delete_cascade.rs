//! Deleting objects cascades along child relations.

mod common;

use common::{count, exec, oid, query, seeded_facade, table};
use wcmf::prelude::*;

#[test]
fn deleting_a_book_deletes_its_chapters_and_links() {
    let ctx = seeded_facade();
    let book = ctx.load(&oid("Book", 1), BuildDepth::Single).unwrap().unwrap();

    ctx.delete(&book).unwrap();

    assert_eq!(read_object(&book).state(), ObjectState::Deleted);
    assert!(ctx.registered(&oid("Book", 1)).is_none());
    assert_eq!(count(&ctx, "Book"), 1);
    assert_eq!(count(&ctx, "Chapter"), 0);

    // only the link of the deleted book goes, the author stays
    let sql = format!("SELECT id FROM {}", table(&ctx, "NMBookAuthor"));
    let links = query(&ctx, &sql);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].get_named::<i64>("id").unwrap(), 2);
    assert_eq!(count(&ctx, "Author"), 1);
}

#[test]
fn deleting_a_publisher_unlinks_shared_books() {
    let ctx = seeded_facade();
    let book = ctx.load(&oid("Book", 1), BuildDepth::Single).unwrap().unwrap();
    let publisher = ctx
        .load(&oid("Publisher", 1), BuildDepth::Single)
        .unwrap()
        .unwrap();

    ctx.delete(&publisher).unwrap();

    assert_eq!(count(&ctx, "Publisher"), 0);
    assert_eq!(count(&ctx, "Book"), 2);
    let sql = format!(
        "SELECT COUNT(*) AS n FROM {} WHERE fk_publisher_id IS NULL",
        table(&ctx, "Book")
    );
    assert_eq!(query(&ctx, &sql)[0].get_named::<i64>("n").unwrap(), 2);

    // the loaded instance follows without becoming dirty
    let book = read_object(&book);
    assert_eq!(book.get_value("fk_publisher_id"), Some(&Value::Null));
    assert_eq!(book.state(), ObjectState::Clean);
}

#[test]
fn deleting_a_missing_row_does_not_cascade() {
    let ctx = seeded_facade();
    let book = ctx.load(&oid("Book", 1), BuildDepth::Single).unwrap().unwrap();
    exec(&ctx, &format!("DELETE FROM {} WHERE id = 1", table(&ctx, "Book")));

    ctx.delete(&book).unwrap();

    assert_eq!(read_object(&book).state(), ObjectState::Deleted);
    assert_eq!(count(&ctx, "Chapter"), 2);
    assert_eq!(count(&ctx, "NMBookAuthor"), 2);
}

#[test]
fn deleting_a_new_object_touches_no_rows() {
    let ctx = seeded_facade();
    let book = ctx.create("Book", BuildDepth::Single).unwrap();

    ctx.delete(&book).unwrap();
    ctx.commit().unwrap();

    assert_eq!(read_object(&book).state(), ObjectState::Deleted);
    assert_eq!(count(&ctx, "Book"), 2);
}

#[test]
fn marked_deletions_run_on_commit() {
    let ctx = seeded_facade();
    let chapter = ctx
        .load(&oid("Chapter", 2), BuildDepth::Single)
        .unwrap()
        .unwrap();

    ctx.mark_deleted(&chapter);
    assert_eq!(count(&ctx, "Chapter"), 2);
    ctx.commit().unwrap();

    assert_eq!(count(&ctx, "Chapter"), 1);
    assert!(ctx.load(&oid("Chapter", 2), BuildDepth::Single).unwrap().is_none());
}
