//! Shared fixtures for the end-to-end tests.
//!
//! The schema models a small library:
//! - a `Publisher` shares its `Book`s
//! - a `Book` composes its `Chapter`s and exactly one `Cover`
//! - `Book` and `Author` are linked many-to-many through `NMBookAuthor`

#![allow(dead_code)]

use wcmf::prelude::*;
use wcmf::Row;

pub fn schema() -> Schema {
    let publisher = PersistentType::new("app.Publisher")
        .attribute(AttributeDescription::primary_key("id"))
        .attribute(AttributeDescription::new("name", SqlType::Text))
        .relation(RelationDescription::one_to_many(
            RelationEnd::new("Publisher", "Publisher").aggregation(AggregationKind::Shared),
            RelationEnd::new("Book", "Book").unbounded(),
            "id",
            "fk_publisher_id",
        ));

    let book = PersistentType::new("app.Book")
        .attribute(AttributeDescription::primary_key("id"))
        .attribute(AttributeDescription::new("title", SqlType::Text))
        .attribute(AttributeDescription::new("published", SqlType::Boolean))
        .attribute(AttributeDescription::new("meta", SqlType::Json))
        .attribute(AttributeDescription::new("fk_publisher_id", SqlType::BigInt))
        .relation(RelationDescription::many_to_one(
            RelationEnd::new("Book", "Book").unbounded(),
            RelationEnd::new("Publisher", "Publisher"),
            "id",
            "fk_publisher_id",
        ))
        .relation(RelationDescription::one_to_many(
            RelationEnd::new("Book", "Book").aggregation(AggregationKind::Composite),
            RelationEnd::new("Chapter", "Chapter").unbounded(),
            "id",
            "fk_book_id",
        ))
        .relation(RelationDescription::one_to_many(
            RelationEnd::new("Book", "Book").aggregation(AggregationKind::Composite),
            RelationEnd::new("Cover", "Cover")
                .min(1)
                .max(1)
                .aggregation(AggregationKind::Composite),
            "id",
            "fk_book_id",
        ))
        .relation(RelationDescription::many_to_many(
            RelationDescription::one_to_many(
                RelationEnd::new("Book", "Book"),
                RelationEnd::new("NMBookAuthor", "NMBookAuthor").unbounded(),
                "id",
                "fk_book_id",
            ),
            RelationDescription::many_to_one(
                RelationEnd::new("NMBookAuthor", "NMBookAuthor").unbounded(),
                RelationEnd::new("Author", "Author"),
                "id",
                "fk_author_id",
            ),
        ))
        .default_order("title");

    let chapter = PersistentType::new("app.Chapter")
        .attribute(AttributeDescription::primary_key("id"))
        .attribute(AttributeDescription::new("name", SqlType::Text))
        .attribute(AttributeDescription::new("fk_book_id", SqlType::BigInt))
        .relation(RelationDescription::many_to_one(
            RelationEnd::new("Chapter", "Chapter").unbounded(),
            RelationEnd::new("Book", "Book"),
            "id",
            "fk_book_id",
        ));

    let cover = PersistentType::new("app.Cover")
        .attribute(AttributeDescription::primary_key("id"))
        .attribute(AttributeDescription::new("color", SqlType::Text).default_value("white"))
        .attribute(AttributeDescription::new("fk_book_id", SqlType::BigInt))
        .relation(RelationDescription::many_to_one(
            RelationEnd::new("Cover", "Cover"),
            RelationEnd::new("Book", "Book"),
            "id",
            "fk_book_id",
        ));

    let author = PersistentType::new("app.Author")
        .attribute(AttributeDescription::primary_key("id"))
        .attribute(AttributeDescription::new("name", SqlType::Text))
        .relation(RelationDescription::many_to_many(
            RelationDescription::one_to_many(
                RelationEnd::new("Author", "Author"),
                RelationEnd::new("NMBookAuthor", "NMBookAuthor").unbounded(),
                "id",
                "fk_author_id",
            ),
            RelationDescription::many_to_one(
                RelationEnd::new("NMBookAuthor", "NMBookAuthor").unbounded(),
                RelationEnd::new("Book", "Book"),
                "id",
                "fk_book_id",
            ),
        ));

    let link = PersistentType::new("app.NMBookAuthor")
        .table("nm_book_author")
        .attribute(AttributeDescription::primary_key("id"))
        .attribute(AttributeDescription::new("fk_book_id", SqlType::BigInt))
        .attribute(AttributeDescription::new("fk_author_id", SqlType::BigInt))
        .relation(RelationDescription::many_to_one(
            RelationEnd::new("NMBookAuthor", "NMBookAuthor").unbounded(),
            RelationEnd::new("Book", "Book"),
            "id",
            "fk_book_id",
        ))
        .relation(RelationDescription::many_to_one(
            RelationEnd::new("NMBookAuthor", "NMBookAuthor").unbounded(),
            RelationEnd::new("Author", "Author"),
            "id",
            "fk_author_id",
        ))
        .link_type();

    let sequence = PersistentType::new("Adodbseq").attribute(AttributeDescription::primary_key("id"));

    Schema::new(vec![publisher, book, chapter, cover, author, link, sequence]).unwrap()
}

/// A facade on a fresh in-memory database with every table created.
pub fn facade() -> PersistenceFacade {
    facade_with(MapperConfig::new(ConnectionParams::sqlite_memory()))
}

pub fn facade_with(config: MapperConfig) -> PersistenceFacade {
    let ctx = wcmf::sqlite_facade_with(schema(), config).unwrap();
    wcmf::create_tables(&ctx).unwrap();
    ctx
}

/// [`facade`] with the library rows:
/// - publisher 1 with books 1 ("Hamlet") and 2 ("Macbeth")
/// - chapters 1 and 2 of book 1
/// - author 1 linked to both books (links 1 and 2)
///
/// The sequence starts at 100 so that new objects never clash with them.
pub fn seeded_facade() -> PersistenceFacade {
    let ctx = facade();
    let publisher = table(&ctx, "Publisher");
    let book = table(&ctx, "Book");
    let chapter = table(&ctx, "Chapter");
    let author = table(&ctx, "Author");
    let link = table(&ctx, "NMBookAuthor");
    let sequence = table(&ctx, "Adodbseq");
    for sql in [
        format!("INSERT INTO {publisher} (id, name) VALUES (1, 'Globe')"),
        format!("INSERT INTO {book} (id, title, fk_publisher_id) VALUES (1, 'Hamlet', 1)"),
        format!("INSERT INTO {book} (id, title, fk_publisher_id) VALUES (2, 'Macbeth', 1)"),
        format!("INSERT INTO {chapter} (id, name, fk_book_id) VALUES (1, 'Act I', 1)"),
        format!("INSERT INTO {chapter} (id, name, fk_book_id) VALUES (2, 'Act II', 1)"),
        format!("INSERT INTO {author} (id, name) VALUES (1, 'Shakespeare')"),
        format!("INSERT INTO {link} (id, fk_book_id, fk_author_id) VALUES (1, 1, 1)"),
        format!("INSERT INTO {link} (id, fk_book_id, fk_author_id) VALUES (2, 2, 1)"),
        format!("INSERT INTO {sequence} (id) VALUES (100)"),
    ] {
        exec(&ctx, &sql);
    }
    ctx
}

/// Quoted table name of `type_name`.
pub fn table(ctx: &PersistenceFacade, type_name: &str) -> String {
    let mapper = ctx.mapper(type_name).unwrap();
    mapper.dialect().quote_identifier(mapper.table_name())
}

pub fn exec(ctx: &PersistenceFacade, sql: &str) {
    let shared = ctx.registry().connect(&ctx.config().connection).unwrap();
    shared.connection().execute(sql, &[]).unwrap();
}

pub fn query(ctx: &PersistenceFacade, sql: &str) -> Vec<Row> {
    let shared = ctx.registry().connect(&ctx.config().connection).unwrap();
    shared.connection().query(sql, &[]).unwrap()
}

/// Number of stored rows of `type_name`.
pub fn count(ctx: &PersistenceFacade, type_name: &str) -> i64 {
    let sql = format!("SELECT COUNT(*) AS n FROM {}", table(ctx, type_name));
    query(ctx, &sql)[0].get_named::<i64>("n").unwrap()
}

/// Id of the object `id` of the simple type `type_name`.
pub fn oid(type_name: &str, id: i64) -> ObjectId {
    ObjectId::new(format!("app.{type_name}"), vec![Value::BigInt(id)])
}

