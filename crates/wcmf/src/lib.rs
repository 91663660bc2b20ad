//! wCMF persistence core.
//!
//! Maps persistent types described by a declarative schema onto relational
//! tables and keeps the loaded object graph consistent:
//!
//! - Declarative schema: attributes, relations (many-to-one, one-to-many,
//!   many-to-many through a link type) and table bindings per type
//! - Generic mapper that loads, creates, saves and deletes objects,
//!   following child relations to a requested [`BuildDepth`]
//! - Identity map and unit of work committed in one database transaction
//! - Criteria rendered for SQLite, MySQL and PostgreSQL
//! - Bundled SQLite driver
//!
//! # Quick Start
//!
//! ```ignore
//! use wcmf::prelude::*;
//!
//! let schema = Schema::new(vec![
//!     PersistentType::new("Book")
//!         .attribute(AttributeDescription::primary_key("id"))
//!         .attribute(AttributeDescription::new("title", SqlType::Text)),
//!     PersistentType::new("Adodbseq").attribute(AttributeDescription::primary_key("id")),
//! ])?;
//! let ctx = wcmf::sqlite_facade(schema, ConnectionParams::sqlite_memory())?;
//! wcmf::create_tables(&ctx)?;
//!
//! let book = ctx.create("Book", BuildDepth::Single)?;
//! write_object(&book).set_value("title", "Hamlet");
//! ctx.commit()?;
//!
//! let books = ctx.load_objects(
//!     "Book",
//!     BuildDepth::Single,
//!     &[Criteria::eq("Book", "title", "Hamlet")],
//!     &[],
//!     None,
//! )?;
//! ```

use std::sync::Arc;

pub use wcmf_core::{
    ColumnInfo, Connection, ConnectionParams, DbType, Driver, Error, FromValue, Result, Row,
    SqlType, Value,
};
pub use wcmf_persistence::{
    BuildDepth, ConnectionRegistry, DataConverter, DefaultDataConverter, LoadOptions,
    MapperConfig, ObjectId, ObjectRef, ObjectState, PagingInfo, PersistenceFacade,
    PersistentObject, PersistentObjectProxy, RdbMapper, Related, RelationValue,
    SharedConnection, Transaction, read_object, write_object,
};
pub use wcmf_query::{CombineOperator, Criteria, CriteriaOperator, Dialect, OrderBy, OrderDirection};
pub use wcmf_schema::{
    AggregationKind, AttributeDescription, CreateTable, HierarchyType, PersistentType,
    RelationDescription, RelationEnd, RelationKind, Schema, SchemaConfig,
};
pub use wcmf_sqlite::{SqliteConnection, SqliteDriver};

/// A facade over `schema` whose registry opens connections with the
/// bundled SQLite driver.
pub fn sqlite_facade(schema: Schema, params: ConnectionParams) -> Result<PersistenceFacade> {
    sqlite_facade_with(schema, MapperConfig::new(params))
}

/// Like [`sqlite_facade`], with a complete mapper configuration.
pub fn sqlite_facade_with(schema: Schema, config: MapperConfig) -> Result<PersistenceFacade> {
    let registry = ConnectionRegistry::new().with_driver(Arc::new(SqliteDriver));
    PersistenceFacade::new(schema, config, Arc::new(registry))
}

/// Create the table of every type in the facade's schema if missing.
pub fn create_tables(ctx: &PersistenceFacade) -> Result<()> {
    let shared = ctx.registry().connect(&ctx.config().connection)?;
    let prefix = &ctx.config().connection.table_prefix;
    for ty in ctx.schema().types() {
        let dialect = ctx.mapper(&ty.name)?.dialect();
        let sql = CreateTable::new(ty)
            .prefix(prefix.clone())
            .if_not_exists()
            .build(dialect);
        shared.connection().execute(&sql, &[])?;
    }
    Ok(())
}

/// Common imports.
///
/// ```ignore
/// use wcmf::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        AggregationKind, AttributeDescription, BuildDepth, Connection, ConnectionParams,
        Criteria, CriteriaOperator, DbType, Error, MapperConfig, ObjectId, ObjectRef,
        ObjectState, OrderBy, PagingInfo, PersistenceFacade, PersistentType,
        RelationDescription, RelationEnd, RelationValue, Result, Schema, SqlType, Value,
        read_object, write_object,
    };
}
