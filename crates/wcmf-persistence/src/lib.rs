//! Relational object mapper for wCMF.
//!
//! `wcmf-persistence` is the **mapping layer**. It turns rows into
//! [`PersistentObject`]s and back, driven by the descriptors of
//! `wcmf-schema`, and keeps the loaded object graph consistent.
//!
//! # Role In The Architecture
//!
//! - **Mapper**: one [`RdbMapper`] per persistent type loads, creates,
//!   saves and deletes objects, including relation traversal and cascades.
//! - **Facade**: [`PersistenceFacade`] resolves types to mappers and is the
//!   context every mapper call runs in.
//! - **Identity map**: [`Transaction`] keeps one instance per [`ObjectId`]
//!   and collects the work flushed on [`PersistenceFacade::commit`].
//! - **Connections**: [`ConnectionRegistry`] shares one connection and one
//!   transaction flag per connection signature.
//!
//! # Example
//!
//! ```ignore
//! let registry = ConnectionRegistry::new().with_driver(Arc::new(SqliteDriver));
//! let ctx = PersistenceFacade::new(schema, MapperConfig::new(params), Arc::new(registry))?;
//!
//! // Load a book with its chapters
//! let oid = ObjectId::parse("Book:1")?;
//! let book = ctx.load(&oid, BuildDepth::Depth(1))?;
//!
//! // Create and store a new chapter
//! let chapter = ctx.create("Chapter", BuildDepth::Single)?;
//! write_object(&chapter).set_value("name", "Epilogue");
//! ctx.commit()?;
//! ```

pub mod build_depth;
pub mod config;
pub mod converter;
pub mod facade;
pub mod flush;
pub mod mapper;
pub mod object;
pub mod object_id;
pub mod paging;
pub mod registry;
pub mod transaction;

#[cfg(test)]
mod testing;

pub use build_depth::BuildDepth;
pub use config::{MapperConfig, SEQUENCE_COLUMN};
pub use converter::{DataConverter, DefaultDataConverter};
pub use facade::PersistenceFacade;
pub use flush::order_inserts;
pub use mapper::{LoadOptions, RdbMapper};
pub use object::{
    ObjectReadGuard, ObjectRef, ObjectState, ObjectWriteGuard, PersistentObject,
    PersistentObjectProxy, Related, RelationValue, object_ref, read_object, write_object,
};
pub use object_id::ObjectId;
pub use paging::PagingInfo;
pub use registry::{ConnectionRegistry, SharedConnection};
pub use transaction::{PendingWork, Transaction};
