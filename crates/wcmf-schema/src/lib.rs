//! Declarative mapping descriptors for wCMF persistent types.
//!
//! This crate provides:
//! - [`AttributeDescription`]: attribute name, column, type, default and tags
//! - [`RelationDescription`]: many-to-one, one-to-many and many-to-many edges
//!   with multiplicity, aggregation, navigability and hierarchy
//! - [`PersistentType`]: the per-type descriptor the generic mapper reads
//! - [`Schema`]: a validated type registry, loadable from JSON
//! - [`CreateTable`]: CREATE TABLE generation for bootstrapping storage

pub mod attribute;
pub mod create;
pub mod persistent_type;
pub mod relation;
pub mod schema;

pub use attribute::AttributeDescription;
pub use create::{CreateTable, column_type, create_sequence_table};
pub use persistent_type::PersistentType;
pub use relation::{
    AggregationKind, HierarchyType, RelationDescription, RelationEnd, RelationKind,
};
pub use schema::{Schema, SchemaConfig};
