//! The generic relational mapper.
//!
//! One [`RdbMapper`] exists per persistent type. It is driven entirely by
//! the type's [`PersistentType`] descriptor: table and column bindings,
//! primary key, default order and relations. Operations that cross types
//! (relation loading, cascades, fk propagation) go through the
//! [`PersistenceFacade`] passed in as context.

mod create;
mod delete;
mod load;
mod materialize;
mod save;
mod sql;

use crate::config::MapperConfig;
use crate::converter::DataConverter;
use crate::facade::PersistenceFacade;
use crate::registry::{ConnectionRegistry, SharedConnection, persistence_error};
use std::collections::HashMap;
use std::sync::Arc;
use wcmf_core::error::PersistenceError;
use wcmf_core::{ConnectionParams, Error, Result, Row, Value};
use wcmf_query::{Criteria, Dialect, SequenceAdvance};
use wcmf_schema::{AttributeDescription, PersistentType};

/// Narrows what a load materializes.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Attributes to load per type (full or simple name); primary keys are
    /// always loaded. Types without an entry load all attributes.
    pub build_attribs: Option<HashMap<String, Vec<String>>>,
    /// Types to load at all; objects of other types are skipped.
    pub build_types: Option<Vec<String>>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load only `attributes` of `type_name`.
    pub fn attributes<I, S>(mut self, type_name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_attribs
            .get_or_insert_with(HashMap::new)
            .insert(type_name.into(), attributes.into_iter().map(Into::into).collect());
        self
    }

    /// Load only objects of `types`.
    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub(crate) fn includes_type(&self, ty: &PersistentType) -> bool {
        self.build_types.as_ref().is_none_or(|types| {
            types
                .iter()
                .any(|t| *t == ty.name || t == ty.simple_name())
        })
    }

    pub(crate) fn attributes_for(&self, ty: &PersistentType) -> Option<&[String]> {
        let attribs = self.build_attribs.as_ref()?;
        attribs
            .get(&ty.name)
            .or_else(|| attribs.get(ty.simple_name()))
            .map(Vec::as_slice)
    }
}

/// Whether `attr` passes an optional attribute allow-list.
pub(crate) fn is_requested(attr: &AttributeDescription, attribs: Option<&[String]>) -> bool {
    attr.is_primary_key || attribs.is_none_or(|names| names.iter().any(|n| *n == attr.name))
}

/// Mapper for one persistent type.
#[derive(Debug)]
pub struct RdbMapper {
    ty: Arc<PersistentType>,
    table: String,
    dialect: Dialect,
    params: ConnectionParams,
    sequence: (String, String),
    converter: Option<Arc<dyn DataConverter>>,
    registry: Arc<ConnectionRegistry>,
}

impl RdbMapper {
    pub(crate) fn new(
        ty: Arc<PersistentType>,
        config: &MapperConfig,
        sequence: (String, String),
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        let table = ty.table_name(&config.connection.table_prefix);
        Self {
            ty,
            table,
            dialect: Dialect::from(config.connection.db_type),
            params: config.connection.clone(),
            sequence,
            converter: config.data_converter.clone(),
            registry,
        }
    }

    /// The mapped type.
    pub fn ptype(&self) -> &Arc<PersistentType> {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        &self.ty.name
    }

    /// Physical table name including the prefix.
    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub(crate) fn pk_attributes(&self) -> Vec<&AttributeDescription> {
        self.ty.pk_attributes().collect()
    }

    /// The attribute stored in `column`.
    pub(crate) fn attribute_for_column(&self, column: &str) -> Result<&AttributeDescription> {
        self.ty.attribute_by_column(column).ok_or_else(|| {
            Error::config(format!("type '{}' has no column '{}'", self.ty.name, column))
        })
    }

    /// Whether `column` is the single primary key column.
    pub(crate) fn is_sole_pk_column(&self, column: &str) -> bool {
        matches!(self.pk_attributes().as_slice(), [pk] if pk.column_name() == column)
    }

    /// The shared connection of this mapper.
    pub fn connection(&self) -> Result<Arc<SharedConnection>> {
        self.registry.connect(&self.params)
    }

    pub(crate) fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        tracing::debug!(sql = %sql, params = params.len(), "query");
        let shared = self.connection()?;
        shared
            .connection()
            .query(sql, params)
            .map_err(|e| persistence_error(Some(sql), e))
    }

    pub(crate) fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        tracing::debug!(sql = %sql, params = params.len(), "execute");
        let shared = self.connection()?;
        shared
            .connection()
            .execute(sql, params)
            .map_err(|e| persistence_error(Some(sql), e))
    }

    /// Begin a transaction on the shared connection (idempotent).
    pub fn begin_transaction(&self) -> Result<()> {
        self.registry.begin_transaction(&self.params)
    }

    /// Commit the shared connection's transaction (idempotent).
    pub fn commit_transaction(&self) -> Result<()> {
        self.registry.commit_transaction(&self.params)
    }

    /// Roll back the shared connection's transaction (idempotent).
    pub fn rollback_transaction(&self) -> Result<()> {
        self.registry.rollback_transaction(&self.params)
    }

    /// Draw the next id from the sequence table.
    ///
    /// Seeds the table with `0` when it has no row and returns the value
    /// stored before the atomic advance.
    pub fn get_next_id(&self) -> Result<i64> {
        let (table, column) = &self.sequence;
        let current = self.dialect.sequence_select(table, column);
        if self.query(&current, &[])?.is_empty() {
            self.execute(&self.dialect.sequence_seed(table, column, 0), &[])?;
        }
        let rows = match self.dialect.sequence_advance(table, column) {
            SequenceAdvance::Returning(sql) => self.query(&sql, &[])?,
            SequenceAdvance::LastInsertId { update, select } => {
                self.execute(&update, &[])?;
                self.query(&select, &[])?
            }
        };
        let id = rows
            .first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                tracing::error!(table = %table, "sequence returned no id");
                Error::Persistence(PersistenceError::new("sequence returned no id"))
            })?;
        tracing::debug!(table = %table, id, "next id");
        Ok(id)
    }

    /// Render `criteria` as a condition on this type's table.
    ///
    /// `table` and `column` override the table name and the column the
    /// criteria's attribute maps to.
    pub fn render_criteria(
        &self,
        criteria: &Criteria,
        use_placeholder: bool,
        table: Option<&str>,
        column: Option<&str>,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let column = match column {
            Some(column) => column,
            None => self
                .ty
                .get_attribute(&criteria.attribute)
                .filter(|a| !a.is_derived)
                .map(AttributeDescription::column_name)
                .ok_or_else(|| {
                    Error::illegal_argument(format!(
                        "type '{}' has no stored attribute '{}'",
                        self.ty.name, criteria.attribute
                    ))
                })?,
        };
        Ok(criteria.render(
            self.dialect,
            table.unwrap_or(&self.table),
            column,
            use_placeholder,
            params,
        ))
    }

    /// Reject criteria on other types.
    pub(crate) fn check_criteria(&self, ctx: &PersistenceFacade, criteria: &Criteria) -> Result<()> {
        match ctx.schema().get(&criteria.type_name) {
            Some(ty) if ty.name == self.ty.name => Ok(()),
            Some(ty) => Err(Error::illegal_argument(format!(
                "criteria on '{}' cannot filter '{}'",
                ty.name, self.ty.name
            ))),
            None => Err(Error::illegal_argument(format!(
                "unknown type '{}'",
                criteria.type_name
            ))),
        }
    }
}
