//! Statement builders of the mapper.

use super::{RdbMapper, is_requested};
use crate::facade::PersistenceFacade;
use crate::object::PersistentObjectProxy;
use crate::object_id::ObjectId;
use std::collections::BTreeMap;
use wcmf_core::{Error, Result, Value};
use wcmf_query::{
    CombineOperator, Criteria, DeleteStatement, InsertStatement, Join, OrderBy, SelectStatement,
    UpdateStatement, combine_conditions,
};
use wcmf_schema::{RelationDescription, RelationKind};

/// Alias of the joined type in a one-to-many relation select.
const RELATED_ALIAS: &str = "related";
/// Alias of the link table in a many-to-many relation select.
const LINK_ALIAS: &str = "link";
/// Alias of a referenced type joined to match a non-key column.
const REFERENCED_ALIAS: &str = "referenced";

/// A statement and its parameters.
pub(crate) type Statement = (String, Vec<Value>);

impl RdbMapper {
    /// SELECT of the stored attributes, narrowed to `attribs`.
    pub(crate) fn base_select(&self, attribs: Option<&[String]>) -> SelectStatement {
        self.ty
            .stored_attributes()
            .filter(|attr| is_requested(attr, attribs))
            .fold(SelectStatement::new(self.dialect, &self.table), |select, attr| {
                select.column(&self.table, attr.column_name(), &attr.name)
            })
    }

    /// SELECT of the objects matching `criteria`.
    pub(crate) fn select_sql(
        &self,
        ctx: &PersistenceFacade,
        criteria: &[Criteria],
        order: &[OrderBy],
        attribs: Option<&[String]>,
    ) -> Result<SelectStatement> {
        let mut select = self.base_select(attribs);
        self.add_criteria(ctx, &mut select, criteria)?;
        self.add_order(&mut select, order)?;
        Ok(select)
    }

    /// SELECT of the objects related to `proxy`, where `inverse` is this
    /// type's relation pointing back at the proxy's type.
    pub(crate) fn relation_select_sql(
        &self,
        ctx: &PersistenceFacade,
        proxy: &PersistentObjectProxy,
        inverse: &RelationDescription,
        criteria: &[Criteria],
        order: &[OrderBy],
        attribs: Option<&[String]>,
    ) -> Result<SelectStatement> {
        let mut select = self.base_select(attribs);
        let other = ctx.mapper(inverse.other_type())?;
        match &inverse.kind {
            RelationKind::ManyToOne { id_name, fk_name } => {
                select = other.match_reference(select, &self.table, fk_name, id_name, proxy.oid())?;
            }
            RelationKind::OneToMany { id_name, fk_name } => {
                select = select.join(
                    Join::inner(
                        other.table_name(),
                        (RELATED_ALIAS, fk_name.as_str()),
                        (self.table.as_str(), id_name.as_str()),
                    )
                    .alias(RELATED_ALIAS),
                );
                other.pk_condition(&mut select, RELATED_ALIAS, proxy.oid())?;
            }
            RelationKind::ManyToMany {
                link_type,
                this_half,
                other_half,
            } => {
                let (RelationKind::OneToMany { id_name: this_id, fk_name: this_fk },
                    RelationKind::ManyToOne { id_name: other_id, fk_name: other_fk }) =
                    (&this_half.kind, &other_half.kind)
                else {
                    return Err(Error::config(format!(
                        "relation '{}' of '{}' has malformed halves",
                        inverse.other_role(),
                        self.ty.name
                    )));
                };
                let link = ctx.mapper(link_type)?;
                select = select
                    .join(
                        Join::inner(
                            link.table_name(),
                            (LINK_ALIAS, this_fk.as_str()),
                            (self.table.as_str(), this_id.as_str()),
                        )
                        .alias(LINK_ALIAS),
                    )
                    .distinct();
                select = other.match_reference(select, LINK_ALIAS, other_fk, other_id, proxy.oid())?;
            }
        }
        self.add_criteria(ctx, &mut select, criteria)?;
        self.add_order(&mut select, order)?;
        Ok(select)
    }

    /// Restrict `select` to rows whose `table.fk_column` references the
    /// object `oid` of this type through `id_column`.
    fn match_reference(
        &self,
        mut select: SelectStatement,
        table: &str,
        fk_column: &str,
        id_column: &str,
        oid: &ObjectId,
    ) -> Result<SelectStatement> {
        if self.is_sole_pk_column(id_column) {
            let value = oid.first_id().clone();
            let dialect = self.dialect;
            select.params_mut().push(value);
            let placeholder = dialect.placeholder(select.params().len());
            select.condition(
                CombineOperator::And,
                format!("{} = {}", dialect.qualified(table, fk_column), placeholder),
            );
            return Ok(select);
        }
        select = select.join(
            Join::inner(&self.table, (REFERENCED_ALIAS, id_column), (table, fk_column))
                .alias(REFERENCED_ALIAS),
        );
        self.pk_condition(&mut select, REFERENCED_ALIAS, oid)?;
        Ok(select)
    }

    /// Add `alias.pk = ?` for every primary key column of this type.
    pub(crate) fn pk_condition(
        &self,
        select: &mut SelectStatement,
        alias: &str,
        oid: &ObjectId,
    ) -> Result<()> {
        let pks = self.pk_attributes();
        if pks.len() != oid.ids().len() {
            return Err(Error::illegal_argument(format!(
                "object id '{}' does not match the primary key of '{}'",
                oid, self.ty.name
            )));
        }
        let dialect = self.dialect;
        let mut parts = Vec::with_capacity(pks.len());
        for (attr, id) in pks.iter().zip(oid.ids()) {
            select.params_mut().push(id.clone());
            parts.push(format!(
                "{} = {}",
                dialect.qualified(alias, attr.column_name()),
                dialect.placeholder(select.params().len())
            ));
        }
        select.condition(CombineOperator::And, parts.join(" AND "));
        Ok(())
    }

    /// Criteria selecting the object `oid`.
    pub(crate) fn pk_criteria(&self, oid: &ObjectId) -> Result<Vec<Criteria>> {
        let pks = self.pk_attributes();
        if pks.len() != oid.ids().len() {
            return Err(Error::illegal_argument(format!(
                "object id '{}' does not match the primary key of '{}'",
                oid, self.ty.name
            )));
        }
        Ok(pks
            .iter()
            .zip(oid.ids())
            .map(|(attr, id)| Criteria::eq(self.ty.name.as_str(), attr.name.as_str(), id.clone()))
            .collect())
    }

    /// Add `criteria` as one condition group.
    fn add_criteria(
        &self,
        ctx: &PersistenceFacade,
        select: &mut SelectStatement,
        criteria: &[Criteria],
    ) -> Result<()> {
        let mut conditions = Vec::with_capacity(criteria.len());
        for c in criteria {
            self.check_criteria(ctx, c)?;
            let sql = self.render_criteria(c, true, None, None, select.params_mut())?;
            conditions.push((c.combine, sql));
        }
        if !conditions.is_empty() {
            select.condition(CombineOperator::And, combine_conditions(&conditions));
        }
        Ok(())
    }

    /// Add `order`, or the type's default order if `order` is empty.
    fn add_order(&self, select: &mut SelectStatement, order: &[OrderBy]) -> Result<()> {
        let default_order;
        let order = if order.is_empty() {
            default_order = self.ty.default_order_by()?;
            default_order.as_slice()
        } else {
            order
        };
        for key in order {
            let attr = self
                .ty
                .get_attribute(&key.attribute)
                .filter(|a| !a.is_derived)
                .ok_or_else(|| {
                    Error::illegal_argument(format!(
                        "cannot order '{}' by '{}'",
                        self.ty.name, key.attribute
                    ))
                })?;
            select.order_by(key.to_sql(self.dialect, &self.table, attr.column_name()));
        }
        Ok(())
    }

    /// INSERT of the stored attributes present in `values`.
    pub(crate) fn insert_sql(&self, values: &BTreeMap<String, Value>) -> Vec<Statement> {
        let insert = self
            .ty
            .stored_attributes()
            .filter_map(|attr| values.get(&attr.name).map(|v| (attr, v)))
            .fold(InsertStatement::new(&self.table), |insert, (attr, value)| {
                insert.value(attr.column_name(), value.clone())
            });
        vec![insert.build(self.dialect)]
    }

    /// UPDATE of the non-key attributes present in `values`.
    pub(crate) fn update_sql(
        &self,
        values: &BTreeMap<String, Value>,
        oid: &ObjectId,
    ) -> Result<Vec<Statement>> {
        let update = self
            .ty
            .stored_attributes()
            .filter(|attr| !attr.is_primary_key)
            .filter_map(|attr| values.get(&attr.name).map(|v| (attr, v)))
            .fold(UpdateStatement::new(&self.table), |update, (attr, value)| {
                update.set(attr.column_name(), value.clone())
            });
        if update.is_empty() {
            return Ok(Vec::new());
        }
        let update = self
            .key_columns(oid)?
            .into_iter()
            .fold(update, |update, (column, id)| update.filter_eq(column, id));
        Ok(vec![update.build(self.dialect)])
    }

    /// DELETE of the row of `oid`.
    pub(crate) fn delete_sql(&self, oid: &ObjectId) -> Result<Vec<Statement>> {
        let delete = self
            .key_columns(oid)?
            .into_iter()
            .fold(DeleteStatement::new(&self.table), |delete, (column, id)| {
                delete.filter_eq(column, id)
            });
        Ok(vec![delete.build(self.dialect)])
    }

    /// UPDATE clearing `fk_column` of the row of `oid`.
    pub(crate) fn unlink_sql(&self, oid: &ObjectId, fk_column: &str) -> Result<Statement> {
        let update = self
            .key_columns(oid)?
            .into_iter()
            .fold(
                UpdateStatement::new(&self.table).set(fk_column, Value::Null),
                |update, (column, id)| update.filter_eq(column, id),
            );
        Ok(update.build(self.dialect))
    }

    /// COUNT of the rows with `column = value` for every pair.
    pub(crate) fn count_sql(&self, filters: &[(&str, &Value)]) -> Statement {
        let mut select = SelectStatement::new(self.dialect, &self.table);
        for (column, value) in filters {
            select.params_mut().push((*value).clone());
            let condition = format!(
                "{} = {}",
                self.dialect.qualified(&self.table, column),
                self.dialect.placeholder(select.params().len())
            );
            select.condition(CombineOperator::And, condition);
        }
        select.build_count()
    }

    fn key_columns(&self, oid: &ObjectId) -> Result<Vec<(String, Value)>> {
        let pks = self.pk_attributes();
        if pks.len() != oid.ids().len() || oid.is_dummy() {
            return Err(Error::illegal_argument(format!(
                "object id '{}' does not identify a stored '{}'",
                oid, self.ty.name
            )));
        }
        Ok(pks
            .iter()
            .zip(oid.ids())
            .map(|(attr, id)| (attr.column_name().to_string(), id.clone()))
            .collect())
    }
}
