//! Inserting and updating objects.

use super::RdbMapper;
use crate::facade::PersistenceFacade;
use crate::object::{
    ObjectRef, ObjectState, Related, RelationValue, object_ref, read_object, write_object,
};
use crate::object_id::{ObjectId, is_dummy_value};
use std::collections::BTreeMap;
use wcmf_core::{Error, Result, Value};
use wcmf_schema::RelationKind;

impl RdbMapper {
    /// Insert a NEW object or update a DIRTY one.
    ///
    /// A NEW object gets its primary key from the sequence unless it was set
    /// explicitly, and is re-registered under its stored id. On success the
    /// object is CLEAN; on failure it is left as it was. Statements already
    /// executed when a later one fails are not undone here.
    pub fn save(&self, ctx: &PersistenceFacade, object: &ObjectRef) -> Result<()> {
        let (old_oid, state, mut values) = {
            let o = read_object(object);
            (o.oid().clone(), o.state(), o.values().clone())
        };
        match state {
            ObjectState::Clean => return Ok(()),
            ObjectState::Deleted => {
                return Err(Error::illegal_argument(format!(
                    "cannot save deleted object '{}'",
                    old_oid
                )));
            }
            ObjectState::New | ObjectState::Dirty => {}
        }

        self.prepare_for_storage(ctx, object, &mut values, state)?;
        let oid = if state == ObjectState::New {
            self.assign_primary_key(&mut values)?
        } else {
            old_oid.clone()
        };

        let storage = self.to_storage(&values)?;
        let statements = if state == ObjectState::New {
            tracing::debug!(oid = %oid, "insert");
            self.insert_sql(&storage)
        } else {
            tracing::debug!(oid = %oid, "update");
            self.update_sql(&storage, &oid)?
        };
        for (sql, params) in &statements {
            self.execute(sql, params)?;
        }

        {
            let mut o = write_object(object);
            for (name, value) in values {
                o.set_value_silent(name, value);
            }
            o.set_oid(oid);
            o.set_state(ObjectState::Clean);
        }
        ctx.rekey(&old_oid, object);

        self.propagate_to_children(ctx, object)?;
        self.save_links(ctx, object)
    }

    /// Take foreign keys from many-to-one relation values and, for a NEW
    /// object, fill in missing attributes.
    fn prepare_for_storage(
        &self,
        ctx: &PersistenceFacade,
        object: &ObjectRef,
        values: &mut BTreeMap<String, Value>,
        state: ObjectState,
    ) -> Result<()> {
        let relations = relation_values(object);
        for (role, value) in &relations {
            let Some(rel) = self.ty.get_relation(role) else {
                continue;
            };
            let Some((fk_column, id_column)) = rel.own_foreign_key() else {
                continue;
            };
            let fk = self.attribute_for_column(fk_column)?;
            let referenced = match value.iter().next() {
                None => Some(Value::Null),
                Some(related) => ctx
                    .mapper(rel.other_type())?
                    .referenced_value(related, id_column)?,
            };
            match referenced {
                Some(v) => {
                    values.insert(fk.name.clone(), v);
                }
                None => tracing::warn!(
                    type_name = %self.ty.name,
                    role = %role,
                    "referenced object is not stored yet, keeping foreign key"
                ),
            }
        }

        if state == ObjectState::New {
            for attr in self.ty.stored_attributes() {
                if values.contains_key(&attr.name) {
                    continue;
                }
                let value = match &attr.default_value {
                    Some(default) => attr.convert(default.clone())?,
                    None => Value::Null,
                };
                values.insert(attr.name.clone(), value);
            }
        }
        Ok(())
    }

    /// Value of `id_column` of the object `related` stands for, if it is
    /// known without storing that object first.
    fn referenced_value(&self, related: &Related, id_column: &str) -> Result<Option<Value>> {
        let oid = related.oid();
        if self.is_sole_pk_column(id_column) {
            return Ok((!oid.is_dummy()).then(|| oid.first_id().clone()));
        }
        let attr = self.attribute_for_column(id_column)?;
        Ok(related
            .as_object()
            .and_then(|object| read_object(object).get_value(&attr.name).cloned())
            .filter(|value| !is_dummy_value(value)))
    }

    /// Replace missing or placeholder key values by sequence ids and
    /// return the resulting object id.
    fn assign_primary_key(&self, values: &mut BTreeMap<String, Value>) -> Result<ObjectId> {
        let mut ids = Vec::new();
        for attr in self.pk_attributes() {
            let id = match values.get(&attr.name) {
                Some(value) if !value.is_null() && !is_dummy_value(value) => {
                    attr.convert(value.clone())?
                }
                _ => Value::BigInt(self.get_next_id()?),
            };
            values.insert(attr.name.clone(), id.clone());
            ids.push(id);
        }
        Ok(ObjectId::new(&self.ty.name, ids))
    }

    /// Storage representation of `values` through the data converter.
    fn to_storage(&self, values: &BTreeMap<String, Value>) -> Result<BTreeMap<String, Value>> {
        let Some(converter) = &self.converter else {
            return Ok(values.clone());
        };
        let mut storage = values.clone();
        for attr in self.ty.stored_attributes().filter(|a| !a.is_primary_key) {
            if let Some(value) = storage.remove(&attr.name) {
                storage.insert(attr.name.clone(), converter.to_storage(value, attr)?);
            }
        }
        Ok(storage)
    }

    /// Point the foreign keys of realized one-to-many children at the
    /// saved object. A CLEAN child becomes DIRTY.
    fn propagate_to_children(&self, ctx: &PersistenceFacade, object: &ObjectRef) -> Result<()> {
        let relations = relation_values(object);
        for (role, value) in &relations {
            let Some(rel) = self.ty.get_relation(role) else {
                continue;
            };
            let RelationKind::OneToMany { id_name, fk_name } = &rel.kind else {
                continue;
            };
            let Some(id) = self.own_value(object, id_name)? else {
                continue;
            };
            let child_mapper = ctx.mapper(rel.other_type())?;
            let fk = child_mapper.attribute_for_column(fk_name)?;
            for child_ref in value.objects() {
                let mut child = write_object(&child_ref);
                if child.state() != ObjectState::Deleted && child.get_value(&fk.name) != Some(&id) {
                    child.set_value(fk.name.clone(), id.clone());
                }
            }
        }
        Ok(())
    }

    /// Insert missing link rows for many-to-many relation values whose
    /// other end is stored.
    fn save_links(&self, ctx: &PersistenceFacade, object: &ObjectRef) -> Result<()> {
        let relations = relation_values(object);
        for (role, value) in &relations {
            let Some(rel) = self.ty.get_relation(role) else {
                continue;
            };
            let RelationKind::ManyToMany {
                link_type,
                this_half,
                other_half,
            } = &rel.kind
            else {
                continue;
            };
            let (
                RelationKind::OneToMany {
                    id_name: this_id,
                    fk_name: this_fk,
                },
                RelationKind::ManyToOne {
                    id_name: other_id,
                    fk_name: other_fk,
                },
            ) = (&this_half.kind, &other_half.kind)
            else {
                continue;
            };
            let Some(this_value) = self.own_value(object, this_id)? else {
                continue;
            };
            let link = ctx.mapper(link_type)?;
            let other = ctx.mapper(rel.other_type())?;
            for related in value.iter() {
                let Some(other_value) = other.referenced_value(related, other_id)? else {
                    continue;
                };
                let filters = [
                    (this_fk.as_str(), &this_value),
                    (other_fk.as_str(), &other_value),
                ];
                if link.link_exists(&filters)? {
                    continue;
                }
                let mut row = link.create_object_from_data(None, None)?;
                for (column, v) in filters {
                    let attr = link.attribute_for_column(column)?;
                    row.set_value_silent(attr.name.clone(), v.clone());
                }
                tracing::debug!(link_type = %link_type, role = %role, "insert link");
                link.save(ctx, &object_ref(row))?;
            }
        }
        Ok(())
    }

    fn link_exists(&self, filters: &[(&str, &Value)]) -> Result<bool> {
        let (sql, params) = self.count_sql(filters);
        let count = self
            .query(&sql, &params)?
            .first()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Ok(count > 0)
    }

    /// Stored value of this type's `column` for `object`.
    fn own_value(&self, object: &ObjectRef, column: &str) -> Result<Option<Value>> {
        let o = read_object(object);
        if self.is_sole_pk_column(column) {
            return Ok((!o.oid().is_dummy()).then(|| o.oid().first_id().clone()));
        }
        let attr = self.attribute_for_column(column)?;
        Ok(o.get_value(&attr.name).cloned())
    }
}

/// Relation values of `object`, copied out so that no guard is held while
/// related objects are visited.
fn relation_values(object: &ObjectRef) -> Vec<(String, RelationValue)> {
    read_object(object)
        .relations()
        .map(|(role, value)| (role.to_string(), value.clone()))
        .collect()
}
