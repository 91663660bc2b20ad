//! Turning rows into objects and giving new objects their defaults.

use super::{RdbMapper, is_requested};
use crate::object::PersistentObject;
use crate::object_id::ObjectId;
use wcmf_core::{Error, Result, Row, Value};

impl RdbMapper {
    /// Build an object from a row, or a NEW object with default values when
    /// `data` is absent or empty.
    pub fn create_object_from_data(
        &self,
        data: Option<&Row>,
        attribs: Option<&[String]>,
    ) -> Result<PersistentObject> {
        match data {
            Some(row) if !row.is_empty() => {
                let mut object = PersistentObject::new(self.construct_oid(row)?);
                self.apply_data_on_load(&mut object, row, attribs)?;
                Ok(object)
            }
            _ => {
                let oid = ObjectId::dummy(&self.ty.name, self.pk_attributes().len());
                let mut object = PersistentObject::new(oid);
                self.apply_data_on_create(&mut object, attribs)?;
                Ok(object)
            }
        }
    }

    /// Object id from the primary key columns of `row`.
    pub fn construct_oid(&self, row: &Row) -> Result<ObjectId> {
        let ids = self
            .pk_attributes()
            .into_iter()
            .map(|attr| {
                let value = row.get_by_name(&attr.name).ok_or_else(|| {
                    Error::illegal_argument(format!(
                        "row of '{}' lacks primary key '{}'",
                        self.ty.name, attr.name
                    ))
                })?;
                attr.convert(value.clone())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ObjectId::new(&self.ty.name, ids))
    }

    /// Copy the known, requested attributes of `row` into `object`.
    pub(crate) fn apply_data_on_load(
        &self,
        object: &mut PersistentObject,
        row: &Row,
        attribs: Option<&[String]>,
    ) -> Result<()> {
        for (name, value) in row.iter() {
            let Some(attr) = self.ty.get_attribute(name).filter(|a| !a.is_derived) else {
                tracing::warn!(type_name = %self.ty.name, column = name, "skipping unknown column");
                continue;
            };
            if !is_requested(attr, attribs) {
                continue;
            }
            let mut value = attr.convert(value.clone())?;
            if let Some(converter) = &self.converter {
                if !attr.is_primary_key {
                    value = converter.from_storage(value, attr)?;
                }
            }
            object.set_value_silent(attr.name.as_str(), value);
        }
        Ok(())
    }

    /// Give a NEW object its id values and the declared defaults.
    pub(crate) fn apply_data_on_create(
        &self,
        object: &mut PersistentObject,
        attribs: Option<&[String]>,
    ) -> Result<()> {
        let ids: Vec<Value> = object.oid().ids().to_vec();
        for (attr, id) in self.pk_attributes().into_iter().zip(ids) {
            object.set_value_silent(attr.name.as_str(), id);
        }
        for attr in self.ty.stored_attributes() {
            if attr.is_primary_key || !is_requested(attr, attribs) {
                continue;
            }
            let value = match &attr.default_value {
                Some(default) => attr.convert(default.clone())?,
                None => Value::Null,
            };
            object.set_value_silent(attr.name.as_str(), value);
        }
        Ok(())
    }
}
