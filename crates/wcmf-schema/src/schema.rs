//! The type registry.

use crate::persistent_type::PersistentType;
use crate::relation::RelationKind;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use wcmf_core::{Error, Result, is_simple_identifier};

/// Serialized form of a schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub types: Vec<PersistentType>,
}

/// A validated set of persistent types, addressable by full or simple name.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: Vec<Arc<PersistentType>>,
    by_name: HashMap<String, usize>,
    by_simple_name: HashMap<String, usize>,
}

impl Schema {
    /// Build and validate a schema.
    pub fn new(types: Vec<PersistentType>) -> Result<Self> {
        let mut schema = Self::default();
        for ty in types {
            let index = schema.types.len();
            if schema.by_name.insert(ty.name.clone(), index).is_some() {
                return Err(Error::config(format!("duplicate type '{}'", ty.name)));
            }
            let simple = ty.simple_name().to_string();
            if schema.by_simple_name.insert(simple.clone(), index).is_some() {
                return Err(Error::config(format!(
                    "ambiguous simple type name '{}'",
                    simple
                )));
            }
            schema.types.push(Arc::new(ty));
        }
        schema.validate()?;
        tracing::debug!(types = schema.types.len(), "schema loaded");
        Ok(schema)
    }

    /// Parse and validate a JSON schema (`{"types": [...]}`).
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SchemaConfig = serde_json::from_str(json)?;
        Self::new(config.types)
    }

    /// Resolve a type by full name, falling back to the simple name.
    pub fn get(&self, name: &str) -> Option<&Arc<PersistentType>> {
        self.by_name
            .get(name)
            .or_else(|| self.by_simple_name.get(name))
            .map(|&i| &self.types[i])
    }

    pub fn is_known_type(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn types(&self) -> impl Iterator<Item = &Arc<PersistentType>> {
        self.types.iter()
    }

    fn require(&self, name: &str, context: &str) -> Result<&Arc<PersistentType>> {
        self.get(name).ok_or_else(|| {
            Error::config(format!("{} references unknown type '{}'", context, name))
        })
    }

    fn validate(&self) -> Result<()> {
        for ty in &self.types {
            let context = format!("type '{}'", ty.name);
            let mut names = HashSet::new();
            let mut columns = HashSet::new();
            for attr in &ty.attributes {
                if !names.insert(attr.name.as_str()) {
                    return Err(Error::config(format!(
                        "{}: duplicate attribute '{}'",
                        context, attr.name
                    )));
                }
                if attr.is_derived {
                    continue;
                }
                if !is_simple_identifier(attr.column_name()) {
                    return Err(Error::config(format!(
                        "{}: invalid column name '{}'",
                        context,
                        attr.column_name()
                    )));
                }
                if !columns.insert(attr.column_name()) {
                    return Err(Error::config(format!(
                        "{}: column '{}' mapped twice",
                        context,
                        attr.column_name()
                    )));
                }
            }
            if ty.pk_attributes().next().is_none() {
                return Err(Error::config(format!("{} has no primary key", context)));
            }
            if let Some(table) = &ty.table {
                if !is_simple_identifier(table) {
                    return Err(Error::config(format!(
                        "{}: invalid table name '{}'",
                        context, table
                    )));
                }
            }
            for order in ty.default_order_by()? {
                if ty.get_attribute(&order.attribute).is_none() {
                    return Err(Error::config(format!(
                        "{}: default order names unknown attribute '{}'",
                        context, order.attribute
                    )));
                }
            }

            let mut roles = HashSet::new();
            for rel in &ty.relations {
                let rel_context = format!("{} relation '{}'", context, rel.other_role());
                if !roles.insert(rel.other_role()) {
                    return Err(Error::config(format!(
                        "{}: duplicate role",
                        rel_context
                    )));
                }
                let this = self.require(rel.this_type(), &rel_context)?;
                if this.name != ty.name {
                    return Err(Error::config(format!(
                        "{}: this end is '{}'",
                        rel_context,
                        rel.this_type()
                    )));
                }
                let other = self.require(rel.other_type(), &rel_context)?;
                match &rel.kind {
                    RelationKind::ManyToOne { id_name, fk_name } => {
                        require_column(ty, fk_name, &rel_context)?;
                        require_column(other, id_name, &rel_context)?;
                    }
                    RelationKind::OneToMany { id_name, fk_name } => {
                        require_column(ty, id_name, &rel_context)?;
                        require_column(other, fk_name, &rel_context)?;
                    }
                    RelationKind::ManyToMany {
                        link_type,
                        this_half,
                        other_half,
                    } => {
                        let link = self.require(link_type, &rel_context)?;
                        if !link.is_link_type {
                            return Err(Error::config(format!(
                                "{}: '{}' is not a link type",
                                rel_context, link_type
                            )));
                        }
                        let halves_match = matches!(this_half.kind, RelationKind::OneToMany { .. })
                            && matches!(other_half.kind, RelationKind::ManyToOne { .. })
                            && self.get(this_half.other_type()).map(|t| &t.name) == Some(&link.name)
                            && self.get(other_half.this_type()).map(|t| &t.name) == Some(&link.name)
                            && self.get(other_half.other_type()).map(|t| &t.name)
                                == Some(&other.name);
                        if !halves_match {
                            return Err(Error::config(format!(
                                "{}: halves must lead through link type '{}'",
                                rel_context, link_type
                            )));
                        }
                        // link type resolves both halves by role
                        for half_role in [this_half.this_role(), other_half.other_role()] {
                            if link.get_relation(half_role).is_none() {
                                return Err(Error::config(format!(
                                    "{}: link type '{}' has no relation '{}'",
                                    rel_context, link_type, half_role
                                )));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn require_column(ty: &PersistentType, column: &str, context: &str) -> Result<()> {
    if ty.attribute_by_column(column).is_some() {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{}: type '{}' has no column '{}'",
            context, ty.name, column
        )))
    }
}
