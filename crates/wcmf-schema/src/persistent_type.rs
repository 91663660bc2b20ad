//! Per-type mapping descriptor.

use crate::attribute::AttributeDescription;
use crate::relation::{HierarchyType, RelationDescription};
use serde::{Deserialize, Serialize};
use wcmf_core::{Result, to_storage_name};
use wcmf_query::OrderBy;

/// Declarative description of one persistent type: its table, attributes
/// and relations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentType {
    /// Type name, optionally namespaced with dots (`app.model.Book`)
    pub name: String,
    /// Table name without prefix; defaults to the snake cased simple name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub attributes: Vec<AttributeDescription>,
    #[serde(default)]
    pub relations: Vec<RelationDescription>,
    /// Order applied when a load names none, e.g. `"sortkey DESC, title"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_order: Option<String>,
    /// Link types only exist to store many-to-many relations
    #[serde(default)]
    pub is_link_type: bool,
}

impl PersistentType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            attributes: Vec::new(),
            relations: Vec::new(),
            default_order: None,
            is_link_type: false,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn attribute(mut self, attribute: AttributeDescription) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn relation(mut self, relation: RelationDescription) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn default_order(mut self, order: impl Into<String>) -> Self {
        self.default_order = Some(order.into());
        self
    }

    pub fn link_type(mut self) -> Self {
        self.is_link_type = true;
        self
    }

    /// The name without namespace.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Physical table name including `prefix`.
    pub fn table_name(&self, prefix: &str) -> String {
        match &self.table {
            Some(table) => format!("{}{}", prefix, table),
            None => format!("{}{}", prefix, to_storage_name(self.simple_name())),
        }
    }

    /// Look up an attribute by name.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeDescription> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Look up an attribute by its storage column.
    pub fn attribute_by_column(&self, column: &str) -> Option<&AttributeDescription> {
        self.attributes
            .iter()
            .find(|a| !a.is_derived && a.column_name() == column)
    }

    /// Attributes backed by a column.
    pub fn stored_attributes(&self) -> impl Iterator<Item = &AttributeDescription> {
        self.attributes.iter().filter(|a| !a.is_derived)
    }

    pub fn pk_attributes(&self) -> impl Iterator<Item = &AttributeDescription> {
        self.attributes.iter().filter(|a| a.is_primary_key)
    }

    /// Primary key attribute names in declaration order.
    pub fn pk_names(&self) -> Vec<&str> {
        self.pk_attributes().map(|a| a.name.as_str()).collect()
    }

    /// Look up a relation by the role of the other end.
    pub fn get_relation(&self, role: &str) -> Option<&RelationDescription> {
        self.relations.iter().find(|r| r.other_role() == role)
    }

    /// Relations with the given hierarchy type.
    pub fn relations_by_hierarchy(
        &self,
        hierarchy: HierarchyType,
    ) -> impl Iterator<Item = &RelationDescription> {
        self.relations
            .iter()
            .filter(move |r| r.hierarchy == hierarchy)
    }

    /// Whether `column` is the foreign key column of a many-to-one relation.
    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.relations
            .iter()
            .filter_map(RelationDescription::own_foreign_key)
            .any(|(fk, _)| fk == column)
    }

    /// The parsed default order.
    pub fn default_order_by(&self) -> Result<Vec<OrderBy>> {
        match &self.default_order {
            Some(order) => OrderBy::parse_list(order),
            None => Ok(Vec::new()),
        }
    }
}
