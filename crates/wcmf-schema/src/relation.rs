//! Relation metadata.
//!
//! A [`RelationDescription`] is one labeled edge seen from one of its types
//! ("this" end) towards the other. The same physical foreign key therefore
//! appears twice in a schema: as [`RelationKind::ManyToOne`] on the type
//! holding the foreign key column and as [`RelationKind::OneToMany`] on the
//! referenced type.
//!
//! Many-to-many relations go through a link type and store both halves
//! explicitly: a one-to-many from this type to the link type and a
//! many-to-one from the link type to the other type.

use serde::{Deserialize, Serialize};

/// UML aggregation kind of a relation end.
///
/// The kind is attached to the end playing the whole: for a book that
/// composes its chapters, the book end is `Composite`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    #[default]
    None,
    Shared,
    Composite,
}

/// Position of the other end in the object hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyType {
    /// The other end is a parent of this end
    Parent,
    /// The other end is a child of this end
    Child,
    #[default]
    Undefined,
}

/// One end of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEnd {
    /// Type at this end
    pub type_name: String,
    /// Role name of this end, as seen from the opposite end
    pub role: String,
    #[serde(default)]
    pub min: u32,
    /// Upper bound; `None` is unbounded
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub aggregation: AggregationKind,
    /// Whether the opposite end can navigate to this end
    #[serde(default = "navigable_default")]
    pub navigable: bool,
}

fn navigable_default() -> bool {
    true
}

impl RelationEnd {
    /// An end with multiplicity `0..1`, no aggregation, navigable.
    pub fn new(type_name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            role: role.into(),
            min: 0,
            max: Some(1),
            aggregation: AggregationKind::None,
            navigable: true,
        }
    }

    pub fn min(mut self, min: u32) -> Self {
        self.min = min;
        self
    }

    pub fn max(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.max = None;
        self
    }

    pub fn aggregation(mut self, kind: AggregationKind) -> Self {
        self.aggregation = kind;
        self
    }

    pub fn not_navigable(mut self) -> Self {
        self.navigable = false;
        self
    }

    /// Whether this end can hold more than one object.
    pub fn is_multi_valued(&self) -> bool {
        self.max.is_none_or(|max| max > 1)
    }
}

/// How the relation is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// This type's `fk_name` column references the other type's `id_name`
    ManyToOne { id_name: String, fk_name: String },
    /// The other type's `fk_name` column references this type's `id_name`
    OneToMany { id_name: String, fk_name: String },
    /// Stored in rows of `link_type`
    ManyToMany {
        link_type: String,
        /// One-to-many from this type to the link type
        this_half: Box<RelationDescription>,
        /// Many-to-one from the link type to the other type
        other_half: Box<RelationDescription>,
    },
}

/// A labeled edge from this type to another type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescription {
    pub this_end: RelationEnd,
    pub other_end: RelationEnd,
    #[serde(default)]
    pub hierarchy: HierarchyType,
    pub kind: RelationKind,
}

impl RelationDescription {
    /// This type holds the foreign key `fk_name` referencing `id_name` of the
    /// other type.
    pub fn many_to_one(
        this_end: RelationEnd,
        other_end: RelationEnd,
        id_name: impl Into<String>,
        fk_name: impl Into<String>,
    ) -> Self {
        Self {
            this_end,
            other_end,
            hierarchy: HierarchyType::Parent,
            kind: RelationKind::ManyToOne {
                id_name: id_name.into(),
                fk_name: fk_name.into(),
            },
        }
    }

    /// The other type holds the foreign key `fk_name` referencing `id_name`
    /// of this type.
    pub fn one_to_many(
        this_end: RelationEnd,
        other_end: RelationEnd,
        id_name: impl Into<String>,
        fk_name: impl Into<String>,
    ) -> Self {
        Self {
            this_end,
            other_end,
            hierarchy: HierarchyType::Child,
            kind: RelationKind::OneToMany {
                id_name: id_name.into(),
                fk_name: fk_name.into(),
            },
        }
    }

    /// Compose a many-to-many relation from its two halves.
    ///
    /// `this_half` must lead from this type to the link type and
    /// `other_half` from the link type to the other type. The outer ends are
    /// taken from the halves; the link end multiplicities become unbounded.
    pub fn many_to_many(this_half: RelationDescription, other_half: RelationDescription) -> Self {
        let link_type = this_half.other_end.type_name.clone();
        let this_end = this_half.this_end.clone().unbounded();
        let other_end = other_half.other_end.clone().unbounded();
        Self {
            this_end,
            other_end,
            hierarchy: HierarchyType::Child,
            kind: RelationKind::ManyToMany {
                link_type,
                this_half: Box::new(this_half),
                other_half: Box::new(other_half),
            },
        }
    }

    /// Set the hierarchy type.
    pub fn hierarchy(mut self, hierarchy: HierarchyType) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn this_type(&self) -> &str {
        &self.this_end.type_name
    }

    /// How the other type refers to this type.
    pub fn this_role(&self) -> &str {
        &self.this_end.role
    }

    pub fn other_type(&self) -> &str {
        &self.other_end.type_name
    }

    /// How this type refers to the other type; the key of this relation.
    pub fn other_role(&self) -> &str {
        &self.other_end.role
    }

    /// Whether objects of this type can navigate to the other end.
    pub fn is_navigable(&self) -> bool {
        self.other_end.navigable
    }

    /// Whether the other end holds a list.
    pub fn is_multi_valued(&self) -> bool {
        self.other_end.is_multi_valued()
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self.kind, RelationKind::ManyToMany { .. })
    }

    pub fn is_child(&self) -> bool {
        self.hierarchy == HierarchyType::Child
    }

    /// The relation to follow for link-row lifecycle.
    ///
    /// For a many-to-many relation this is the half pointing at the link
    /// type; every other relation returns itself.
    pub fn this_end_relation(&self) -> &RelationDescription {
        match &self.kind {
            RelationKind::ManyToMany { this_half, .. } => this_half,
            _ => self,
        }
    }

    /// The link type of a many-to-many relation.
    pub fn link_type(&self) -> Option<&str> {
        match &self.kind {
            RelationKind::ManyToMany { link_type, .. } => Some(link_type),
            _ => None,
        }
    }

    /// Foreign key column held by this type (many-to-one only).
    pub fn own_foreign_key(&self) -> Option<(&str, &str)> {
        match &self.kind {
            RelationKind::ManyToOne { id_name, fk_name } => Some((fk_name, id_name)),
            _ => None,
        }
    }
}
