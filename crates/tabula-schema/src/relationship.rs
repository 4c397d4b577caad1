//! Relationship declarations and their resolved form.
//!
//! A declaration names its target entity, which may not be registered yet;
//! forward references stay unresolved until the registry is configured.
//! Relationship slots never participate in record equality or hashing, are
//! hidden from debug rendering, and default to `None` or an empty list
//! depending on `uselist`.

use serde::{Deserialize, Serialize};

/// Something that can name the target entity of a relationship.
///
/// Implemented for strings, which allows forward references, and for entity
/// maps, which name targets that are already registered.
pub trait RelationTarget {
    /// Returns the target entity's name.
    fn entity_name(&self) -> String;
}

impl RelationTarget for &str {
    fn entity_name(&self) -> String {
        (*self).to_string()
    }
}

impl RelationTarget for String {
    fn entity_name(&self) -> String {
        self.clone()
    }
}

/// A declared link between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDef {
    /// Slot name on the declaring entity.
    pub name: String,
    /// Target entity name.
    pub target: String,
    /// Reciprocal relationship on the target entity, when the link is
    /// navigable from both sides.
    pub back_populates: Option<String>,
    /// True for the collection side of the link.
    pub uselist: bool,
}

/// Starts a relationship declaration pointing at `target`.
///
/// The scalar side is the default; call [`RelationshipDef::uselist`] for the
/// collection side.
pub fn relation(name: impl Into<String>, target: impl RelationTarget) -> RelationshipDef {
    RelationshipDef {
        name: name.into(),
        target: target.entity_name(),
        back_populates: None,
        uselist: false,
    }
}

impl RelationshipDef {
    /// Names the reciprocal relationship on the target entity.
    pub fn back_populates(mut self, name: impl Into<String>) -> Self {
        self.back_populates = Some(name.into());
        self
    }

    /// Sets whether this side holds a collection.
    pub fn uselist(mut self, uselist: bool) -> Self {
        self.uselist = uselist;
        self
    }
}

/// A relationship after target and join resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipMap {
    /// Slot name on the source entity.
    pub name: String,
    /// Source entity name.
    pub source: String,
    /// Target entity name.
    pub target: String,
    /// True for the collection side.
    pub many: bool,
    /// Reciprocal relationship on the target entity.
    pub back_populates: Option<String>,
    /// The foreign-key join connecting the two tables.
    pub join: Join,
}

/// A foreign-key join: `fk_table.fk_column` references
/// `ref_table.ref_column`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Table carrying the foreign key.
    pub fk_table: String,
    /// Foreign-key column.
    pub fk_column: String,
    /// Referenced table.
    pub ref_table: String,
    /// Referenced column.
    pub ref_column: String,
}
