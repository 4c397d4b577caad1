//! Entity definitions: the declarative input to registration.

use crate::field::FieldDef;
use crate::record::{standard_transform, TransformFn};
use crate::relationship::RelationshipDef;
use crate::table::TableArgs;

/// An externally supplied mapper property.
///
/// Properties ride alongside declared fields and take precedence over
/// declared relationships with the same name. A scalar field whose name a
/// property claims is satisfied by the property instead of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapperProperty {
    /// A relationship supplied directly as a property.
    Relation(RelationshipDef),
}

impl MapperProperty {
    fn name(&self) -> &str {
        match self {
            Self::Relation(declared) => &declared.name,
        }
    }
}

/// A declarative entity definition.
///
/// Definitions are built fluently and handed to
/// [`crate::Registry::register`]. Nothing is validated until registration;
/// a definition is plain data plus the transform strategy that will turn it
/// into a record shape.
#[derive(Debug, Clone)]
pub struct EntityDef {
    name: String,
    table_name: Option<String>,
    table_args: TableArgs,
    abstract_base: bool,
    fields: Vec<FieldDef>,
    relations: Vec<RelationshipDef>,
    properties: Vec<MapperProperty>,
    transform: TransformFn,
}

impl EntityDef {
    /// Starts a definition. The table name defaults to the lower-cased
    /// entity name and the transform to [`standard_transform`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: None,
            table_args: TableArgs::default(),
            abstract_base: false,
            fields: Vec::new(),
            relations: Vec::new(),
            properties: Vec::new(),
            transform: standard_transform,
        }
    }

    /// Overrides the derived table name.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Attaches table-level arguments, passed through to the table verbatim.
    pub fn table_args(mut self, args: TableArgs) -> Self {
        self.table_args = args;
        self
    }

    /// Marks the definition as an abstract base: it is transformed and can
    /// be inherited from, but maps no table.
    pub fn abstract_base(mut self) -> Self {
        self.abstract_base = true;
        self
    }

    /// Prepends another definition's fields, relationships, and properties.
    ///
    /// Redeclaring a name overrides the inherited item while keeping the
    /// base's position in the field order.
    pub fn inherit(mut self, base: &EntityDef) -> Self {
        self.fields = merge_by_name(base.fields.clone(), std::mem::take(&mut self.fields), |f| {
            f.name.clone()
        });
        self.relations = merge_by_name(
            base.relations.clone(),
            std::mem::take(&mut self.relations),
            |r| r.name.clone(),
        );
        self.properties = merge_by_name(
            base.properties.clone(),
            std::mem::take(&mut self.properties),
            |p| p.name().to_string(),
        );
        self
    }

    /// Appends a scalar field.
    pub fn field(mut self, descriptor: FieldDef) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Appends a relationship declaration.
    pub fn relation(mut self, declared: RelationshipDef) -> Self {
        self.relations.push(declared);
        self
    }

    /// Appends an externally supplied mapper property.
    pub fn property(mut self, property: MapperProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Replaces the transform strategy.
    pub fn transform_with(mut self, transform: TransformFn) -> Self {
        self.transform = transform;
        self
    }

    /// Returns the entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true when the definition maps no table.
    pub fn is_abstract(&self) -> bool {
        self.abstract_base
    }

    /// Returns the declared scalar fields.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Returns the declared relationships.
    pub fn relations(&self) -> &[RelationshipDef] {
        &self.relations
    }

    /// Returns the externally supplied properties.
    pub fn properties(&self) -> &[MapperProperty] {
        &self.properties
    }

    /// Returns the effective relationships: caller-supplied properties
    /// first, then declared relationships whose names they did not claim.
    pub fn merged_relations(&self) -> Vec<&RelationshipDef> {
        let mut merged: Vec<&RelationshipDef> = self
            .properties
            .iter()
            .map(|property| match property {
                MapperProperty::Relation(declared) => declared,
            })
            .collect();
        for declared in &self.relations {
            if !merged.iter().any(|existing| existing.name == declared.name) {
                merged.push(declared);
            }
        }
        merged
    }

    pub(crate) fn resolved_table_name(&self) -> String {
        self.table_name
            .clone()
            .unwrap_or_else(|| self.name.to_lowercase())
    }

    pub(crate) fn table_arguments(&self) -> &TableArgs {
        &self.table_args
    }

    pub(crate) fn transform(&self) -> TransformFn {
        self.transform
    }
}

fn merge_by_name<T>(base: Vec<T>, own: Vec<T>, name_of: impl Fn(&T) -> String) -> Vec<T> {
    let mut merged = base;
    for item in own {
        let name = name_of(&item);
        match merged.iter_mut().find(|existing| name_of(existing) == name) {
            Some(existing) => *existing = item,
            None => merged.push(item),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field;
    use crate::relationship::relation;
    use tabula_types::{int, primary_key, text};

    #[test]
    fn table_name_defaults_to_lowercased_entity_name() {
        assert_eq!(EntityDef::new("BookAuthor").resolved_table_name(), "bookauthor");
        assert_eq!(
            EntityDef::new("Model").table_name("models").resolved_table_name(),
            "models"
        );
    }

    #[test]
    fn inherit_keeps_base_order_and_overrides_in_place() {
        let base = EntityDef::new("Base")
            .field(field("id", primary_key(int())))
            .field(field("name", text()));
        let sub = EntityDef::new("Sub")
            .field(field("name", text()).repr(false))
            .field(field("extra", int()))
            .inherit(&base);

        let names: Vec<&str> = sub.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "extra"]);
        assert!(!sub.fields()[1].repr, "redeclared field replaces the base one");
    }

    #[test]
    fn properties_win_name_collisions_against_relations() {
        let definition = EntityDef::new("Author")
            .relation(relation("books", "Book").uselist(true))
            .property(MapperProperty::Relation(
                relation("books", "Book").uselist(true).back_populates("author"),
            ));

        let merged = definition.merged_relations();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].back_populates.as_deref(), Some("author"));
    }

    #[test]
    fn merged_relations_keeps_unclaimed_declarations() {
        let definition = EntityDef::new("Author")
            .relation(relation("publisher", "Publisher"))
            .property(MapperProperty::Relation(relation("books", "Book").uselist(true)));

        let names: Vec<&str> = definition
            .merged_relations()
            .iter()
            .map(|declared| declared.name.as_str())
            .collect();
        assert_eq!(names, vec!["books", "publisher"]);
    }
}
