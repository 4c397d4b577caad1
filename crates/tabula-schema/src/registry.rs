//! The class registrar: entity registration, shared metadata ownership, and
//! relationship resolution.
//!
//! A registry owns one metadata and one type map, so everything about the
//! mapping is explicit state. Registration is synchronous and atomic per
//! definition: a definition either maps fully or leaves the registry
//! unchanged. Relationship targets may be forward references and are only
//! resolved when the registry is configured, which happens before schema
//! creation or first session use.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tabula_types::{ScalarKind, Value};

use crate::column::{Column, ColumnRef};
use crate::entity::EntityDef;
use crate::error::SchemaError;
use crate::field::ForeignKey;
use crate::record::{Record, RecordBuilder, RecordShape};
use crate::relationship::{Join, RelationTarget, RelationshipDef, RelationshipMap};
use crate::table::{Metadata, Table};
use crate::typemap::{SqlType, TypeMap};

/// The runtime mapping for one registered entity: its table, its record
/// shape, and its declared relationships.
#[derive(Debug)]
pub struct EntityMap {
    name: String,
    table: Table,
    shape: Arc<RecordShape>,
    relations: Vec<RelationshipDef>,
}

impl EntityMap {
    /// Returns the entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the mapped table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Returns the mapped table's name.
    pub fn table_name(&self) -> &str {
        &self.table.name
    }

    /// Returns the shared record shape.
    pub fn shape(&self) -> &Arc<RecordShape> {
        &self.shape
    }

    /// Returns the effective relationship declarations.
    pub fn relations(&self) -> &[RelationshipDef] {
        &self.relations
    }

    /// Starts building a record of this entity.
    pub fn record(&self) -> RecordBuilder {
        RecordBuilder::new(Arc::clone(&self.shape))
    }

    /// Builds a record from loaded column values, bypassing construction
    /// rules. Used by the session when it materializes query rows.
    pub fn hydrate(&self, loaded: impl IntoIterator<Item = (String, Value)>) -> Record {
        Record::from_loaded(Arc::clone(&self.shape), loaded)
    }

    /// Returns a handle to a mapped column.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownField`] when no column has this name.
    pub fn col(&self, name: &str) -> Result<ColumnRef, SchemaError> {
        self.table
            .column(name)
            .map(|column| ColumnRef {
                table: self.table.name.clone(),
                column: column.name.clone(),
                sql_type: column.sql_type.clone(),
            })
            .ok_or_else(|| SchemaError::UnknownField {
                entity: self.name.clone(),
                field: name.to_string(),
            })
    }
}

impl RelationTarget for &EntityMap {
    fn entity_name(&self) -> String {
        self.name.clone()
    }
}

impl RelationTarget for &Arc<EntityMap> {
    fn entity_name(&self) -> String {
        self.name.clone()
    }
}

/// The registrar mapping entity definitions onto tables.
///
/// Holds the shared [`Metadata`], the extensible [`TypeMap`], and every
/// registered [`EntityMap`]. Two registries are fully independent; the same
/// entity and table names can exist in both.
#[derive(Debug, Default)]
pub struct Registry {
    metadata: Metadata,
    types: TypeMap,
    entities: BTreeMap<String, Arc<EntityMap>>,
    resolved: BTreeMap<String, Vec<RelationshipMap>>,
    configured: bool,
}

impl Registry {
    /// Creates a registry with empty metadata and the built-in type map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry around existing metadata.
    pub fn with_metadata(metadata: Metadata) -> Self {
        Self {
            metadata,
            ..Self::default()
        }
    }

    /// Adds or replaces the column type for a scalar kind.
    ///
    /// Affects entities registered after the call.
    pub fn register_type(&mut self, kind: ScalarKind, sql_type: SqlType) {
        tracing::debug!(kind = kind.name(), sql = sql_type.ddl(), "registered column type");
        self.types.register(kind, sql_type);
    }

    /// Returns the type map.
    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    /// Returns the shared metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Returns the mapping for a registered entity.
    pub fn entity(&self, name: &str) -> Option<&Arc<EntityMap>> {
        self.entities.get(name)
    }

    /// Iterates over registered entities in name order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityMap>> {
        self.entities.values()
    }

    /// Returns true when every relationship has been resolved since the
    /// last registration.
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Registers an entity definition.
    ///
    /// Runs the definition's transform, builds one column per scalar field
    /// not claimed by a relationship, and adds the table to the shared
    /// metadata. Abstract definitions are transformed for validation but map
    /// no table and return `None`.
    ///
    /// # Errors
    ///
    /// Returns the transform's or column builder's error unchanged, plus
    /// [`SchemaError::DuplicateEntity`] and [`SchemaError::DuplicateTable`]
    /// for name collisions. The registry is unchanged on error.
    pub fn register(&mut self, definition: EntityDef) -> Result<Option<Arc<EntityMap>>, SchemaError> {
        let shape = (definition.transform())(&definition)?;

        if definition.is_abstract() {
            tracing::debug!(entity = definition.name(), "registered abstract base");
            return Ok(None);
        }
        if self.entities.contains_key(definition.name()) {
            return Err(SchemaError::DuplicateEntity {
                entity: definition.name().to_string(),
            });
        }

        let relations: Vec<RelationshipDef> = definition
            .merged_relations()
            .into_iter()
            .cloned()
            .collect();
        let claimed: BTreeSet<&str> = relations
            .iter()
            .map(|declared| declared.name.as_str())
            .collect();

        let mut columns = Vec::new();
        for descriptor in definition.fields() {
            if claimed.contains(descriptor.name.as_str()) {
                continue;
            }
            columns.push(Column::from_field(descriptor, &self.types)?);
        }

        let table = Table {
            name: definition.resolved_table_name(),
            columns,
            args: definition.table_arguments().clone(),
        };
        self.metadata.add(table.clone())?;

        let map = Arc::new(EntityMap {
            name: definition.name().to_string(),
            table,
            shape: Arc::new(shape),
            relations,
        });
        self.entities
            .insert(definition.name().to_string(), Arc::clone(&map));
        self.configured = false;

        tracing::debug!(
            entity = definition.name(),
            table = map.table.name.as_str(),
            columns = map.table.columns.len(),
            "registered entity"
        );
        Ok(Some(map))
    }

    /// Resolves every relationship against the current entity set.
    ///
    /// Idempotent; registration marks the registry unconfigured again so
    /// later entities can satisfy earlier forward references.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownTarget`],
    /// [`SchemaError::BackPopulatesMismatch`], [`SchemaError::MissingJoin`],
    /// or [`SchemaError::AmbiguousJoin`] for the first relationship that
    /// cannot be resolved.
    pub fn configure(&mut self) -> Result<(), SchemaError> {
        if self.configured {
            return Ok(());
        }
        let mut resolved = BTreeMap::new();
        for map in self.entities.values() {
            let mut relationship_maps = Vec::new();
            for declared in &map.relations {
                relationship_maps.push(self.resolve_relationship(map, declared)?);
            }
            resolved.insert(map.name.clone(), relationship_maps);
        }
        self.resolved = resolved;
        self.configured = true;
        tracing::debug!(entities = self.entities.len(), "registry configured");
        Ok(())
    }

    /// Returns the resolved relationships of an entity. Empty until the
    /// registry is configured.
    pub fn relationships(&self, entity: &str) -> &[RelationshipMap] {
        self.resolved
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns one resolved relationship by name.
    pub fn relationship(&self, entity: &str, name: &str) -> Option<&RelationshipMap> {
        self.relationships(entity)
            .iter()
            .find(|resolved| resolved.name == name)
    }

    fn resolve_relationship(
        &self,
        source: &EntityMap,
        declared: &RelationshipDef,
    ) -> Result<RelationshipMap, SchemaError> {
        let target = self.entities.get(&declared.target).ok_or_else(|| {
            SchemaError::UnknownTarget {
                entity: source.name.clone(),
                relation: declared.name.clone(),
                target: declared.target.clone(),
            }
        })?;

        if let Some(expected) = &declared.back_populates {
            let reciprocal_exists = target
                .relations
                .iter()
                .any(|relation| &relation.name == expected);
            if !reciprocal_exists {
                return Err(SchemaError::BackPopulatesMismatch {
                    entity: source.name.clone(),
                    relation: declared.name.clone(),
                    target: target.name.clone(),
                    expected: expected.clone(),
                });
            }
        }

        // The collection side expects the foreign key on the target table;
        // the scalar side carries it itself.
        let (fk_table, ref_table) = if declared.uselist {
            (&target.table, &source.table)
        } else {
            (&source.table, &target.table)
        };

        let mut candidates = fk_table.columns.iter().filter_map(|column| {
            column
                .foreign_key
                .as_ref()
                .and_then(ForeignKey::table_and_column)
                .filter(|(table, _)| *table == ref_table.name)
                .map(|(_, ref_column)| Join {
                    fk_table: fk_table.name.clone(),
                    fk_column: column.name.clone(),
                    ref_table: ref_table.name.clone(),
                    ref_column: ref_column.to_string(),
                })
        });

        let join = match (candidates.next(), candidates.next()) {
            (Some(join), None) => join,
            (None, _) => {
                return Err(SchemaError::MissingJoin {
                    entity: source.name.clone(),
                    relation: declared.name.clone(),
                    from_table: fk_table.name.clone(),
                    to_table: ref_table.name.clone(),
                })
            }
            _ => {
                return Err(SchemaError::AmbiguousJoin {
                    entity: source.name.clone(),
                    relation: declared.name.clone(),
                    from_table: fk_table.name.clone(),
                    to_table: ref_table.name.clone(),
                })
            }
        };

        Ok(RelationshipMap {
            name: declared.name.clone(),
            source: source.name.clone(),
            target: target.name.clone(),
            many: declared.uselist,
            back_populates: declared.back_populates.clone(),
            join,
        })
    }
}
