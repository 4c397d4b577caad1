//! Error types for schema resolution and entity registration.

/// Errors that can occur while resolving types, building columns, or
/// registering entities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A declared type did not reduce to exactly one non-null scalar kind.
    #[error("unable to resolve a single column type for {declared}: candidates are [{candidates}]")]
    AmbiguousType {
        /// The declared type, rendered.
        declared: String,
        /// Comma-separated candidate kinds after flattening.
        candidates: String,
    },

    /// A scalar kind has no entry in the registry's type map.
    #[error("no column type registered for scalar kind {kind} (declared type {declared})")]
    UnmappedType {
        /// The unmapped scalar kind's label.
        kind: String,
        /// The declared type, rendered.
        declared: String,
    },

    /// A field descriptor carries both a fixed default and a default factory.
    #[error("field '{field}' declares both a default value and a default factory")]
    ConflictingDefaults {
        /// The offending field.
        field: String,
    },

    /// A field excluded from construction has no way to obtain a value.
    #[error("field '{entity}.{field}' is excluded from construction but has no default")]
    NotConstructible {
        /// The entity being transformed.
        entity: String,
        /// The offending field.
        field: String,
    },

    /// A table with this name already exists in the target metadata.
    #[error("table '{table}' is already defined in this metadata")]
    DuplicateTable {
        /// The colliding table name.
        table: String,
    },

    /// An entity with this name is already registered.
    #[error("entity '{entity}' is already registered in this registry")]
    DuplicateEntity {
        /// The colliding entity name.
        entity: String,
    },

    /// The table being created has no primary-key column.
    #[error("no primary key defined for table '{table}'")]
    MissingPrimaryKey {
        /// The offending table.
        table: String,
    },

    /// A name did not match any field of the entity.
    #[error("entity '{entity}' has no field '{field}'")]
    UnknownField {
        /// The entity looked up.
        entity: String,
        /// The missing field name.
        field: String,
    },

    /// A required constructor argument was not supplied and has no default.
    #[error("missing value for field '{entity}.{field}'")]
    MissingField {
        /// The entity being constructed.
        entity: String,
        /// The field without a value.
        field: String,
    },

    /// A constructor argument named a field that does not accept one.
    #[error("field '{entity}.{field}' does not accept a constructor argument")]
    UnexpectedArgument {
        /// The entity being constructed.
        entity: String,
        /// The init-excluded field.
        field: String,
    },

    /// A constructor argument had the wrong shape for its slot.
    #[error("'{entity}.{field}' expects {expected}")]
    InvalidArgument {
        /// The entity being constructed.
        entity: String,
        /// The field or relationship the argument named.
        field: String,
        /// What the slot accepts.
        expected: &'static str,
    },

    /// A name did not match any relationship of the entity.
    #[error("entity '{entity}' has no relationship '{relation}'")]
    UnknownRelationship {
        /// The entity looked up.
        entity: String,
        /// The missing relationship name.
        relation: String,
    },

    /// A relationship names a target entity that is not registered.
    #[error("relationship '{entity}.{relation}' targets unregistered entity '{target}'")]
    UnknownTarget {
        /// The entity declaring the relationship.
        entity: String,
        /// The relationship name.
        relation: String,
        /// The unresolved target entity name.
        target: String,
    },

    /// No foreign key connects the two sides of a relationship.
    #[error("relationship '{entity}.{relation}': no foreign key links '{from_table}' to '{to_table}'")]
    MissingJoin {
        /// The entity declaring the relationship.
        entity: String,
        /// The relationship name.
        relation: String,
        /// The table expected to carry the foreign key.
        from_table: String,
        /// The referenced table.
        to_table: String,
    },

    /// More than one foreign key connects the two sides of a relationship.
    #[error("relationship '{entity}.{relation}': multiple foreign keys link '{from_table}' to '{to_table}'")]
    AmbiguousJoin {
        /// The entity declaring the relationship.
        entity: String,
        /// The relationship name.
        relation: String,
        /// The table carrying the foreign keys.
        from_table: String,
        /// The referenced table.
        to_table: String,
    },

    /// `back_populates` names a relationship the target entity does not have.
    #[error("relationship '{entity}.{relation}' back-populates '{target}.{expected}', which is not declared")]
    BackPopulatesMismatch {
        /// The entity declaring the relationship.
        entity: String,
        /// The relationship name.
        relation: String,
        /// The target entity.
        target: String,
        /// The reciprocal relationship that was expected on the target.
        expected: String,
    },

    /// A foreign-key reference was not in `table.column` form.
    #[error("malformed foreign-key reference '{reference}' on field '{field}': expected 'table.column'")]
    MalformedForeignKey {
        /// The field carrying the reference.
        field: String,
        /// The reference as written.
        reference: String,
    },
}
