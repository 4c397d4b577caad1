//! Error types for the mapper runtime.

use thiserror::Error;

/// Errors produced while deploying schemas or running sessions.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Entity registration or relationship resolution failed.
    #[error(transparent)]
    Schema(#[from] tabula_schema::SchemaError),

    /// The underlying SQLite call failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A pooled connection could not be checked out.
    #[error("failed to check out a pooled connection: {0}")]
    Checkout(#[from] r2d2::Error),

    /// A stored value did not fit the column's mapped type.
    #[error("cannot decode column '{column}' as {expected}, stored value was {got}")]
    Decode {
        column: String,
        expected: String,
        got: String,
    },

    /// A query expected a row and none came back.
    #[error("expected one row, query returned none")]
    NoRowReturned,

    /// A query expected at most one row.
    #[error("expected at most one row, query returned {found}")]
    MultipleRows { found: usize },

    /// Primary-key lookups support single-column keys only.
    #[error("entity '{entity}' has a composite primary key, look it up with a filtered select")]
    CompositePrimaryKey { entity: String },

    /// The record's entity is not known to the session's registry.
    #[error("entity '{entity}' is not registered with this session's registry")]
    UnknownEntity { entity: String },
}
