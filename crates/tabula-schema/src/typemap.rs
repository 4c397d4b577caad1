//! The extensible mapping from scalar kinds to column types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tabula_types::{ScalarKind, TypeExpr};

use crate::error::SchemaError;

/// A column storage type.
///
/// `ddl` is the type name emitted into `CREATE TABLE`. SQLite assigns
/// affinity from the name, so `Boolean`, `Date`, and `Timestamp` behave as
/// numeric and text affinities underneath; the bind and decode layer keeps
/// the declared semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    /// Signed integer column.
    Integer,
    /// Float column.
    Real,
    /// Boolean column, stored as 0 or 1.
    Boolean,
    /// UTF-8 text column.
    Text,
    /// Raw blob column.
    Blob,
    /// Calendar date column, stored as `YYYY-MM-DD` text.
    Date,
    /// UTC timestamp column, stored as RFC 3339 text.
    Timestamp,
    /// UUID column, stored as 32-character lowercase hex text.
    Guid,
    /// Application-defined column type; the string is emitted into DDL
    /// verbatim and values pass through undecoded.
    Custom(String),
}

impl SqlType {
    /// Returns the type name used in `CREATE TABLE` statements.
    pub fn ddl(&self) -> &str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Date => "DATE",
            Self::Timestamp => "TIMESTAMP",
            Self::Guid => "CHAR(32)",
            Self::Custom(name) => name,
        }
    }
}

/// The lookup table from scalar kinds to column types.
///
/// Every registry owns one. It starts with the built-in entries and can be
/// extended, or overridden, with [`TypeMap::register`]; changes affect
/// entities registered afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMap {
    entries: BTreeMap<ScalarKind, SqlType>,
}

impl Default for TypeMap {
    fn default() -> Self {
        let entries = BTreeMap::from([
            (ScalarKind::Int, SqlType::Integer),
            (ScalarKind::Float, SqlType::Real),
            (ScalarKind::Bool, SqlType::Boolean),
            (ScalarKind::Text, SqlType::Text),
            (ScalarKind::Bytes, SqlType::Blob),
            (ScalarKind::Date, SqlType::Date),
            (ScalarKind::DateTime, SqlType::Timestamp),
            (ScalarKind::Uuid, SqlType::Guid),
        ]);
        Self { entries }
    }
}

impl TypeMap {
    /// Creates a map with the built-in entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the column type for a scalar kind.
    ///
    /// Registering an existing kind overwrites its entry, so repeated
    /// registration is idempotent.
    pub fn register(&mut self, kind: ScalarKind, sql_type: SqlType) {
        self.entries.insert(kind, sql_type);
    }

    /// Returns the column type for a kind, if one is registered.
    pub fn get(&self, kind: ScalarKind) -> Option<&SqlType> {
        self.entries.get(&kind)
    }

    /// Looks up the column type for a resolved scalar kind.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnmappedType`] naming both the kind and the
    /// original declaration when no entry exists.
    pub fn column_type(
        &self,
        kind: ScalarKind,
        declared: &TypeExpr,
    ) -> Result<SqlType, SchemaError> {
        self.entries
            .get(&kind)
            .cloned()
            .ok_or_else(|| SchemaError::UnmappedType {
                kind: kind.name().to_string(),
                declared: declared.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_types::uuid;

    #[test]
    fn built_in_entries_cover_all_base_kinds() {
        let map = TypeMap::new();
        assert_eq!(map.get(ScalarKind::Int), Some(&SqlType::Integer));
        assert_eq!(map.get(ScalarKind::Float), Some(&SqlType::Real));
        assert_eq!(map.get(ScalarKind::Bool), Some(&SqlType::Boolean));
        assert_eq!(map.get(ScalarKind::Text), Some(&SqlType::Text));
        assert_eq!(map.get(ScalarKind::Bytes), Some(&SqlType::Blob));
        assert_eq!(map.get(ScalarKind::Date), Some(&SqlType::Date));
        assert_eq!(map.get(ScalarKind::DateTime), Some(&SqlType::Timestamp));
        assert_eq!(map.get(ScalarKind::Uuid), Some(&SqlType::Guid));
    }

    #[test]
    fn unmapped_kind_names_kind_and_declaration() {
        let map = TypeMap::new();
        let kind = ScalarKind::Other("Money");
        let declared = TypeExpr::Scalar(kind);
        let err = map.column_type(kind, &declared).unwrap_err();
        match err {
            SchemaError::UnmappedType { kind, declared } => {
                assert_eq!(kind, "Money");
                assert_eq!(declared, "Money");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn register_overwrites_existing_entry() {
        let mut map = TypeMap::new();
        map.register(ScalarKind::Uuid, SqlType::Text);
        assert_eq!(map.column_type(ScalarKind::Uuid, &uuid()), Ok(SqlType::Text));

        // Same registration again leaves the map unchanged.
        map.register(ScalarKind::Uuid, SqlType::Text);
        assert_eq!(map.get(ScalarKind::Uuid), Some(&SqlType::Text));
    }

    #[test]
    fn custom_ddl_is_emitted_verbatim() {
        let money = SqlType::Custom("DECIMAL(10,2)".to_string());
        assert_eq!(money.ddl(), "DECIMAL(10,2)");
    }
}
