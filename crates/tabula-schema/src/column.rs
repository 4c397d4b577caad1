//! Column construction from field descriptors.
//!
//! Build order mirrors the override precedence: facts computed from the
//! declared type come first, extra args are appended on top, and keyword
//! overrides are merged last so they always win.

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::field::{ColumnArg, FieldDef, ForeignKey};
use crate::resolve::resolve;
use crate::typemap::{SqlType, TypeMap};

/// Quotes an identifier for SQLite DDL and queries.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A fully specified table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub sql_type: SqlType,
    /// Whether the column admits NULL.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
    /// Whether the column carries a UNIQUE constraint.
    pub unique: bool,
    /// Server-side default expression, emitted verbatim.
    pub server_default: Option<String>,
    /// Foreign-key reference, if any.
    pub foreign_key: Option<ForeignKey>,
    /// Extra DDL fragments appended to the definition.
    pub extras: Vec<String>,
}

impl Column {
    /// Builds a column from a field descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::AmbiguousType`] or [`SchemaError::UnmappedType`]
    /// when the declared type cannot be resolved or mapped, and
    /// [`SchemaError::MalformedForeignKey`] when a foreign-key reference is
    /// not in `table.column` form.
    pub(crate) fn from_field(descriptor: &FieldDef, types: &TypeMap) -> Result<Self, SchemaError> {
        let resolved = resolve(&descriptor.declared)?;
        let sql_type = types.column_type(resolved.scalar, &descriptor.declared)?;

        let mut nullable = resolved.nullable;
        let mut primary_key = descriptor.primary_key || resolved.is_primary_key();
        let mut foreign_key = descriptor.foreign_key.clone();
        let mut extras = Vec::new();

        for arg in &descriptor.args {
            match arg {
                ColumnArg::ForeignKey(reference) => foreign_key = Some(reference.clone()),
                ColumnArg::Check(expr) => extras.push(format!("CHECK ({expr})")),
                ColumnArg::Raw(fragment) => extras.push(fragment.clone()),
            }
        }

        if let Some(reference) = &foreign_key {
            if reference.table_and_column().is_none() {
                return Err(SchemaError::MalformedForeignKey {
                    field: descriptor.name.clone(),
                    reference: reference.target.clone(),
                });
            }
        }

        let options = &descriptor.options;
        if let Some(value) = options.nullable {
            nullable = value;
        }
        if let Some(value) = options.primary_key {
            primary_key = value;
        }

        Ok(Self {
            name: descriptor.name.clone(),
            sql_type,
            nullable,
            primary_key,
            unique: options.unique.unwrap_or(false),
            server_default: options.server_default.clone(),
            foreign_key,
            extras,
        })
    }

    /// Renders the column definition for `CREATE TABLE`.
    ///
    /// `inline_primary_key` is false when the table has a composite primary
    /// key, which is then emitted as a table-level constraint instead.
    pub(crate) fn render(&self, inline_primary_key: bool) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.sql_type.ddl());
        if self.primary_key && inline_primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.server_default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if let Some((table, column)) = self
            .foreign_key
            .as_ref()
            .and_then(ForeignKey::table_and_column)
        {
            sql.push_str(&format!(
                " REFERENCES {} ({})",
                quote_ident(table),
                quote_ident(column)
            ));
        }
        for extra in &self.extras {
            sql.push(' ');
            sql.push_str(extra);
        }
        sql
    }
}

/// A resolved handle to a mapped column.
///
/// Handles come from [`crate::EntityMap::col`] and are what filters,
/// ordering, and typed projections are written against. Not `PartialEq`:
/// comparison methods on handles build SQL predicates instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Owning table name.
    pub table: String,
    /// Column name.
    pub column: String,
    /// Storage type, used to decode loaded values.
    pub sql_type: SqlType,
}

impl ColumnRef {
    /// Returns the quoted `"table"."column"` form.
    pub fn qualified(&self) -> String {
        format!(
            "{}.{}",
            quote_ident(&self.table),
            quote_ident(&self.column)
        )
    }
}

impl From<&ColumnRef> for ForeignKey {
    fn from(reference: &ColumnRef) -> Self {
        ForeignKey::new(format!("{}.{}", reference.table, reference.column))
    }
}
