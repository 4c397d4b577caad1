//! Mapped tables, table-level arguments, and the shared metadata container.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::column::{quote_ident, Column};
use crate::error::SchemaError;

/// A secondary index created alongside its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexDef {
    /// Creates a non-unique index over the given columns.
    pub fn new(name: impl Into<String>, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
        }
    }

    /// Makes the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Table-level arguments passed through an entity definition verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableArgs {
    /// Raw table-level constraint clauses, e.g. `UNIQUE ("a", "b")`.
    pub constraints: Vec<String>,
    /// Secondary indexes created after the table.
    pub indexes: Vec<IndexDef>,
}

impl TableArgs {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw table-level constraint clause.
    pub fn constraint(mut self, clause: impl Into<String>) -> Self {
        self.constraints.push(clause.into());
        self
    }

    /// Appends a secondary index.
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }
}

/// A mapped table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<Column>,
    /// Table-level arguments.
    pub args: TableArgs,
}

impl Table {
    /// Returns the column with the given name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Returns the primary-key columns in declaration order.
    pub fn primary_key_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|column| column.primary_key)
            .collect()
    }

    /// Renders the `CREATE TABLE` statement.
    ///
    /// A single-column primary key is rendered inline; a composite key
    /// becomes a table-level constraint.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingPrimaryKey`] when no column is part of
    /// the primary key. The mapping layer accepts such tables at
    /// registration; the error surfaces when the schema is materialized.
    pub fn create_sql(&self) -> Result<String, SchemaError> {
        let primary = self.primary_key_columns();
        if primary.is_empty() {
            return Err(SchemaError::MissingPrimaryKey {
                table: self.name.clone(),
            });
        }

        let inline = primary.len() == 1;
        let mut defs: Vec<String> = self
            .columns
            .iter()
            .map(|column| column.render(inline))
            .collect();

        if !inline {
            let names = primary
                .iter()
                .map(|column| quote_ident(&column.name))
                .collect::<Vec<_>>()
                .join(", ");
            defs.push(format!("PRIMARY KEY ({names})"));
        }
        defs.extend(self.args.constraints.iter().cloned());

        Ok(format!(
            "CREATE TABLE {} (\n    {}\n)",
            quote_ident(&self.name),
            defs.join(",\n    ")
        ))
    }

    /// Renders `CREATE INDEX` statements for the table's secondary indexes.
    pub fn index_sql(&self) -> Vec<String> {
        self.args
            .indexes
            .iter()
            .map(|index| {
                let columns = index
                    .columns
                    .iter()
                    .map(|name| quote_ident(name))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    if index.unique { "UNIQUE " } else { "" },
                    quote_ident(&index.name),
                    quote_ident(&self.name),
                    columns
                )
            })
            .collect()
    }
}

/// The shared collection of tables a registry maps entities into.
///
/// Table names are unique within one metadata. Two registries own two
/// independent metadata instances, so the same table name can exist in both.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    tables: BTreeMap<String, Table>,
}

impl Metadata {
    /// Creates an empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateTable`] when a table with the same
    /// name already exists. The metadata is unchanged on error.
    pub(crate) fn add(&mut self, table: Table) -> Result<(), SchemaError> {
        if self.tables.contains_key(&table.name) {
            return Err(SchemaError::DuplicateTable { table: table.name });
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Returns the table with the given name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Iterates over tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Returns the number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true when no tables are present.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Removes all tables. Intended for test fixtures that reuse a registry.
    pub fn clear(&mut self) {
        self.tables.clear();
    }
}
