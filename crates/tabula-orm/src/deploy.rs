//! Schema deployment against a live connection.

use rusqlite::Connection;
use tabula_schema::Registry;

use crate::error::OrmError;

/// Creates every mapped table that does not already exist, along with the
/// indexes declared in its table arguments.
///
/// The registry is configured first so relationship forward references are
/// resolved before any DDL runs. Tables already present are left untouched,
/// which makes deploying against an existing database safe.
///
/// Returns the number of tables created.
///
/// # Errors
///
/// Returns [`OrmError::Schema`] when a table has no primary key or
/// relationship resolution fails, and [`OrmError::Database`] when DDL
/// execution fails.
pub fn create_all(conn: &Connection, registry: &mut Registry) -> Result<usize, OrmError> {
    registry.configure()?;

    let mut created = 0;
    for table in registry.metadata().tables() {
        if table_exists(conn, &table.name)? {
            tracing::debug!(table = table.name.as_str(), "table already exists");
            continue;
        }
        conn.execute(&table.create_sql()?, [])?;
        for index in table.index_sql() {
            conn.execute(&index, [])?;
        }
        tracing::info!(table = table.name.as_str(), "created table");
        created += 1;
    }
    Ok(created)
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, OrmError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_schema::{field, EntityDef, IndexDef, SchemaError, TableArgs};
    use tabula_types::{int, text};

    fn note_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                EntityDef::new("Note")
                    .table_args(
                        TableArgs::new().index(IndexDef::new("ix_note_title", ["title"])),
                    )
                    .field(field("id", int()).primary_key())
                    .field(field("title", text())),
            )
            .expect("note should register");
        registry
    }

    #[test]
    fn creates_tables_and_indexes_once() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let mut registry = note_registry();

        let created = create_all(&conn, &mut registry).expect("deploy should succeed");
        assert_eq!(created, 1);
        assert!(table_exists(&conn, "note").expect("existence check should succeed"));

        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'ix_note_title'",
                [],
                |row| row.get(0),
            )
            .expect("should query sqlite_master");
        assert_eq!(indexes, 1);

        let again = create_all(&conn, &mut registry).expect("second deploy should succeed");
        assert_eq!(again, 0, "existing tables are not recreated");
    }

    #[test]
    fn missing_primary_key_surfaces_at_deploy() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let mut registry = Registry::new();
        registry
            .register(EntityDef::new("Loose").field(field("title", text())))
            .expect("registration itself should succeed");

        let result = create_all(&conn, &mut registry);
        assert!(matches!(
            result,
            Err(OrmError::Schema(SchemaError::MissingPrimaryKey { .. }))
        ));
    }
}
