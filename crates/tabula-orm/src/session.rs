//! Sessions: a unit of work over one database connection.
//!
//! A session borrows a configured registry and owns one connection, either
//! checked out of a pool or handed in directly. Records queue with
//! [`Session::add`] and flush inside a single transaction at
//! [`Session::commit`]. Reads go through the typed select layer;
//! [`Session::get`] and [`Session::refresh`] are conveniences built on it.

use std::sync::Arc;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tabula_schema::{
    quote_ident, EntityMap, Record, Registry, Related, RelationshipMap, SchemaError,
};
use tabula_types::Value;

use crate::bind::BindValue;
use crate::error::OrmError;
use crate::pool::DbPool;
use crate::rows::{Rows, ScalarRow, Scalars};
use crate::select::{select, ColumnExt, Select, Selectable};

enum Conn {
    Pooled(PooledConnection<SqliteConnectionManager>),
    Owned(Connection),
}

impl Conn {
    fn get(&self) -> &Connection {
        match self {
            Conn::Pooled(conn) => conn,
            Conn::Owned(conn) => conn,
        }
    }
}

/// A unit of work over one connection.
///
/// Holding a session keeps the registry borrowed, so no new entities can
/// register while it is open; every mapping the session sees is final.
pub struct Session<'r> {
    conn: Conn,
    registry: &'r Registry,
    pending: Vec<Record>,
}

impl<'r> Session<'r> {
    /// Opens a session on a connection checked out of `pool`.
    ///
    /// Configures the registry first, resolving relationship forward
    /// references.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Schema`] when relationship resolution fails and
    /// [`OrmError::Checkout`] when the pool has no connection to give.
    pub fn new(pool: &DbPool, registry: &'r mut Registry) -> Result<Self, OrmError> {
        registry.configure()?;
        Ok(Self {
            conn: Conn::Pooled(pool.get()?),
            registry,
            pending: Vec::new(),
        })
    }

    /// Opens a session that owns `conn` outright.
    ///
    /// An in-memory database is private to its connection, so this is the
    /// way to run a whole workload, tests included, against `:memory:`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Schema`] when relationship resolution fails.
    pub fn with_connection(conn: Connection, registry: &'r mut Registry) -> Result<Self, OrmError> {
        registry.configure()?;
        Ok(Self {
            conn: Conn::Owned(conn),
            registry,
            pending: Vec::new(),
        })
    }

    /// Returns the underlying connection for raw SQL.
    pub fn connection(&self) -> &Connection {
        self.conn.get()
    }

    /// Returns the registry this session reads mappings from.
    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Returns the number of records queued for the next commit.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queues a record for insertion.
    ///
    /// A scalar-side relationship slot holding a record fills the matching
    /// foreign-key field in place when that field is still null, so the
    /// caller's record reflects the linkage immediately, before any flush.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::UnknownEntity`] when the record's entity is not
    /// registered here.
    pub fn add(&mut self, record: &mut Record) -> Result<(), OrmError> {
        self.autofill_foreign_keys(record)?;
        self.pending.push(record.clone());
        Ok(())
    }

    /// Queues several records in order.
    ///
    /// # Errors
    ///
    /// Same as [`Session::add`]; records before the failing one stay queued.
    pub fn add_all<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a mut Record>,
    ) -> Result<(), OrmError> {
        for record in records {
            self.add(record)?;
        }
        Ok(())
    }

    fn autofill_foreign_keys(&self, record: &mut Record) -> Result<(), OrmError> {
        if self.registry.entity(record.entity()).is_none() {
            return Err(OrmError::UnknownEntity {
                entity: record.entity().to_string(),
            });
        }

        let mut updates = Vec::new();
        for relationship in self.registry.relationships(record.entity()) {
            if relationship.many {
                continue;
            }
            if let Some(related) = record.related_one(&relationship.name) {
                if let Some(value) = related.get(&relationship.join.ref_column) {
                    if !value.is_null() {
                        updates.push((relationship.join.fk_column.clone(), value.clone()));
                    }
                }
            }
        }
        for (field, value) in updates {
            let unset = record.get(&field).map(Value::is_null).unwrap_or(true);
            if unset {
                record.set(&field, value)?;
            }
        }
        Ok(())
    }

    /// Writes every queued record in one transaction.
    ///
    /// A failed flush rolls the transaction back; the queue is empty
    /// afterwards either way.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Database`] when an insert fails, including
    /// constraint violations.
    pub fn commit(&mut self) -> Result<(), OrmError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        let conn = match &mut self.conn {
            Conn::Pooled(conn) => &mut **conn,
            Conn::Owned(conn) => conn,
        };
        let tx = conn.transaction()?;
        for record in &pending {
            let map = self.registry.entity(record.entity()).ok_or_else(|| {
                OrmError::UnknownEntity {
                    entity: record.entity().to_string(),
                }
            })?;
            insert_record(&tx, map, record)?;
        }
        tx.commit()?;
        tracing::debug!(records = pending.len(), "committed pending records");
        Ok(())
    }

    /// Discards the queued records without touching the database.
    pub fn rollback(&mut self) {
        let dropped = self.pending.len();
        self.pending.clear();
        if dropped > 0 {
            tracing::debug!(records = dropped, "discarded pending records");
        }
    }

    /// Executes a typed select and buffers the decoded rows.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Database`] for statement failures and
    /// [`OrmError::Decode`] when a stored value does not fit its column's
    /// mapped type.
    pub fn execute<S: Selectable>(&self, query: Select<S>) -> Result<Rows<S::Row>, OrmError> {
        let (sql, params) = query.render();
        tracing::trace!(sql = sql.as_str(), params = params.len(), "executing select");

        let binds: Vec<BindValue<'_>> = params.iter().map(BindValue).collect();
        let conn = self.conn.get();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(binds))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(query.decode_row(row)?);
        }
        Ok(Rows::new(items))
    }

    /// Executes a typed select and narrows each row to its first item.
    ///
    /// # Errors
    ///
    /// Same as [`Session::execute`].
    pub fn scalars<S>(
        &self,
        query: Select<S>,
    ) -> Result<Scalars<<S::Row as ScalarRow>::First>, OrmError>
    where
        S: Selectable,
        S::Row: ScalarRow,
    {
        Ok(self.execute(query)?.scalars())
    }

    /// Looks up a record by primary key.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::CompositePrimaryKey`] when the entity's key
    /// spans several columns; those lookups need a filtered select.
    pub fn get(
        &self,
        entity: &EntityMap,
        key: impl Into<Value>,
    ) -> Result<Option<Record>, OrmError> {
        let key_column = single_primary_key(entity)?;
        let handle = entity.col(&key_column)?;
        let rows = self.execute(select((entity,)).filter(handle.eq(key)))?;
        Ok(rows.one_or_none()?.map(|(record,)| record))
    }

    /// Reloads a record's fields from its row and fills every relationship
    /// slot.
    ///
    /// Children loaded into a collection slot carry a detached copy of this
    /// record in their reciprocal slot, so navigation works in both
    /// directions without a reference cycle.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NoRowReturned`] when the record's row no longer
    /// exists.
    pub fn refresh(&self, record: &mut Record) -> Result<(), OrmError> {
        let map = self.entity_map(record.entity())?;
        let key_column = single_primary_key(map)?;
        let key = record.get(&key_column).cloned().unwrap_or(Value::Null);
        let handle = map.col(&key_column)?;
        let (loaded,) = self.execute(select((map,)).filter(handle.eq(key)))?.one()?;

        let fields: Vec<String> = record
            .shape()
            .fields
            .iter()
            .map(|field| field.name.clone())
            .collect();
        for field in fields {
            let value = loaded.get(&field).cloned().unwrap_or(Value::Null);
            record.set(&field, value)?;
        }

        let mut slots = Vec::new();
        for relationship in self.registry.relationships(record.entity()) {
            slots.push((
                relationship.name.clone(),
                self.load_related(record, relationship)?,
            ));
        }
        for (name, related) in slots {
            record.set_related(&name, related)?;
        }
        Ok(())
    }

    /// Resolves one relationship for a record without mutating it.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Schema`] when the record's entity declares no
    /// relationship of this name.
    pub fn related(&self, record: &Record, name: &str) -> Result<Related, OrmError> {
        let relationship = self
            .registry
            .relationship(record.entity(), name)
            .ok_or_else(|| {
                OrmError::Schema(SchemaError::UnknownRelationship {
                    entity: record.entity().to_string(),
                    relation: name.to_string(),
                })
            })?;
        self.load_related(record, relationship)
    }

    fn entity_map(&self, name: &str) -> Result<&Arc<EntityMap>, OrmError> {
        self.registry.entity(name).ok_or_else(|| OrmError::UnknownEntity {
            entity: name.to_string(),
        })
    }

    fn load_related(
        &self,
        record: &Record,
        relationship: &RelationshipMap,
    ) -> Result<Related, OrmError> {
        let target = self.entity_map(&relationship.target)?;
        if relationship.many {
            let anchor = record
                .get(&relationship.join.ref_column)
                .cloned()
                .unwrap_or(Value::Null);
            if anchor.is_null() {
                return Ok(Related::Many(Vec::new()));
            }
            let handle = target.col(&relationship.join.fk_column)?;
            let rows = self.execute(select((target,)).filter(handle.eq(anchor)))?;
            let mut children: Vec<Record> =
                rows.into_iter().map(|(child,)| child).collect();
            if let Some(back) = &relationship.back_populates {
                let parent = record.detached();
                for child in &mut children {
                    child.set_related(back, Related::One(Some(Box::new(parent.clone()))))?;
                }
            }
            Ok(Related::Many(children))
        } else {
            let anchor = record
                .get(&relationship.join.fk_column)
                .cloned()
                .unwrap_or(Value::Null);
            if anchor.is_null() {
                return Ok(Related::One(None));
            }
            let handle = target.col(&relationship.join.ref_column)?;
            let rows = self.execute(select((target,)).filter(handle.eq(anchor)))?;
            let parent = rows.one_or_none()?.map(|(record,)| Box::new(record));
            Ok(Related::One(parent))
        }
    }
}

fn single_primary_key(entity: &EntityMap) -> Result<String, OrmError> {
    let primary = entity.table().primary_key_columns();
    match primary.as_slice() {
        [column] => Ok(column.name.clone()),
        [] => Err(OrmError::Schema(SchemaError::MissingPrimaryKey {
            table: entity.table_name().to_string(),
        })),
        _ => Err(OrmError::CompositePrimaryKey {
            entity: entity.name().to_string(),
        }),
    }
}

fn insert_record(
    tx: &rusqlite::Transaction<'_>,
    map: &EntityMap,
    record: &Record,
) -> Result<(), OrmError> {
    let table = map.table();
    let columns = table
        .columns
        .iter()
        .map(|column| quote_ident(&column.name))
        .collect::<Vec<_>>()
        .join(", ");
    let markers = (1..=table.columns.len())
        .map(|n| format!("?{n}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(&table.name),
        columns,
        markers
    );

    let values: Vec<Value> = table
        .columns
        .iter()
        .map(|column| record.get(&column.name).cloned().unwrap_or(Value::Null))
        .collect();
    let binds: Vec<BindValue<'_>> = values.iter().map(BindValue).collect();
    tx.execute(&sql, rusqlite::params_from_iter(binds))?;
    tracing::trace!(table = table.name.as_str(), "inserted record");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::create_all;
    use tabula_schema::{field, EntityDef};
    use tabula_types::{int, text};

    fn note_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(
                EntityDef::new("Note")
                    .field(field("id", int()).primary_key())
                    .field(field("title", text())),
            )
            .expect("note should register");
        registry
    }

    #[test]
    fn rollback_discards_the_queue() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let mut registry = note_registry();
        create_all(&conn, &mut registry).expect("deploy should succeed");

        let mut session =
            Session::with_connection(conn, &mut registry).expect("session should open");
        let map = Arc::clone(session.registry().entity("Note").expect("note is mapped"));
        let mut note = map
            .record()
            .set("id", 1i64)
            .set("title", "draft")
            .build()
            .expect("note should build");

        session.add(&mut note).expect("add should succeed");
        assert_eq!(session.pending_count(), 1);
        session.rollback();
        assert_eq!(session.pending_count(), 0);
        session.commit().expect("empty commit is a no-op");

        let count: i64 = session
            .connection()
            .query_row("SELECT COUNT(*) FROM note", [], |row| row.get(0))
            .expect("count should succeed");
        assert_eq!(count, 0);
    }

    #[test]
    fn add_rejects_unregistered_entities() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let mut registry = note_registry();
        create_all(&conn, &mut registry).expect("deploy should succeed");

        let mut other = Registry::new();
        let ghost_map = other
            .register(
                EntityDef::new("Ghost")
                    .field(field("id", int()).primary_key())
                    .field(field("name", text())),
            )
            .expect("ghost should register")
            .expect("ghost is concrete");
        let mut ghost = ghost_map
            .record()
            .set("id", 1i64)
            .set("name", "banquo")
            .build()
            .expect("ghost should build");

        let mut session =
            Session::with_connection(conn, &mut registry).expect("session should open");
        let result = session.add(&mut ghost);
        assert!(matches!(result, Err(OrmError::UnknownEntity { .. })));
    }

    #[test]
    fn get_on_composite_key_is_an_error() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let mut registry = Registry::new();
        let pair = registry
            .register(
                EntityDef::new("Pair")
                    .field(field("left", int()).primary_key())
                    .field(field("right", int()).primary_key()),
            )
            .expect("pair should register")
            .expect("pair is concrete");
        create_all(&conn, &mut registry).expect("deploy should succeed");

        let session =
            Session::with_connection(conn, &mut registry).expect("session should open");
        let result = session.get(&pair, 1i64);
        assert!(matches!(result, Err(OrmError::CompositePrimaryKey { .. })));
    }
}
