//! Runtime layer for the Tabula mapper: connection pooling, schema
//! deployment, typed selects, and sessions.
//!
//! `tabula-schema` maps entity definitions onto tables; this crate makes
//! those mappings executable against SQLite. A [`Session`] borrows a
//! configured [`tabula_schema::Registry`] and one connection, queues records
//! for insertion, and runs typed select statements whose projections decode
//! straight into records and Rust values.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: no external database process required; WAL
//!   allows concurrent readers with a single writer.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management. In-memory databases are private per connection,
//!   so [`Session::with_connection`] exists for single-connection work.
//! - **Buffered results**: executing a select decodes every row up front,
//!   so [`Rows`] and [`Scalars`] hand out owned values and never borrow the
//!   connection.
//!
//! # Usage
//!
//! ```rust,ignore
//! let pool = create_pool("library.db", DbSettings::default())?;
//! create_all(&pool.get()?, &mut registry)?;
//!
//! let mut session = Session::new(&pool, &mut registry)?;
//! let mut author = authors.record().set("id", id).set("name", "Ursula").build()?;
//! session.add(&mut author)?;
//! session.commit()?;
//!
//! let name = col::<String>(&authors, "name")?;
//! let names = session.scalars(select((name.clone(),)).order_by(name.asc()))?.all();
//! ```

mod bind;
mod config;
mod deploy;
mod error;
mod pool;
mod rows;
mod select;
mod session;

pub use bind::{decode_value, BindValue};
pub use config::{init_logging, load_config, Config, ConfigError, DatabaseConfig, LoggingConfig};
pub use deploy::create_all;
pub use error::OrmError;
pub use pool::{create_pool, DbPool, DbSettings, PoolError};
pub use rows::{Rows, ScalarRow, Scalars};
pub use select::{
    col, lit, select, ColumnExt, Filter, Lit, OrderBy, Select, SelectItem, Selectable, TypedColumn,
};
pub use session::Session;
