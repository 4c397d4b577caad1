//! Declarative entity-to-table mapping.
//!
//! Applications describe their data as entity definitions: named scalar
//! fields with declared types, plus relationship declarations. Registering a
//! definition resolves every declared type down to a column, builds the
//! table in the registry's shared metadata, and produces an [`EntityMap`]
//! that constructs records of the entity.
//!
//! All mapping state lives in an explicit [`Registry`] value. There is no
//! global registration, no reflection, and no background work: what the
//! registry maps is exactly what was handed to [`Registry::register`], in
//! the order it was handed over.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tabula_schema::{field, EntityDef, Registry};
//! use tabula_types::{int, primary_key, text};
//!
//! let mut registry = Registry::new();
//! let model = registry
//!     .register(
//!         EntityDef::new("Model")
//!             .field(field("id", primary_key(int())))
//!             .field(field("name", text())),
//!     )?
//!     .expect("concrete entity");
//!
//! let record = model.record().set("id", 1).set("name", "first").build()?;
//! ```

mod column;
mod entity;
mod error;
mod field;
mod record;
mod registry;
mod relationship;
mod resolve;
mod table;
mod typemap;

pub use column::{quote_ident, Column, ColumnRef};
pub use entity::{EntityDef, MapperProperty};
pub use error::SchemaError;
pub use field::{field, ColumnArg, ColumnOptions, FieldDef, ForeignKey};
pub use record::{
    standard_transform, Arg, DefaultSource, Record, RecordBuilder, RecordShape, Related,
    ShapeField, ShapeRelation, TransformFn,
};
pub use registry::{EntityMap, Registry};
pub use relationship::{relation, Join, RelationTarget, RelationshipDef, RelationshipMap};
pub use resolve::{resolve, ResolvedType};
pub use table::{IndexDef, Metadata, Table, TableArgs};
pub use typemap::{SqlType, TypeMap};
