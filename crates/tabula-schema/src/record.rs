//! Record shapes and the dynamically shaped records built from them.
//!
//! A [`RecordShape`] is the construction and comparison plan produced by
//! transforming an entity definition. Every [`Record`] holds a shared
//! reference to its shape plus one value per scalar field and one slot per
//! relationship. Shapes are produced once at registration; records are cheap
//! to construct and clone.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tabula_types::Value;
use uuid::Uuid;

use crate::entity::EntityDef;
use crate::error::SchemaError;

/// How a field obtains a value when construction omits it.
#[derive(Debug, Clone)]
pub enum DefaultSource {
    /// A fixed value, cloned per construction.
    Fixed(Value),
    /// A factory invoked once per construction.
    Factory(fn() -> Value),
}

impl DefaultSource {
    fn produce(&self) -> Value {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Factory(factory) => factory(),
        }
    }
}

/// Runtime behavior of one scalar field slot.
#[derive(Debug, Clone)]
pub struct ShapeField {
    /// Field name.
    pub name: String,
    /// Whether construction accepts a value.
    pub init: bool,
    /// Whether the field appears in debug rendering.
    pub repr: bool,
    /// Whether the field participates in equality.
    pub compare: bool,
    /// Whether the field participates in hashing.
    pub hash: bool,
    /// Default applied when construction omits the field.
    pub default: Option<DefaultSource>,
}

/// Runtime behavior of one relationship slot.
#[derive(Debug, Clone)]
pub struct ShapeRelation {
    /// Slot name.
    pub name: String,
    /// True for the collection side.
    pub many: bool,
}

/// The construction and comparison plan shared by all records of an entity.
#[derive(Debug, Clone)]
pub struct RecordShape {
    /// Entity name.
    pub entity: String,
    /// Scalar fields in declaration order.
    pub fields: Vec<ShapeField>,
    /// Relationship slots in declaration order.
    pub relations: Vec<ShapeRelation>,
}

impl RecordShape {
    /// Returns the position of a scalar field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Returns the position of a relationship slot.
    pub fn relation_index(&self, name: &str) -> Option<usize> {
        self.relations.iter().position(|relation| relation.name == name)
    }
}

/// Strategy turning an entity definition into a record shape.
///
/// The registrar calls this during registration; swapping it out changes how
/// records of the entity construct and compare without touching column
/// mapping.
pub type TransformFn = fn(&EntityDef) -> Result<RecordShape, SchemaError>;

/// The standard transform.
///
/// Produces dataclass-like behavior: fields construct in declaration order,
/// defaults fill omitted arguments, `hash` follows `compare` unless set
/// explicitly, and fields satisfied by a relationship or mapper property are
/// left to their relationship slots.
///
/// # Errors
///
/// Returns [`SchemaError::ConflictingDefaults`] when a field carries both a
/// fixed default and a factory, and [`SchemaError::NotConstructible`] when a
/// field excluded from construction has no default to fall back on.
pub fn standard_transform(definition: &EntityDef) -> Result<RecordShape, SchemaError> {
    let relations: Vec<ShapeRelation> = definition
        .merged_relations()
        .into_iter()
        .map(|declared| ShapeRelation {
            name: declared.name.clone(),
            many: declared.uselist,
        })
        .collect();

    let mut fields = Vec::new();
    for descriptor in definition.fields() {
        // A field whose name is claimed by a relationship slot is satisfied
        // by that slot, not by a scalar value.
        if relations.iter().any(|relation| relation.name == descriptor.name) {
            continue;
        }

        let default = match (&descriptor.default, descriptor.default_factory) {
            (Some(_), Some(_)) => {
                return Err(SchemaError::ConflictingDefaults {
                    field: descriptor.name.clone(),
                })
            }
            (Some(value), None) => Some(DefaultSource::Fixed(value.clone())),
            (None, Some(factory)) => Some(DefaultSource::Factory(factory)),
            (None, None) => None,
        };

        if !descriptor.init && default.is_none() {
            return Err(SchemaError::NotConstructible {
                entity: definition.name().to_string(),
                field: descriptor.name.clone(),
            });
        }

        fields.push(ShapeField {
            name: descriptor.name.clone(),
            init: descriptor.init,
            repr: descriptor.repr,
            compare: descriptor.compare,
            hash: descriptor.hash.unwrap_or(descriptor.compare),
            default,
        });
    }

    Ok(RecordShape {
        entity: definition.name().to_string(),
        fields,
        relations,
    })
}

/// State of one relationship slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Scalar side; `None` until set or loaded.
    One(Option<Box<Record>>),
    /// Collection side.
    Many(Vec<Record>),
}

/// A constructor argument: a scalar value or related records.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A scalar field value.
    Value(Value),
    /// A single related record.
    One(Record),
    /// A list of related records.
    Many(Vec<Record>),
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Record> for Arg {
    fn from(record: Record) -> Self {
        Self::One(record)
    }
}

impl From<Vec<Record>> for Arg {
    fn from(records: Vec<Record>) -> Self {
        Self::Many(records)
    }
}

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        Self::Value(value.into())
    }
}

macro_rules! impl_arg_from_scalar {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for Arg {
                fn from(value: $source) -> Self {
                    Self::Value(value.into())
                }
            }
        )+
    };
}

impl_arg_from_scalar!(
    i64, i32, u32, f64, bool, &str, String, Vec<u8>, NaiveDate, DateTime<Utc>, Uuid
);

/// Collects named arguments for one record, then constructs it.
///
/// Obtained from [`crate::EntityMap::record`]. Arguments are validated when
/// [`RecordBuilder::build`] runs, so `set` chains freely.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    shape: Arc<RecordShape>,
    args: Vec<(String, Arg)>,
}

impl RecordBuilder {
    pub(crate) fn new(shape: Arc<RecordShape>) -> Self {
        Self {
            shape,
            args: Vec::new(),
        }
    }

    /// Supplies a value for a field or relationship slot. A later value for
    /// the same name replaces an earlier one.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    /// Constructs the record.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownField`] for names that match no slot,
    /// [`SchemaError::UnexpectedArgument`] for fields excluded from
    /// construction, [`SchemaError::InvalidArgument`] for arguments of the
    /// wrong shape, and [`SchemaError::MissingField`] when a field without a
    /// default is omitted.
    pub fn build(self) -> Result<Record, SchemaError> {
        Record::from_args(self.shape, self.args)
    }
}

/// One mapped record.
///
/// Equality and hashing honor the per-field `compare` and `hash` behavior
/// from the shape; relationship slots never participate in either.
#[derive(Clone)]
pub struct Record {
    shape: Arc<RecordShape>,
    values: Vec<Value>,
    related: Vec<Related>,
}

impl Record {
    fn from_args(shape: Arc<RecordShape>, args: Vec<(String, Arg)>) -> Result<Self, SchemaError> {
        let entity = || shape.entity.clone();
        let mut field_slots: Vec<Option<Value>> = vec![None; shape.fields.len()];
        let mut relation_slots: Vec<Option<Related>> = vec![None; shape.relations.len()];

        for (name, arg) in args {
            if let Some(index) = shape.field_index(&name) {
                if !shape.fields[index].init {
                    return Err(SchemaError::UnexpectedArgument {
                        entity: entity(),
                        field: name,
                    });
                }
                match arg {
                    Arg::Value(value) => field_slots[index] = Some(value),
                    Arg::One(_) | Arg::Many(_) => {
                        return Err(SchemaError::InvalidArgument {
                            entity: entity(),
                            field: name,
                            expected: "a scalar value",
                        })
                    }
                }
            } else if let Some(index) = shape.relation_index(&name) {
                let slot = match (shape.relations[index].many, arg) {
                    (false, Arg::One(record)) => Related::One(Some(Box::new(record))),
                    (false, Arg::Value(Value::Null)) => Related::One(None),
                    (false, _) => {
                        return Err(SchemaError::InvalidArgument {
                            entity: entity(),
                            field: name,
                            expected: "a single related record",
                        })
                    }
                    (true, Arg::Many(records)) => Related::Many(records),
                    (true, _) => {
                        return Err(SchemaError::InvalidArgument {
                            entity: entity(),
                            field: name,
                            expected: "a list of related records",
                        })
                    }
                };
                relation_slots[index] = Some(slot);
            } else {
                return Err(SchemaError::UnknownField {
                    entity: entity(),
                    field: name,
                });
            }
        }

        let mut values = Vec::with_capacity(shape.fields.len());
        for (index, field) in shape.fields.iter().enumerate() {
            let value = match field_slots[index].take() {
                Some(value) => value,
                None => match &field.default {
                    Some(source) => source.produce(),
                    None => {
                        return Err(SchemaError::MissingField {
                            entity: entity(),
                            field: field.name.clone(),
                        })
                    }
                },
            };
            values.push(value);
        }

        let related = shape
            .relations
            .iter()
            .zip(relation_slots)
            .map(|(relation, slot)| {
                slot.unwrap_or_else(|| {
                    if relation.many {
                        Related::Many(Vec::new())
                    } else {
                        Related::One(None)
                    }
                })
            })
            .collect();

        Ok(Self {
            shape,
            values,
            related,
        })
    }

    /// Builds a record from loaded column values, bypassing construction
    /// rules. Fields without a loaded value become null; relationship slots
    /// start unloaded.
    pub(crate) fn from_loaded(
        shape: Arc<RecordShape>,
        loaded: impl IntoIterator<Item = (String, Value)>,
    ) -> Self {
        let mut values: Vec<Value> = vec![Value::Null; shape.fields.len()];
        for (name, value) in loaded {
            if let Some(index) = shape.field_index(&name) {
                values[index] = value;
            }
        }
        let related = shape
            .relations
            .iter()
            .map(|relation| {
                if relation.many {
                    Related::Many(Vec::new())
                } else {
                    Related::One(None)
                }
            })
            .collect();
        Self {
            shape,
            values,
            related,
        }
    }

    /// Returns the entity name.
    pub fn entity(&self) -> &str {
        &self.shape.entity
    }

    /// Returns the shared shape.
    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }

    /// Returns a field's value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.shape
            .field_index(field)
            .map(|index| &self.values[index])
    }

    /// Replaces a field's value.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownField`] when the field does not exist.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), SchemaError> {
        match self.shape.field_index(field) {
            Some(index) => {
                self.values[index] = value.into();
                Ok(())
            }
            None => Err(SchemaError::UnknownField {
                entity: self.shape.entity.clone(),
                field: field.to_string(),
            }),
        }
    }

    /// Returns a relationship slot.
    pub fn related(&self, name: &str) -> Option<&Related> {
        self.shape
            .relation_index(name)
            .map(|index| &self.related[index])
    }

    /// Returns the record in a scalar-side slot, if set.
    pub fn related_one(&self, name: &str) -> Option<&Record> {
        match self.related(name) {
            Some(Related::One(Some(record))) => Some(record),
            _ => None,
        }
    }

    /// Returns the records in a collection-side slot.
    pub fn related_many(&self, name: &str) -> Option<&[Record]> {
        match self.related(name) {
            Some(Related::Many(records)) => Some(records),
            _ => None,
        }
    }

    /// Replaces a relationship slot.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::UnknownRelationship`] when the slot does not
    /// exist.
    pub fn set_related(&mut self, name: &str, related: Related) -> Result<(), SchemaError> {
        match self.shape.relation_index(name) {
            Some(index) => {
                self.related[index] = related;
                Ok(())
            }
            None => Err(SchemaError::UnknownRelationship {
                entity: self.shape.entity.clone(),
                relation: name.to_string(),
            }),
        }
    }

    /// Returns a copy with all relationship slots reset to their defaults.
    ///
    /// Used when a record is embedded into another record's slot, so the
    /// embedding does not recurse.
    pub fn detached(&self) -> Record {
        Record {
            shape: Arc::clone(&self.shape),
            values: self.values.clone(),
            related: self
                .shape
                .relations
                .iter()
                .map(|relation| {
                    if relation.many {
                        Related::Many(Vec::new())
                    } else {
                        Related::One(None)
                    }
                })
                .collect(),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        if self.shape.entity != other.shape.entity
            || self.shape.fields.len() != other.shape.fields.len()
        {
            return false;
        }
        self.shape
            .fields
            .iter()
            .zip(&self.values)
            .zip(&other.values)
            .all(|((field, mine), theirs)| !field.compare || mine == theirs)
    }
}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.entity.hash(state);
        for (field, value) in self.shape.fields.iter().zip(&self.values) {
            if field.hash {
                value.hash(state);
            }
        }
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{ ", self.shape.entity)?;
        let mut first = true;
        for (field, value) in self.shape.fields.iter().zip(&self.values) {
            if !field.repr {
                continue;
            }
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{}: {}", field.name, value)?;
        }
        f.write_str(" }")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityDef;
    use crate::field::field;
    use crate::relationship::relation;
    use tabula_types::{int, optional, primary_key, text, uuid as uuid_type};

    fn shape_of(definition: &EntityDef) -> Arc<RecordShape> {
        Arc::new(standard_transform(definition).unwrap())
    }

    fn person() -> Arc<RecordShape> {
        shape_of(
            &EntityDef::new("Person")
                .field(field("id", primary_key(int())))
                .field(field("name", text()))
                .field(field("age", optional(int())).default(Value::Null)),
        )
    }

    fn fresh_uuid() -> Value {
        Value::Uuid(Uuid::new_v4())
    }

    #[test]
    fn construction_fills_declared_fields() {
        let record = RecordBuilder::new(person())
            .set("id", 1)
            .set("name", "My Author")
            .build()
            .unwrap();
        assert_eq!(record.get("id"), Some(&Value::Int(1)));
        assert_eq!(record.get("name"), Some(&Value::Text("My Author".into())));
        assert_eq!(record.get("age"), Some(&Value::Null), "default applies");
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = RecordBuilder::new(person()).set("id", 1).build().unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingField {
                entity: "Person".into(),
                field: "name".into()
            }
        );
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let err = RecordBuilder::new(person())
            .set("id", 1)
            .set("name", "x")
            .set("nickname", "y")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownField {
                entity: "Person".into(),
                field: "nickname".into()
            }
        );
    }

    #[test]
    fn default_factory_runs_per_construction() {
        let shape = shape_of(
            &EntityDef::new("Tagged")
                .field(field("id", primary_key(uuid_type())).init(false).default_factory(fresh_uuid))
                .field(field("label", text())),
        );
        let a = RecordBuilder::new(Arc::clone(&shape))
            .set("label", "a")
            .build()
            .unwrap();
        let b = RecordBuilder::new(shape).set("label", "b").build().unwrap();
        assert_ne!(a.get("id"), b.get("id"), "each construction gets a fresh id");
    }

    #[test]
    fn init_excluded_field_rejects_arguments() {
        let shape = shape_of(
            &EntityDef::new("Tagged")
                .field(field("id", primary_key(uuid_type())).init(false).default_factory(fresh_uuid))
                .field(field("label", text())),
        );
        let err = RecordBuilder::new(shape)
            .set("label", "a")
            .set("id", 9)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnexpectedArgument {
                entity: "Tagged".into(),
                field: "id".into()
            }
        );
    }

    #[test]
    fn init_excluded_field_requires_a_default() {
        let definition = EntityDef::new("Broken").field(field("id", int()).init(false));
        let err = standard_transform(&definition).unwrap_err();
        assert_eq!(
            err,
            SchemaError::NotConstructible {
                entity: "Broken".into(),
                field: "id".into()
            }
        );
    }

    #[test]
    fn conflicting_defaults_are_rejected() {
        let definition = EntityDef::new("Broken")
            .field(field("id", int()).default(0).default_factory(fresh_uuid));
        let err = standard_transform(&definition).unwrap_err();
        assert_eq!(
            err,
            SchemaError::ConflictingDefaults { field: "id".into() }
        );
    }

    #[test]
    fn later_argument_replaces_earlier() {
        let record = RecordBuilder::new(person())
            .set("id", 1)
            .set("name", "first")
            .set("name", "second")
            .build()
            .unwrap();
        assert_eq!(record.get("name"), Some(&Value::Text("second".into())));
    }

    #[test]
    fn equality_skips_non_compare_fields_and_relations() {
        let shape = shape_of(
            &EntityDef::new("Doc")
                .field(field("id", primary_key(int())))
                .field(field("etag", text()).compare(false))
                .relation(relation("owner", "Person")),
        );
        let a = RecordBuilder::new(Arc::clone(&shape))
            .set("id", 1)
            .set("etag", "aaa")
            .build()
            .unwrap();
        let mut b = RecordBuilder::new(shape)
            .set("id", 1)
            .set("etag", "bbb")
            .build()
            .unwrap();
        let owner = RecordBuilder::new(person())
            .set("id", 7)
            .set("name", "o")
            .build()
            .unwrap();
        b.set_related("owner", Related::One(Some(Box::new(owner)))).unwrap();

        assert_eq!(a, b, "etag and relationship state are not compared");
    }

    #[test]
    fn hash_follows_compare_unless_overridden() {
        use std::collections::hash_map::DefaultHasher;

        let hash_of = |record: &Record| {
            let mut state = DefaultHasher::new();
            record.hash(&mut state);
            state.finish()
        };

        let shape = shape_of(
            &EntityDef::new("Doc")
                .field(field("id", primary_key(int())))
                .field(field("etag", text()).compare(false)),
        );
        let a = RecordBuilder::new(Arc::clone(&shape))
            .set("id", 1)
            .set("etag", "aaa")
            .build()
            .unwrap();
        let b = RecordBuilder::new(shape)
            .set("id", 1)
            .set("etag", "bbb")
            .build()
            .unwrap();
        assert_eq!(hash_of(&a), hash_of(&b), "etag inherits hash=false from compare");
    }

    #[test]
    fn debug_hides_repr_excluded_fields() {
        let shape = shape_of(
            &EntityDef::new("Account")
                .field(field("id", primary_key(int())))
                .field(field("secret", text()).repr(false)),
        );
        let record = RecordBuilder::new(shape)
            .set("id", 5)
            .set("secret", "hunter2")
            .build()
            .unwrap();
        let rendered = format!("{record:?}");
        assert_eq!(rendered, "Account { id: 5 }");
    }

    #[test]
    fn relationship_slots_default_empty() {
        let shape = shape_of(
            &EntityDef::new("Author")
                .field(field("id", primary_key(int())))
                .relation(relation("books", "Book").uselist(true))
                .relation(relation("publisher", "Publisher")),
        );
        let record = RecordBuilder::new(shape).set("id", 1).build().unwrap();
        assert_eq!(record.related_many("books").map(<[Record]>::len), Some(0));
        assert!(record.related_one("publisher").is_none());
    }

    #[test]
    fn relationship_arguments_fill_slots() {
        let author_shape = shape_of(
            &EntityDef::new("Author")
                .field(field("id", primary_key(int())))
                .relation(relation("books", "Book").uselist(true)),
        );
        let book_shape = shape_of(
            &EntityDef::new("Book")
                .field(field("id", primary_key(int())))
                .relation(relation("author", "Author")),
        );
        let author = RecordBuilder::new(Arc::clone(&author_shape))
            .set("id", 1)
            .build()
            .unwrap();
        let book = RecordBuilder::new(book_shape)
            .set("id", 2)
            .set("author", author.clone())
            .build()
            .unwrap();
        assert_eq!(book.related_one("author"), Some(&author));

        let author_with_books = RecordBuilder::new(author_shape)
            .set("id", 1)
            .set("books", vec![book.clone()])
            .build()
            .unwrap();
        assert_eq!(author_with_books.related_many("books"), Some(&[book][..]));
    }

    #[test]
    fn wrong_argument_shape_is_rejected() {
        let shape = shape_of(
            &EntityDef::new("Author")
                .field(field("id", primary_key(int())))
                .relation(relation("books", "Book").uselist(true)),
        );
        let author = RecordBuilder::new(Arc::clone(&shape)).set("id", 1).build().unwrap();
        let err = RecordBuilder::new(shape)
            .set("id", 2)
            .set("books", author)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::InvalidArgument {
                entity: "Author".into(),
                field: "books".into(),
                expected: "a list of related records",
            }
        );
    }

    #[test]
    fn detached_copy_resets_relationship_slots() {
        let shape = shape_of(
            &EntityDef::new("Author")
                .field(field("id", primary_key(int())))
                .relation(relation("books", "Book").uselist(true)),
        );
        let inner = RecordBuilder::new(Arc::clone(&shape)).set("id", 9).build().unwrap();
        let mut record = RecordBuilder::new(shape).set("id", 1).build().unwrap();
        record
            .set_related("books", Related::Many(vec![inner]))
            .unwrap();

        let detached = record.detached();
        assert_eq!(detached.related_many("books").map(<[Record]>::len), Some(0));
        assert_eq!(detached.get("id"), Some(&Value::Int(1)));
        assert_eq!(detached, record, "relationship state is not compared");
    }
}
