//! Field descriptors and the column-level knobs they carry.

use serde::{Deserialize, Serialize};
use tabula_types::{TypeExpr, Value};

/// A reference to a column in another table, written `"table.column"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// The referenced column in `table.column` form.
    pub target: String,
}

impl ForeignKey {
    /// Creates a reference to `table.column`.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Splits the reference into its table and column parts.
    ///
    /// Returns `None` when the reference is not in `table.column` form.
    pub fn table_and_column(&self) -> Option<(&str, &str)> {
        self.target
            .split_once('.')
            .filter(|(table, column)| !table.is_empty() && !column.is_empty())
    }
}

impl From<&str> for ForeignKey {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}

impl From<String> for ForeignKey {
    fn from(target: String) -> Self {
        Self::new(target)
    }
}

/// Extra column-level constructs appended after the computed column facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnArg {
    /// A foreign-key reference. Takes precedence over one set through the
    /// descriptor when both are present.
    ForeignKey(ForeignKey),
    /// A `CHECK` constraint expression, emitted as `CHECK (<expr>)`.
    Check(String),
    /// A raw DDL fragment appended to the column definition verbatim.
    Raw(String),
}

/// Column keyword overrides, merged in last so they win over computed facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOptions {
    /// Overrides the nullability derived from the declared type.
    pub nullable: Option<bool>,
    /// Overrides primary-key membership derived from flag and marker.
    pub primary_key: Option<bool>,
    /// Adds or removes a UNIQUE constraint.
    pub unique: Option<bool>,
    /// A `DEFAULT` expression emitted into DDL verbatim.
    pub server_default: Option<String>,
}

impl ColumnOptions {
    /// Creates an empty override set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the column's nullability.
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = Some(nullable);
        self
    }

    /// Forces primary-key membership.
    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = Some(primary_key);
        self
    }

    /// Adds or removes a UNIQUE constraint.
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    /// Sets a server-side default expression.
    pub fn server_default(mut self, expr: impl Into<String>) -> Self {
        self.server_default = Some(expr.into());
        self
    }
}

/// A scalar field of an entity definition.
///
/// Carries everything the registrar needs to build both the record slot
/// (defaults, construction and comparison behavior) and the mapped column
/// (declared type, key flags, extra arguments, overrides).
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name; also the column name.
    pub name: String,
    /// The declared type, resolved at registration time.
    pub declared: TypeExpr,
    /// Fixed default value applied when construction omits the field.
    pub default: Option<Value>,
    /// Default factory invoked per construction. Mutually exclusive with
    /// `default`.
    pub default_factory: Option<fn() -> Value>,
    /// Whether construction accepts a value for this field.
    pub init: bool,
    /// Whether the field appears in a record's debug rendering.
    pub repr: bool,
    /// Whether the field participates in hashing. `None` follows `compare`.
    pub hash: Option<bool>,
    /// Whether the field participates in equality.
    pub compare: bool,
    /// Marks the column as part of the primary key. Interchangeable with the
    /// `PrimaryKey` type marker.
    pub primary_key: bool,
    /// Foreign-key reference for the column.
    pub foreign_key: Option<ForeignKey>,
    /// Extra column constructs appended after computed facts.
    pub args: Vec<ColumnArg>,
    /// Keyword overrides merged in last.
    pub options: ColumnOptions,
}

/// Starts a field descriptor with dataclass-like defaults: included in
/// construction, rendering, and equality, with hashing following equality.
pub fn field(name: impl Into<String>, declared: impl Into<TypeExpr>) -> FieldDef {
    FieldDef {
        name: name.into(),
        declared: declared.into(),
        default: None,
        default_factory: None,
        init: true,
        repr: true,
        hash: None,
        compare: true,
        primary_key: false,
        foreign_key: None,
        args: Vec::new(),
        options: ColumnOptions::default(),
    }
}

impl FieldDef {
    /// Sets a fixed default value.
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Sets a default factory, invoked once per construction.
    pub fn default_factory(mut self, factory: fn() -> Value) -> Self {
        self.default_factory = Some(factory);
        self
    }

    /// Includes or excludes the field from construction.
    pub fn init(mut self, init: bool) -> Self {
        self.init = init;
        self
    }

    /// Includes or excludes the field from debug rendering.
    pub fn repr(mut self, repr: bool) -> Self {
        self.repr = repr;
        self
    }

    /// Includes or excludes the field from hashing.
    pub fn hash(mut self, hash: bool) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Includes or excludes the field from equality.
    pub fn compare(mut self, compare: bool) -> Self {
        self.compare = compare;
        self
    }

    /// Marks the field as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Attaches a foreign-key reference.
    pub fn foreign_key(mut self, reference: impl Into<ForeignKey>) -> Self {
        self.foreign_key = Some(reference.into());
        self
    }

    /// Appends an extra column construct.
    pub fn arg(mut self, arg: ColumnArg) -> Self {
        self.args.push(arg);
        self
    }

    /// Sets keyword overrides.
    pub fn options(mut self, options: ColumnOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_types::{int, text};

    #[test]
    fn descriptor_defaults_match_dataclass_behavior() {
        let defined = field("name", text());
        assert!(defined.init);
        assert!(defined.repr);
        assert!(defined.compare);
        assert_eq!(defined.hash, None);
        assert!(!defined.primary_key);
        assert!(defined.default.is_none() && defined.default_factory.is_none());
    }

    #[test]
    fn builder_chain_applies_each_knob() {
        let defined = field("author_id", int())
            .foreign_key("author.id")
            .repr(false)
            .hash(false)
            .options(ColumnOptions::new().nullable(true).unique(true));

        assert_eq!(
            defined.foreign_key,
            Some(ForeignKey::new("author.id")),
        );
        assert!(!defined.repr);
        assert_eq!(defined.hash, Some(false));
        assert_eq!(defined.options.nullable, Some(true));
        assert_eq!(defined.options.unique, Some(true));
    }

    #[test]
    fn foreign_key_reference_splits() {
        assert_eq!(
            ForeignKey::new("author.id").table_and_column(),
            Some(("author", "id")),
        );
        assert_eq!(ForeignKey::new("author").table_and_column(), None);
        assert_eq!(ForeignKey::new(".id").table_and_column(), None);
    }
}
