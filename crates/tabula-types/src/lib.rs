//! Shared type vocabulary for the Tabula mapping layer.
//!
//! This crate provides the foundational types used across all Tabula crates:
//! the declared-type language ([`TypeExpr`]) that entity fields are written
//! in, the scalar kinds it bottoms out in ([`ScalarKind`]), and the dynamic
//! runtime value carried through records and query results ([`Value`]).
//!
//! Nothing in this crate touches a database engine. Schema resolution lives
//! in `tabula-schema` and SQLite bindings live in `tabula-orm`; both depend
//! on this crate and nothing here depends on them.

use serde::{Deserialize, Serialize};
use std::fmt;

mod value;
pub use value::{FromValue, Value};

/// Scalar kinds a declared field type can bottom out in.
///
/// Each kind maps to exactly one column type through the registry's type
/// map. `Other` carries a caller-chosen label so applications can introduce
/// their own kinds and register column types for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ScalarKind {
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Text,
    /// Raw byte string.
    Bytes,
    /// Calendar date without a time component.
    Date,
    /// Timestamp with UTC offset.
    DateTime,
    /// 128-bit UUID.
    Uuid,
    /// Application-defined kind, identified by label.
    Other(&'static str),
}

// Derived `Deserialize` would force `'de: 'static` because of the label in
// `Other`; deserialize through an owned mirror of the variants instead and
// leak the label to obtain the static lifetime.
impl<'de> Deserialize<'de> for ScalarKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename = "ScalarKind")]
        enum Repr {
            Int,
            Float,
            Bool,
            Text,
            Bytes,
            Date,
            DateTime,
            Uuid,
            Other(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Int => Self::Int,
            Repr::Float => Self::Float,
            Repr::Bool => Self::Bool,
            Repr::Text => Self::Text,
            Repr::Bytes => Self::Bytes,
            Repr::Date => Self::Date,
            Repr::DateTime => Self::DateTime,
            Repr::Uuid => Self::Uuid,
            Repr::Other(label) => Self::Other(Box::leak(label.into_boxed_str())),
        })
    }
}

impl ScalarKind {
    /// Returns the display label for this kind.
    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::Bool => "Bool",
            Self::Text => "Text",
            Self::Bytes => "Bytes",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::Uuid => "Uuid",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Markers that can be attached to a declared type via [`TypeExpr::Annotated`].
///
/// Markers only take effect at the outermost level of a declaration; a marker
/// buried inside a union alternative is dropped during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeMarker {
    /// Marks the annotated field as part of the table's primary key.
    PrimaryKey,
}

/// A declared field type.
///
/// This is the wrapper language entity definitions are written in. Schema
/// resolution strips the wrappers down to a single scalar kind plus
/// nullability and markers; a declaration that cannot be reduced to exactly
/// one scalar kind is rejected at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeExpr {
    /// A bare scalar kind.
    Scalar(ScalarKind),
    /// The null type. On its own it cannot map to a column; inside a union
    /// or `Optional` it makes the column nullable.
    Null,
    /// Shorthand for `Union[T, Null]`.
    Optional(Box<TypeExpr>),
    /// A union of alternatives. Resolvable only when exactly one non-null
    /// scalar kind remains after flattening.
    Union(Vec<TypeExpr>),
    /// A base type with markers attached.
    Annotated {
        /// The wrapped type.
        base: Box<TypeExpr>,
        /// Markers attached at this level.
        markers: Vec<TypeMarker>,
    },
}

impl TypeExpr {
    /// Returns true if this declaration admits null at any level.
    pub fn admits_null(&self) -> bool {
        match self {
            Self::Scalar(_) => false,
            Self::Null => true,
            Self::Optional(_) => true,
            Self::Union(alternatives) => alternatives.iter().any(Self::admits_null),
            Self::Annotated { base, .. } => base.admits_null(),
        }
    }
}

impl From<ScalarKind> for TypeExpr {
    fn from(kind: ScalarKind) -> Self {
        Self::Scalar(kind)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Null => f.write_str("Null"),
            Self::Optional(inner) => write!(f, "Optional[{inner}]"),
            Self::Union(alternatives) => {
                f.write_str("Union[")?;
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{alt}")?;
                }
                f.write_str("]")
            }
            Self::Annotated { base, markers } => {
                write!(f, "Annotated[{base}")?;
                for marker in markers {
                    write!(f, ", {marker:?}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Declares a signed integer field.
pub fn int() -> TypeExpr {
    TypeExpr::Scalar(ScalarKind::Int)
}

/// Declares a float field.
pub fn float() -> TypeExpr {
    TypeExpr::Scalar(ScalarKind::Float)
}

/// Declares a boolean field.
pub fn boolean() -> TypeExpr {
    TypeExpr::Scalar(ScalarKind::Bool)
}

/// Declares a text field.
pub fn text() -> TypeExpr {
    TypeExpr::Scalar(ScalarKind::Text)
}

/// Declares a byte-string field.
pub fn bytes() -> TypeExpr {
    TypeExpr::Scalar(ScalarKind::Bytes)
}

/// Declares a date field.
pub fn date() -> TypeExpr {
    TypeExpr::Scalar(ScalarKind::Date)
}

/// Declares a UTC timestamp field.
pub fn datetime() -> TypeExpr {
    TypeExpr::Scalar(ScalarKind::DateTime)
}

/// Declares a UUID field.
pub fn uuid() -> TypeExpr {
    TypeExpr::Scalar(ScalarKind::Uuid)
}

/// Wraps a declaration so the resulting column admits null.
pub fn optional(inner: impl Into<TypeExpr>) -> TypeExpr {
    TypeExpr::Optional(Box::new(inner.into()))
}

/// Declares a union of alternatives.
pub fn union(alternatives: impl IntoIterator<Item = TypeExpr>) -> TypeExpr {
    TypeExpr::Union(alternatives.into_iter().collect())
}

/// Attaches markers to a base declaration.
pub fn annotated(base: impl Into<TypeExpr>, markers: Vec<TypeMarker>) -> TypeExpr {
    TypeExpr::Annotated {
        base: Box::new(base.into()),
        markers,
    }
}

/// Marks a declaration as a primary-key field.
///
/// Equivalent to annotating the base type with [`TypeMarker::PrimaryKey`].
/// The marker form and the field descriptor's `primary_key()` flag are
/// interchangeable.
pub fn primary_key(base: impl Into<TypeExpr>) -> TypeExpr {
    annotated(base, vec![TypeMarker::PrimaryKey])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_wrapper_structure() {
        assert_eq!(int().to_string(), "Int");
        assert_eq!(optional(text()).to_string(), "Optional[Text]");
        assert_eq!(union([text(), date()]).to_string(), "Union[Text, Date]");
        assert_eq!(
            primary_key(int()).to_string(),
            "Annotated[Int, PrimaryKey]"
        );
        assert_eq!(
            union([text(), TypeExpr::Null]).to_string(),
            "Union[Text, Null]"
        );
    }

    #[test]
    fn admits_null_sees_through_wrappers() {
        assert!(!int().admits_null());
        assert!(optional(int()).admits_null());
        assert!(union([text(), TypeExpr::Null]).admits_null());
        assert!(!union([text(), int()]).admits_null());
        assert!(annotated(optional(int()), vec![TypeMarker::PrimaryKey]).admits_null());
    }

    #[test]
    fn scalar_kind_labels() {
        assert_eq!(ScalarKind::Int.name(), "Int");
        assert_eq!(ScalarKind::DateTime.name(), "DateTime");
        assert_eq!(ScalarKind::Other("Money").name(), "Money");
    }

    #[test]
    fn type_expr_round_trips_through_json() {
        let declared = primary_key(optional(union([int(), TypeExpr::Null])));
        let encoded = serde_json::to_string(&declared).unwrap();
        let decoded: TypeExpr = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, declared);
    }
}
