//! Reduction of declared field types to column facts.
//!
//! A declared type is a tree of wrappers around scalar kinds. Resolution
//! flattens that tree into a candidate set and accepts it only when exactly
//! one non-null scalar kind remains. Null alternatives never disqualify a
//! declaration; they are folded into nullability instead.

use std::collections::BTreeSet;

use tabula_types::{ScalarKind, TypeExpr, TypeMarker};

use crate::error::SchemaError;

/// The column-relevant facts extracted from one declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    /// The single scalar kind the declaration reduces to.
    pub scalar: ScalarKind,
    /// Whether any level of the declaration admitted null.
    pub nullable: bool,
    /// Markers attached at the outermost level of the declaration.
    pub markers: Vec<TypeMarker>,
}

impl ResolvedType {
    /// Returns true if the outermost markers include
    /// [`TypeMarker::PrimaryKey`].
    pub fn is_primary_key(&self) -> bool {
        self.markers.contains(&TypeMarker::PrimaryKey)
    }
}

#[derive(Debug, Default)]
struct Candidates {
    scalars: BTreeSet<ScalarKind>,
    saw_null: bool,
}

/// Resolves a declared type to a scalar kind, nullability, and markers.
///
/// # Errors
///
/// Returns [`SchemaError::AmbiguousType`] when the declaration flattens to
/// zero or more than one non-null scalar kind. `Union[Text, Date]` is
/// rejected; `Union[Text, Null]` resolves to a nullable text column.
pub fn resolve(declared: &TypeExpr) -> Result<ResolvedType, SchemaError> {
    let (candidates, markers) = flatten(declared);
    let names = candidates
        .scalars
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ");

    let mut kinds = candidates.scalars.into_iter();
    match (kinds.next(), kinds.next()) {
        (Some(scalar), None) => Ok(ResolvedType {
            scalar,
            nullable: candidates.saw_null,
            markers,
        }),
        _ => Err(SchemaError::AmbiguousType {
            declared: declared.to_string(),
            candidates: names,
        }),
    }
}

/// Flattens a declaration into its candidate scalar kinds.
///
/// Only the outermost `Annotated` level contributes markers; markers buried
/// inside unions or optionals are dropped.
fn flatten(declared: &TypeExpr) -> (Candidates, Vec<TypeMarker>) {
    match declared {
        TypeExpr::Scalar(kind) => (
            Candidates {
                scalars: BTreeSet::from([*kind]),
                saw_null: false,
            },
            Vec::new(),
        ),
        TypeExpr::Null => (
            Candidates {
                scalars: BTreeSet::new(),
                saw_null: true,
            },
            Vec::new(),
        ),
        TypeExpr::Optional(inner) => {
            let (mut candidates, _) = flatten(inner);
            candidates.saw_null = true;
            (candidates, Vec::new())
        }
        TypeExpr::Union(alternatives) => {
            let mut merged = Candidates::default();
            for alternative in alternatives {
                let (candidates, _) = flatten(alternative);
                merged.scalars.extend(candidates.scalars);
                merged.saw_null |= candidates.saw_null;
            }
            (merged, Vec::new())
        }
        TypeExpr::Annotated { base, markers } => {
            let (candidates, _) = flatten(base);
            (candidates, markers.clone())
        }
    }
}
