//! Buffered query results and scalar narrowing.
//!
//! Executing a select buffers every decoded row tuple. [`Rows`] keeps the
//! tuples; [`Rows::scalars`] narrows each tuple to its first element, which
//! is the common shape for single-item projections.

use crate::error::OrmError;

/// Buffered row tuples of an executed select.
#[derive(Debug)]
pub struct Rows<T> {
    items: Vec<T>,
}

impl<T> Rows<T> {
    pub(crate) fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    /// Returns every row.
    pub fn all(self) -> Vec<T> {
        self.items
    }

    /// Returns the first row, if any.
    pub fn first(self) -> Option<T> {
        self.items.into_iter().next()
    }

    /// Returns exactly one row.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NoRowReturned`] on zero rows and
    /// [`OrmError::MultipleRows`] on more than one.
    pub fn one(self) -> Result<T, OrmError> {
        let found = self.items.len();
        let mut items = self.items.into_iter();
        match (items.next(), items.next()) {
            (Some(item), None) => Ok(item),
            (None, _) => Err(OrmError::NoRowReturned),
            _ => Err(OrmError::MultipleRows { found }),
        }
    }

    /// Returns at most one row.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::MultipleRows`] on more than one row.
    pub fn one_or_none(self) -> Result<Option<T>, OrmError> {
        let found = self.items.len();
        let mut items = self.items.into_iter();
        match (items.next(), items.next()) {
            (item, None) => Ok(item),
            _ => Err(OrmError::MultipleRows { found }),
        }
    }

    /// Splits the rows into chunks of at most `size`. A `size` of zero
    /// yields everything in one chunk.
    pub fn partitions(self, size: usize) -> Vec<Vec<T>> {
        if size == 0 {
            return if self.items.is_empty() {
                Vec::new()
            } else {
                vec![self.items]
            };
        }
        let mut chunks = Vec::new();
        let mut current = Vec::with_capacity(size.min(self.items.len()));
        for item in self.items {
            current.push(item);
            if current.len() == size {
                chunks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    /// Narrows each row tuple to its first element.
    pub fn scalars(self) -> Scalars<T::First>
    where
        T: ScalarRow,
    {
        Scalars {
            items: self.items.into_iter().map(ScalarRow::into_first).collect(),
        }
    }

    /// Iterates over the buffered rows.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the number of buffered rows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> IntoIterator for Rows<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Rows<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// A row tuple whose first element can stand alone.
pub trait ScalarRow {
    /// The first element's type.
    type First;

    /// Extracts the first element, dropping the rest.
    fn into_first(self) -> Self::First;
}

macro_rules! impl_scalar_row {
    ($(($first:ident $(, $rest:ident)*))+) => {
        $(
            impl<$first $(, $rest)*> ScalarRow for ($first, $($rest,)*) {
                type First = $first;

                fn into_first(self) -> $first {
                    self.0
                }
            }
        )+
    };
}

impl_scalar_row! {
    (A)
    (A, B)
    (A, B, C)
}

/// Scalar projection of buffered rows.
#[derive(Debug)]
pub struct Scalars<T> {
    items: Vec<T>,
}

impl<T> Scalars<T> {
    /// Returns every value.
    pub fn all(self) -> Vec<T> {
        self.items
    }

    /// Returns the first value, if any.
    pub fn first(self) -> Option<T> {
        self.items.into_iter().next()
    }

    /// Returns exactly one value.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NoRowReturned`] on zero rows and
    /// [`OrmError::MultipleRows`] on more than one.
    pub fn one(self) -> Result<T, OrmError> {
        let found = self.items.len();
        let mut items = self.items.into_iter();
        match (items.next(), items.next()) {
            (Some(item), None) => Ok(item),
            (None, _) => Err(OrmError::NoRowReturned),
            _ => Err(OrmError::MultipleRows { found }),
        }
    }

    /// Returns at most one value.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::MultipleRows`] on more than one row.
    pub fn one_or_none(self) -> Result<Option<T>, OrmError> {
        let found = self.items.len();
        let mut items = self.items.into_iter();
        match (items.next(), items.next()) {
            (item, None) => Ok(item),
            _ => Err(OrmError::MultipleRows { found }),
        }
    }

    /// Splits the values into chunks of at most `size`. A `size` of zero
    /// yields everything in one chunk.
    pub fn partitions(self, size: usize) -> Vec<Vec<T>> {
        Rows { items: self.items }.partitions(size)
    }

    /// Iterates over the buffered values.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the number of buffered values.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> IntoIterator for Scalars<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Scalars<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_accepts_exactly_one_row() {
        assert_eq!(Rows::new(vec![(7,)]).one().unwrap(), (7,));
        assert!(matches!(
            Rows::<(i64,)>::new(vec![]).one(),
            Err(OrmError::NoRowReturned)
        ));
        assert!(matches!(
            Rows::new(vec![(1,), (2,), (3,)]).one(),
            Err(OrmError::MultipleRows { found: 3 })
        ));
    }

    #[test]
    fn one_or_none_tolerates_zero_rows() {
        assert_eq!(Rows::<(i64,)>::new(vec![]).one_or_none().unwrap(), None);
        assert_eq!(Rows::new(vec![(4,)]).one_or_none().unwrap(), Some((4,)));
        assert!(matches!(
            Rows::new(vec![(1,), (2,)]).one_or_none(),
            Err(OrmError::MultipleRows { found: 2 })
        ));
    }

    #[test]
    fn partitions_chunk_in_order() {
        let rows = Rows::new(vec![(1,), (2,), (3,), (4,), (5,)]);
        assert_eq!(
            rows.partitions(2),
            vec![vec![(1,), (2,)], vec![(3,), (4,)], vec![(5,)]]
        );
    }

    #[test]
    fn zero_partition_size_keeps_one_chunk() {
        let rows = Rows::new(vec![(1,), (2,)]);
        assert_eq!(rows.partitions(0), vec![vec![(1,), (2,)]]);
        assert!(Rows::<(i64,)>::new(vec![]).partitions(0).is_empty());
    }

    #[test]
    fn scalars_take_the_first_tuple_element() {
        let rows = Rows::new(vec![(1i64, "a"), (2, "b")]);
        assert_eq!(rows.scalars().all(), vec![1, 2]);
    }
}
