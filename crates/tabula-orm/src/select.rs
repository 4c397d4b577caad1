//! Typed select statements over mapped entities.
//!
//! A statement is built from a tuple of projection items: an entity map
//! projects whole records, a typed column handle projects one decoded value,
//! and a literal projects itself. Filters and ordering terms come from the
//! comparison methods on column handles. Everything renders to SQL with
//! numbered placeholders, bound positionally at execution.

use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::Row;
use tabula_schema::{quote_ident, ColumnRef, EntityMap, Record};
use tabula_types::{FromValue, Value};

use crate::bind::decode_value;
use crate::error::OrmError;

#[derive(Debug, Clone)]
enum Frag {
    Sql(String),
    Param(Value),
}

/// One WHERE predicate together with its bind values.
#[derive(Debug, Clone)]
pub struct Filter {
    frags: Vec<Frag>,
}

impl Filter {
    fn binary(column: &ColumnRef, op: &str, value: Value) -> Self {
        Self {
            frags: vec![
                Frag::Sql(format!("{} {op} ", column.qualified())),
                Frag::Param(value),
            ],
        }
    }

    fn suffix(column: &ColumnRef, suffix: &str) -> Self {
        Self {
            frags: vec![Frag::Sql(format!("{} {suffix}", column.qualified()))],
        }
    }

    fn group(op: &str, left: Filter, right: Filter) -> Self {
        let mut frags = Vec::with_capacity(left.frags.len() + right.frags.len() + 3);
        frags.push(Frag::Sql("(".to_string()));
        frags.extend(left.frags);
        frags.push(Frag::Sql(format!(") {op} (")));
        frags.extend(right.frags);
        frags.push(Frag::Sql(")".to_string()));
        Self { frags }
    }

    /// Both predicates must hold.
    pub fn and(self, other: Filter) -> Filter {
        Filter::group("AND", self, other)
    }

    /// Either predicate may hold.
    pub fn or(self, other: Filter) -> Filter {
        Filter::group("OR", self, other)
    }

    fn render(&self, sql: &mut String, params: &mut Vec<Value>) {
        for frag in &self.frags {
            match frag {
                Frag::Sql(text) => sql.push_str(text),
                Frag::Param(value) => {
                    params.push(value.clone());
                    sql.push_str(&format!("?{}", params.len()));
                }
            }
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone)]
pub struct OrderBy {
    sql: String,
}

/// Comparison and ordering constructors available on anything that names a
/// mapped column.
pub trait ColumnExt {
    /// The underlying column handle.
    fn column_ref(&self) -> &ColumnRef;

    /// `column = value`
    fn eq(&self, value: impl Into<Value>) -> Filter {
        Filter::binary(self.column_ref(), "=", value.into())
    }

    /// `column != value`
    fn ne(&self, value: impl Into<Value>) -> Filter {
        Filter::binary(self.column_ref(), "!=", value.into())
    }

    /// `column < value`
    fn lt(&self, value: impl Into<Value>) -> Filter {
        Filter::binary(self.column_ref(), "<", value.into())
    }

    /// `column <= value`
    fn le(&self, value: impl Into<Value>) -> Filter {
        Filter::binary(self.column_ref(), "<=", value.into())
    }

    /// `column > value`
    fn gt(&self, value: impl Into<Value>) -> Filter {
        Filter::binary(self.column_ref(), ">", value.into())
    }

    /// `column >= value`
    fn ge(&self, value: impl Into<Value>) -> Filter {
        Filter::binary(self.column_ref(), ">=", value.into())
    }

    /// `column LIKE pattern`
    fn like(&self, pattern: impl Into<String>) -> Filter {
        Filter::binary(self.column_ref(), "LIKE", Value::Text(pattern.into()))
    }

    /// `column IS NULL`
    fn is_null(&self) -> Filter {
        Filter::suffix(self.column_ref(), "IS NULL")
    }

    /// `column IS NOT NULL`
    fn is_not_null(&self) -> Filter {
        Filter::suffix(self.column_ref(), "IS NOT NULL")
    }

    /// Ascending ORDER BY term.
    fn asc(&self) -> OrderBy {
        OrderBy {
            sql: format!("{} ASC", self.column_ref().qualified()),
        }
    }

    /// Descending ORDER BY term.
    fn desc(&self) -> OrderBy {
        OrderBy {
            sql: format!("{} DESC", self.column_ref().qualified()),
        }
    }
}

impl ColumnExt for ColumnRef {
    fn column_ref(&self) -> &ColumnRef {
        self
    }
}

/// A column handle carrying the Rust type its values decode to.
pub struct TypedColumn<T> {
    column: ColumnRef,
    _decodes: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedColumn<T> {
    fn clone(&self) -> Self {
        Self {
            column: self.column.clone(),
            _decodes: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for TypedColumn<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedColumn")
            .field("column", &self.column)
            .finish()
    }
}

impl<T> ColumnExt for TypedColumn<T> {
    fn column_ref(&self) -> &ColumnRef {
        &self.column
    }
}

/// Returns a typed handle to one of an entity's mapped columns.
///
/// # Errors
///
/// Returns [`OrmError::Schema`] when the entity has no column of this name.
pub fn col<T: FromValue>(entity: &EntityMap, name: &str) -> Result<TypedColumn<T>, OrmError> {
    Ok(TypedColumn {
        column: entity.col(name)?,
        _decodes: PhantomData,
    })
}

/// A literal value projected as its own result column.
#[derive(Debug, Clone)]
pub struct Lit<T> {
    value: T,
}

/// Projects a literal value.
pub fn lit<T: Clone + Into<Value>>(value: T) -> Lit<T> {
    Lit { value }
}

/// One projection slot of a select statement.
pub trait SelectItem {
    /// The Rust value this slot yields per row.
    type Output;

    /// Appends the slot's SQL to the select list.
    fn push_sql(&self, sql: &mut String, params: &mut Vec<Value>);

    /// The table the slot reads from, when it reads one.
    fn table(&self) -> Option<&str>;

    /// Decodes the slot from `row`, advancing `cursor` past the result
    /// columns it consumed.
    fn decode(&self, row: &Row<'_>, cursor: &mut usize) -> Result<Self::Output, OrmError>;
}

impl<T: FromValue> SelectItem for TypedColumn<T> {
    type Output = T;

    fn push_sql(&self, sql: &mut String, _params: &mut Vec<Value>) {
        sql.push_str(&self.column.qualified());
    }

    fn table(&self) -> Option<&str> {
        Some(&self.column.table)
    }

    fn decode(&self, row: &Row<'_>, cursor: &mut usize) -> Result<T, OrmError> {
        let index = *cursor;
        *cursor += 1;
        let stored = row.get_ref(index)?;
        let value = decode_value(&self.column.column, &self.column.sql_type, stored)?;
        let loaded = value.type_name();
        T::from_value(value).ok_or_else(|| OrmError::Decode {
            column: self.column.column.clone(),
            expected: T::EXPECTED.to_string(),
            got: loaded.to_string(),
        })
    }
}

fn push_entity_sql(map: &EntityMap, sql: &mut String) {
    let list = map
        .table()
        .columns
        .iter()
        .map(|column| {
            format!(
                "{}.{}",
                quote_ident(map.table_name()),
                quote_ident(&column.name)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    sql.push_str(&list);
}

fn decode_entity(map: &EntityMap, row: &Row<'_>, cursor: &mut usize) -> Result<Record, OrmError> {
    let mut loaded = Vec::with_capacity(map.table().columns.len());
    for column in &map.table().columns {
        let index = *cursor;
        *cursor += 1;
        let stored = row.get_ref(index)?;
        loaded.push((column.name.clone(), decode_value(&column.name, &column.sql_type, stored)?));
    }
    Ok(map.hydrate(loaded))
}

impl SelectItem for &EntityMap {
    type Output = Record;

    fn push_sql(&self, sql: &mut String, _params: &mut Vec<Value>) {
        push_entity_sql(self, sql);
    }

    fn table(&self) -> Option<&str> {
        Some(self.table_name())
    }

    fn decode(&self, row: &Row<'_>, cursor: &mut usize) -> Result<Record, OrmError> {
        decode_entity(self, row, cursor)
    }
}

impl SelectItem for &Arc<EntityMap> {
    type Output = Record;

    fn push_sql(&self, sql: &mut String, _params: &mut Vec<Value>) {
        push_entity_sql(self, sql);
    }

    fn table(&self) -> Option<&str> {
        Some(self.table_name())
    }

    fn decode(&self, row: &Row<'_>, cursor: &mut usize) -> Result<Record, OrmError> {
        decode_entity(self, row, cursor)
    }
}

impl<T: Clone + Into<Value>> SelectItem for Lit<T> {
    type Output = T;

    fn push_sql(&self, sql: &mut String, params: &mut Vec<Value>) {
        params.push(self.value.clone().into());
        sql.push_str(&format!("?{}", params.len()));
    }

    fn table(&self) -> Option<&str> {
        None
    }

    // The engine echoes a bound literal back unchanged, so the slot hands
    // out its own value instead of re-decoding the row.
    fn decode(&self, _row: &Row<'_>, cursor: &mut usize) -> Result<T, OrmError> {
        *cursor += 1;
        Ok(self.value.clone())
    }
}

/// A full projection: a tuple of one to three select items.
pub trait Selectable {
    /// The tuple of decoded values one row yields.
    type Row;

    /// Appends the comma-separated select list.
    fn push_select_sql(&self, sql: &mut String, params: &mut Vec<Value>);

    /// Collects the distinct tables read, in first-use order.
    fn tables(&self, out: &mut Vec<String>);

    /// Decodes one result row.
    fn decode_row(&self, row: &Row<'_>) -> Result<Self::Row, OrmError>;
}

macro_rules! impl_selectable {
    ($(($($item:ident : $index:tt),+))+) => {
        $(
            impl<$($item: SelectItem),+> Selectable for ($($item,)+) {
                type Row = ($($item::Output,)+);

                fn push_select_sql(&self, sql: &mut String, params: &mut Vec<Value>) {
                    let mut first = true;
                    $(
                        if !std::mem::replace(&mut first, false) {
                            sql.push_str(", ");
                        }
                        self.$index.push_sql(sql, params);
                    )+
                }

                fn tables(&self, out: &mut Vec<String>) {
                    $(
                        if let Some(table) = self.$index.table() {
                            if !out.iter().any(|seen| seen == table) {
                                out.push(table.to_string());
                            }
                        }
                    )+
                }

                fn decode_row(&self, row: &Row<'_>) -> Result<Self::Row, OrmError> {
                    let mut cursor = 0usize;
                    Ok(($(self.$index.decode(row, &mut cursor)?,)+))
                }
            }
        )+
    };
}

impl_selectable! {
    (A: 0)
    (A: 0, B: 1)
    (A: 0, B: 1, C: 2)
}

/// A select statement under construction.
#[derive(Debug, Clone)]
pub struct Select<S: Selectable> {
    items: S,
    filters: Vec<Filter>,
    order: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

/// Starts a typed select over the given projection tuple.
pub fn select<S: Selectable>(items: S) -> Select<S> {
    Select {
        items,
        filters: Vec::new(),
        order: Vec::new(),
        limit: None,
        offset: None,
    }
}

impl<S: Selectable> Select<S> {
    /// Adds a WHERE predicate. Multiple predicates are joined with AND.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds an ORDER BY term.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    /// Caps the number of returned rows.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips the first `offset` rows.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Renders to SQL plus the bind values in placeholder order.
    pub(crate) fn render(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();
        self.items.push_select_sql(&mut sql, &mut params);

        let mut tables = Vec::new();
        self.items.tables(&mut tables);
        if !tables.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(
                &tables
                    .iter()
                    .map(|name| quote_ident(name))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        if !self.filters.is_empty() {
            sql.push_str(" WHERE ");
            for (i, filter) in self.filters.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                filter.render(&mut sql, &mut params);
            }
        }

        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(
                &self
                    .order
                    .iter()
                    .map(|order| order.sql.clone())
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        // SQLite only accepts OFFSET after a LIMIT; -1 means unlimited.
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        (sql, params)
    }

    pub(crate) fn decode_row(&self, row: &Row<'_>) -> Result<S::Row, OrmError> {
        self.items.decode_row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_schema::{field, relation, EntityDef, Registry};
    use tabula_types::{optional, primary_key, text, uuid};

    fn library() -> (Registry, Arc<EntityMap>, Arc<EntityMap>) {
        let mut registry = Registry::new();
        let author = registry
            .register(
                EntityDef::new("Author")
                    .field(field("id", primary_key(uuid())))
                    .field(field("name", text()))
                    .relation(relation("books", "Book").uselist(true).back_populates("author")),
            )
            .expect("author should register")
            .expect("author is concrete");
        let book = registry
            .register(
                EntityDef::new("Book")
                    .field(field("id", primary_key(uuid())))
                    .field(field("title", text()))
                    .field(field("author_id", optional(uuid())).foreign_key("author.id"))
                    .relation(relation("author", "Author").back_populates("books")),
            )
            .expect("book should register")
            .expect("book is concrete");
        (registry, author, book)
    }

    #[test]
    fn entity_projection_lists_every_column() {
        let (_registry, author, _book) = library();
        let (sql, params) = select((&author,)).render();
        assert_eq!(
            sql,
            "SELECT \"author\".\"id\", \"author\".\"name\" FROM \"author\""
        );
        assert!(params.is_empty());
    }

    #[test]
    fn filters_order_and_paging_render_in_clause_order() {
        let (_registry, author, _book) = library();
        let name = col::<String>(&author, "name").expect("name column exists");
        let (sql, params) = select((name.clone(),))
            .filter(name.ne("anonymous"))
            .order_by(name.asc())
            .limit(5)
            .offset(2)
            .render();
        assert_eq!(
            sql,
            "SELECT \"author\".\"name\" FROM \"author\" \
             WHERE \"author\".\"name\" != ?1 \
             ORDER BY \"author\".\"name\" ASC LIMIT 5 OFFSET 2"
        );
        assert_eq!(params, vec![Value::Text("anonymous".to_string())]);
    }

    #[test]
    fn offset_without_limit_renders_unlimited_limit() {
        let (_registry, author, _book) = library();
        let (sql, _params) = select((&author,)).offset(10).render();
        assert!(sql.ends_with("LIMIT -1 OFFSET 10"));
    }

    #[test]
    fn literal_params_are_numbered_before_filter_params() {
        let (_registry, author, _book) = library();
        let name = col::<String>(&author, "name").expect("name column exists");
        let (sql, params) = select((lit(7i64), name.clone()))
            .filter(name.eq("ursula"))
            .render();
        assert_eq!(
            sql,
            "SELECT ?1, \"author\".\"name\" FROM \"author\" \
             WHERE \"author\".\"name\" = ?2"
        );
        assert_eq!(
            params,
            vec![Value::Int(7), Value::Text("ursula".to_string())]
        );
    }

    #[test]
    fn all_literal_projection_has_no_from_clause() {
        let (sql, params) = select((lit(1i64), lit("pelican"))).render();
        assert_eq!(sql, "SELECT ?1, ?2");
        assert_eq!(
            params,
            vec![Value::Int(1), Value::Text("pelican".to_string())]
        );
    }

    #[test]
    fn combined_filters_group_with_parentheses() {
        let (_registry, _author, book) = library();
        let title = col::<String>(&book, "title").expect("title column exists");
        let author_id = book.col("author_id").expect("author_id column exists");
        let (sql, params) = select((&book,))
            .filter(title.like("The %").or(author_id.is_null()))
            .render();
        assert!(sql.contains(
            "WHERE (\"book\".\"title\" LIKE ?1) OR (\"book\".\"author_id\" IS NULL)"
        ));
        assert_eq!(params, vec![Value::Text("The %".to_string())]);
    }

    #[test]
    fn multiple_filter_calls_join_with_and() {
        let (_registry, author, _book) = library();
        let name = col::<String>(&author, "name").expect("name column exists");
        let (sql, _params) = select((&author,))
            .filter(name.ge("a"))
            .filter(name.lt("n"))
            .render();
        assert!(sql.contains("WHERE \"author\".\"name\" >= ?1 AND \"author\".\"name\" < ?2"));
    }

    #[test]
    fn mixed_projection_reads_tables_in_first_use_order() {
        let (_registry, author, book) = library();
        let title = col::<String>(&book, "title").expect("title column exists");
        let (sql, _params) = select((title, &author)).render();
        assert!(sql.ends_with("FROM \"book\", \"author\""));
    }
}
