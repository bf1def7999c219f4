/// Row store traits for rowio.
///
/// `RowStore` is the narrow primitive-operation contract implemented by
/// concrete stores (e.g. SQLite). Resolvers and prepared operations are
/// written against it and never see a concrete connection.
use crate::error::Result;
use crate::query::{DeleteQuery, InsertQuery, Query, UpdateQuery};
use crate::types::{Row, RowId};

/// Primitive persistence operations plus a transaction boundary.
///
/// Implementors must be `Send + Sync` so they can be shared across threads.
pub trait RowStore: Send + Sync {
    /// Insert `row` into the query's table and return the new row id.
    fn insert(&self, query: &InsertQuery, row: &Row) -> Result<RowId>;

    /// Apply `row` to every row matching the query predicate. Returns the
    /// number of rows affected.
    fn update(&self, query: &UpdateQuery, row: &Row) -> Result<usize>;

    /// Delete every row matching the query predicate. Returns the number of
    /// rows removed.
    fn delete(&self, query: &DeleteQuery) -> Result<usize>;

    /// Run a read query.
    fn query(&self, query: &Query) -> Result<Cursor>;

    /// Execute a closure inside a store transaction.
    ///
    /// Implementations must commit when `f` returns `Ok` and roll back when
    /// it returns `Err`. Calls may nest; a nested failure rolls back only the
    /// nested scope.
    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;
}

// ============================================================================
// Cursor
// ============================================================================

/// Forward-only, single-traversal result of a read.
#[derive(Debug)]
pub struct Cursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Row>,
}

impl Cursor {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: rows.into_iter(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Column names in projection order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.rows.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Cursor {}
