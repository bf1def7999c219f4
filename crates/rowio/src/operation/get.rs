//! Get: reads as a list, a single object, or a raw cursor.
//!
//! Every prepared read can run once (`execute_as_blocking`) or become a live
//! [`Observable`] that re-runs after each change to the queried table plus
//! any tables added with [`PreparedGet::observe_tables`].

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::Db;
use crate::error::{MappingError, Result, RowioError};
use crate::query::Query;
use crate::storage::{Cursor, RowStore};
use crate::types::Row;

use super::observable::Observable;

pub type MapFn<T> = dyn Fn(&Row) -> std::result::Result<T, MappingError> + Send + Sync;

/// Strategy for running a read against a store.
pub trait GetResolver<S: RowStore>: Send + Sync {
    fn perform_get(&self, store: &S, query: &Query) -> Result<Cursor>;
}

impl<S: RowStore, R: GetResolver<S> + ?Sized> GetResolver<S> for Arc<R> {
    fn perform_get(&self, store: &S, query: &Query) -> Result<Cursor> {
        (**self).perform_get(store, query)
    }
}

/// Passes the query straight to [`RowStore::query`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGetResolver;

impl<S: RowStore> GetResolver<S> for DefaultGetResolver {
    fn perform_get(&self, store: &S, query: &Query) -> Result<Cursor> {
        store.query(query)
    }
}

/// Map every row of `cursor`. The first failure aborts the read and is
/// reported with its zero-based row index.
pub fn map_rows<T>(table: &str, cursor: Cursor, map: &MapFn<T>) -> Result<Vec<T>> {
    cursor
        .enumerate()
        .map(|(row, values)| {
            map(&values).map_err(|source| RowioError::Mapping {
                table: table.to_string(),
                row,
                source,
            })
        })
        .collect()
}

// ============================================================================
// PreparedGet
// ============================================================================

/// A read bound to a database and a query. Pick a result shape with
/// [`list_of`](Self::list_of), [`object`](Self::object) or
/// [`cursor`](Self::cursor).
pub struct PreparedGet<S: RowStore> {
    db: Db<S>,
    query: Query,
    resolver: Arc<dyn GetResolver<S>>,
    extra_tables: BTreeSet<String>,
}

impl<S: RowStore + 'static> PreparedGet<S> {
    pub(crate) fn new(db: Db<S>, query: Query) -> Self {
        Self {
            db,
            query,
            resolver: Arc::new(DefaultGetResolver),
            extra_tables: BTreeSet::new(),
        }
    }

    pub fn with_resolver(mut self, resolver: impl GetResolver<S> + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Also re-run live observers when any of `tables` changes.
    pub fn observe_tables<I, T>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.extra_tables.extend(tables.into_iter().map(Into::into));
        self
    }

    pub fn list_of<T>(
        self,
        map: impl Fn(&Row) -> std::result::Result<T, MappingError> + Send + Sync + 'static,
    ) -> PreparedGetList<S, T> {
        PreparedGetList {
            read: self.into_read(),
            map: Arc::new(map),
        }
    }

    pub fn object<T>(
        self,
        map: impl Fn(&Row) -> std::result::Result<T, MappingError> + Send + Sync + 'static,
    ) -> PreparedGetObject<S, T> {
        PreparedGetObject {
            read: self.into_read(),
            map: Arc::new(map),
        }
    }

    pub fn cursor(self) -> PreparedGetCursor<S> {
        PreparedGetCursor {
            read: self.into_read(),
        }
    }

    fn into_read(self) -> Read<S> {
        let mut tables = self.extra_tables;
        tables.insert(self.query.table().to_string());
        Read {
            db: self.db,
            query: self.query,
            resolver: self.resolver,
            tables,
        }
    }
}

struct Read<S: RowStore> {
    db: Db<S>,
    query: Query,
    resolver: Arc<dyn GetResolver<S>>,
    tables: BTreeSet<String>,
}

impl<S: RowStore + 'static> Read<S> {
    fn run(&self) -> Result<Cursor> {
        self.resolver.perform_get(self.db.store(), &self.query)
    }

    fn table(&self) -> &str {
        self.query.table()
    }

    fn observe<T: Send + 'static>(
        self,
        shape: impl Fn(&Self) -> Result<T> + Send + Sync + 'static,
    ) -> Observable<T> {
        let scheduler = self.db.scheduler();
        let bus = self.db.bus().clone();
        let tables = self.tables.clone();
        Observable::live(move || shape(&self), scheduler, bus, tables)
    }
}

// ============================================================================
// Result shapes
// ============================================================================

pub struct PreparedGetList<S: RowStore, T> {
    read: Read<S>,
    map: Arc<MapFn<T>>,
}

impl<S: RowStore + 'static, T: Send + 'static> PreparedGetList<S, T> {
    pub fn execute_as_blocking(&self) -> Result<Vec<T>> {
        let cursor = self.read.run()?;
        map_rows(self.read.table(), cursor, &*self.map)
    }

    pub fn observed_tables(&self) -> &BTreeSet<String> {
        &self.read.tables
    }

    pub fn as_observable(self) -> Observable<Vec<T>> {
        let map = self.map;
        self.read
            .observe(move |read| map_rows(read.table(), read.run()?, &*map))
    }
}

/// Maps only the first row; `None` when the query matched nothing.
pub struct PreparedGetObject<S: RowStore, T> {
    read: Read<S>,
    map: Arc<MapFn<T>>,
}

impl<S: RowStore + 'static, T: Send + 'static> PreparedGetObject<S, T> {
    pub fn execute_as_blocking(&self) -> Result<Option<T>> {
        first_of(&self.read, &*self.map)
    }

    pub fn observed_tables(&self) -> &BTreeSet<String> {
        &self.read.tables
    }

    pub fn as_observable(self) -> Observable<Option<T>> {
        let map = self.map;
        self.read.observe(move |read| first_of(read, &*map))
    }
}

fn first_of<S: RowStore + 'static, T>(read: &Read<S>, map: &MapFn<T>) -> Result<Option<T>> {
    let mut cursor = read.run()?;
    match cursor.next() {
        None => Ok(None),
        Some(row) => map(&row)
            .map(Some)
            .map_err(|source| RowioError::Mapping {
                table: read.table().to_string(),
                row: 0,
                source,
            }),
    }
}

pub struct PreparedGetCursor<S: RowStore> {
    read: Read<S>,
}

impl<S: RowStore + 'static> PreparedGetCursor<S> {
    pub fn execute_as_blocking(&self) -> Result<Cursor> {
        self.read.run()
    }

    pub fn observed_tables(&self) -> &BTreeSet<String> {
        &self.read.tables
    }

    pub fn as_observable(self) -> Observable<Cursor> {
        self.read.observe(|read| read.run())
    }
}
