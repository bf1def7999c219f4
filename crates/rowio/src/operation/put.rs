//! Put: insert-or-update of one object.
//!
//! [`DefaultPutResolver`] maps the object to a [`Row`] and decides by its
//! identifier column. A row without an identifier (or with a NULL one) is
//! inserted. Otherwise the row is updated by identifier, and if no row
//! matched it is inserted with the identifier it carries. Both steps run in
//! one store transaction so a concurrent writer can't slip in between.

use std::sync::Arc;

use crate::db::Db;
use crate::error::Result;
use crate::query::{quote_identifier, InsertQuery, UpdateQuery};
use crate::storage::RowStore;
use crate::types::{PutResult, Row, Value};

use super::observable::Observable;

/// Column the default resolvers treat as the row identifier.
pub const DEFAULT_ID_COLUMN: &str = "_id";

pub type ToRowFn<T> = dyn Fn(&T) -> Row + Send + Sync;

/// Strategy for writing one object to a store.
pub trait PutResolver<S: RowStore, T>: Send + Sync {
    fn perform_put(&self, store: &S, object: &T) -> Result<PutResult>;
}

impl<S: RowStore, T, R: PutResolver<S, T> + ?Sized> PutResolver<S, T> for Arc<R> {
    fn perform_put(&self, store: &S, object: &T) -> Result<PutResult> {
        (**self).perform_put(store, object)
    }
}

pub struct DefaultPutResolver<T> {
    table: String,
    id_column: String,
    null_column_hack: Option<String>,
    to_row: Arc<ToRowFn<T>>,
}

impl<T> DefaultPutResolver<T> {
    pub fn new(table: impl Into<String>, to_row: impl Fn(&T) -> Row + Send + Sync + 'static) -> Self {
        Self {
            table: table.into(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            null_column_hack: None,
            to_row: Arc::new(to_row),
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Column set to NULL when inserting a row with no values.
    pub fn with_null_column_hack(mut self, column: impl Into<String>) -> Self {
        self.null_column_hack = Some(column.into());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    fn insert<S: RowStore>(&self, store: &S, row: &Row) -> Result<PutResult> {
        let mut builder = InsertQuery::builder().table(&self.table);
        if let Some(column) = &self.null_column_hack {
            builder = builder.null_column_hack(column);
        }
        let id = store.insert(&builder.build()?, row)?;
        Ok(PutResult::inserted(id, &self.table))
    }

    fn put_row<S: RowStore>(&self, store: &S, row: &Row) -> Result<PutResult> {
        let id = match row.get(&self.id_column) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.clone()),
        };

        let Some(id) = id else {
            tracing::debug!(table = %self.table, "put: no identifier, inserting");
            return self.insert(store, row);
        };

        let query = UpdateQuery::builder()
            .table(&self.table)
            .where_clause(format!("{} = ?", quote_identifier(&self.id_column)))
            .where_args([id.clone()])
            .build()?;
        let updated = store.update(&query, row)?;
        if updated > 0 {
            tracing::debug!(table = %self.table, %id, rows = updated, "put: updated");
            return Ok(PutResult::updated(updated, &self.table));
        }

        tracing::debug!(table = %self.table, %id, "put: no row matched, inserting");
        self.insert(store, row)
    }
}

impl<S: RowStore, T> PutResolver<S, T> for DefaultPutResolver<T> {
    fn perform_put(&self, store: &S, object: &T) -> Result<PutResult> {
        let row = (self.to_row)(object);
        store.transaction(|store| self.put_row(store, &row))
    }
}

// ============================================================================
// Prepared operations
// ============================================================================

/// A put bound to a database, an object and a resolver.
pub struct PreparedPut<S: RowStore, T> {
    db: Db<S>,
    object: Arc<T>,
    resolver: Arc<dyn PutResolver<S, T>>,
}

impl<S: RowStore + 'static, T: Send + Sync + 'static> PreparedPut<S, T> {
    pub(crate) fn new(db: Db<S>, object: T, resolver: Arc<dyn PutResolver<S, T>>) -> Self {
        Self {
            db,
            object: Arc::new(object),
            resolver,
        }
    }

    pub fn execute_as_blocking(&self) -> Result<PutResult> {
        put_one(&self.db, &*self.resolver, &self.object)
    }

    /// One-shot observable: emits the result then completes.
    pub fn as_observable(self) -> Observable<PutResult> {
        let scheduler = self.db.scheduler();
        Observable::once(move || self.execute_as_blocking(), scheduler)
    }
}

/// Puts a batch of objects in one transaction with one merged notification.
pub struct PreparedPutAll<S: RowStore, T> {
    db: Db<S>,
    objects: Arc<Vec<T>>,
    resolver: Arc<dyn PutResolver<S, T>>,
}

impl<S: RowStore + 'static, T: Send + Sync + 'static> PreparedPutAll<S, T> {
    pub(crate) fn new(db: Db<S>, objects: Vec<T>, resolver: Arc<dyn PutResolver<S, T>>) -> Self {
        Self {
            db,
            objects: Arc::new(objects),
            resolver,
        }
    }

    pub fn execute_as_blocking(&self) -> Result<Vec<PutResult>> {
        self.db.transaction(|db| {
            self.objects
                .iter()
                .map(|object| put_one(db, &*self.resolver, object))
                .collect()
        })
    }

    pub fn as_observable(self) -> Observable<Vec<PutResult>> {
        let scheduler = self.db.scheduler();
        Observable::once(move || self.execute_as_blocking(), scheduler)
    }
}

fn put_one<S: RowStore + 'static, T>(
    db: &Db<S>,
    resolver: &dyn PutResolver<S, T>,
    object: &T,
) -> Result<PutResult> {
    db.mutate(
        |store| resolver.perform_put(store, object),
        |result| result.affected_tables().clone(),
    )
}
