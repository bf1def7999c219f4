//! Delete: by object (through a resolver) or by query.
//!
//! A delete always publishes a notification for its table, even when no row
//! matched.

use std::sync::Arc;

use crate::db::Db;
use crate::error::{QueryError, Result};
use crate::query::{quote_identifier, DeleteQuery};
use crate::storage::RowStore;
use crate::types::{DeleteResult, Value};

use super::observable::Observable;
use super::put::DEFAULT_ID_COLUMN;

pub type IdFn<T> = dyn Fn(&T) -> Value + Send + Sync;

/// Strategy for removing one object from a store.
pub trait DeleteResolver<S: RowStore, T>: Send + Sync {
    fn perform_delete(&self, store: &S, object: &T) -> Result<DeleteResult>;
}

impl<S: RowStore, T, R: DeleteResolver<S, T> + ?Sized> DeleteResolver<S, T> for Arc<R> {
    fn perform_delete(&self, store: &S, object: &T) -> Result<DeleteResult> {
        (**self).perform_delete(store, object)
    }
}

/// Deletes the row whose identifier column equals the object's identifier.
///
/// An object with a NULL identifier is rejected with
/// [`QueryError::MissingIdentifier`] rather than deleting nothing silently.
pub struct DefaultDeleteResolver<T> {
    table: String,
    id_column: String,
    id_of: Arc<IdFn<T>>,
}

impl<T: 'static> DefaultDeleteResolver<T> {
    pub fn new<V>(table: impl Into<String>, id_of: impl Fn(&T) -> V + Send + Sync + 'static) -> Self
    where
        V: Into<Value> + 'static,
    {
        Self {
            table: table.into(),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            id_of: Arc::new(move |object: &T| -> Value { id_of(object).into() }),
        }
    }

    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }
}

impl<S: RowStore, T> DeleteResolver<S, T> for DefaultDeleteResolver<T> {
    fn perform_delete(&self, store: &S, object: &T) -> Result<DeleteResult> {
        let id = (self.id_of)(object);
        if id.is_null() {
            return Err(QueryError::MissingIdentifier {
                table: self.table.clone(),
                column: self.id_column.clone(),
            }
            .into());
        }

        let query = DeleteQuery::builder()
            .table(&self.table)
            .where_clause(format!("{} = ?", quote_identifier(&self.id_column)))
            .where_args([id])
            .build()?;
        let deleted = store.delete(&query)?;
        Ok(DeleteResult::new(deleted, &self.table))
    }
}

// ============================================================================
// Prepared operations
// ============================================================================

pub struct PreparedDeleteObject<S: RowStore, T> {
    db: Db<S>,
    object: Arc<T>,
    resolver: Arc<dyn DeleteResolver<S, T>>,
}

impl<S: RowStore + 'static, T: Send + Sync + 'static> PreparedDeleteObject<S, T> {
    pub(crate) fn new(db: Db<S>, object: T, resolver: Arc<dyn DeleteResolver<S, T>>) -> Self {
        Self {
            db,
            object: Arc::new(object),
            resolver,
        }
    }

    pub fn execute_as_blocking(&self) -> Result<DeleteResult> {
        delete_one(&self.db, &*self.resolver, &self.object)
    }

    pub fn as_observable(self) -> Observable<DeleteResult> {
        let scheduler = self.db.scheduler();
        Observable::once(move || self.execute_as_blocking(), scheduler)
    }
}

/// Deletes a batch of objects in one transaction with one merged notification.
pub struct PreparedDeleteAll<S: RowStore, T> {
    db: Db<S>,
    objects: Arc<Vec<T>>,
    resolver: Arc<dyn DeleteResolver<S, T>>,
}

impl<S: RowStore + 'static, T: Send + Sync + 'static> PreparedDeleteAll<S, T> {
    pub(crate) fn new(
        db: Db<S>,
        objects: Vec<T>,
        resolver: Arc<dyn DeleteResolver<S, T>>,
    ) -> Self {
        Self {
            db,
            objects: Arc::new(objects),
            resolver,
        }
    }

    pub fn execute_as_blocking(&self) -> Result<Vec<DeleteResult>> {
        self.db.transaction(|db| {
            self.objects
                .iter()
                .map(|object| delete_one(db, &*self.resolver, object))
                .collect()
        })
    }

    pub fn as_observable(self) -> Observable<Vec<DeleteResult>> {
        let scheduler = self.db.scheduler();
        Observable::once(move || self.execute_as_blocking(), scheduler)
    }
}

/// Deletes every row matching a [`DeleteQuery`].
pub struct PreparedDeleteByQuery<S: RowStore> {
    db: Db<S>,
    query: DeleteQuery,
}

impl<S: RowStore + 'static> PreparedDeleteByQuery<S> {
    pub(crate) fn new(db: Db<S>, query: DeleteQuery) -> Self {
        Self { db, query }
    }

    pub fn execute_as_blocking(&self) -> Result<DeleteResult> {
        self.db.mutate(
            |store| {
                let deleted = store.delete(&self.query)?;
                Ok(DeleteResult::new(deleted, self.query.table()))
            },
            |result| result.affected_tables().clone(),
        )
    }

    pub fn as_observable(self) -> Observable<DeleteResult> {
        let scheduler = self.db.scheduler();
        Observable::once(move || self.execute_as_blocking(), scheduler)
    }
}

fn delete_one<S: RowStore + 'static, T>(
    db: &Db<S>,
    resolver: &dyn DeleteResolver<S, T>,
    object: &T,
) -> Result<DeleteResult> {
    db.mutate(
        |store| resolver.perform_delete(store, object),
        |result| result.affected_tables().clone(),
    )
}
