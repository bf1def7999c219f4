//! Db<S>: the operation executor. Binds a [`RowStore`], a [`ChangeBus`] and a
//! [`Scheduler`], and hands out prepared operations.
//!
//! # Threading model
//!
//! `Db<S>` is `Send + Sync` and cheap to clone. Two locks matter:
//!   - `writes`: a `parking_lot::ReentrantMutex` held for the duration of
//!     every mutation and transaction. It makes "store commit, then publish"
//!     atomic with respect to other writers, so notifications go out in
//!     commit order. Reads never take it.
//!   - the bus's own publish lock, taken inside `writes`.
//!
//! Both are reentrant, so a change listener running inline may itself write.
//!
//! # Transactions
//!
//! Inside [`Db::transaction`] mutations record their affected tables instead
//! of publishing. The outermost commit publishes the union once; a rollback
//! or panic at any depth discards what that scope recorded.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::changes::{ChangeBus, ChangeStream, Changes, Unsubscribe};
use crate::error::Result;
use crate::operation::{
    DeleteResolver, Immediate, PreparedDeleteAll, PreparedDeleteByQuery, PreparedDeleteObject,
    PreparedGet, PreparedPut, PreparedPutAll, PutResolver, Scheduler,
};
use crate::query::{DeleteQuery, Query};
use crate::storage::RowStore;

#[derive(Default)]
struct PendingChanges {
    depth: u32,
    tables: BTreeSet<String>,
}

struct DbInner<S> {
    store: S,
    bus: ChangeBus,
    writes: ReentrantMutex<RefCell<PendingChanges>>,
    scheduler: Arc<dyn Scheduler>,
}

pub struct Db<S: RowStore> {
    inner: Arc<DbInner<S>>,
}

impl<S: RowStore> Clone for Db<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RowStore + 'static> Db<S> {
    /// Observable work runs inline on the subscribing or publishing thread.
    pub fn new(store: S) -> Self {
        Self::with_scheduler(store, Arc::new(Immediate))
    }

    pub fn with_scheduler(store: S, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            inner: Arc::new(DbInner {
                store,
                bus: ChangeBus::new(),
                writes: ReentrantMutex::new(RefCell::new(PendingChanges::default())),
                scheduler,
            }),
        }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.inner.bus
    }

    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.inner.scheduler)
    }

    // ------------------------------------------------------------------------
    // Prepared operations
    // ------------------------------------------------------------------------

    pub fn put<T>(&self, object: T, resolver: impl PutResolver<S, T> + 'static) -> PreparedPut<S, T>
    where
        T: Send + Sync + 'static,
    {
        PreparedPut::new(self.clone(), object, Arc::new(resolver))
    }

    pub fn put_all<T>(
        &self,
        objects: Vec<T>,
        resolver: impl PutResolver<S, T> + 'static,
    ) -> PreparedPutAll<S, T>
    where
        T: Send + Sync + 'static,
    {
        PreparedPutAll::new(self.clone(), objects, Arc::new(resolver))
    }

    pub fn get(&self, query: Query) -> PreparedGet<S> {
        PreparedGet::new(self.clone(), query)
    }

    pub fn delete<T>(
        &self,
        object: T,
        resolver: impl DeleteResolver<S, T> + 'static,
    ) -> PreparedDeleteObject<S, T>
    where
        T: Send + Sync + 'static,
    {
        PreparedDeleteObject::new(self.clone(), object, Arc::new(resolver))
    }

    pub fn delete_all<T>(
        &self,
        objects: Vec<T>,
        resolver: impl DeleteResolver<S, T> + 'static,
    ) -> PreparedDeleteAll<S, T>
    where
        T: Send + Sync + 'static,
    {
        PreparedDeleteAll::new(self.clone(), objects, Arc::new(resolver))
    }

    pub fn delete_by_query(&self, query: DeleteQuery) -> PreparedDeleteByQuery<S> {
        PreparedDeleteByQuery::new(self.clone(), query)
    }

    // ------------------------------------------------------------------------
    // Change notifications
    // ------------------------------------------------------------------------

    pub fn observe_changes_in<I, T>(&self, tables: I) -> ChangeStream
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.inner.bus.observe_changes_in(tables)
    }

    pub fn on_changes<I, T>(
        &self,
        tables: I,
        callback: impl Fn(&Changes) + Send + Sync + 'static,
    ) -> Unsubscribe
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.inner.bus.subscribe(tables, callback)
    }

    // ------------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------------

    /// Run `f` inside one store transaction.
    ///
    /// Mutations made through the `Db` passed to `f` are committed together
    /// and produce a single notification covering every affected table. On
    /// `Err` or panic the store rolls back and nothing is published. Nested
    /// calls become savepoints.
    pub fn transaction<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Db<S>) -> Result<R>,
    {
        let gate = self.inner.writes.lock();
        let snapshot = {
            let mut pending = gate.borrow_mut();
            pending.depth += 1;
            pending.tables.clone()
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.inner.store.transaction(|_| f(self))
        }));

        let to_publish = {
            let mut pending = gate.borrow_mut();
            pending.depth -= 1;
            if !matches!(outcome, Ok(Ok(_))) {
                pending.tables = snapshot;
            }
            if pending.depth == 0 {
                std::mem::take(&mut pending.tables)
            } else {
                BTreeSet::new()
            }
        };

        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                tracing::warn!("transaction closure panicked, discarding buffered changes");
                panic::resume_unwind(payload)
            }
        };
        if !to_publish.is_empty() {
            self.inner.bus.publish(to_publish);
        }

        result
    }

    /// Run a store mutation under the write gate and publish (or buffer) the
    /// tables it reports.
    pub(crate) fn mutate<R>(
        &self,
        op: impl FnOnce(&S) -> Result<R>,
        affected: impl FnOnce(&R) -> BTreeSet<String>,
    ) -> Result<R> {
        let _gate = self.inner.writes.lock();
        let result = op(&self.inner.store)?;
        self.notify(affected(&result));
        Ok(result)
    }

    fn notify(&self, tables: BTreeSet<String>) {
        let gate = self.inner.writes.lock();
        let buffered = {
            let mut pending = gate.borrow_mut();
            if pending.depth > 0 {
                pending.tables.extend(tables.iter().cloned());
                true
            } else {
                false
            }
        };
        if !buffered {
            self.inner.bus.publish(tables);
        }
    }
}
