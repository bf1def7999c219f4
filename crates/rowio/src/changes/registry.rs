//! ListenerRegistry<T>: listeners indexed by the table names they watch.
//!
//! Listeners are stored as `Arc<dyn Fn(&T)>` so snapshots are cheap.
//! Snapshot-on-dispatch semantics mean:
//!   - A listener removed *during* dispatch is still called in that round.
//!   - A listener added *during* dispatch is NOT called until the next round.
//!
//! All methods take `&self` (interior mutability via `parking_lot::Mutex`),
//! and the lock is never held while a listener runs, so listeners may
//! register or remove listeners without deadlocking.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Returned by [`ListenerRegistry::register`]; pass to `remove`.
pub type ListenerId = u64;

/// Closure type for listeners.
pub type ListenerFn<T> = dyn Fn(&T) + Send + Sync;

struct Entry<T> {
    tables: BTreeSet<String>,
    callback: Arc<ListenerFn<T>>,
}

struct Inner<T> {
    /// Ordered by id, i.e. registration order.
    listeners: BTreeMap<ListenerId, Entry<T>>,
    by_table: HashMap<String, BTreeSet<ListenerId>>,
}

pub struct ListenerRegistry<T> {
    inner: Mutex<Inner<T>>,
    next_id: AtomicU64,
}

impl<T> ListenerRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                listeners: BTreeMap::new(),
                by_table: HashMap::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` for every table in `tables`.
    pub fn register(
        &self,
        tables: BTreeSet<String>,
        callback: impl Fn(&T) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        for table in &tables {
            inner.by_table.entry(table.clone()).or_default().insert(id);
        }
        inner.listeners.insert(
            id,
            Entry {
                tables,
                callback: Arc::new(callback),
            },
        );
        id
    }

    /// Does nothing if `id` is not present (safe to call multiple times).
    pub fn remove(&self, id: ListenerId) {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.listeners.remove(&id) else {
            return;
        };
        for table in &entry.tables {
            if let Some(ids) = inner.by_table.get_mut(table) {
                ids.remove(&id);
                if ids.is_empty() {
                    inner.by_table.remove(table);
                }
            }
        }
    }

    /// Listeners interested in any of `tables`, each at most once, in
    /// registration order. The lock is released before this returns.
    pub fn snapshot_for<'a>(
        &self,
        tables: impl IntoIterator<Item = &'a String>,
    ) -> Vec<Arc<ListenerFn<T>>> {
        let inner = self.inner.lock();
        let mut ids = BTreeSet::new();
        for table in tables {
            if let Some(found) = inner.by_table.get(table) {
                ids.extend(found.iter().copied());
            }
        }
        ids.iter()
            .filter_map(|id| inner.listeners.get(id))
            .map(|entry| Arc::clone(&entry.callback))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of listeners watching `table`.
    pub fn len_for(&self, table: &str) -> usize {
        self.inner.lock().by_table.get(table).map_or(0, |ids| ids.len())
    }
}

impl<T> Default for ListenerRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
