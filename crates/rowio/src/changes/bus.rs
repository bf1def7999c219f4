//! ChangeBus: in-process publish/subscribe of table-level [`Changes`].
//!
//! # Ordering
//!
//! Publishes are serialized by a `parking_lot::ReentrantMutex`: a publish
//! delivers to every interested listener before the next publish (from any
//! thread) starts, so each listener observes notifications in publish order.
//! The mutex is reentrant so a listener may itself publish; that nested
//! notification is delivered before the outer round continues.
//!
//! Distinct publishes are never merged. Grouping several mutations into one
//! notification is the caller's job (see `Db::transaction`).

use std::cell::Cell;
use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tokio::sync::mpsc;

use super::event::Changes;
use super::registry::ListenerRegistry;

/// An owned one-shot closure that removes a subscription when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

struct BusInner {
    listeners: ListenerRegistry<Changes>,
    /// Serializes delivery; holds the last assigned sequence number.
    publish_lock: ReentrantMutex<Cell<u64>>,
}

/// Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: ListenerRegistry::new(),
                publish_lock: ReentrantMutex::new(Cell::new(0)),
            }),
        }
    }

    /// Call `callback` for every publish that touches any of `tables`.
    pub fn subscribe<I, S>(
        &self,
        tables: I,
        callback: impl Fn(&Changes) + Send + Sync + 'static,
    ) -> Unsubscribe
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables: BTreeSet<String> = tables.into_iter().map(Into::into).collect();
        let id = self.inner.listeners.register(tables, callback);
        let inner = Arc::clone(&self.inner);
        Box::new(move || inner.listeners.remove(id))
    }

    /// Stream of notifications touching any of `tables`. The registration
    /// is released when the stream is dropped.
    pub fn observe_changes_in<I, S>(&self, tables: I) -> ChangeStream
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let unsubscribe = self.subscribe(tables, move |changes| {
            let _ = tx.send(changes.clone());
        });
        ChangeStream {
            rx,
            unsubscribe: Some(unsubscribe),
        }
    }

    /// Deliver one notification for `tables` to every interested listener.
    ///
    /// Returns the published [`Changes`], or `None` if `tables` is empty.
    /// A panicking listener is logged and skipped; the remaining listeners
    /// still run.
    pub fn publish<I, S>(&self, tables: I) -> Option<Changes>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables: BTreeSet<String> = tables.into_iter().map(Into::into).collect();
        if tables.is_empty() {
            return None;
        }

        let seq_guard = self.inner.publish_lock.lock();
        let sequence = seq_guard.get() + 1;
        seq_guard.set(sequence);

        let changes = Changes::new(tables, sequence);
        let snapshot = self.inner.listeners.snapshot_for(changes.tables());
        tracing::trace!(
            sequence,
            tables = ?changes.tables(),
            listeners = snapshot.len(),
            "publishing changes"
        );

        for callback in snapshot {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&changes);
            }));
            if result.is_err() {
                tracing::warn!(sequence, "change listener panicked");
            }
        }
        drop(seq_guard);

        Some(changes)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Number of listeners watching `table`.
    pub fn listener_count_for(&self, table: &str) -> usize {
        self.inner.listeners.len_for(table)
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ChangeStream
// ============================================================================

/// Async stream of [`Changes`] returned by [`ChangeBus::observe_changes_in`].
pub struct ChangeStream {
    rx: mpsc::UnboundedReceiver<Changes>,
    unsubscribe: Option<Unsubscribe>,
}

impl ChangeStream {
    /// Wait for the next notification. Returns `None` once the stream has
    /// been closed.
    pub async fn next(&mut self) -> Option<Changes> {
        self.rx.recv().await
    }

    /// Next already-delivered notification, without waiting.
    pub fn try_next(&mut self) -> Option<Changes> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving. Notifications already delivered can still be drained.
    pub fn close(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
        self.rx.close();
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}
