//! Observable<T>: the streaming execution mode of a prepared operation.
//!
//! # Lifecycle
//!
//! Subscribing schedules the operation on the injected [`Scheduler`].
//! A one-shot observable emits `Next(value)` then `Completed`, or a single
//! `Error`. A live observable registers on the [`ChangeBus`] for its tables
//! *before* the first execution, emits `Next` for the initial result and
//! again after every notification touching those tables, and only stops on
//! [`Subscription::unsubscribe`] or on the first error (which is terminal
//! and releases the bus registration).
//!
//! # Ordering
//!
//! Re-executions for one subscription go through a serial queue: each
//! notification enqueues one run and a single drain loop executes them, so
//! emissions follow notification order under any scheduler.
//!
//! Cancellation is cooperative. A run already in flight is not interrupted,
//! but its result is discarded once the subscription is cancelled.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::changes::{ChangeBus, Unsubscribe};
use crate::error::{Result, RowioError};

use super::scheduler::Scheduler;

/// Signal delivered to an observer.
#[derive(Debug)]
pub enum Event<T> {
    Next(T),
    Error(RowioError),
    Completed,
}

type Operation<T> = dyn Fn() -> Result<T> + Send + Sync;
type Observer<T> = dyn Fn(Event<T>) + Send + Sync;

struct LiveSource {
    bus: ChangeBus,
    tables: BTreeSet<String>,
}

pub struct Observable<T> {
    operation: Arc<Operation<T>>,
    scheduler: Arc<dyn Scheduler>,
    live: Option<LiveSource>,
}

impl<T: Send + 'static> Observable<T> {
    /// Runs `operation` once per subscription.
    pub(crate) fn once(
        operation: impl Fn() -> Result<T> + Send + Sync + 'static,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            operation: Arc::new(operation),
            scheduler,
            live: None,
        }
    }

    /// Runs `operation` on subscription and again after every change to `tables`.
    pub(crate) fn live(
        operation: impl Fn() -> Result<T> + Send + Sync + 'static,
        scheduler: Arc<dyn Scheduler>,
        bus: ChangeBus,
        tables: BTreeSet<String>,
    ) -> Self {
        Self {
            operation: Arc::new(operation),
            scheduler,
            live: Some(LiveSource { bus, tables }),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Tables whose changes trigger re-execution. Empty for one-shot observables.
    pub fn observed_tables(&self) -> BTreeSet<String> {
        self.live
            .as_ref()
            .map(|l| l.tables.clone())
            .unwrap_or_default()
    }

    pub fn subscribe(&self, observer: impl Fn(Event<T>) + Send + Sync + 'static) -> Subscription {
        let state = Arc::new(SubscriptionState::new());
        let observer: Arc<Observer<T>> = Arc::new(observer);

        match &self.live {
            None => {
                let operation = Arc::clone(&self.operation);
                let state_clone = Arc::clone(&state);
                self.scheduler.schedule(Box::new(move || {
                    if state_clone.is_cancelled() {
                        return;
                    }
                    let result = operation();
                    if state_clone.is_cancelled() {
                        return;
                    }
                    match result {
                        Ok(value) => {
                            observer(Event::Next(value));
                            observer(Event::Completed);
                        }
                        Err(e) => observer(Event::Error(e)),
                    }
                }));
            }
            Some(source) => {
                let runner = Arc::new(LiveRunner {
                    operation: Arc::clone(&self.operation),
                    observer,
                    scheduler: Arc::clone(&self.scheduler),
                    state: Arc::clone(&state),
                    queue: Mutex::new(RunQueue::default()),
                });

                let runner_clone = Arc::clone(&runner);
                let unsubscribe = source
                    .bus
                    .subscribe(source.tables.iter().cloned(), move |_changes| {
                        runner_clone.trigger();
                    });
                state.set_unsubscribe(unsubscribe);

                runner.trigger();
            }
        }

        Subscription { state }
    }

    /// Adapt to an async stream. Dropping the stream unsubscribes.
    pub fn into_stream(self) -> ObservableStream<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |event| match event {
            Event::Next(v) => {
                let _ = tx.send(Ok(v));
            }
            Event::Error(e) => {
                let _ = tx.send(Err(e));
            }
            Event::Completed => {}
        });
        ObservableStream { rx, subscription }
    }
}

// ============================================================================
// Live re-execution
// ============================================================================

#[derive(Default)]
struct RunQueue {
    pending: usize,
    running: bool,
}

struct LiveRunner<T> {
    operation: Arc<Operation<T>>,
    observer: Arc<Observer<T>>,
    scheduler: Arc<dyn Scheduler>,
    state: Arc<SubscriptionState>,
    queue: Mutex<RunQueue>,
}

impl<T: Send + 'static> LiveRunner<T> {
    fn trigger(self: &Arc<Self>) {
        if self.state.is_cancelled() {
            return;
        }
        {
            let mut queue = self.queue.lock();
            queue.pending += 1;
            if queue.running {
                return;
            }
            queue.running = true;
        }
        let this = Arc::clone(self);
        self.scheduler.schedule(Box::new(move || this.drain()));
    }

    fn drain(&self) {
        loop {
            {
                let mut queue = self.queue.lock();
                if queue.pending == 0 || self.state.is_cancelled() {
                    queue.pending = 0;
                    queue.running = false;
                    return;
                }
                queue.pending -= 1;
            }

            tracing::trace!("re-executing live query");
            let result = (self.operation)();
            if self.state.is_cancelled() {
                continue;
            }
            match result {
                Ok(value) => (self.observer)(Event::Next(value)),
                Err(e) => {
                    self.state.cancel();
                    (self.observer)(Event::Error(e));
                }
            }
        }
    }
}

// ============================================================================
// Subscription
// ============================================================================

struct SubscriptionState {
    cancelled: AtomicBool,
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl SubscriptionState {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            unsubscribe: Mutex::new(None),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Store the bus registration. If the subscription was cancelled while
    /// the registration was being made, release it right away.
    fn set_unsubscribe(&self, unsubscribe: Unsubscribe) {
        *self.unsubscribe.lock() = Some(unsubscribe);
        if self.is_cancelled() {
            let unsubscribe = self.unsubscribe.lock().take();
            if let Some(unsubscribe) = unsubscribe {
                unsubscribe();
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let unsubscribe = self.unsubscribe.lock().take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe();
        }
    }
}

/// Handle returned by [`Observable::subscribe`].
///
/// Dropping it does not cancel; call [`Subscription::unsubscribe`].
pub struct Subscription {
    state: Arc<SubscriptionState>,
}

impl Subscription {
    /// Stop further emissions and release the change-bus registration.
    /// Safe to call more than once.
    pub fn unsubscribe(&self) {
        self.state.cancel();
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.state.is_cancelled()
    }
}

// ============================================================================
// ObservableStream
// ============================================================================

/// Async adapter returned by [`Observable::into_stream`].
///
/// Yields `Ok` for every emission and `Err` for a terminal failure, then
/// `None` once the observable has finished.
pub struct ObservableStream<T> {
    rx: mpsc::UnboundedReceiver<Result<T>>,
    subscription: Subscription,
}

impl<T> ObservableStream<T> {
    pub async fn next(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<Result<T>> {
        self.rx.try_recv().ok()
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl<T> Drop for ObservableStream<T> {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}
