//! Scheduler: where observable operations run.
//!
//! The concurrency policy is injected into `Db`; nothing here spawns onto a
//! hidden global pool.

/// A unit of work handed to a [`Scheduler`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Scheduler: Send + Sync {
    fn schedule(&self, task: Task);
}

/// Runs every task inline on the calling thread.
///
/// Subscribing executes the operation before `subscribe` returns, and live
/// queries re-execute inside the publishing call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl Scheduler for Immediate {
    fn schedule(&self, task: Task) {
        task();
    }
}

/// Runs tasks on a tokio runtime's blocking pool.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Scheduler bound to the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, task: Task) {
        // Detached: results travel through the observer, not the join handle.
        drop(self.handle.spawn_blocking(task));
    }
}
