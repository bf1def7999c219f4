//! Change notification: table-level pub/sub.
//!
//! - [`event`]: [`Changes`] notification.
//! - [`registry`]: [`ListenerRegistry<T>`], listeners keyed by table.
//! - [`bus`]: [`ChangeBus`] and the async [`ChangeStream`].

pub mod bus;
pub mod event;
pub mod registry;

pub use bus::{ChangeBus, ChangeStream, Unsubscribe};
pub use event::Changes;
pub use registry::{ListenerId, ListenerRegistry};
