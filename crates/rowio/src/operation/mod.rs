//! Prepared operations and their execution modes.
//!
//! - [`put`], [`get`], [`delete`]: resolvers and prepared operations.
//! - [`observable`]: [`Observable<T>`], subscriptions and async streams.
//! - [`scheduler`]: where observable work runs.

pub mod delete;
pub mod get;
pub mod observable;
pub mod put;
pub mod scheduler;

pub use delete::{
    DefaultDeleteResolver, DeleteResolver, PreparedDeleteAll, PreparedDeleteByQuery,
    PreparedDeleteObject,
};
pub use get::{
    map_rows, DefaultGetResolver, GetResolver, MapFn, PreparedGet, PreparedGetCursor,
    PreparedGetList, PreparedGetObject,
};
pub use observable::{Event, Observable, ObservableStream, Subscription};
pub use put::{DefaultPutResolver, PreparedPut, PreparedPutAll, PutResolver, DEFAULT_ID_COLUMN};
pub use scheduler::{Immediate, Scheduler, Task, TokioScheduler};
