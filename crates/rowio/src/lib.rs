//! Reactive put/get/delete over a relational row store.
//!
//! Mutations publish table-level notifications on a [`ChangeBus`]; reads can
//! be turned into live [`Observable`]s that re-run whenever a table they
//! depend on changes.

pub mod error;
pub mod types;

pub mod changes;
pub mod config;
pub mod db;
pub mod operation;
pub mod query;
pub mod storage;

pub use changes::{ChangeBus, ChangeStream, Changes, Unsubscribe};
pub use db::Db;
pub use error::{MappingError, QueryError, Result, RowioError, StoreError};
pub use operation::{Event, Observable, ObservableStream, Subscription};
pub use query::{DeleteQuery, InsertQuery, Query, UpdateQuery};
pub use types::{DeleteResult, FromValue, PutKind, PutResult, Row, RowId, Value};
