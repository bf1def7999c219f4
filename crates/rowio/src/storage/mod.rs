#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use traits::{Cursor, RowStore};
