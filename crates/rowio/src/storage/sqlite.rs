//! SQLite row store.
//!
//! Implements `RowStore` using rusqlite (bundled). The connection is
//! protected by a `parking_lot::ReentrantMutex<RefCell<Connection>>` so that
//! `transaction()` can hold the lock for the whole closure while the closure
//! re-acquires it for individual statements. Other threads are kept out of
//! the connection until the transaction finishes.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::ReentrantMutex;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

use crate::config::SqliteConfig;
use crate::error::{Result, RowioError, StoreError};
use crate::query::{quote_identifier, DeleteQuery, InsertQuery, Query, UpdateQuery};
use crate::types::{Row, RowId, Value};

use super::traits::{Cursor, RowStore};

// ============================================================================
// Value helpers
// ============================================================================

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(r) => ToSqlOutput::Borrowed(ValueRef::Real(*r)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

fn value_from_sql(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// Map a rusqlite error to a `RowioError`.
fn store_err(e: rusqlite::Error) -> RowioError {
    RowioError::Store(StoreError::Sqlite(e))
}

// ============================================================================
// SQL rendering
// ============================================================================

fn select_sql(query: &Query) -> String {
    let mut sql = String::from("SELECT ");
    if query.is_distinct() {
        sql.push_str("DISTINCT ");
    }
    if query.columns().is_empty() {
        sql.push('*');
    } else {
        sql.push_str(&query.columns().join(", "));
    }
    sql.push_str(" FROM ");
    sql.push_str(&quote_identifier(query.table()));

    if let Some(w) = query.where_clause() {
        sql.push_str(&format!(" WHERE {w}"));
    }
    if let Some(g) = query.group_by() {
        sql.push_str(&format!(" GROUP BY {g}"));
    }
    if let Some(h) = query.having() {
        sql.push_str(&format!(" HAVING {h}"));
    }
    if let Some(o) = query.order_by() {
        sql.push_str(&format!(" ORDER BY {o}"));
    }
    if let Some(l) = query.limit() {
        sql.push_str(&format!(" LIMIT {l}"));
    }
    sql
}

fn insert_sql(query: &InsertQuery, row: &Row) -> String {
    let table = quote_identifier(query.table());
    if row.is_empty() {
        return match query.null_column_hack() {
            Some(col) => format!(
                "INSERT INTO {table} ({}) VALUES (NULL)",
                quote_identifier(col)
            ),
            None => format!("INSERT INTO {table} DEFAULT VALUES"),
        };
    }
    let cols: Vec<String> = row.columns().map(quote_identifier).collect();
    let placeholders: Vec<String> = (1..=row.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        cols.join(", "),
        placeholders.join(", ")
    )
}

fn update_sql(query: &UpdateQuery, row: &Row) -> String {
    let assignments: Vec<String> = row
        .columns()
        .map(|c| format!("{} = ?", quote_identifier(c)))
        .collect();
    let mut sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(query.table()),
        assignments.join(", ")
    );
    if let Some(w) = query.where_clause() {
        sql.push_str(&format!(" WHERE {w}"));
    }
    sql
}

fn delete_sql(query: &DeleteQuery) -> String {
    let mut sql = format!("DELETE FROM {}", quote_identifier(query.table()));
    if let Some(w) = query.where_clause() {
        sql.push_str(&format!(" WHERE {w}"));
    }
    sql
}

// ============================================================================
// SqliteStore
// ============================================================================

/// SQLite row store.
pub struct SqliteStore {
    conn: ReentrantMutex<RefCell<rusqlite::Connection>>,
    savepoint_seq: AtomicU64,
}

impl SqliteStore {
    /// Open a file-backed SQLite database with default settings.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with(&SqliteConfig::file(path))
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with(&SqliteConfig::in_memory())
    }

    pub fn open_with(config: &SqliteConfig) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => rusqlite::Connection::open(path),
            None => rusqlite::Connection::open_in_memory(),
        }
        .map_err(store_err)?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(store_err)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode={};
             PRAGMA foreign_keys={};",
            config.journal_mode.as_str(),
            if config.foreign_keys { "ON" } else { "OFF" },
        ))
        .map_err(store_err)?;

        Ok(Self {
            conn: ReentrantMutex::new(RefCell::new(conn)),
            savepoint_seq: AtomicU64::new(0),
        })
    }

    /// Run raw SQL statements, e.g. to create the schema. Does not publish
    /// change notifications.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| conn.execute_batch(sql))
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    /// Execute `f` with a shared reference to the underlying connection.
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>,
    {
        let guard = self.conn.lock();
        let conn = guard.borrow();
        f(&conn).map_err(store_err)
    }

    fn execute_savepoint(&self, statement: &str) -> rusqlite::Result<()> {
        let guard = self.conn.lock();
        let conn = guard.borrow();
        conn.execute_batch(statement)
    }
}

// ============================================================================
// RowStore implementation
// ============================================================================

impl RowStore for SqliteStore {
    fn insert(&self, query: &InsertQuery, row: &Row) -> Result<RowId> {
        let sql = insert_sql(query, row);
        self.with_conn(|conn| {
            conn.execute(&sql, rusqlite::params_from_iter(row.values()))?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn update(&self, query: &UpdateQuery, row: &Row) -> Result<usize> {
        if row.is_empty() {
            return Err(StoreError::backend(format!(
                "update of \"{}\" has no columns to set",
                query.table()
            ))
            .into());
        }
        let sql = update_sql(query, row);
        let params: Vec<&Value> = row.values().chain(query.where_args()).collect();
        self.with_conn(|conn| conn.execute(&sql, rusqlite::params_from_iter(params)))
    }

    fn delete(&self, query: &DeleteQuery) -> Result<usize> {
        let sql = delete_sql(query);
        self.with_conn(|conn| conn.execute(&sql, rusqlite::params_from_iter(query.where_args())))
    }

    fn query(&self, query: &Query) -> Result<Cursor> {
        let sql = select_sql(query);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let rows = stmt.query_map(rusqlite::params_from_iter(query.where_args()), |r| {
                let mut row = Row::new();
                for (i, name) in columns.iter().enumerate() {
                    row.set(name.clone(), value_from_sql(r.get_ref(i)?));
                }
                Ok(row)
            })?;
            let rows: rusqlite::Result<Vec<Row>> = rows.collect();
            Ok(Cursor::new(columns.clone(), rows?))
        })
    }

    fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        // Held until the savepoint is released or rolled back.
        let _guard = self.conn.lock();

        let n = self.savepoint_seq.fetch_add(1, Ordering::Relaxed);
        let sp_name = format!("sp_{n}");
        self.execute_savepoint(&format!("SAVEPOINT {sp_name}"))
            .map_err(store_err)?;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| f(self))) {
            Ok(outcome) => outcome,
            Err(payload) => {
                tracing::warn!(savepoint = %sp_name, "transaction closure panicked, rolling back");
                let _ = self.execute_savepoint(&format!(
                    "ROLLBACK TO SAVEPOINT {sp_name}; RELEASE SAVEPOINT {sp_name}"
                ));
                panic::resume_unwind(payload)
            }
        };

        match outcome {
            Ok(v) => match self.execute_savepoint(&format!("RELEASE SAVEPOINT {sp_name}")) {
                Ok(()) => Ok(v),
                Err(e) => {
                    tracing::warn!(savepoint = %sp_name, error = %e, "release failed, rolling back");
                    let _ = self.execute_savepoint(&format!(
                        "ROLLBACK TO SAVEPOINT {sp_name}; RELEASE SAVEPOINT {sp_name}"
                    ));
                    Err(StoreError::Transaction {
                        message: format!("failed to release savepoint {sp_name}"),
                        source: Some(Box::new(e)),
                    }
                    .into())
                }
            },
            Err(e) => {
                let _ = self.execute_savepoint(&format!(
                    "ROLLBACK TO SAVEPOINT {sp_name}; RELEASE SAVEPOINT {sp_name}"
                ));
                Err(e)
            }
        }
    }
}
