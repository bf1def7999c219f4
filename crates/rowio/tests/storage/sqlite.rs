//! Tests for `SqliteStore` primitives and query rendering against a real
//! in-memory database.

use std::panic::{self, AssertUnwindSafe};

use rowio::config::SqliteConfig;
use rowio::query::{DeleteQuery, InsertQuery, Query, UpdateQuery};
use rowio::storage::sqlite::SqliteStore;
use rowio::storage::RowStore;
use rowio::error::StoreError;
use rowio::{Row, RowioError, Value};

// ============================================================================
// Test helpers
// ============================================================================

/// In-memory store with a `users` and a `notes` table.
fn make_store() -> SqliteStore {
    let store = SqliteStore::open_in_memory().expect("open in-memory DB");
    store
        .execute_batch(
            "CREATE TABLE users (_id INTEGER PRIMARY KEY, email TEXT NOT NULL, age INTEGER);
             CREATE TABLE notes (_id INTEGER PRIMARY KEY, body TEXT);",
        )
        .expect("create schema");
    store
}

fn insert_user(store: &SqliteStore, email: &str, age: i64) -> i64 {
    let query = InsertQuery::builder().table("users").build().unwrap();
    store
        .insert(&query, &Row::new().with("email", email).with("age", age))
        .unwrap()
}

fn emails(store: &SqliteStore, query: &Query) -> Vec<String> {
    store
        .query(query)
        .unwrap()
        .map(|row| row.get_as::<String>("email").unwrap())
        .collect()
}

fn seed(store: &SqliteStore) {
    for (email, age) in [("b@x.com", 30), ("a@x.com", 20), ("c@x.com", 40), ("d@x.com", 10)] {
        insert_user(store, email, age);
    }
}

// ============================================================================
// Primitive operations
// ============================================================================

#[test]
fn insert_returns_generated_row_id() {
    let store = make_store();
    assert_eq!(insert_user(&store, "a@x.com", 1), 1);
    assert_eq!(insert_user(&store, "b@x.com", 2), 2);
}

#[test]
fn insert_with_explicit_id_keeps_it() {
    let store = make_store();
    let query = InsertQuery::builder().table("users").build().unwrap();
    let id = store
        .insert(&query, &Row::new().with("_id", 100).with("email", "a@x.com"))
        .unwrap();
    assert_eq!(id, 100);
}

#[test]
fn empty_insert_uses_null_column_hack() {
    let store = make_store();
    let query = InsertQuery::builder()
        .table("notes")
        .null_column_hack("body")
        .build()
        .unwrap();
    let id = store.insert(&query, &Row::new()).unwrap();

    let rows: Vec<Row> = store
        .query(&Query::builder().table("notes").build().unwrap())
        .unwrap()
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("_id"), Some(&Value::Integer(id)));
    assert_eq!(rows[0].get("body"), Some(&Value::Null));
}

#[test]
fn update_returns_affected_count() {
    let store = make_store();
    seed(&store);
    let query = UpdateQuery::builder()
        .table("users")
        .where_clause("age >= ?")
        .where_args([30])
        .build()
        .unwrap();

    let updated = store.update(&query, &Row::new().with("age", 99)).unwrap();

    assert_eq!(updated, 2);
}

#[test]
fn update_with_no_columns_is_rejected() {
    let store = make_store();
    let query = UpdateQuery::builder().table("users").build().unwrap();
    let err = store.update(&query, &Row::new()).unwrap_err();
    assert!(err.is_store());
}

#[test]
fn delete_returns_removed_count() {
    let store = make_store();
    seed(&store);
    let query = DeleteQuery::builder()
        .table("users")
        .where_clause("age < ?")
        .where_args([25])
        .build()
        .unwrap();

    assert_eq!(store.delete(&query).unwrap(), 2);
    assert_eq!(store.delete(&query).unwrap(), 0);
}

#[test]
fn sql_error_surfaces_as_store_error() {
    let store = make_store();
    let query = Query::builder().table("missing_table").build().unwrap();
    let err = store.query(&query).unwrap_err();
    assert!(matches!(err, RowioError::Store(_)));
}

// ============================================================================
// Query semantics
// ============================================================================

#[test]
fn order_by_ascending_and_descending() {
    let store = make_store();
    seed(&store);

    let asc = Query::builder().table("users").order_by("email").build().unwrap();
    let desc = Query::builder()
        .table("users")
        .order_by("email DESC")
        .build()
        .unwrap();

    assert_eq!(emails(&store, &asc), ["a@x.com", "b@x.com", "c@x.com", "d@x.com"]);
    assert_eq!(emails(&store, &desc), ["d@x.com", "c@x.com", "b@x.com", "a@x.com"]);
}

#[test]
fn limit_and_offset() {
    let store = make_store();
    seed(&store);

    let limited = Query::builder()
        .table("users")
        .order_by("email")
        .limit("2")
        .build()
        .unwrap();
    let paged = Query::builder()
        .table("users")
        .order_by("email")
        .limit_offset(1, 2)
        .build()
        .unwrap();

    assert_eq!(emails(&store, &limited), ["a@x.com", "b@x.com"]);
    assert_eq!(emails(&store, &paged), ["b@x.com", "c@x.com"]);
}

#[test]
fn page_past_the_end_is_truncated() {
    let store = make_store();
    seed(&store);

    let tail = Query::builder()
        .table("users")
        .order_by("email")
        .limit_offset(3, 5)
        .build()
        .unwrap();
    let beyond = Query::builder()
        .table("users")
        .order_by("email")
        .limit_offset(10, 5)
        .build()
        .unwrap();

    assert_eq!(emails(&store, &tail), ["d@x.com"]);
    assert!(emails(&store, &beyond).is_empty());
}

#[test]
fn numbered_placeholder_binds_one_argument_twice() {
    let store = make_store();
    seed(&store);

    let query = Query::builder()
        .table("users")
        .where_clause("age = ?1 OR age = ?1 + 20")
        .where_args([10])
        .order_by("email")
        .build()
        .unwrap();

    assert_eq!(emails(&store, &query), ["b@x.com", "d@x.com"]);
}

#[test]
fn where_arguments_are_bound() {
    let store = make_store();
    seed(&store);

    let query = Query::builder()
        .table("users")
        .where_clause("age > ? AND email != ?")
        .where_args([Value::from(15), Value::from("c@x.com")])
        .order_by("age")
        .build()
        .unwrap();

    assert_eq!(emails(&store, &query), ["a@x.com", "b@x.com"]);
}

#[test]
fn distinct_collapses_duplicates() {
    let store = make_store();
    for _ in 0..3 {
        insert_user(&store, "same@x.com", 1);
    }

    let plain = Query::builder()
        .table("users")
        .columns(["email"])
        .build()
        .unwrap();
    let distinct = plain.to_builder().distinct(true).build().unwrap();

    assert_eq!(emails(&store, &plain).len(), 3);
    assert_eq!(emails(&store, &distinct), ["same@x.com"]);
}

#[test]
fn group_by_with_having_filters_groups() {
    let store = make_store();
    for _ in 0..5 {
        insert_user(&store, "busy@x.com", 1);
    }
    for _ in 0..2 {
        insert_user(&store, "quiet@x.com", 1);
    }

    let query = Query::builder()
        .table("users")
        .columns(["email", "COUNT(*) AS n"])
        .group_by("email")
        .having("COUNT(*) >= 5")
        .build()
        .unwrap();
    let rows: Vec<Row> = store.query(&query).unwrap().collect();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_as::<String>("email").unwrap(), "busy@x.com");
    assert_eq!(rows[0].get_as::<i64>("n").unwrap(), 5);
}

#[test]
fn cursor_reports_projection_columns() {
    let store = make_store();
    let query = Query::builder()
        .table("users")
        .columns(["email", "age"])
        .build()
        .unwrap();

    let cursor = store.query(&query).unwrap();

    assert_eq!(cursor.columns(), ["email", "age"]);
    assert_eq!(cursor.count(), 0);
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn transaction_commits_on_ok() {
    let store = make_store();
    store
        .transaction(|s| {
            insert_user(s, "a@x.com", 1);
            insert_user(s, "b@x.com", 2);
            Ok(())
        })
        .unwrap();

    let all = Query::builder().table("users").build().unwrap();
    assert_eq!(emails(&store, &all).len(), 2);
}

#[test]
fn transaction_rolls_back_on_err() {
    let store = make_store();
    let result: rowio::Result<()> = store.transaction(|s| {
        insert_user(s, "a@x.com", 1);
        Err(StoreError::backend("abort").into())
    });

    assert!(result.is_err());
    let all = Query::builder().table("users").build().unwrap();
    assert!(emails(&store, &all).is_empty());
}

#[test]
fn nested_failure_rolls_back_only_inner_scope() {
    let store = make_store();
    store
        .transaction(|s| {
            insert_user(s, "outer@x.com", 1);
            let inner: rowio::Result<()> = s.transaction(|s| {
                insert_user(s, "inner@x.com", 2);
                Err(StoreError::backend("abort inner").into())
            });
            assert!(inner.is_err());
            Ok(())
        })
        .unwrap();

    let all = Query::builder().table("users").build().unwrap();
    assert_eq!(emails(&store, &all), ["outer@x.com"]);
}

#[test]
fn panic_rolls_back_and_releases_the_savepoint() {
    let path = std::env::temp_dir().join(format!("rowio-unwind-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let path = path.to_str().unwrap().to_string();

    let writer = SqliteStore::open(&path).unwrap();
    writer
        .execute_batch(
            "CREATE TABLE users (_id INTEGER PRIMARY KEY, email TEXT NOT NULL, age INTEGER)",
        )
        .unwrap();

    let unwound = panic::catch_unwind(AssertUnwindSafe(|| {
        writer.transaction(|s| -> rowio::Result<()> {
            insert_user(s, "lost@x.com", 1);
            panic!("closure failed");
        })
    }));
    assert!(unwound.is_err());

    insert_user(&writer, "kept@x.com", 2);

    let reader = SqliteStore::open(&path).unwrap();
    let all = Query::builder().table("users").build().unwrap();
    assert_eq!(emails(&reader, &all), ["kept@x.com"]);

    drop(reader);
    drop(writer);
    let _ = std::fs::remove_file(&path);
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn open_with_json_config() {
    let config =
        SqliteConfig::from_json_str(r#"{"busy_timeout_ms": 250, "journal_mode": "memory"}"#)
            .unwrap();
    assert!(config.path.is_none());

    let store = SqliteStore::open_with(&config).unwrap();
    store
        .execute_batch("CREATE TABLE t (_id INTEGER PRIMARY KEY)")
        .unwrap();
}

#[test]
fn invalid_json_config_is_config_error() {
    let err = SqliteConfig::from_json_str(r#"{"journal_mode": "sideways"}"#).unwrap_err();
    assert!(matches!(err, RowioError::Config(_)));
}
