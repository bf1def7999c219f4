//! Tests for `DefaultPutResolver`, `PreparedPut` and `PreparedPutAll`.

use std::sync::{Arc, Mutex};

use rowio::operation::{DefaultPutResolver, Event, PutResolver};
use rowio::{Db, PutKind, PutResult, Value};

use super::support::{make_log, put_resolver, user_to_row, MockStore, User};

// ============================================================================
// Insert / update decision
// ============================================================================

#[test]
fn put_without_id_inserts_once_and_never_updates() {
    let db = Db::new(MockStore::new());
    db.store().set_next_id(42);

    let result = db
        .put(User::new(None, "a@example.com"), put_resolver())
        .execute_as_blocking()
        .unwrap();

    assert_eq!(result.kind(), PutKind::Inserted { id: 42 });
    assert_eq!(db.store().calls(), vec!["begin", "insert users", "commit"]);
}

#[test]
fn put_with_id_updates_by_identifier() {
    let db = Db::new(MockStore::new());
    db.store().set_update_result(1);

    let result = db
        .put(User::new(Some(7), "a@example.com"), put_resolver())
        .execute_as_blocking()
        .unwrap();

    assert!(result.was_updated());
    assert_eq!(result.rows_updated(), Some(1));
    assert_eq!(
        db.store().calls(),
        vec!["begin", "update users where \"_id\" = ?", "commit"]
    );
}

#[test]
fn put_with_unknown_id_falls_back_to_insert_with_same_id() {
    let db = Db::new(MockStore::new());
    db.store().set_update_result(0);
    db.store().set_next_id(7);

    let result = db
        .put(User::new(Some(7), "a@example.com"), put_resolver())
        .execute_as_blocking()
        .unwrap();

    assert_eq!(result.inserted_id(), Some(7));
    assert_eq!(db.store().count("update"), 1);
    assert_eq!(db.store().count("insert"), 1);
    let inserted = db.store().inserted();
    assert_eq!(inserted[0].get("_id"), Some(&Value::Integer(7)));
}

#[test]
fn put_runs_update_and_fallback_insert_in_one_transaction() {
    let db = Db::new(MockStore::new());

    db.put(User::new(Some(3), "a@example.com"), put_resolver())
        .execute_as_blocking()
        .unwrap();

    assert_eq!(
        db.store().calls(),
        vec![
            "begin",
            "update users where \"_id\" = ?",
            "insert users",
            "commit"
        ]
    );
}

#[test]
fn custom_id_column_is_used_in_predicate() {
    let db = Db::new(MockStore::new());
    db.store().set_update_result(1);
    let resolver = DefaultPutResolver::new("users", |u: &User| {
        rowio::Row::new()
            .with("user_id", u.id)
            .with("email", u.email.as_str())
    })
    .with_id_column("user_id");

    db.put(User::new(Some(1), "a@example.com"), resolver)
        .execute_as_blocking()
        .unwrap();

    assert_eq!(db.store().count("update users where \"user_id\" = ?"), 1);
}

#[test]
fn put_failure_rolls_back_and_is_reported() {
    let db = Db::new(MockStore::new());
    db.store().fail_inserts();

    let err = db
        .put(User::new(None, "a@example.com"), put_resolver())
        .execute_as_blocking()
        .unwrap_err();

    assert!(err.is_store());
    assert_eq!(db.store().calls().last().map(String::as_str), Some("rollback"));
}

#[test]
fn shared_resolver_can_be_reused_through_arc() {
    let db = Db::new(MockStore::new());
    let resolver: Arc<DefaultPutResolver<User>> = Arc::new(put_resolver());

    db.put(User::new(None, "a@example.com"), Arc::clone(&resolver))
        .execute_as_blocking()
        .unwrap();
    db.put(User::new(None, "b@example.com"), resolver)
        .execute_as_blocking()
        .unwrap();

    assert_eq!(db.store().count("insert"), 2);
}

// ============================================================================
// Custom resolvers
// ============================================================================

struct AlwaysInsert;

impl PutResolver<MockStore, User> for AlwaysInsert {
    fn perform_put(&self, store: &MockStore, user: &User) -> rowio::Result<PutResult> {
        use rowio::storage::RowStore;
        let query = rowio::InsertQuery::builder().table("audit").build()?;
        let id = store.insert(&query, &user_to_row(user))?;
        Ok(PutResult::inserted(id, "audit"))
    }
}

#[test]
fn custom_resolver_controls_affected_tables() {
    let db = Db::new(MockStore::new());
    let log = make_log();
    let log_clone = Arc::clone(&log);
    let _unsub = db.on_changes(["audit", "users"], move |c| {
        let tables: Vec<&str> = c.tables().iter().map(String::as_str).collect();
        log_clone.lock().unwrap().push(tables.join(","));
    });

    db.put(User::new(Some(1), "a@example.com"), AlwaysInsert)
        .execute_as_blocking()
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["audit"]);
}

// ============================================================================
// Notifications
// ============================================================================

#[test]
fn each_put_publishes_exactly_one_notification() {
    let db = Db::new(MockStore::new());
    let log = make_log();
    let log_clone = Arc::clone(&log);
    let _unsub = db.on_changes(["users"], move |c| {
        log_clone
            .lock()
            .unwrap()
            .push(format!("seq:{}", c.sequence()));
    });

    db.put(User::new(None, "a@example.com"), put_resolver())
        .execute_as_blocking()
        .unwrap();
    db.put(User::new(None, "b@example.com"), put_resolver())
        .execute_as_blocking()
        .unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["seq:1", "seq:2"]);
}

#[test]
fn failed_put_publishes_nothing() {
    let db = Db::new(MockStore::new());
    db.store().fail_inserts();
    let log = make_log();
    let log_clone = Arc::clone(&log);
    let _unsub = db.on_changes(["users"], move |_| log_clone.lock().unwrap().push("x".into()));

    let _ = db
        .put(User::new(None, "a@example.com"), put_resolver())
        .execute_as_blocking();

    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn put_all_publishes_one_merged_notification() {
    let db = Db::new(MockStore::new());
    let log = make_log();
    let log_clone = Arc::clone(&log);
    let _unsub = db.on_changes(["users"], move |c| {
        log_clone
            .lock()
            .unwrap()
            .push(format!("seq:{}", c.sequence()));
    });

    let results = db
        .put_all(
            vec![
                User::new(None, "a@example.com"),
                User::new(None, "b@example.com"),
                User::new(None, "c@example.com"),
            ],
            put_resolver(),
        )
        .execute_as_blocking()
        .unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(PutResult::was_inserted));
    assert_eq!(*log.lock().unwrap(), vec!["seq:1"]);
}

#[test]
fn put_all_of_nothing_publishes_nothing() {
    let db = Db::new(MockStore::new());
    let log = make_log();
    let log_clone = Arc::clone(&log);
    let _unsub = db.on_changes(["users"], move |_| log_clone.lock().unwrap().push("x".into()));

    let results = db
        .put_all(Vec::<User>::new(), put_resolver())
        .execute_as_blocking()
        .unwrap();

    assert!(results.is_empty());
    assert!(log.lock().unwrap().is_empty());
}

// ============================================================================
// Observable mode
// ============================================================================

#[test]
fn put_observable_emits_result_then_completes() {
    let db = Db::new(MockStore::new());
    db.store().set_next_id(5);
    let events: Arc<Mutex<Vec<String>>> = make_log();
    let events_clone = Arc::clone(&events);

    let observable = db
        .put(User::new(None, "a@example.com"), put_resolver())
        .as_observable();
    assert!(!observable.is_live());

    let _sub = observable.subscribe(move |event| {
        let entry = match event {
            Event::Next(r) => format!("next:{:?}", r.inserted_id()),
            Event::Error(e) => format!("error:{e}"),
            Event::Completed => "completed".to_string(),
        };
        events_clone.lock().unwrap().push(entry);
    });

    assert_eq!(*events.lock().unwrap(), vec!["next:Some(5)", "completed"]);
}

#[test]
fn put_observable_does_nothing_until_subscribed() {
    let db = Db::new(MockStore::new());

    let _observable = db
        .put(User::new(None, "a@example.com"), put_resolver())
        .as_observable();

    assert!(db.store().calls().is_empty());
}
