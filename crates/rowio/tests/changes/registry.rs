//! Tests for `ListenerRegistry<T>`.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use rowio::changes::ListenerRegistry;

fn tables(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn snapshot_returns_listeners_in_registration_order() {
    let registry: ListenerRegistry<i32> = ListenerRegistry::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    for name in ["a", "b", "c"] {
        let log = Arc::clone(&log);
        registry.register(tables(&["users"]), move |e| {
            log.lock().unwrap().push(format!("{name}:{e}"))
        });
    }

    for callback in registry.snapshot_for(&tables(&["users"])) {
        callback(&1);
    }

    assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1", "c:1"]);
}

#[test]
fn listener_on_several_tables_appears_once() {
    let registry: ListenerRegistry<()> = ListenerRegistry::new();
    registry.register(tables(&["users", "tweets"]), |_| {});

    let snapshot = registry.snapshot_for(&tables(&["users", "tweets"]));

    assert_eq!(snapshot.len(), 1);
}

#[test]
fn snapshot_ignores_other_tables() {
    let registry: ListenerRegistry<()> = ListenerRegistry::new();
    registry.register(tables(&["users"]), |_| {});

    assert!(registry.snapshot_for(&tables(&["tweets"])).is_empty());
}

#[test]
fn remove_cleans_up_table_index() {
    let registry: ListenerRegistry<()> = ListenerRegistry::new();
    let id = registry.register(tables(&["users", "tweets"]), |_| {});
    assert_eq!(registry.len_for("users"), 1);

    registry.remove(id);
    registry.remove(id);

    assert!(registry.is_empty());
    assert_eq!(registry.len_for("users"), 0);
    assert_eq!(registry.len_for("tweets"), 0);
}

#[test]
fn listener_added_after_snapshot_is_not_included() {
    let registry: Arc<ListenerRegistry<()>> = Arc::new(ListenerRegistry::new());
    let calls = Arc::new(Mutex::new(0));

    let registry_clone = Arc::clone(&registry);
    registry.register(tables(&["users"]), move |_| {
        registry_clone.register(tables(&["users"]), |_| {});
    });
    let snapshot = registry.snapshot_for(&tables(&["users"]));
    for callback in &snapshot {
        callback(&());
        *calls.lock().unwrap() += 1;
    }

    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(registry.len_for("users"), 2);
}
