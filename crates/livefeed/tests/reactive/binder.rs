//! Integration tests for `LiveQueryBinder` against scripted databases.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use livefeed::{
    database::FeedEvent,
    error::ConfigError,
    reactive::{
        Component, ConfigSource, LiveFeedEvent, LiveQueryBinder, QueryConfig, ReactiveHost,
    },
    types::FieldValue,
};
use serde_json::{json, Value};

use crate::support::{
    batch, count_events, event_names, record_events, record_field, scripted_registry,
    ScriptedDatabase,
};

// ============================================================================
// Helpers
// ============================================================================

fn setup(dbs: &[&Arc<ScriptedDatabase>]) -> (Arc<Component>, LiveQueryBinder) {
    let component = Arc::new(Component::new("test"));
    let registry = scripted_registry(dbs.iter().map(|db| Arc::clone(db)).collect());
    let binder = LiveQueryBinder::new(&component, registry);
    (component, binder)
}

// ============================================================================
// bind
// ============================================================================

#[test]
fn bind_opens_one_feed_against_the_field_named_database() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);

    binder.bind("todos", json!({ "selector": {} }));

    assert_eq!(todos.opened(), 1);
    assert!(binder.is_active("todos"));
    assert_eq!(binder.active_database("todos").as_deref(), Some("todos"));
    assert_eq!(component.field("todos"), Some(FieldValue::Batch(vec![])));
}

#[test]
fn bind_uses_the_named_database_when_given() {
    let todos = ScriptedDatabase::new("todos");
    let archive = ScriptedDatabase::new("archive");
    let (_component, binder) = setup(&[&todos, &archive]);

    binder.bind("done", json!({ "selector": { "done": true }, "database": "archive" }));

    assert_eq!(archive.opened(), 1);
    assert_eq!(todos.opened(), 0);
    assert_eq!(archive.latest().query.selector, json!({ "done": true }));
}

#[test]
fn bind_prefers_an_explicit_handle() {
    let todos = ScriptedDatabase::new("todos");
    let (_component, binder) = setup(&[]);

    binder.bind("items", QueryConfig::all().with_handle(todos.clone()));

    assert_eq!(todos.opened(), 1);
    assert_eq!(binder.active_database("items").as_deref(), Some("todos"));
}

#[test]
fn bind_passes_sort_skip_and_limit_through() {
    let todos = ScriptedDatabase::new("todos");
    let (_component, binder) = setup(&[&todos]);

    binder.bind(
        "todos",
        json!({ "selector": { "done": false }, "sort": [{ "due": "desc" }], "skip": 5, "limit": 10 }),
    );

    let query = &todos.latest().query;
    assert_eq!(query.selector, json!({ "done": false }));
    assert_eq!(query.sort, Some(json!([{ "due": "desc" }])));
    assert_eq!(query.skip, Some(5));
    assert_eq!(query.limit, Some(10));
}

#[test]
fn unresolved_database_emits_config_error_and_initializes_field() {
    let (component, binder) = setup(&[]);
    let events = record_events(&component);

    binder.bind("missing", json!({ "selector": {}, "first": true }));

    assert!(!binder.is_active("missing"));
    assert_eq!(component.field("missing"), Some(FieldValue::First(None)));
    let log = events.lock().unwrap();
    assert_eq!(log.len(), 1);
    match &log[0] {
        LiveFeedEvent::ConfigError { field, error } => {
            assert_eq!(field, "missing");
            assert!(matches!(error, ConfigError::UnresolvedDatabase { database, .. } if database == "missing"));
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn failed_open_emits_error() {
    let todos = ScriptedDatabase::new("todos");
    todos.fail_next_opens(true);
    let (component, binder) = setup(&[&todos]);
    let events = record_events(&component);

    binder.bind("todos", json!({}));

    assert!(!binder.is_active("todos"));
    assert_eq!(event_names(&events), vec!["livefeed-error"]);
}

// ============================================================================
// Delivery
// ============================================================================

#[test]
fn update_assigns_the_whole_batch_in_order() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", json!({}));

    let docs = [json!({ "_id": "b" }), json!({ "_id": "a" }), json!({ "_id": "c" })];
    todos.update_latest(&docs);

    assert_eq!(component.field("todos"), Some(batch(&docs)));
}

#[test]
fn first_assigns_only_the_head() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("current", json!({ "selector": {}, "first": true, "database": "todos" }));

    todos.update_latest(&[json!({ "_id": "x" }), json!({ "_id": "y" })]);

    assert_eq!(
        component.field("current"),
        Some(FieldValue::First(Some(json!({ "_id": "x" }))))
    );
}

#[test]
fn ready_after_update_keeps_the_latest_batch() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", json!({}));
    let values = record_field(&component, "todos");

    todos.update_latest(&[json!({ "_id": "1" })]);
    todos.emit_latest(FeedEvent::Ready);

    let log = values.lock().unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1], batch(&[json!({ "_id": "1" })]));
}

#[test]
fn update_events_carry_the_assigned_count() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    let events = record_events(&component);
    binder.bind("todos", json!({}));

    todos.update_latest(&[json!({ "_id": "1" }), json!({ "_id": "2" })]);

    let log = events.lock().unwrap();
    assert_eq!(
        log.last(),
        Some(&LiveFeedEvent::Update {
            field: "todos".to_string(),
            count: 2
        })
    );
}

#[test]
fn feed_error_terminates_the_subscription() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    let events = record_events(&component);
    binder.bind("todos", json!({}));

    todos.emit_latest(FeedEvent::Error("boom".to_string()));

    assert!(!binder.is_active("todos"));
    assert!(binder.is_bound("todos"));
    assert_eq!(
        events.lock().unwrap().last(),
        Some(&LiveFeedEvent::Error {
            field: "todos".to_string(),
            error: "boom".to_string()
        })
    );
}

#[test]
fn feed_cancelled_by_the_database_is_reported() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    let events = record_events(&component);
    binder.bind("todos", json!({}));

    todos.emit_latest(FeedEvent::Cancelled);

    assert!(!binder.is_active("todos"));
    assert_eq!(count_events(&events, "livefeed-cancel"), 1);
}

// ============================================================================
// Re-evaluation
// ============================================================================

fn selector_from_filter() -> ConfigSource {
    ConfigSource::computed_json(|data| {
        json!({ "selector": { "type": data.get("filter").cloned().unwrap_or(json!("all")) } })
    })
}

#[test]
fn changed_config_replaces_the_subscription() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    let events = record_events(&component);
    binder.bind("todos", selector_from_filter());
    let first_generation = binder.generation("todos");

    component.set_data("filter", json!("work"));

    assert_eq!(todos.opened(), 2);
    assert_eq!(todos.active(), 1);
    assert_eq!(todos.feed(0).cancel_calls(), 1);
    assert_eq!(todos.latest().query.selector, json!({ "type": "work" }));
    assert_ne!(binder.generation("todos"), first_generation);
    assert_eq!(count_events(&events, "livefeed-cancel"), 1);
}

#[test]
fn unchanged_config_does_not_resubscribe() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", selector_from_filter());

    component.set_data("unrelated", json!(1));
    component.set_data("unrelated", json!(2));

    assert_eq!(todos.opened(), 1);
}

#[test]
fn at_most_one_feed_is_active_per_field() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", selector_from_filter());

    for filter in ["a", "b", "c", "d", "e"] {
        component.set_data("filter", json!(filter));
        assert_eq!(todos.active(), 1);
        assert_eq!(binder.active_count(), 1);
    }
    assert_eq!(todos.opened(), 6);
}

#[test]
fn events_from_a_replaced_feed_are_dropped() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", selector_from_filter());
    component.set_data("filter", json!("work"));
    todos.update_latest(&[json!({ "_id": "new" })]);

    todos.emit(0, FeedEvent::Update {
        change: None,
        aggregate: vec![json!({ "_id": "stale" })],
    });
    todos.emit(0, FeedEvent::Ready);
    todos.emit(0, FeedEvent::Error("late".to_string()));

    assert_eq!(component.field("todos"), Some(batch(&[json!({ "_id": "new" })])));
    assert!(binder.is_active("todos"));
}

#[test]
fn rebinding_a_field_replaces_its_watch_and_feed() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", selector_from_filter());
    binder.bind("todos", json!({ "selector": { "type": "fixed" } }));

    assert_eq!(component.watch_count(), 1);
    assert_eq!(todos.active(), 1);
    assert_eq!(todos.feed(0).cancel_calls(), 1);

    component.set_data("filter", json!("ignored"));
    assert_eq!(todos.opened(), 2);
}

#[test]
fn empty_field_takes_the_shape_of_a_later_first_config() {
    let todos = ScriptedDatabase::new("todo");
    let (component, binder) = setup(&[&todos]);
    binder.bind(
        "todo",
        ConfigSource::computed_json(|data| match data.get("id") {
            Some(id) => json!({ "selector": { "_id": id }, "first": true }),
            None => Value::Null,
        }),
    );
    assert_eq!(component.field("todo"), Some(FieldValue::Batch(vec![])));

    component.set_data("id", json!("a"));

    assert_eq!(todos.opened(), 1);
    assert_eq!(component.field("todo"), Some(FieldValue::First(None)));
}

#[test]
fn a_held_value_is_not_reset_by_a_new_config() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", selector_from_filter());
    todos.update_latest(&[json!({ "_id": "a" })]);

    component.set_data("filter", json!("work"));

    assert_eq!(todos.opened(), 2);
    assert_eq!(component.field("todos"), Some(batch(&[json!({ "_id": "a" })])));
}

#[test]
fn generations_increase_across_fields() {
    let a = ScriptedDatabase::new("a");
    let b = ScriptedDatabase::new("b");
    let (_component, binder) = setup(&[&a, &b]);

    binder.bind("a", json!({}));
    binder.bind("b", json!({}));

    let ga = binder.generation("a").unwrap();
    let gb = binder.generation("b").unwrap();
    assert!(ga > 0);
    assert!(gb > ga);
}

// ============================================================================
// unbind
// ============================================================================

#[test]
fn unbind_cancels_and_stops_assignments() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", json!({}));
    let values = record_field(&component, "todos");

    assert!(binder.unbind("todos"));
    todos.update_latest(&[json!({ "_id": "late" })]);

    assert!(!binder.unbind("todos"));
    assert_eq!(todos.active(), 0);
    assert_eq!(component.watch_count(), 0);
    assert!(values.lock().unwrap().is_empty());
}

#[test]
fn unbind_all_twice_is_harmless() {
    let a = ScriptedDatabase::new("a");
    let b = ScriptedDatabase::new("b");
    let (component, binder) = setup(&[&a, &b]);
    binder.bind("a", json!({}));
    binder.bind("b", json!({}));
    let events = record_events(&component);

    binder.unbind_all();
    binder.unbind_all();

    assert_eq!(a.feed(0).cancel_calls(), 1);
    assert_eq!(b.feed(0).cancel_calls(), 1);
    assert_eq!(count_events(&events, "livefeed-cancel"), 2);
    assert!(binder.fields().is_empty());
    assert_eq!(component.watch_count(), 0);
}

#[test]
fn unbind_all_waits_for_a_delivery_on_another_thread() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    binder.bind("todos", json!({}));
    let values = record_field(&component, "todos");
    let stop = Arc::new(AtomicBool::new(false));

    let feeder = {
        let todos = Arc::clone(&todos);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut n = 0;
            while !stop.load(Ordering::SeqCst) {
                todos.update_latest(&[json!({ "_id": "doc", "n": n })]);
                n += 1;
            }
        })
    };
    while values.lock().unwrap().len() < 10 {
        thread::yield_now();
    }

    binder.unbind_all();
    let assigned = values.lock().unwrap().len();
    thread::sleep(std::time::Duration::from_millis(20));
    stop.store(true, Ordering::SeqCst);
    feeder.join().unwrap();

    assert_eq!(values.lock().unwrap().len(), assigned);
    assert_eq!(todos.active(), 0);
}

#[test]
fn dropped_host_makes_bind_a_no_op() {
    let todos = ScriptedDatabase::new("todos");
    let (component, binder) = setup(&[&todos]);
    drop(component);

    binder.bind("todos", json!({}));

    assert_eq!(todos.opened(), 0);
    assert!(!binder.is_bound("todos"));
}
