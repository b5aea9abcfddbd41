//! Integration tests for `Component` and `watch_value`.

use std::sync::Arc;

use livefeed::{
    reactive::{watch_value, Component, HostData, HostEvent, LiveFeedEvent, ReactiveHost},
    types::FieldValue,
};
use serde_json::{json, Map};

use crate::support::make_log;

#[test]
fn set_data_runs_watchers_only_on_change() {
    let component = Component::new("c");
    let runs = make_log::<u64>();
    let runs_clone = Arc::clone(&runs);
    component.watch(
        Arc::new(move |data: &HostData| {
            runs_clone
                .lock()
                .unwrap()
                .push(data.get("n").and_then(|v| v.as_u64()).unwrap_or(0));
        }),
        false,
    );

    component.set_data("n", json!(1));
    component.set_data("n", json!(1));
    component.set_data("n", json!(2));
    component.remove_data("n");
    component.remove_data("n");

    assert_eq!(*runs.lock().unwrap(), vec![1, 2, 0]);
}

#[test]
fn immediate_watch_runs_before_returning() {
    let mut data = Map::new();
    data.insert("n".to_string(), json!(7));
    let component = Component::with_data("c", data);
    let runs = make_log::<u64>();
    let runs_clone = Arc::clone(&runs);

    component.watch(
        Arc::new(move |data: &HostData| {
            runs_clone
                .lock()
                .unwrap()
                .push(data["n"].as_u64().unwrap_or(0));
        }),
        true,
    );

    assert_eq!(*runs.lock().unwrap(), vec![7]);
}

#[test]
fn unwatch_stops_effects() {
    let component = Component::new("c");
    let runs = make_log::<()>();
    let runs_clone = Arc::clone(&runs);
    let id = component.watch(Arc::new(move |_: &HostData| runs_clone.lock().unwrap().push(())), false);

    component.unwatch(id);
    component.set_data("n", json!(1));

    assert!(runs.lock().unwrap().is_empty());
    assert_eq!(component.watch_count(), 0);
}

#[test]
fn watch_value_fires_on_derived_changes_only() {
    let component = Component::new("c");
    let seen = make_log::<bool>();
    let seen_clone = Arc::clone(&seen);

    watch_value(
        &component,
        |data| data.get("age").and_then(|v| v.as_u64()).unwrap_or(0) >= 18,
        move |adult| seen_clone.lock().unwrap().push(adult),
        true,
    );
    component.set_data("age", json!(10));
    component.set_data("age", json!(12));
    component.set_data("age", json!(20));
    component.set_data("age", json!(30));

    assert_eq!(*seen.lock().unwrap(), vec![false, true]);
}

#[test]
fn watch_value_without_immediate_primes_with_current_value() {
    let component = Component::new("c");
    component.set_data("x", json!(1));
    let seen = make_log::<i64>();
    let seen_clone = Arc::clone(&seen);

    watch_value(
        &component,
        |data| data.get("x").and_then(|v| v.as_i64()).unwrap_or(0),
        move |x| seen_clone.lock().unwrap().push(x),
        false,
    );
    component.set_data("x", json!(1));
    component.set_data("y", json!(1));
    component.set_data("x", json!(2));

    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[test]
fn set_field_notifies_listeners_every_time() {
    let component = Component::new("c");
    let changes = make_log::<String>();
    let changes_clone = Arc::clone(&changes);
    let id = component.on_field_change(move |c| changes_clone.lock().unwrap().push(c.field.clone()));

    component.set_field("todos", FieldValue::empty(false));
    component.set_field("todos", FieldValue::empty(false));
    assert!(component.off_field_change(id));
    component.set_field("todos", FieldValue::empty(false));

    assert_eq!(changes.lock().unwrap().len(), 2);
    assert_eq!(component.field("todos"), Some(FieldValue::Batch(vec![])));
    assert_eq!(component.field("other"), None);
}

#[test]
fn emit_reaches_event_listeners() {
    let component = Component::new("c");
    let events = make_log::<String>();
    let events_clone = Arc::clone(&events);
    component.on_event(move |e: &HostEvent| events_clone.lock().unwrap().push(e.name()));

    component.emit(
        LiveFeedEvent::Ready {
            field: "todos".to_string(),
        }
        .into(),
    );

    assert_eq!(*events.lock().unwrap(), vec!["livefeed-ready".to_string()]);
}

#[test]
fn data_changes_made_by_a_watcher_reach_later_watchers() {
    let component = Arc::new(Component::new("c"));
    let weak = Arc::downgrade(&component);
    component.watch(
        Arc::new(move |data: &HostData| {
            if data.get("a").is_some() {
                if let Some(c) = weak.upgrade() {
                    c.set_data("b", json!(true));
                }
            }
        }),
        false,
    );

    component.set_data("a", json!(1));

    assert_eq!(component.get_data("b"), Some(json!(true)));
}
