//! The reactive host seam and a concrete component implementing it.
//!
//! A host owns plain data (the inputs config sources read), fields driven by
//! live queries, and an event channel. Its only change-detection primitive
//! is [`ReactiveHost::watch`]: run an effect whenever data changes.
//! [`watch_value`] builds "call back when this derived value changes" on top.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::types::FieldValue;

use super::{
    event::HostEvent,
    notifier::{ListenerId, Notifier},
};

/// Snapshot of a host's plain data.
pub type HostData = Map<String, Value>;

/// Identifies a registered watch.
pub type WatchId = u64;

/// Effect run by the host on data changes.
pub type WatchEffect = Arc<dyn Fn(&HostData) + Send + Sync>;

// ============================================================================
// ReactiveHost
// ============================================================================

pub trait ReactiveHost: Send + Sync {
    fn data(&self) -> HostData;

    /// Current value of a field, `None` if it was never assigned.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Assign a field, notifying its dependents.
    fn set_field(&self, name: &str, value: FieldValue);

    fn emit(&self, event: HostEvent);

    /// Run `effect` after every data change, and once before returning when
    /// `immediate` is set.
    fn watch(&self, effect: WatchEffect, immediate: bool) -> WatchId;

    fn unwatch(&self, id: WatchId);
}

/// Watch a value derived from host data.
///
/// `callback` fires when the evaluated value differs (by `PartialEq`) from
/// the previous evaluation, and once at registration when `immediate` is set.
pub fn watch_value<T, E, C>(
    host: &dyn ReactiveHost,
    evaluate: E,
    callback: C,
    immediate: bool,
) -> WatchId
where
    T: PartialEq + Clone + Send + 'static,
    E: Fn(&HostData) -> T + Send + Sync + 'static,
    C: Fn(T) + Send + Sync + 'static,
{
    let baseline = if immediate {
        None
    } else {
        Some(evaluate(&host.data()))
    };
    let last: Mutex<Option<T>> = Mutex::new(baseline);

    let effect = move |data: &HostData| {
        let value = evaluate(data);
        {
            let mut last = last.lock();
            if last.as_ref() == Some(&value) {
                return;
            }
            *last = Some(value.clone());
        }
        callback(value);
    };

    host.watch(Arc::new(effect), immediate)
}

// ============================================================================
// Component
// ============================================================================

/// A field assignment, as delivered to `on_field_change` listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub value: FieldValue,
}

/// In-process reactive host.
///
/// Watch effects run synchronously inside `set_data`, in registration order,
/// with no component lock held.
pub struct Component {
    name: String,
    data: Mutex<HostData>,
    fields: Mutex<HashMap<String, FieldValue>>,
    watchers: Mutex<Vec<(WatchId, WatchEffect)>>,
    next_watch_id: AtomicU64,
    field_changes: Notifier<FieldChange>,
    events: Notifier<HostEvent>,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_data(name, Map::new())
    }

    pub fn with_data(name: impl Into<String>, data: HostData) -> Self {
        Self {
            name: name.into(),
            data: Mutex::new(data),
            fields: Mutex::new(HashMap::new()),
            watchers: Mutex::new(Vec::new()),
            next_watch_id: AtomicU64::new(1),
            field_changes: Notifier::new(),
            events: Notifier::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_data(&self, key: &str) -> Option<Value> {
        self.data.lock().get(key).cloned()
    }

    /// Set a data key and run watch effects if the value changed.
    pub fn set_data(&self, key: &str, value: Value) {
        {
            let mut data = self.data.lock();
            if data.get(key) == Some(&value) {
                return;
            }
            data.insert(key.to_string(), value);
        }
        self.run_watchers();
    }

    pub fn remove_data(&self, key: &str) {
        if self.data.lock().remove(key).is_some() {
            self.run_watchers();
        }
    }

    pub fn on_field_change(
        &self,
        listener: impl Fn(&FieldChange) + Send + Sync + 'static,
    ) -> ListenerId {
        self.field_changes.subscribe(listener)
    }

    pub fn off_field_change(&self, id: ListenerId) -> bool {
        self.field_changes.unsubscribe(id)
    }

    pub fn on_event(&self, listener: impl Fn(&HostEvent) + Send + Sync + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn off_event(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn watch_count(&self) -> usize {
        self.watchers.lock().len()
    }

    fn run_watchers(&self) {
        let snapshot: Vec<WatchEffect> = self
            .watchers
            .lock()
            .iter()
            .map(|(_, effect)| Arc::clone(effect))
            .collect();
        for effect in snapshot {
            let data = self.data();
            effect(&data);
        }
    }
}

impl ReactiveHost for Component {
    fn data(&self) -> HostData {
        self.data.lock().clone()
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        self.fields.lock().get(name).cloned()
    }

    fn set_field(&self, name: &str, value: FieldValue) {
        self.fields.lock().insert(name.to_string(), value.clone());
        self.field_changes.notify(&FieldChange {
            field: name.to_string(),
            value,
        });
    }

    fn emit(&self, event: HostEvent) {
        tracing::trace!(component = %self.name, event = %event.name(), "emit");
        self.events.notify(&event);
    }

    fn watch(&self, effect: WatchEffect, immediate: bool) -> WatchId {
        let id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        self.watchers.lock().push((id, Arc::clone(&effect)));
        if immediate {
            let data = self.data();
            effect(&data);
        }
        id
    }

    fn unwatch(&self, id: WatchId) {
        self.watchers.lock().retain(|(wid, _)| *wid != id);
    }
}
