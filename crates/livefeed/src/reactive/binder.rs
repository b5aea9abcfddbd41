//! LiveQueryBinder: keeps reactive fields in sync with live queries.
//!
//! Each bound field owns at most one open feed. Every time a field's config
//! source produces a new configuration the current feed is cancelled (fire
//! and forget) and a new one is opened. Feeds are tagged with a generation
//! drawn from a binder-wide counter; events from any generation other than
//! the field's current one are dropped, so a cancelled feed can never write
//! to the field even if the database keeps delivering for a while.
//!
//! # Locking
//!
//! `bindings` is never held while calling into the host or a database. Both
//! may call back into the binder synchronously (a feed may deliver before
//! `live_find` returns; a field assignment may change data that re-fires a
//! watch).
//!
//! `delivery` is a reentrant guard held by every event delivery from the
//! generation check through the field assignment, and by every operation
//! that replaces or removes a subscription. A feed delivering on another
//! thread therefore either completes before `unbind_all` starts or sees the
//! binding gone. A database must not block inside `live_find` or `cancel`
//! waiting for a delivery running on another thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};

use crate::{
    database::{Database, DatabaseRegistry, FeedEvent, FeedHandle, FeedSink},
    error::ConfigError,
    types::FieldValue,
};

use super::{
    config::{ConfigSource, DatabaseRef, QueryConfig},
    event::LiveFeedEvent,
    host::{watch_value, ReactiveHost, WatchId},
};

// ============================================================================
// Internal state
// ============================================================================

struct ActiveFeed {
    generation: u64,
    database: String,
    handle: Box<dyn FeedHandle>,
}

struct Binding {
    /// Identifies the `bind` call that created this binding; watch callbacks
    /// from an earlier `bind` of the same field carry a different token.
    token: u64,
    watch: Option<WatchId>,
    /// Generation of the most recent subscription attempt.
    generation: u64,
    active: Option<ActiveFeed>,
}

struct BinderInner {
    host: Weak<dyn ReactiveHost>,
    registry: Arc<DatabaseRegistry>,
    bindings: Mutex<HashMap<String, Binding>>,
    delivery: ReentrantMutex<()>,
    next_token: AtomicU64,
    next_generation: AtomicU64,
    debug: bool,
}

// ============================================================================
// LiveQueryBinder
// ============================================================================

/// Binds live queries to the fields of one host.
///
/// Cloning yields another handle to the same bindings.
#[derive(Clone)]
pub struct LiveQueryBinder {
    inner: Arc<BinderInner>,
}

impl LiveQueryBinder {
    /// The binder holds the host weakly; once the host is dropped every
    /// operation becomes a no-op.
    pub fn new<H: ReactiveHost + 'static>(host: &Arc<H>, registry: Arc<DatabaseRegistry>) -> Self {
        let host: Arc<dyn ReactiveHost> = Arc::clone(host) as Arc<dyn ReactiveHost>;
        Self::from_dyn(&host, registry)
    }

    pub fn from_dyn(host: &Arc<dyn ReactiveHost>, registry: Arc<DatabaseRegistry>) -> Self {
        Self {
            inner: Arc::new(BinderInner {
                host: Arc::downgrade(host),
                registry,
                bindings: Mutex::new(HashMap::new()),
                delivery: ReentrantMutex::new(()),
                next_token: AtomicU64::new(1),
                next_generation: AtomicU64::new(1),
                debug: false,
            }),
        }
    }

    /// Log every delivered event at `info` instead of `debug`.
    ///
    /// Must be called before the first `bind`.
    pub fn with_debug(mut self, debug: bool) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.debug = debug;
        }
        self
    }

    pub fn registry(&self) -> &Arc<DatabaseRegistry> {
        &self.inner.registry
    }

    /// Bind `field` to the live query described by `source`.
    ///
    /// The source is evaluated before this returns, so the field holds a
    /// value (possibly empty) on return. Re-binding a bound field replaces
    /// its watch and subscription.
    pub fn bind(&self, field: impl Into<String>, source: impl Into<ConfigSource>) {
        let field = field.into();
        let source = source.into();
        let Some(host) = self.inner.host.upgrade() else {
            tracing::debug!(field = %field, "host dropped, not binding");
            return;
        };

        let _delivery = self.inner.delivery.lock();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let previous = self.inner.bindings.lock().insert(
            field.clone(),
            Binding {
                token,
                watch: None,
                generation: 0,
                active: None,
            },
        );
        if let Some(previous) = previous {
            self.inner.teardown(host.as_ref(), &field, previous);
        }

        let weak = Arc::downgrade(&self.inner);
        let watched_field = field.clone();
        let watch = watch_value(
            host.as_ref(),
            move |data| source.evaluate(data),
            move |config| {
                if let Some(inner) = weak.upgrade() {
                    inner.apply(&watched_field, token, config);
                }
            },
            true,
        );

        let orphaned = {
            let mut bindings = self.inner.bindings.lock();
            match bindings.get_mut(&field) {
                Some(b) if b.token == token => {
                    b.watch = Some(watch);
                    false
                }
                _ => true,
            }
        };
        if orphaned {
            host.unwatch(watch);
        }
    }

    /// Cancel and forget one binding. Returns whether the field was bound.
    pub fn unbind(&self, field: &str) -> bool {
        let _delivery = self.inner.delivery.lock();
        let removed = self.inner.bindings.lock().remove(field);
        match (removed, self.inner.host.upgrade()) {
            (Some(binding), Some(host)) => {
                self.inner.teardown(host.as_ref(), field, binding);
                true
            }
            (Some(binding), None) => {
                if let Some(feed) = binding.active {
                    feed.handle.cancel();
                }
                true
            }
            (None, _) => false,
        }
    }

    /// Cancel every subscription and remove every watch. Idempotent.
    ///
    /// Once this returns no further field assignments happen for the
    /// removed bindings.
    pub fn unbind_all(&self) {
        let _delivery = self.inner.delivery.lock();
        let drained: Vec<(String, Binding)> = self.inner.bindings.lock().drain().collect();
        if drained.is_empty() {
            return;
        }
        let host = self.inner.host.upgrade();
        for (field, binding) in drained {
            match &host {
                Some(host) => self.inner.teardown(host.as_ref(), &field, binding),
                None => {
                    if let Some(feed) = binding.active {
                        feed.handle.cancel();
                    }
                }
            }
        }
    }

    pub fn is_bound(&self, field: &str) -> bool {
        self.inner.bindings.lock().contains_key(field)
    }

    /// Bound field names, sorted.
    pub fn fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.inner.bindings.lock().keys().cloned().collect();
        fields.sort();
        fields
    }

    /// Number of fields with an open subscription.
    pub fn active_count(&self) -> usize {
        self.inner
            .bindings
            .lock()
            .values()
            .filter(|b| b.active.is_some())
            .count()
    }

    /// Whether `field` currently has an open subscription.
    pub fn is_active(&self, field: &str) -> bool {
        self.inner
            .bindings
            .lock()
            .get(field)
            .map(|b| b.active.is_some())
            .unwrap_or(false)
    }

    /// Name of the database `field`'s open subscription runs against.
    pub fn active_database(&self, field: &str) -> Option<String> {
        self.inner
            .bindings
            .lock()
            .get(field)
            .and_then(|b| b.active.as_ref().map(|a| a.database.clone()))
    }

    /// Generation of `field`'s latest subscription (0 before the first).
    pub fn generation(&self, field: &str) -> Option<u64> {
        self.inner.bindings.lock().get(field).map(|b| b.generation)
    }
}

// ============================================================================
// BinderInner
// ============================================================================

impl BinderInner {
    /// Handle one firing of a field's watch.
    fn apply(self: &Arc<Self>, field: &str, token: u64, config: Option<QueryConfig>) {
        let Some(host) = self.host.upgrade() else {
            return;
        };
        let _delivery = self.delivery.lock();
        if !self.owns(field, token) {
            return;
        }

        let Some(config) = config else {
            if host.field(field).is_none() {
                host.set_field(field, FieldValue::empty(false));
            }
            tracing::debug!(field, "live query has no selector, keeping current subscription");
            host.emit(
                LiveFeedEvent::NoSelector {
                    field: field.to_string(),
                }
                .into(),
            );
            return;
        };

        let db = match self.resolve(field, &config) {
            Ok(db) => db,
            Err(error) => {
                tracing::warn!(field, error = %error, "live query database did not resolve");
                reset_empty(host.as_ref(), field, config.first);
                host.emit(
                    LiveFeedEvent::ConfigError {
                        field: field.to_string(),
                        error,
                    }
                    .into(),
                );
                return;
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = {
            let mut bindings = self.bindings.lock();
            let Some(binding) = bindings.get_mut(field).filter(|b| b.token == token) else {
                return;
            };
            binding.generation = generation;
            binding.active.take()
        };
        if let Some(previous) = previous {
            self.cancel_feed(host.as_ref(), field, previous);
        }

        reset_empty(host.as_ref(), field, config.first);

        let terminated = Arc::new(AtomicBool::new(false));
        let sink = self.sink(field, generation, config.first, Arc::clone(&terminated));
        tracing::debug!(field, database = db.name(), generation, "opening live query");

        match db.live_find(&config.live_query(), sink) {
            Ok(handle) => {
                if terminated.load(Ordering::SeqCst) {
                    return;
                }
                let stale = {
                    let mut bindings = self.bindings.lock();
                    match bindings.get_mut(field) {
                        Some(b) if b.generation == generation => {
                            b.active = Some(ActiveFeed {
                                generation,
                                database: db.name().to_string(),
                                handle,
                            });
                            None
                        }
                        _ => Some(handle),
                    }
                };
                // Superseded while opening: a newer generation already owns the field.
                if let Some(handle) = stale {
                    handle.cancel();
                }
            }
            Err(e) => {
                tracing::warn!(field, database = db.name(), error = %e, "live query failed to open");
                host.emit(
                    LiveFeedEvent::Error {
                        field: field.to_string(),
                        error: e.to_string(),
                    }
                    .into(),
                );
            }
        }
    }

    fn resolve(&self, field: &str, config: &QueryConfig) -> Result<Arc<dyn Database>, ConfigError> {
        let name = match &config.database {
            Some(DatabaseRef::Handle(db)) => return Ok(Arc::clone(db)),
            Some(DatabaseRef::Name(name)) => name.as_str(),
            None => field,
        };
        let opened = self
            .registry
            .open(name)
            .map_err(|e| ConfigError::UnresolvedDatabase {
                field: field.to_string(),
                database: name.to_string(),
                reason: e.to_string(),
            })?;
        if opened.created {
            self.registry.login_pending(&opened.database);
        }
        Ok(opened.database)
    }

    fn sink(
        self: &Arc<Self>,
        field: &str,
        generation: u64,
        first: bool,
        terminated: Arc<AtomicBool>,
    ) -> FeedSink {
        let weak = Arc::downgrade(self);
        let field = field.to_string();
        let latest: Mutex<Option<FieldValue>> = Mutex::new(None);

        Arc::new(move |event: FeedEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.deliver(&field, generation, first, &latest, &terminated, event);
            }
        })
    }

    fn deliver(
        &self,
        field: &str,
        generation: u64,
        first: bool,
        latest: &Mutex<Option<FieldValue>>,
        terminated: &AtomicBool,
        event: FeedEvent,
    ) {
        let Some(host) = self.host.upgrade() else {
            return;
        };
        let _delivery = self.delivery.lock();
        if self.current_generation(field) != Some(generation) {
            tracing::trace!(field, generation, "dropping event from a replaced live query");
            return;
        }

        match event {
            FeedEvent::Update { aggregate, .. } => {
                let value = FieldValue::project(aggregate, first);
                let count = value.len();
                *latest.lock() = Some(value.clone());
                if self.debug {
                    tracing::info!(field, generation, count, "live query update");
                } else {
                    tracing::debug!(field, generation, count, "live query update");
                }
                host.set_field(field, value);
                host.emit(
                    LiveFeedEvent::Update {
                        field: field.to_string(),
                        count,
                    }
                    .into(),
                );
            }
            FeedEvent::Ready => {
                let value = latest
                    .lock()
                    .clone()
                    .unwrap_or_else(|| FieldValue::empty(first));
                host.set_field(field, value);
                host.emit(
                    LiveFeedEvent::Ready {
                        field: field.to_string(),
                    }
                    .into(),
                );
            }
            FeedEvent::Error(error) => {
                terminated.store(true, Ordering::SeqCst);
                self.clear_active(field, generation);
                tracing::warn!(field, generation, error = %error, "live query failed");
                host.emit(
                    LiveFeedEvent::Error {
                        field: field.to_string(),
                        error,
                    }
                    .into(),
                );
            }
            FeedEvent::Cancelled => {
                terminated.store(true, Ordering::SeqCst);
                self.clear_active(field, generation);
                host.emit(
                    LiveFeedEvent::Cancel {
                        field: field.to_string(),
                    }
                    .into(),
                );
            }
        }
    }

    fn owns(&self, field: &str, token: u64) -> bool {
        self.bindings
            .lock()
            .get(field)
            .map(|b| b.token == token)
            .unwrap_or(false)
    }

    fn current_generation(&self, field: &str) -> Option<u64> {
        self.bindings.lock().get(field).map(|b| b.generation)
    }

    /// Forget a feed that ended on its own. The handle is dropped, not
    /// cancelled.
    fn clear_active(&self, field: &str, generation: u64) {
        let mut bindings = self.bindings.lock();
        if let Some(b) = bindings.get_mut(field) {
            if b.active.as_ref().map(|a| a.generation) == Some(generation) {
                b.active = None;
            }
        }
    }

    fn cancel_feed(&self, host: &dyn ReactiveHost, field: &str, feed: ActiveFeed) {
        tracing::debug!(
            field,
            database = %feed.database,
            generation = feed.generation,
            "cancelling live query"
        );
        feed.handle.cancel();
        host.emit(
            LiveFeedEvent::Cancel {
                field: field.to_string(),
            }
            .into(),
        );
    }

    /// Release everything a removed binding owns.
    fn teardown(&self, host: &dyn ReactiveHost, field: &str, binding: Binding) {
        if let Some(watch) = binding.watch {
            host.unwatch(watch);
        }
        if let Some(feed) = binding.active {
            self.cancel_feed(host, field, feed);
        }
    }
}

/// Give an unset or still-empty field the empty value of the current shape.
fn reset_empty(host: &dyn ReactiveHost, field: &str, first: bool) {
    let reset = match host.field(field) {
        None => true,
        Some(value) => value.is_empty() && value.is_first() != first,
    };
    if reset {
        host.set_field(field, FieldValue::empty(first));
    }
}
