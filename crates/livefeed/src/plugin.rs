//! Plugin wiring: one shared database registry, mounted per component.
//!
//! ```ignore
//! let plugin = LiveFeedPlugin::install(
//!     PluginOptions::new(Arc::new(MemoryFactory::new())).with_default_db("todos"),
//! );
//! let component = Arc::new(Component::new("todo-list"));
//! let mounted = plugin.mount(
//!     &component,
//!     LiveQueries::new().field("todos", json!({ "done": false })),
//! );
//! // ...
//! mounted.destroy();
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    api::DatabaseApi,
    database::{DatabaseFactory, DatabaseRegistry},
    error::{ConfigError, Result},
    reactive::{ConfigSource, HostEvent, ListenerId, LiveQueryBinder, ReactiveHost},
    replication::Replicator,
};

// ============================================================================
// Configuration
// ============================================================================

/// Serializable plugin settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Database used for sessions and opened at mount time.
    #[serde(default, alias = "defaultDB")]
    pub default_db: Option<String>,
    /// Creation options for the default database and every remote one.
    #[serde(default, alias = "optionsDB", skip_serializing_if = "Option::is_none")]
    pub options_db: Option<Value>,
    /// Log every delivered live-query event at `info`.
    #[serde(default)]
    pub debug: bool,
}

impl PluginConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| ConfigError::InvalidPluginConfig(e.to_string()).into())
    }

    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| ConfigError::InvalidPluginConfig(e.to_string()).into())
    }
}

pub struct PluginOptions {
    pub factory: Arc<dyn DatabaseFactory>,
    pub replicator: Option<Arc<dyn Replicator>>,
    pub config: PluginConfig,
}

impl PluginOptions {
    pub fn new(factory: Arc<dyn DatabaseFactory>) -> Self {
        Self {
            factory,
            replicator: None,
            config: PluginConfig::default(),
        }
    }

    pub fn with_replicator(mut self, replicator: Arc<dyn Replicator>) -> Self {
        self.replicator = Some(replicator);
        self
    }

    pub fn with_default_db(mut self, name: impl Into<String>) -> Self {
        self.config.default_db = Some(name.into());
        self
    }

    pub fn with_options_db(mut self, options: Value) -> Self {
        self.config.options_db = Some(options);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn with_config(mut self, config: PluginConfig) -> Self {
        self.config = config;
        self
    }
}

// ============================================================================
// LiveQueries
// ============================================================================

/// Field name to config source, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct LiveQueries {
    entries: Vec<(String, ConfigSource)>,
}

impl LiveQueries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, source: impl Into<ConfigSource>) -> Self {
        self.entries.push((name.into(), source.into()));
        self
    }

    /// Each key of a JSON object becomes a field with a fixed config.
    /// Anything other than an object yields no fields.
    pub fn from_json(value: Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        Self {
            entries: map
                .into_iter()
                .map(|(name, config)| (name, ConfigSource::json(config)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl<N: Into<String>, S: Into<ConfigSource>> FromIterator<(N, S)> for LiveQueries {
    fn from_iter<I: IntoIterator<Item = (N, S)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(name, source)| (name.into(), source.into()))
                .collect(),
        }
    }
}

// ============================================================================
// LiveFeedPlugin
// ============================================================================

pub struct LiveFeedPlugin {
    registry: Arc<DatabaseRegistry>,
    replicator: Option<Arc<dyn Replicator>>,
    debug: bool,
}

impl LiveFeedPlugin {
    pub fn install(options: PluginOptions) -> Self {
        let PluginOptions {
            factory,
            replicator,
            config,
        } = options;
        tracing::debug!(default_db = ?config.default_db, debug = config.debug, "installing live feed plugin");
        let registry = DatabaseRegistry::new(factory, config.default_db)
            .with_db_options(config.options_db.unwrap_or(Value::Null));
        Self {
            registry: Arc::new(registry),
            replicator,
            debug: config.debug,
        }
    }

    pub fn registry(&self) -> &Arc<DatabaseRegistry> {
        &self.registry
    }

    /// Attach the database api to `host` and bind each of `queries`.
    ///
    /// The default database is opened first. Failing to open it is logged
    /// and does not prevent mounting; session calls will report the error.
    /// Databases created or destroyed through the registry from then on are
    /// reported to `host` as [`HostEvent::Database`].
    pub fn mount<H: ReactiveHost + 'static>(&self, host: &Arc<H>, queries: LiveQueries) -> Mounted {
        let host: Arc<dyn ReactiveHost> = Arc::clone(host) as Arc<dyn ReactiveHost>;
        let weak: Weak<dyn ReactiveHost> = Arc::downgrade(&host);

        let listener = {
            let weak = weak.clone();
            self.registry.on_event(move |event| {
                if let Some(host) = weak.upgrade() {
                    host.emit(HostEvent::Database(event.clone()));
                }
            })
        };

        if let Some(name) = self.registry.default_name() {
            match self.registry.open(name) {
                Ok(opened) if opened.created => {
                    self.registry.login_pending(&opened.database);
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(database = name, error = %error, "could not open default database");
                }
            }
        }

        let api = DatabaseApi::new(Arc::clone(&self.registry), self.replicator.clone(), weak);
        let binder =
            LiveQueryBinder::from_dyn(&host, Arc::clone(&self.registry)).with_debug(self.debug);

        for (field, source) in queries.entries {
            binder.bind(field, source);
        }

        Mounted {
            api,
            binder,
            registry: Arc::clone(&self.registry),
            listener: Mutex::new(Some(listener)),
        }
    }
}

// ============================================================================
// Mounted
// ============================================================================

/// A component's view of the plugin. Call [`Mounted::destroy`] when the
/// component goes away.
pub struct Mounted {
    api: DatabaseApi,
    binder: LiveQueryBinder,
    registry: Arc<DatabaseRegistry>,
    listener: Mutex<Option<ListenerId>>,
}

impl Mounted {
    pub fn api(&self) -> &DatabaseApi {
        &self.api
    }

    pub fn binder(&self) -> &LiveQueryBinder {
        &self.binder
    }

    /// Cancel every live query and stop database event delivery. Safe to
    /// call more than once.
    pub fn destroy(&self) {
        self.binder.unbind_all();
        if let Some(id) = self.listener.lock().take() {
            self.registry.off_event(id);
        }
    }
}
