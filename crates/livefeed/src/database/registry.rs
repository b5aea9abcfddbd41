//! DatabaseRegistry: named database handles, created on first reference.
//!
//! One registry is shared (through `Arc`) by everything mounted from the
//! same plugin. Independent registries never see each other's handles.
//!
//! The default database's handle stays cached across `close` and `destroy`;
//! every other handle is evicted.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::{
    error::{DatabaseError, Result},
    reactive::{ListenerId, Notifier},
    types::Credentials,
};

use super::{
    event::DatabaseEvent,
    traits::{is_remote_name, Database, DatabaseFactory},
};

/// Result of [`DatabaseRegistry::open`].
pub struct Opened {
    pub database: Arc<dyn Database>,
    /// `true` if the handle was created by this call.
    pub created: bool,
}

pub struct DatabaseRegistry {
    factory: Arc<dyn DatabaseFactory>,
    default_name: Option<String>,
    databases: Mutex<HashMap<String, Arc<dyn Database>>>,
    /// Creation options for the default database and remote databases.
    db_options: Value,
    /// Kept for logins triggered when a remote database is first opened.
    credentials: Mutex<Option<Credentials>>,
    events: Notifier<DatabaseEvent>,
}

impl DatabaseRegistry {
    pub fn new(factory: Arc<dyn DatabaseFactory>, default_name: Option<String>) -> Self {
        Self {
            factory,
            default_name,
            databases: Mutex::new(HashMap::new()),
            db_options: Value::Null,
            credentials: Mutex::new(None),
            events: Notifier::new(),
        }
    }

    /// Options handed to the factory when creating the default database or
    /// a remote one.
    pub fn with_db_options(mut self, options: Value) -> Self {
        self.db_options = options;
        self
    }

    pub fn db_options(&self) -> &Value {
        &self.db_options
    }

    /// Listen for handles created or destroyed through this registry.
    pub fn on_event(&self, listener: impl Fn(&DatabaseEvent) + Send + Sync + 'static) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn off_event(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    fn is_default(&self, name: &str) -> bool {
        self.default_name.as_deref() == Some(name)
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// The default database, opened if needed.
    pub fn default_database(&self) -> Result<Arc<dyn Database>> {
        match &self.default_name {
            Some(name) => Ok(self.open(name)?.database),
            None => Err(DatabaseError::Backend("no default database configured".to_string()).into()),
        }
    }

    /// Return the cached handle for `name`, creating it through the factory
    /// if absent.
    ///
    /// The factory runs without the registry lock held. If another handle for
    /// `name` was inserted meanwhile, that one wins and the new one is dropped.
    pub fn open(&self, name: &str) -> Result<Opened> {
        if let Some(db) = self.get(name) {
            return Ok(Opened {
                database: db,
                created: false,
            });
        }

        let created = if self.is_default(name) || is_remote_name(name) {
            self.factory.open_with_options(name, &self.db_options)?
        } else {
            self.factory.open(name)?
        };
        let (database, was_created) = {
            let mut dbs = self.databases.lock();
            let entry = dbs.entry(name.to_string()).or_insert_with(|| Arc::clone(&created));
            (Arc::clone(entry), Arc::ptr_eq(entry, &created))
        };
        if was_created {
            tracing::debug!(database = name, "opened database");
            self.events.notify(&DatabaseEvent::Created {
                database: name.to_string(),
            });
        }
        Ok(Opened {
            database,
            created: was_created,
        })
    }

    /// Shorthand for `open(name)?.database`.
    pub fn database(&self, name: &str) -> Result<Arc<dyn Database>> {
        Ok(self.open(name)?.database)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Database>> {
        self.databases.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.databases.lock().contains_key(name)
    }

    /// Register a pre-built handle under its own name, replacing any cached one.
    pub fn insert(&self, db: Arc<dyn Database>) {
        self.databases.lock().insert(db.name().to_string(), db);
    }

    /// Names of all cached handles, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Close `name` and evict it unless it is the default database. Does
    /// nothing if it was never opened.
    pub fn close(&self, name: &str) -> Result<()> {
        let db = {
            let mut dbs = self.databases.lock();
            if self.is_default(name) {
                dbs.get(name).cloned()
            } else {
                dbs.remove(name)
            }
        };
        match db {
            Some(db) => db.close(),
            None => Ok(()),
        }
    }

    /// Destroy `name`, opening it first so the destroy reaches the
    /// underlying store, and evict it unless it is the default database.
    pub fn destroy(&self, name: &str) -> Result<()> {
        let db = self.database(name)?;
        if !self.is_default(name) {
            self.databases.lock().remove(name);
        }
        db.destroy()?;
        self.events.notify(&DatabaseEvent::Destroyed {
            database: name.to_string(),
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Credentials / pending login
    // -----------------------------------------------------------------------

    pub fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.lock() = Some(credentials);
    }

    pub fn clear_credentials(&self) {
        *self.credentials.lock() = None;
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.lock().clone()
    }

    /// Log a newly opened remote database in with the stored credentials.
    ///
    /// Runs as a detached task on the current tokio runtime; returns `false`
    /// when nothing was started (local database, no credentials, no runtime).
    pub fn login_pending(&self, db: &Arc<dyn Database>) -> bool {
        if !db.is_remote() {
            return false;
        }
        let (Some(session), Some(creds)) = (db.session(), self.credentials()) else {
            return false;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(database = db.name(), "no runtime, skipping pending login");
            return false;
        };

        let name = db.name().to_string();
        handle.spawn(async move {
            if let Err(e) = session.login(&creds.username, &creds.password).await {
                tracing::warn!(database = %name, error = %e, "pending login failed");
            }
        });
        true
    }
}
