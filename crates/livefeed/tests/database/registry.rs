//! Integration tests for `DatabaseRegistry`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use livefeed::{
    database::{
        Database, DatabaseEvent, DatabaseFactory, DatabaseRegistry, MemoryDatabase,
        MemoryFactory,
    },
    error::{DatabaseError, LiveFeedError, Result},
    types::Credentials,
};
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

/// Counts how many handles the registry asked for.
struct CountingFactory {
    opens: AtomicUsize,
}

impl DatabaseFactory for CountingFactory {
    fn open(&self, name: &str) -> Result<Arc<dyn Database>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if name.is_empty() {
            return Err(DatabaseError::Backend("empty name".to_string()).into());
        }
        Ok(Arc::new(MemoryDatabase::new(name)))
    }
}

fn counting() -> (Arc<CountingFactory>, DatabaseRegistry) {
    let factory = Arc::new(CountingFactory {
        opens: AtomicUsize::new(0),
    });
    let registry = DatabaseRegistry::new(factory.clone(), Some("todos".to_string()));
    (factory, registry)
}

// ============================================================================
// open
// ============================================================================

#[test]
fn open_creates_once_and_then_reuses() {
    let (factory, registry) = counting();

    let first = registry.open("todos").unwrap();
    let second = registry.open("todos").unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert!(Arc::ptr_eq(&first.database, &second.database));
    assert_eq!(factory.opens.load(Ordering::SeqCst), 1);
}

#[test]
fn open_propagates_factory_errors_without_caching() {
    let (_factory, registry) = counting();

    assert!(registry.open("").is_err());
    assert!(!registry.contains(""));
}

#[test]
fn closure_factories_are_accepted() {
    let factory = |name: &str| -> Result<Arc<dyn Database>> { Ok(Arc::new(MemoryDatabase::new(name))) };
    let registry = DatabaseRegistry::new(Arc::new(factory), None);

    assert_eq!(registry.database("x").unwrap().name(), "x");
}

#[test]
fn default_database_requires_a_configured_name() {
    let registry = DatabaseRegistry::new(Arc::new(MemoryFactory::new()), None);

    assert!(registry.default_name().is_none());
    assert!(registry.default_database().is_err());

    let (_factory, registry) = counting();
    assert_eq!(registry.default_database().unwrap().name(), "todos");
}

#[test]
fn independent_registries_do_not_share_handles() {
    let (_fa, a) = counting();
    let (_fb, b) = counting();

    a.open("todos").unwrap();

    assert!(a.contains("todos"));
    assert!(!b.contains("todos"));
}

#[test]
fn insert_replaces_and_names_are_sorted() {
    let (_factory, registry) = counting();
    registry.open("b").unwrap();
    let custom: Arc<dyn Database> = Arc::new(MemoryDatabase::new("a"));

    registry.insert(Arc::clone(&custom));

    assert_eq!(registry.names(), vec!["a".to_string(), "b".to_string()]);
    assert!(Arc::ptr_eq(&registry.get("a").unwrap(), &custom));
}

// ============================================================================
// close / destroy
// ============================================================================

#[test]
fn close_evicts_so_the_next_open_creates_again() {
    let (factory, registry) = counting();
    let first = registry.database("notes").unwrap();

    registry.close("notes").unwrap();
    registry.close("never-opened").unwrap();
    let again = registry.open("notes").unwrap();

    assert!(again.created);
    assert!(!Arc::ptr_eq(&first, &again.database));
    assert_eq!(factory.opens.load(Ordering::SeqCst), 2);
    assert!(first.get("x", &Value::Null).is_err());
}

#[test]
fn close_keeps_the_default_database_cached() {
    let (factory, registry) = counting();
    let first = registry.database("todos").unwrap();

    registry.close("todos").unwrap();
    let again = registry.open("todos").unwrap();

    assert!(!again.created);
    assert!(Arc::ptr_eq(&first, &again.database));
    assert_eq!(factory.opens.load(Ordering::SeqCst), 1);
    assert_eq!(
        first.put(json!({ "_id": "a" }), &Value::Null).unwrap_err(),
        LiveFeedError::Database(DatabaseError::Closed("todos".to_string()))
    );
}

#[test]
fn destroy_clears_documents_and_evicts() {
    let (_factory, registry) = counting();
    let db = registry.database("notes").unwrap();
    db.put(json!({ "_id": "a" }), &Value::Null).unwrap();

    registry.destroy("notes").unwrap();

    assert!(!registry.contains("notes"));
    let err = db.get("a", &Value::Null).unwrap_err();
    assert_eq!(
        err,
        LiveFeedError::Database(DatabaseError::Closed("notes".to_string()))
    );
}

#[test]
fn destroy_keeps_the_default_database_cached() {
    let (_factory, registry) = counting();
    let db = registry.database("todos").unwrap();

    registry.destroy("todos").unwrap();

    assert!(registry.contains("todos"));
    assert!(Arc::ptr_eq(&registry.get("todos").unwrap(), &db));
}

// ============================================================================
// Events / creation options
// ============================================================================

#[test]
fn created_and_destroyed_are_announced() {
    let (_factory, registry) = counting();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    let id = registry.on_event(move |e: &DatabaseEvent| {
        seen_clone.lock().unwrap().push(e.clone());
    });

    registry.open("notes").unwrap();
    registry.open("notes").unwrap();
    registry.destroy("notes").unwrap();
    assert!(registry.off_event(id));
    registry.open("later").unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            DatabaseEvent::Created { database: "notes".to_string() },
            DatabaseEvent::Destroyed { database: "notes".to_string() },
        ]
    );
}

/// Records the options each handle was created with.
#[derive(Default)]
struct OptionsFactory {
    seen: std::sync::Mutex<Vec<(String, Value)>>,
}

impl DatabaseFactory for OptionsFactory {
    fn open(&self, name: &str) -> Result<Arc<dyn Database>> {
        self.seen.lock().unwrap().push((name.to_string(), Value::Null));
        Ok(Arc::new(MemoryDatabase::new(name)))
    }

    fn open_with_options(&self, name: &str, options: &Value) -> Result<Arc<dyn Database>> {
        self.seen.lock().unwrap().push((name.to_string(), options.clone()));
        Ok(Arc::new(MemoryDatabase::new(name)))
    }
}

#[test]
fn creation_options_reach_default_and_remote_databases_only() {
    let factory = Arc::new(OptionsFactory::default());
    let options = json!({ "auto_compaction": true });
    let registry = DatabaseRegistry::new(factory.clone(), Some("todos".to_string()))
        .with_db_options(options.clone());

    registry.open("todos").unwrap();
    registry.open("https://couch.example.com/todos").unwrap();
    registry.open("scratch").unwrap();

    assert_eq!(registry.db_options(), &options);
    assert_eq!(
        *factory.seen.lock().unwrap(),
        vec![
            ("todos".to_string(), options.clone()),
            ("https://couch.example.com/todos".to_string(), options),
            ("scratch".to_string(), Value::Null),
        ]
    );
}

// ============================================================================
// Pending login
// ============================================================================

#[test]
fn login_pending_skips_local_databases_and_missing_credentials() {
    let factory = Arc::new(MemoryFactory::new());
    let registry = DatabaseRegistry::new(factory, None);
    let local = registry.database("todos").unwrap();
    let remote = registry.database("http://couch/todos").unwrap();

    registry.set_credentials(Credentials::new("ada", "pw"));
    assert!(!registry.login_pending(&local));

    registry.clear_credentials();
    assert!(!registry.login_pending(&remote));
}

#[test]
fn login_pending_needs_a_runtime() {
    let factory = Arc::new(MemoryFactory::new());
    let registry = DatabaseRegistry::new(factory, None);
    let remote = registry.database("http://couch/todos").unwrap();
    registry.set_credentials(Credentials::new("ada", "pw"));

    assert!(!registry.login_pending(&remote));
}

#[tokio::test]
async fn login_pending_logs_in_with_stored_credentials() {
    let factory = Arc::new(MemoryFactory::new());
    let session = factory.session();
    session.add_user("ada", "pw", None);
    let registry = DatabaseRegistry::new(factory, None);
    let remote = registry.database("http://couch/todos").unwrap();
    registry.set_credentials(Credentials::new("ada", "pw"));

    assert!(registry.login_pending(&remote));

    for _ in 0..50 {
        if session.logged_in_as().is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(session.logged_in_as().as_deref(), Some("ada"));
}

#[test]
fn credentials_debug_hides_the_password() {
    let creds = Credentials::new("ada", "hunter2");
    let shown = format!("{creds:?}");
    assert!(shown.contains("ada"));
    assert!(!shown.contains("hunter2"));
}
