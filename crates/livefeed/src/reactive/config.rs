//! Live query configuration: what a bound field subscribes to, and where the
//! configuration comes from.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{database::Database, query::LiveQuery};

use super::host::HostData;

// ============================================================================
// DatabaseRef
// ============================================================================

/// The database a live query runs against.
#[derive(Clone)]
pub enum DatabaseRef {
    /// Resolved (and created on first use) through the registry.
    Name(String),
    /// An already-built handle, used as is.
    Handle(Arc<dyn Database>),
}

impl PartialEq for DatabaseRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Name(a), Self::Name(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => {
                std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for DatabaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Self::Handle(db) => f.debug_tuple("Handle").field(&db.name()).finish(),
        }
    }
}

// ============================================================================
// QueryConfig
// ============================================================================

/// A normalized live query configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryConfig {
    pub selector: Value,
    pub sort: Option<Value>,
    pub skip: Option<usize>,
    pub limit: Option<usize>,
    /// Project only the head of each result batch.
    pub first: bool,
    /// Defaults to the bound field's name when `None`.
    pub database: Option<DatabaseRef>,
}

impl QueryConfig {
    pub fn new(selector: Value) -> Self {
        Self {
            selector,
            sort: None,
            skip: None,
            limit: None,
            first: false,
            database: None,
        }
    }

    /// Select every document.
    pub fn all() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    /// Normalize a JSON configuration.
    ///
    /// `null` and `false` mean "no configuration". An object carrying a
    /// non-null `selector` is a full configuration; anything else is taken as
    /// a bare selector. A string `database` key on a bare selector names the
    /// database and is not matched against documents.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bool(false) => None,
            Value::Object(mut obj)
                if obj.get("selector").map(|s| !s.is_null()).unwrap_or(false) =>
            {
                let selector = obj.remove("selector").unwrap_or(Value::Null);
                let sort = obj.remove("sort").filter(|s| !s.is_null());
                let skip = obj.get("skip").and_then(Value::as_u64).map(|n| n as usize);
                let limit = obj.get("limit").and_then(Value::as_u64).map(|n| n as usize);
                let first = obj.get("first").and_then(Value::as_bool).unwrap_or(false);
                let database = obj
                    .get("database")
                    .and_then(Value::as_str)
                    .map(|name| DatabaseRef::Name(name.to_string()));
                Some(Self {
                    selector,
                    sort,
                    skip,
                    limit,
                    first,
                    database,
                })
            }
            Value::Object(mut obj) => {
                let database = match obj.get("database") {
                    Some(Value::String(_)) => match obj.remove("database") {
                        Some(Value::String(name)) => Some(DatabaseRef::Name(name)),
                        _ => None,
                    },
                    _ => None,
                };
                Some(Self {
                    database,
                    ..Self::new(Value::Object(obj))
                })
            }
            selector => Some(Self::new(selector)),
        }
    }

    pub fn with_sort(mut self, sort: Value) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_first(mut self, first: bool) -> Self {
        self.first = first;
        self
    }

    pub fn with_database(mut self, name: impl Into<String>) -> Self {
        self.database = Some(DatabaseRef::Name(name.into()));
        self
    }

    pub fn with_handle(mut self, db: Arc<dyn Database>) -> Self {
        self.database = Some(DatabaseRef::Handle(db));
        self
    }

    /// The query passed to the database.
    pub fn live_query(&self) -> LiveQuery {
        LiveQuery {
            selector: self.selector.clone(),
            sort: self.sort.clone(),
            skip: self.skip,
            limit: self.limit,
        }
    }
}

// ============================================================================
// ConfigSource
// ============================================================================

type ComputeFn = dyn Fn(&HostData) -> Option<QueryConfig> + Send + Sync;

/// Where a binding's configuration comes from.
#[derive(Clone)]
pub enum ConfigSource {
    Fixed(Option<QueryConfig>),
    /// Re-evaluated against the host's data on every data change.
    Computed(Arc<ComputeFn>),
}

impl ConfigSource {
    pub fn fixed(config: QueryConfig) -> Self {
        Self::Fixed(Some(config))
    }

    /// A constant JSON configuration, normalized once.
    pub fn json(value: Value) -> Self {
        Self::Fixed(QueryConfig::from_value(value))
    }

    pub fn computed(
        f: impl Fn(&HostData) -> Option<QueryConfig> + Send + Sync + 'static,
    ) -> Self {
        Self::Computed(Arc::new(f))
    }

    /// A JSON-producing function, normalized on every evaluation.
    pub fn computed_json(f: impl Fn(&HostData) -> Value + Send + Sync + 'static) -> Self {
        Self::computed(move |data| QueryConfig::from_value(f(data)))
    }

    pub fn evaluate(&self, data: &HostData) -> Option<QueryConfig> {
        match self {
            Self::Fixed(config) => config.clone(),
            Self::Computed(f) => f(data),
        }
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(config) => f.debug_tuple("Fixed").field(config).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<QueryConfig> for ConfigSource {
    fn from(config: QueryConfig) -> Self {
        Self::fixed(config)
    }
}

impl From<Value> for ConfigSource {
    fn from(value: Value) -> Self {
        Self::json(value)
    }
}

// ============================================================================
// Tests
// ============================================================================
