//! Changes feed: options, raw feed events and the running-feed handle.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::replication::{default_back_off, BackOff};

use super::traits::FeedHandle;

// ============================================================================
// Options
// ============================================================================

/// Options for `Database::changes`. Unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangesOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    /// `"now"` or a sequence number; changes at or before it are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<Value>,
    #[serde(default)]
    pub include_docs: bool,
    /// Only report documents matching this selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Value>,
    #[serde(skip)]
    pub back_off: Option<BackOff>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChangesOptions {
    /// Live, retrying, with [`default_back_off`], unless the caller chose
    /// otherwise.
    pub fn continuous(mut self) -> Self {
        self.live.get_or_insert(true);
        self.retry.get_or_insert(true);
        self.back_off.get_or_insert(default_back_off);
        self
    }

    pub fn is_live(&self) -> bool {
        self.live.unwrap_or(false)
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = Some(live);
        self
    }

    pub fn with_since(mut self, since: Value) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_include_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = include_docs;
        self
    }

    pub fn with_selector(mut self, selector: Value) -> Self {
        self.selector = Some(selector);
        self
    }
}

// ============================================================================
// Feed events
// ============================================================================

/// An event emitted by a changes feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangesFeedEvent {
    /// One change: `{ "id", "seq", "changes": [{ "rev" }] }`, plus
    /// `"deleted"` and `"doc"` when applicable.
    Change(Value),
    /// The feed finished: `{ "results", "last_seq" }`, or
    /// `{ "status": "cancelled", "last_seq" }` after a cancel.
    Complete(Value),
    Error(String),
}

/// Callback receiving a changes feed's events.
pub type ChangesSink = Arc<dyn Fn(ChangesFeedEvent) + Send + Sync>;

// ============================================================================
// ChangesHandle
// ============================================================================

/// A running changes feed.
pub struct ChangesHandle {
    pub database: String,
    handle: Box<dyn FeedHandle>,
}

impl ChangesHandle {
    pub fn new(database: impl Into<String>, handle: Box<dyn FeedHandle>) -> Self {
        Self {
            database: database.into(),
            handle,
        }
    }

    pub fn cancel(&self) {
        tracing::debug!(database = %self.database, "cancelling changes feed");
        self.handle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }
}

impl std::fmt::Debug for ChangesHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesHandle")
            .field("database", &self.database)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
