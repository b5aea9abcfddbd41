//! Collaborator traits for the document database being bound.
//!
//! The binder and the API only ever talk to a database through these traits,
//! so any client (embedded, remote over HTTP, a test double) can be plugged
//! in through a [`DatabaseFactory`].

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::{DatabaseError, LiveFeedError, Result},
    query::LiveQuery,
    types::{DatabaseInfo, DocResponse, Document, UserContext, UserProfile},
};

use super::changes::{ChangesOptions, ChangesSink};

// ============================================================================
// Live query feed
// ============================================================================

/// An event emitted by a continuous query.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A new aggregate result batch is available. `change` is the document
    /// whose write produced it, if known.
    Update {
        change: Option<Document>,
        aggregate: Vec<Document>,
    },
    /// The initial snapshot is complete.
    Ready,
    /// The feed failed and will emit nothing further.
    Error(String),
    /// The feed was cancelled.
    Cancelled,
}

/// Callback receiving a feed's events, in emission order.
pub type FeedSink = Arc<dyn Fn(FeedEvent) + Send + Sync>;

/// Handle to one open continuous query.
///
/// `cancel` is a request: the database may still deliver events that were
/// already in flight. Calling it more than once is allowed.
pub trait FeedHandle: Send + Sync {
    fn cancel(&self);
    fn is_cancelled(&self) -> bool;
}

// ============================================================================
// Database
// ============================================================================

/// Outcome of one document in a `bulk_docs` call.
pub type BulkResult = std::result::Result<DocResponse, DatabaseError>;

fn unsupported(database: &str, operation: &str) -> LiveFeedError {
    DatabaseError::Unsupported {
        database: database.to_string(),
        operation: operation.to_string(),
    }
    .into()
}

/// A named database client handle.
///
/// Option objects (`opts`) are passed through untouched; `Value::Null` means
/// "no options". Operations beyond documents and live queries default to
/// `Unsupported`.
pub trait Database: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this handle talks to a server (and so supports sessions).
    fn is_remote(&self) -> bool {
        false
    }

    /// Open a continuous query. Events are delivered to `sink`, possibly
    /// before this call returns.
    fn live_find(&self, query: &LiveQuery, sink: FeedSink) -> Result<Box<dyn FeedHandle>>;

    fn get(&self, id: &str, opts: &Value) -> Result<Document>;
    fn put(&self, doc: Document, opts: &Value) -> Result<DocResponse>;
    fn post(&self, doc: Document, opts: &Value) -> Result<DocResponse>;
    fn remove(&self, doc: &Document, opts: &Value) -> Result<DocResponse>;
    fn all_docs(&self, opts: &Value) -> Result<Value>;

    /// Map/reduce view query.
    fn query(&self, view: &str, _opts: &Value) -> Result<Value> {
        Err(unsupported(self.name(), &format!("query({view})")))
    }

    /// One-shot Mango query: `{ selector, sort?, skip?, limit?, fields? }`
    /// answered with `{ "docs": [...] }`.
    fn find(&self, _request: &Value) -> Result<Value> {
        Err(unsupported(self.name(), "find"))
    }

    fn create_index(&self, _index: &Value) -> Result<Value> {
        Err(unsupported(self.name(), "create_index"))
    }

    /// Write several documents. Each gets its own outcome; a failed document
    /// does not stop the others. Documents with `"_deleted": true` are
    /// removed, documents without `_id` are posted.
    fn bulk_docs(&self, docs: Vec<Document>, opts: &Value) -> Result<Vec<BulkResult>> {
        Ok(docs
            .into_iter()
            .map(|doc| {
                let deleted = doc.get("_deleted").and_then(Value::as_bool).unwrap_or(false);
                let outcome = if deleted {
                    self.remove(&doc, opts)
                } else if doc.get("_id").is_some() {
                    self.put(doc, opts)
                } else {
                    self.post(doc, opts)
                };
                outcome.map_err(|e| match e {
                    LiveFeedError::Database(e) => e,
                    other => DatabaseError::Backend(other.to_string()),
                })
            })
            .collect())
    }

    /// Open a changes feed. Events are delivered to `sink`, possibly before
    /// this call returns.
    fn changes(&self, _options: &ChangesOptions, _sink: ChangesSink) -> Result<Box<dyn FeedHandle>> {
        Err(unsupported(self.name(), "changes"))
    }

    fn info(&self) -> Result<DatabaseInfo> {
        Err(unsupported(self.name(), "info"))
    }

    fn compact(&self, _opts: &Value) -> Result<Value> {
        Err(unsupported(self.name(), "compact"))
    }

    fn view_cleanup(&self) -> Result<Value> {
        Err(unsupported(self.name(), "view_cleanup"))
    }

    fn close(&self) -> Result<()>;
    fn destroy(&self) -> Result<()>;

    /// Session operations, available on remote handles.
    fn session(&self) -> Option<Arc<dyn SessionProvider>> {
        None
    }
}

// ============================================================================
// SessionProvider: server-side authentication
// ============================================================================

fn unsupported_admin(operation: &str) -> LiveFeedError {
    unsupported("_users", operation)
}

/// Authentication and user administration against a remote database's
/// server.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<UserContext>;
    async fn logout(&self) -> Result<()>;
    async fn get_session(&self) -> Result<UserContext>;
    async fn get_user(&self, name: &str) -> Result<UserProfile>;
    async fn signup(&self, username: &str, password: &str) -> Result<()>;

    /// Merge `metadata` into an existing user record.
    async fn put_user(&self, _username: &str, _metadata: Value) -> Result<DocResponse> {
        Err(unsupported_admin("put_user"))
    }

    async fn delete_user(&self, _username: &str) -> Result<DocResponse> {
        Err(unsupported_admin("delete_user"))
    }

    async fn change_password(&self, _username: &str, _password: &str) -> Result<DocResponse> {
        Err(unsupported_admin("change_password"))
    }

    async fn change_username(&self, _old: &str, _new: &str) -> Result<DocResponse> {
        Err(unsupported_admin("change_username"))
    }

    async fn sign_up_admin(&self, _username: &str, _password: &str) -> Result<()> {
        Err(unsupported_admin("sign_up_admin"))
    }

    async fn delete_admin(&self, _username: &str) -> Result<()> {
        Err(unsupported_admin("delete_admin"))
    }
}

// ============================================================================
// DatabaseFactory
// ============================================================================

/// Creates database handles by name.
pub trait DatabaseFactory: Send + Sync {
    fn open(&self, name: &str) -> Result<Arc<dyn Database>>;

    /// Create a handle with backend creation options. Factories without
    /// options ignore them.
    fn open_with_options(&self, name: &str, _options: &Value) -> Result<Arc<dyn Database>> {
        self.open(name)
    }
}

impl<F> DatabaseFactory for F
where
    F: Fn(&str) -> Result<Arc<dyn Database>> + Send + Sync,
{
    fn open(&self, name: &str) -> Result<Arc<dyn Database>> {
        self(name)
    }
}

/// `true` for names that address a server (`http://` / `https://`).
pub fn is_remote_name(name: &str) -> bool {
    name.starts_with("http://") || name.starts_with("https://")
}
