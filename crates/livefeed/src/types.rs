//! Shared value types passed between the database seam, the binder and the
//! host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A JSON document as stored by the database.
pub type Document = Value;

// ============================================================================
// FieldValue
// ============================================================================

/// The value a live query projects into a reactive field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The whole result batch, in database order.
    Batch(Vec<Document>),
    /// Only the head of the batch (`first: true`). `None` for an empty batch.
    First(Option<Document>),
}

impl FieldValue {
    /// The empty value for a binding, depending on whether it projects the head.
    pub fn empty(first: bool) -> Self {
        if first {
            Self::First(None)
        } else {
            Self::Batch(Vec::new())
        }
    }

    /// Project a result batch.
    pub fn project(aggregate: Vec<Document>, first: bool) -> Self {
        if first {
            Self::First(aggregate.into_iter().next())
        } else {
            Self::Batch(aggregate)
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Batch(docs) => docs.is_empty(),
            Self::First(doc) => doc.is_none(),
        }
    }

    /// Whether this is the head projection.
    pub fn is_first(&self) -> bool {
        matches!(self, Self::First(_))
    }

    /// Number of documents held (0 or 1 for `First`).
    pub fn len(&self) -> usize {
        match self {
            Self::Batch(docs) => docs.len(),
            Self::First(doc) => usize::from(doc.is_some()),
        }
    }

    /// JSON view: an array for `Batch`, the document or `null` for `First`.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Batch(docs) => Value::Array(docs.clone()),
            Self::First(doc) => doc.clone().unwrap_or(Value::Null),
        }
    }
}

// ============================================================================
// Write / session results
// ============================================================================

/// Result of a single-document write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocResponse {
    pub ok: bool,
    pub id: String,
    pub rev: String,
}

/// Summary returned by `Database::info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub db_name: String,
    pub doc_count: usize,
    pub update_seq: u64,
}

/// The authenticated user as reported by the server session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// A user record's profile data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    #[serde(rename = "displayname", default)]
    pub display_name: Option<String>,
}

/// Session state after `connect`, `get_session` or `disconnect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub user: Option<SessionUser>,
    pub has_access: bool,
}

/// A session user merged with its profile's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub name: String,
    pub roles: Vec<String>,
    pub display_name: Option<String>,
}

/// Username/password pair kept for logins triggered on newly opened databases.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
