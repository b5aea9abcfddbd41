use thiserror::Error;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A live-query configuration that could not be turned into a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Database \"{database}\" for field \"{field}\" could not be resolved: {reason}")]
    UnresolvedDatabase {
        field: String,
        database: String,
        reason: String,
    },

    #[error("Invalid live query configuration for field \"{field}\": {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Invalid plugin configuration: {0}")]
    InvalidPluginConfig(String),
}

// ---------------------------------------------------------------------------
// DatabaseError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    #[error("Document not found: {database}/{id}")]
    NotFound { database: String, id: String },

    #[error("Document update conflict: {database}/{id}")]
    Conflict { database: String, id: String },

    #[error("Database \"{0}\" is not remote")]
    NotRemote(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database \"{0}\" is closed")]
    Closed(String),

    #[error("Operation not supported by database \"{database}\": {operation}")]
    Unsupported { database: String, operation: String },

    #[error("Database backend error: {0}")]
    Backend(String),
}

impl DatabaseError {
    /// HTTP-like status code, matching what a CouchDB-style server reports.
    pub fn status(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::NotRemote(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Closed(_) => 412,
            Self::Unsupported { .. } => 501,
            Self::Backend(_) => 500,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid regex: {0}")]
    InvalidRegex(String),

    #[error("Invalid sort specification: {0}")]
    InvalidSort(String),
}

// ---------------------------------------------------------------------------
// ReplicationError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    #[error("No replicator installed")]
    Unavailable,

    #[error("Replication from \"{source_db}\" to \"{target}\" failed: {message}")]
    Failed {
        source_db: String,
        target: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// LiveFeedError: top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveFeedError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Replication(#[from] ReplicationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias: the default error type is `LiveFeedError`.
pub type Result<T, E = LiveFeedError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
