//! Notifications a component receives from its live queries and replications.

use crate::{
    database::{ChangesEvent, DatabaseEvent},
    error::ConfigError,
    replication::ReplicationEvent,
};

/// What happened to a bound field's live query.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveFeedEvent {
    /// The field received a new result; `count` documents were assigned.
    Update { field: String, count: usize },
    /// The initial snapshot completed and was assigned.
    Ready { field: String },
    /// The subscription failed and is terminated.
    Error { field: String, error: String },
    /// The subscription was cancelled (replaced, unbound or closed).
    Cancel { field: String },
    /// The config source produced no config; the previous subscription stays.
    NoSelector { field: String },
    /// The config could not be turned into a subscription.
    ConfigError { field: String, error: ConfigError },
}

impl LiveFeedEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update { .. } => "livefeed-update",
            Self::Ready { .. } => "livefeed-ready",
            Self::Error { .. } => "livefeed-error",
            Self::Cancel { .. } => "livefeed-cancel",
            Self::NoSelector { .. } => "livefeed-no-selector",
            Self::ConfigError { .. } => "livefeed-config-error",
        }
    }

    /// The bound field this event concerns.
    pub fn field(&self) -> &str {
        match self {
            Self::Update { field, .. }
            | Self::Ready { field }
            | Self::Error { field, .. }
            | Self::Cancel { field }
            | Self::NoSelector { field }
            | Self::ConfigError { field, .. } => field,
        }
    }
}

/// Any event emitted on a component.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    LiveFeed(LiveFeedEvent),
    Replication(ReplicationEvent),
    Changes(ChangesEvent),
    Database(DatabaseEvent),
}

impl HostEvent {
    pub fn name(&self) -> String {
        match self {
            Self::LiveFeed(e) => e.name().to_string(),
            Self::Replication(e) => e.name(),
            Self::Changes(e) => e.name().to_string(),
            Self::Database(e) => e.name().to_string(),
        }
    }

    pub fn as_live_feed(&self) -> Option<&LiveFeedEvent> {
        match self {
            Self::LiveFeed(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_replication(&self) -> Option<&ReplicationEvent> {
        match self {
            Self::Replication(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_changes(&self) -> Option<&ChangesEvent> {
        match self {
            Self::Changes(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_database(&self) -> Option<&DatabaseEvent> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LiveFeedEvent> for HostEvent {
    fn from(e: LiveFeedEvent) -> Self {
        Self::LiveFeed(e)
    }
}

impl From<ReplicationEvent> for HostEvent {
    fn from(e: ReplicationEvent) -> Self {
        Self::Replication(e)
    }
}

impl From<ChangesEvent> for HostEvent {
    fn from(e: ChangesEvent) -> Self {
        Self::Changes(e)
    }
}

impl From<DatabaseEvent> for HostEvent {
    fn from(e: DatabaseEvent) -> Self {
        Self::Database(e)
    }
}
