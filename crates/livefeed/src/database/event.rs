//! Database lifecycle and changes-feed notifications delivered to components.

use serde_json::Value;

use super::changes::ChangesFeedEvent;

/// A database handle was created or destroyed through the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseEvent {
    Created { database: String },
    Destroyed { database: String },
}

impl DatabaseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Created { .. } => "db-created",
            Self::Destroyed { .. } => "db-destroyed",
        }
    }

    pub fn database(&self) -> &str {
        match self {
            Self::Created { database } | Self::Destroyed { database } => database,
        }
    }
}

/// A changes-feed event, tagged with the database it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangesEvent {
    Change { database: String, info: Value },
    Complete { database: String, info: Value },
    Error { database: String, error: String },
}

impl ChangesEvent {
    pub fn from_feed(database: &str, event: ChangesFeedEvent) -> Self {
        let database = database.to_string();
        match event {
            ChangesFeedEvent::Change(info) => Self::Change { database, info },
            ChangesFeedEvent::Complete(info) => Self::Complete { database, info },
            ChangesFeedEvent::Error(error) => Self::Error { database, error },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Change { .. } => "changes-change",
            Self::Complete { .. } => "changes-complete",
            Self::Error { .. } => "changes-error",
        }
    }

    pub fn database(&self) -> &str {
        match self {
            Self::Change { database, .. }
            | Self::Complete { database, .. }
            | Self::Error { database, .. } => database,
        }
    }
}
