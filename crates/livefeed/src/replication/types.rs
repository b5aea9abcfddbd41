//! Replication collaborator trait, options and event types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    database::{Database, FeedHandle},
    error::Result,
};

// ============================================================================
// Direction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicationDirection {
    /// Bidirectional, continuous.
    Sync,
    /// Local to remote.
    Push,
    /// Remote to local.
    Pull,
}

impl ReplicationDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }
}

impl fmt::Display for ReplicationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Options
// ============================================================================

/// Retry delay policy: previous delay in milliseconds to the next one.
pub type BackOff = fn(u64) -> u64;

/// First retry after one second, then triple each time.
pub fn default_back_off(delay_ms: u64) -> u64 {
    if delay_ms == 0 {
        1000
    } else {
        delay_ms.saturating_mul(3)
    }
}

/// Options handed to the replicator. Unknown keys are kept in `extra` and
/// passed through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<bool>,
    /// Only replicate documents matching this selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip)]
    pub back_off: Option<BackOff>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReplicationOptions {
    /// Continuous replication that retries with [`default_back_off`], for
    /// whichever of `live`, `retry` and `back_off` the caller left unset.
    pub fn continuous(mut self) -> Self {
        self.live.get_or_insert(true);
        self.retry.get_or_insert(true);
        self.back_off.get_or_insert(default_back_off);
        self
    }

    pub fn is_live(&self) -> bool {
        self.live.unwrap_or(false)
    }

    pub fn is_retry(&self) -> bool {
        self.retry.unwrap_or(false)
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = Some(live);
        self
    }

    pub fn with_retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_back_off(mut self, back_off: BackOff) -> Self {
        self.back_off = Some(back_off);
        self
    }

    pub fn with_selector(mut self, selector: Value) -> Self {
        self.selector = Some(selector);
        self
    }
}

// ============================================================================
// Events
// ============================================================================

/// Event as reported by the replicator.
#[derive(Debug, Clone, PartialEq)]
pub enum RawReplicationEvent {
    Change(Value),
    /// Replication went idle; `Some` carries the error that paused it.
    Paused(Option<String>),
    Active,
    Denied(String),
    Complete(Value),
    Error(String),
}

/// Replication event as delivered to a component.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplicationEvent {
    Change {
        direction: ReplicationDirection,
        database: String,
        info: Value,
    },
    Paused {
        direction: ReplicationDirection,
        database: String,
    },
    Active {
        direction: ReplicationDirection,
        database: String,
    },
    Denied {
        direction: ReplicationDirection,
        database: String,
        error: String,
    },
    Complete {
        direction: ReplicationDirection,
        database: String,
        info: Value,
    },
    Error {
        direction: ReplicationDirection,
        database: String,
        error: String,
    },
}

impl ReplicationEvent {
    fn kind(&self) -> &'static str {
        match self {
            Self::Change { .. } => "change",
            Self::Paused { .. } => "paused",
            Self::Active { .. } => "active",
            Self::Denied { .. } => "denied",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn direction(&self) -> ReplicationDirection {
        match self {
            Self::Change { direction, .. }
            | Self::Paused { direction, .. }
            | Self::Active { direction, .. }
            | Self::Denied { direction, .. }
            | Self::Complete { direction, .. }
            | Self::Error { direction, .. } => *direction,
        }
    }

    /// The local database the replication was started for.
    pub fn database(&self) -> &str {
        match self {
            Self::Change { database, .. }
            | Self::Paused { database, .. }
            | Self::Active { database, .. }
            | Self::Denied { database, .. }
            | Self::Complete { database, .. }
            | Self::Error { database, .. } => database,
        }
    }

    /// `replication-<direction>-<kind>`, e.g. `replication-sync-paused`.
    pub fn name(&self) -> String {
        format!("replication-{}-{}", self.direction(), self.kind())
    }
}

// ============================================================================
// Replicator
// ============================================================================

/// Callback receiving raw replication events.
pub type ReplicationSink = Arc<dyn Fn(RawReplicationEvent) + Send + Sync>;

/// Starts replications between two database handles.
pub trait Replicator: Send + Sync {
    fn replicate(
        &self,
        source: &Arc<dyn Database>,
        target: &Arc<dyn Database>,
        direction: ReplicationDirection,
        options: &ReplicationOptions,
        sink: ReplicationSink,
    ) -> Result<Box<dyn FeedHandle>>;
}
