//! Starts replications and forwards their events to a component.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::{
    database::{DatabaseRegistry, FeedHandle},
    error::{ReplicationError, Result},
    reactive::ReactiveHost,
};

use super::types::{
    RawReplicationEvent, ReplicationDirection, ReplicationEvent, ReplicationOptions,
    ReplicationSink, Replicator,
};

// ============================================================================
// ReplicationForwarder
// ============================================================================

/// Translates one replication's raw events into [`ReplicationEvent`]s.
///
/// A sync's first idle pause only means the initial catch-up finished, so
/// `Paused` is reported for a sync from its second pause on. Push and pull
/// report every pause.
pub struct ReplicationForwarder {
    host: Weak<dyn ReactiveHost>,
    direction: ReplicationDirection,
    database: String,
    pauses: AtomicUsize,
}

impl ReplicationForwarder {
    pub fn new(
        host: Weak<dyn ReactiveHost>,
        direction: ReplicationDirection,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host,
            direction,
            database: database.into(),
            pauses: AtomicUsize::new(0),
        }
    }

    pub fn into_sink(self) -> ReplicationSink {
        let forwarder = Arc::new(self);
        Arc::new(move |event| forwarder.forward(event))
    }

    /// Idle pauses seen so far.
    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }

    pub fn forward(&self, raw: RawReplicationEvent) {
        let Some(event) = self.translate(raw) else {
            return;
        };
        if let Some(host) = self.host.upgrade() {
            host.emit(event.into());
        }
    }

    fn translate(&self, raw: RawReplicationEvent) -> Option<ReplicationEvent> {
        let direction = self.direction;
        let database = self.database.clone();
        let event = match raw {
            RawReplicationEvent::Paused(Some(error)) => {
                tracing::warn!(database = %database, %direction, error = %error, "replication paused on error");
                ReplicationEvent::Error {
                    direction,
                    database,
                    error,
                }
            }
            RawReplicationEvent::Paused(None) => {
                let pauses = self.pauses.fetch_add(1, Ordering::SeqCst) + 1;
                if direction == ReplicationDirection::Sync && pauses < 2 {
                    return None;
                }
                ReplicationEvent::Paused {
                    direction,
                    database,
                }
            }
            RawReplicationEvent::Change(info) => ReplicationEvent::Change {
                direction,
                database,
                info,
            },
            RawReplicationEvent::Active => ReplicationEvent::Active {
                direction,
                database,
            },
            RawReplicationEvent::Denied(error) => ReplicationEvent::Denied {
                direction,
                database,
                error,
            },
            RawReplicationEvent::Complete(info) => ReplicationEvent::Complete {
                direction,
                database,
                info,
            },
            RawReplicationEvent::Error(error) => {
                tracing::warn!(database = %database, %direction, error = %error, "replication error");
                ReplicationEvent::Error {
                    direction,
                    database,
                    error,
                }
            }
        };
        Some(event)
    }
}

// ============================================================================
// ReplicationHandle
// ============================================================================

/// A running replication.
pub struct ReplicationHandle {
    pub direction: ReplicationDirection,
    pub source: String,
    pub target: String,
    handle: Box<dyn FeedHandle>,
}

impl ReplicationHandle {
    pub fn cancel(&self) {
        tracing::debug!(source = %self.source, target = %self.target, direction = %self.direction, "cancelling replication");
        self.handle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }
}

impl std::fmt::Debug for ReplicationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationHandle")
            .field("direction", &self.direction)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Open `local` and `remote` through the registry and start replicating.
///
/// For push and sync the local database is the source; for pull it is the
/// target. Events are reported on `host` under the local database's name.
pub fn start_replication(
    registry: &DatabaseRegistry,
    replicator: Option<&Arc<dyn Replicator>>,
    host: Weak<dyn ReactiveHost>,
    local: &str,
    remote: &str,
    direction: ReplicationDirection,
    options: &ReplicationOptions,
) -> Result<ReplicationHandle> {
    let replicator = replicator.ok_or(ReplicationError::Unavailable)?;

    let local_db = registry.open(local)?;
    let remote_db = registry.open(remote)?;
    for opened in [&local_db, &remote_db] {
        if opened.created {
            registry.login_pending(&opened.database);
        }
    }

    let (source, target) = match direction {
        ReplicationDirection::Pull => (&remote_db.database, &local_db.database),
        ReplicationDirection::Push | ReplicationDirection::Sync => {
            (&local_db.database, &remote_db.database)
        }
    };

    let sink = ReplicationForwarder::new(host, direction, local).into_sink();
    tracing::debug!(source = source.name(), target = target.name(), %direction, "starting replication");
    let handle = replicator
        .replicate(source, target, direction, options, sink)
        .map_err(|e| ReplicationError::Failed {
            source_db: source.name().to_string(),
            target: target.name().to_string(),
            message: e.to_string(),
        })?;

    Ok(ReplicationHandle {
        direction,
        source: source.name().to_string(),
        target: target.name().to_string(),
        handle,
    })
}
