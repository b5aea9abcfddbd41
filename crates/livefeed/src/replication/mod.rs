pub mod forward;
pub mod types;

pub use forward::{start_replication, ReplicationForwarder, ReplicationHandle};
pub use types::{
    default_back_off, BackOff, RawReplicationEvent, ReplicationDirection, ReplicationEvent,
    ReplicationOptions, ReplicationSink, Replicator,
};
