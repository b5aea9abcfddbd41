//! Database seam: collaborator traits, the handle registry and the in-memory
//! reference implementation.

pub mod changes;
pub mod event;
pub mod memory;
pub mod registry;
pub mod traits;

pub use changes::{ChangesFeedEvent, ChangesHandle, ChangesOptions, ChangesSink};
pub use event::{ChangesEvent, DatabaseEvent};
pub use memory::{MemoryDatabase, MemoryFactory, MemorySession};
pub use registry::{DatabaseRegistry, Opened};
pub use traits::{
    is_remote_name, BulkResult, Database, DatabaseFactory, FeedEvent, FeedHandle, FeedSink,
    SessionProvider,
};
