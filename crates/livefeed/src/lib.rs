pub mod error;
pub mod types;

pub mod api;
pub mod database;
pub mod plugin;
pub mod query;
pub mod reactive;
pub mod replication;

pub use api::DatabaseApi;
pub use error::{LiveFeedError, Result};
pub use plugin::{LiveFeedPlugin, LiveQueries, Mounted, PluginConfig, PluginOptions};
pub use reactive::{Component, ConfigSource, LiveFeedEvent, LiveQueryBinder, QueryConfig};
pub use types::FieldValue;
