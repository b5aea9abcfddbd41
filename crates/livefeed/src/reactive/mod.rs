//! Reactive layer: live queries projected into component fields.
//!
//! # Overview
//!
//! A [`ReactiveHost`] owns plain data and fields. A [`LiveQueryBinder`]
//! watches a [`ConfigSource`] per field and keeps exactly one live query open
//! for it, writing every result batch into the field and reporting what
//! happened as [`LiveFeedEvent`]s on the host.
//!
//! # Modules
//!
//! - [`binder`]: [`LiveQueryBinder`].
//! - [`config`]: [`QueryConfig`], [`DatabaseRef`], [`ConfigSource`].
//! - [`event`]: [`LiveFeedEvent`] and the [`HostEvent`] envelope.
//! - [`host`]: the [`ReactiveHost`] seam, [`watch_value`] and [`Component`].
//! - [`notifier`]: typed listener list ([`Notifier<T>`]).

pub mod binder;
pub mod config;
pub mod event;
pub mod host;
pub mod notifier;

pub use binder::LiveQueryBinder;
pub use config::{ConfigSource, DatabaseRef, QueryConfig};
pub use event::{HostEvent, LiveFeedEvent};
pub use host::{watch_value, Component, FieldChange, HostData, ReactiveHost, WatchEffect, WatchId};
pub use notifier::{ListenerId, Notifier};
