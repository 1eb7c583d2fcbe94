//! Client-side channel synchronization.
//!
//! A [`Connector`] turns a channel identity plus a state store into a live
//! [`Connection`]. Transports build connections through the
//! [`ReconcilingConnector`], which owns the offline / online-disconnected /
//! online state machine so transport code only supplies I/O hooks.
//!
//! ```text
//! registry ─► store factory ─► connector.connect ─► ReconcilingConnector ─► Connection ─► Channel
//! ```

mod channel;
mod connection;
mod connector;
mod error;
mod feed;
mod memory;
mod reconciler;
mod registry;
mod settings;
mod snapshot;

pub use channel::Channel;
pub use connection::Connection;
pub use connector::{BaseConnector, BoxedStore, ConnectRequest, Connector};
pub use error::{ConfigError, ConnectError, ConnectionError, SnapshotError};
pub use feed::{StateFeed, StateSubscription};
pub use memory::InMemoryConnector;
pub use reconciler::{
    ReconcilerConfig, ReconcilingConnector, RemoteSender, StateFetcher, StoreApplier,
    TeardownHook, remote_sender, state_fetcher,
};
pub use registry::{ChannelRegistry, StoreFactory};
pub use settings::SyncSettings;
pub use snapshot::{JsonFileSnapshotStore, MemorySnapshotStore, SnapshotStore};

pub use chansync_core::{
    ChannelEvent, ChannelInfo, ConnectionMode, ConnectionState, DiscoveryEvent, DiscoveryState,
    Event, Origin, ReducingStore, StateStore,
};

/// Values a connection can hold: cloned into snapshots and shared across tasks.
pub trait StateValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> StateValue for T {}
