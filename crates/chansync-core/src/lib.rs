//! Core types and traits for channel state synchronization.
//!
//! This crate provides the synchronous primitives: channel identity, the event
//! contract, and the reducer-backed state store. Applications define their own
//! event vocabularies and state types; `chansync-client` wires them to remotes.

mod channel;
mod discovery;
mod event;
mod store;

pub use channel::{ChannelInfo, ChannelInfoParseError, SnapshotRole};
pub use discovery::{DISCOVERY_CHANNEL_ID, DiscoveryEvent, DiscoveryReducer, DiscoveryState};
pub use event::{ChannelEvent, Event, Origin};
pub use store::{Reducer, ReducingStore, StateStore};

use serde::{Deserialize, Serialize};

/// Connection lifecycle mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionMode {
    /// Remote unreachable. Local events are applied but not forwarded.
    #[default]
    Offline,
    /// Remote reachable and resynced, awaiting an explicit reconnect.
    OnlineDisconnected,
    /// Normal operation. Local events are forwarded to the remote.
    Online,
}

impl ConnectionMode {
    /// Whether local events should be forwarded in this mode.
    pub fn forwards(self) -> bool {
        self == ConnectionMode::Online
    }
}

/// Mode plus the last value the remote is known to hold.
///
/// The server snapshot is replaced wholesale on every update, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState<T> {
    pub mode: ConnectionMode,
    pub last_known_server_state: T,
}

impl<T> ConnectionState<T> {
    pub fn new(mode: ConnectionMode, last_known_server_state: T) -> Self {
        Self {
            mode,
            last_known_server_state,
        }
    }
}
