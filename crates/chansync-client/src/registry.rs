//! Channel registry: identity → facade, plus the discovery channel.

use crate::channel::Channel;
use crate::connection::Connection;
use crate::connector::{BoxedStore, ConnectRequest, Connector};
use crate::error::{ConnectError, ConnectionError};
use crate::StateValue;
use chansync_core::{
    ChannelInfo, DISCOVERY_CHANNEL_ID, DiscoveryEvent, DiscoveryReducer, DiscoveryState, Event,
    ReducingStore,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Creates a fresh store for a channel.
pub type StoreFactory<E, T> = Arc<dyn Fn(&ChannelInfo) -> BoxedStore<E, T> + Send + Sync>;

/// Opens channels of one event/state vocabulary through a connector.
///
/// Owns exactly one discovery channel, connected when the registry is created.
/// Whether two `get_channel` calls for the same id share a connection is up to
/// the connector. Opened channels are tracked weakly; the caller's handles
/// decide how long a connection lives.
pub struct ChannelRegistry<C, E, T> {
    connector: Arc<C>,
    factory: StoreFactory<E, T>,
    discovery: Channel<DiscoveryEvent, DiscoveryState>,
    open: Mutex<HashMap<String, Weak<Connection<E, T>>>>,
}

impl<C, E, T> ChannelRegistry<C, E, T>
where
    C: Connector<E, T> + Connector<DiscoveryEvent, DiscoveryState>,
    E: Event,
    T: StateValue,
{
    pub async fn new<F>(connector: Arc<C>, factory: F) -> Result<Self, ConnectError>
    where
        F: Fn(&ChannelInfo) -> BoxedStore<E, T> + Send + Sync + 'static,
    {
        let info = ChannelInfo::new("discovery", DISCOVERY_CHANNEL_ID).named("Discovery");
        let request = ConnectRequest::<DiscoveryEvent, DiscoveryState>::new(
            info,
            ReducingStore::new(Vec::new(), DiscoveryReducer),
        );
        let connection =
            <C as Connector<DiscoveryEvent, DiscoveryState>>::connect(&*connector, request).await?;
        let discovery = Channel::new(connection);

        Ok(Self {
            connector,
            factory: Arc::new(factory),
            discovery,
            open: Mutex::new(HashMap::new()),
        })
    }

    /// Create a store for `info` and connect it.
    pub async fn get_channel(&self, info: &ChannelInfo) -> Result<Channel<E, T>, ConnectError> {
        let store = (self.factory)(info);
        let request = ConnectRequest {
            info: info.clone(),
            store,
        };
        let connection = <C as Connector<E, T>>::connect(&*self.connector, request).await?;
        let mut open = self.open.lock();
        open.retain(|_, weak| weak.strong_count() > 0);
        open.insert(info.id().to_string(), Arc::downgrade(&connection));
        Ok(Channel::new(connection))
    }

    /// Announce a channel on the discovery channel, then connect it.
    pub async fn register_channel(
        &self,
        info: &ChannelInfo,
    ) -> Result<Channel<E, T>, ConnectError> {
        let channel = self.get_channel(info).await?;
        if let Err(e) = self.discovery.emit(DiscoveryEvent::created(info.clone())) {
            tracing::warn!(channel = %info.id(), "failed to announce channel: {}", e);
        }
        Ok(channel)
    }

    /// Announce a channel's removal and close it if this registry opened it.
    pub fn remove_channel(&self, channel_id: &str) -> Result<(), ConnectionError> {
        self.discovery.emit(DiscoveryEvent::removed(channel_id))?;
        let removed = self.open.lock().remove(channel_id);
        if let Some(connection) = removed.as_ref().and_then(Weak::upgrade) {
            connection.unsubscribe();
        }
        Ok(())
    }

    /// Channels currently announced on the discovery channel.
    pub fn known_channels(&self) -> DiscoveryState {
        self.discovery.state()
    }

    pub fn discovery(&self) -> &Channel<DiscoveryEvent, DiscoveryState> {
        &self.discovery
    }

    pub fn connector(&self) -> &Arc<C> {
        &self.connector
    }
}
