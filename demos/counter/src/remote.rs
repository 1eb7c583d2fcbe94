//! Simulated remote and the connector that reaches it.

use crate::protocol::{self, CounterEvent};
use async_trait::async_trait;
use chansync_client::{
    ConnectError, ConnectRequest, Connection, Connector, DiscoveryEvent, DiscoveryState,
    ReconcilerConfig, ReconcilingConnector, SnapshotStore, SyncSettings, remote_sender,
    state_fetcher,
};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, watch};

/// Shared remote state.
#[derive(Clone)]
pub struct SimulatedRemote {
    value: Arc<RwLock<i64>>,
    events: broadcast::Sender<CounterEvent>,
}

impl SimulatedRemote {
    pub fn new(start: i64) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            value: Arc::new(RwLock::new(start)),
            events,
        }
    }

    pub async fn value(&self) -> i64 {
        *self.value.read().await
    }

    /// An event originating at the remote (another client, a server job).
    pub fn push(&self, event: CounterEvent) {
        let value = self.value.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            protocol::reduce(&mut *value.write().await, &event);
            let _ = events.send(event);
        });
    }

    fn subscribe(&self) -> BoxStream<'static, CounterEvent> {
        futures_util::stream::unfold(self.events.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(event) => return Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "remote feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

/// Reaches a [`SimulatedRemote`], with a switch standing in for the network.
pub struct SimulatedConnector {
    remote: SimulatedRemote,
    settings: SyncSettings,
    online: watch::Sender<bool>,
}

impl SimulatedConnector {
    pub fn new(remote: SimulatedRemote, settings: SyncSettings) -> Self {
        let (online, _) = watch::channel(false);
        Self {
            remote,
            settings,
            online,
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.send_replace(online);
    }

    fn connectivity(&self) -> BoxStream<'static, bool> {
        futures_util::stream::unfold(self.online.subscribe(), |mut rx| async move {
            rx.changed().await.ok()?;
            let online = *rx.borrow_and_update();
            Some((online, rx))
        })
        .boxed()
    }
}

#[async_trait]
impl Connector<CounterEvent, i64> for SimulatedConnector {
    async fn connect(
        &self,
        request: ConnectRequest<CounterEvent, i64>,
    ) -> Result<Arc<Connection<CounterEvent, i64>>, ConnectError> {
        let send_remote = self.remote.clone();
        let fetch_remote = self.remote.clone();
        let channel = request.info.id().to_string();

        let config = ReconcilerConfig {
            remote_events: Some(self.remote.subscribe()),
            connectivity: Some(self.connectivity()),
            send_to_remote: Some(remote_sender(move |event: CounterEvent| {
                let remote = send_remote.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    protocol::reduce(&mut *remote.value.write().await, &event);
                    Ok(())
                }
            })),
            fetch_remote_state: Some(state_fetcher(move || {
                let remote = fetch_remote.clone();
                async move { Ok(remote.value().await) }
            })),
            local_snapshots: self
                .settings
                .file_snapshots()
                .map(|store| Arc::new(store) as Arc<dyn SnapshotStore<i64>>),
            on_teardown: Some(Box::new(move || {
                tracing::info!("Released simulated transport for {}", channel);
            })),
            settings: self.settings.clone(),
            ..ReconcilerConfig::default()
        };

        Ok(ReconcilingConnector::new(request, config)?.build().await)
    }
}

#[async_trait]
impl Connector<DiscoveryEvent, DiscoveryState> for SimulatedConnector {
    async fn connect(
        &self,
        request: ConnectRequest<DiscoveryEvent, DiscoveryState>,
    ) -> Result<Arc<Connection<DiscoveryEvent, DiscoveryState>>, ConnectError> {
        let config = ReconcilerConfig {
            settings: self.settings.clone(),
            ..ReconcilerConfig::default()
        };
        Ok(ReconcilingConnector::new(request, config)?.build().await)
    }
}
