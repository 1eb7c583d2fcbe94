//! The connector contract.

use crate::connection::Connection;
use crate::error::ConnectError;
use crate::StateValue;
use async_trait::async_trait;
use chansync_core::{ChannelInfo, Event, StateStore};
use std::sync::Arc;

/// A state store handed to a connector. The connection becomes its only writer.
pub type BoxedStore<E, T> = Box<dyn StateStore<E, State = T>>;

/// What a connector needs to open a channel.
pub struct ConnectRequest<E, T> {
    pub info: ChannelInfo,
    pub store: BoxedStore<E, T>,
}

impl<E, T> ConnectRequest<E, T> {
    pub fn new(info: ChannelInfo, store: impl StateStore<E, State = T> + 'static) -> Self {
        Self {
            info,
            store: Box::new(store),
        }
    }
}

/// Transport-specific code that knows how to reach a remote for a channel.
///
/// Generic over the channel vocabulary so a transport can demand more of its
/// events (e.g. serde bounds for a wire codec). The default `connect` fails
/// with [`ConnectError::NotImplemented`]; concrete connectors override it,
/// usually by configuring a [`ReconcilingConnector`](crate::ReconcilingConnector).
#[async_trait]
pub trait Connector<E: Event, T: StateValue>: Send + Sync {
    async fn connect(
        &self,
        request: ConnectRequest<E, T>,
    ) -> Result<Arc<Connection<E, T>>, ConnectError> {
        tracing::warn!(channel = %request.info.id(), "connect called on a connector without a transport");
        Err(ConnectError::NotImplemented)
    }
}

/// A connector with no transport. Exists only to be extended.
#[derive(Debug, Clone, Copy, Default)]
pub struct BaseConnector;

impl<E: Event, T: StateValue> Connector<E, T> for BaseConnector {}

#[cfg(test)]
mod tests {
    use super::*;
    use chansync_core::ReducingStore;
    use chrono::{DateTime, Utc};

    #[derive(Debug, Clone)]
    struct Ping;

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "ping"
        }

        fn creation_time(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    #[tokio::test]
    async fn base_connector_fails_fast() {
        let request = ConnectRequest::<Ping, u32>::new(
            ChannelInfo::new("ping", "p1"),
            ReducingStore::new(0u32, |s: &mut u32, _: &Ping| *s += 1),
        );
        let result = BaseConnector.connect(request).await;
        assert!(matches!(result, Err(ConnectError::NotImplemented)));
    }
}
