//! In-process connector for tests and local-only channels.

use crate::connection::Connection;
use crate::connector::{ConnectRequest, Connector};
use crate::error::ConnectError;
use crate::reconciler::{ReconcilerConfig, ReconcilingConnector};
use crate::settings::SyncSettings;
use crate::StateValue;
use async_trait::async_trait;
use chansync_core::Event;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

/// A connector with no remote. Connections stay offline forever.
///
/// Deduplicates by channel id: connecting again to an open channel returns
/// the same `Arc<Connection>` and discards the new request's store. Only weak
/// references are kept, so dropping the last handle still tears the
/// connection down.
#[derive(Default)]
pub struct InMemoryConnector {
    connections: Mutex<HashMap<String, Weak<dyn Any + Send + Sync>>>,
    settings: SyncSettings,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: SyncSettings) -> Self {
        Self {
            connections: Mutex::default(),
            settings,
        }
    }

    /// Number of connections still held somewhere.
    pub async fn len(&self) -> usize {
        self.connections
            .lock()
            .await
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<E: Event, T: StateValue> Connector<E, T> for InMemoryConnector {
    async fn connect(
        &self,
        request: ConnectRequest<E, T>,
    ) -> Result<Arc<Connection<E, T>>, ConnectError> {
        let mut connections = self.connections.lock().await;
        connections.retain(|_, weak| weak.strong_count() > 0);
        let id = request.info.id().to_string();

        if let Some(existing) = connections.get(&id).and_then(Weak::upgrade) {
            let connection = existing
                .downcast::<Connection<E, T>>()
                .map_err(|_| ConnectError::TypeMismatch {
                    channel_id: id.clone(),
                })?;
            if !connection.is_closed() {
                tracing::debug!(channel = %id, "reusing open connection");
                return Ok(connection);
            }
        }

        let config = ReconcilerConfig {
            settings: self.settings.clone(),
            ..ReconcilerConfig::default()
        };
        let connection = ReconcilingConnector::new(request, config)?.build().await;
        let weak: Weak<dyn Any + Send + Sync> = Arc::downgrade(&connection) as Weak<Connection<E, T>>;
        connections.insert(id, weak);
        Ok(connection)
    }
}
