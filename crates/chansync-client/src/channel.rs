//! Application-facing channel handle.

use crate::connection::Connection;
use crate::error::ConnectionError;
use crate::StateValue;
use chansync_core::{ChannelEvent, ChannelInfo, ConnectionMode, Event};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A narrow view of a [`Connection`]: emit, observe, read.
///
/// Holds no state of its own. Clones share the connection.
pub struct Channel<E, T> {
    connection: Arc<Connection<E, T>>,
}

impl<E, T> Clone for Channel<E, T> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
        }
    }
}

impl<E: Event, T: StateValue> Channel<E, T> {
    pub fn new(connection: Arc<Connection<E, T>>) -> Self {
        Self { connection }
    }

    pub fn info(&self) -> &ChannelInfo {
        self.connection.info()
    }

    pub fn emit(&self, event: E) -> Result<(), ConnectionError> {
        self.connection.emit(event)
    }

    pub fn events(&self) -> broadcast::Receiver<ChannelEvent<E>> {
        self.connection.events()
    }

    pub fn state(&self) -> T {
        self.connection.state()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.connection.with_state(f)
    }

    pub fn mode(&self) -> ConnectionMode {
        self.connection.mode()
    }

    pub fn connection(&self) -> &Arc<Connection<E, T>> {
        &self.connection
    }

    /// Tear down the underlying connection.
    pub fn close(&self) {
        self.connection.unsubscribe();
    }
}
