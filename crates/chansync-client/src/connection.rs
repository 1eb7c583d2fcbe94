//! Live connections.

use crate::connector::BoxedStore;
use crate::error::ConnectionError;
use crate::feed::{StateFeed, StateSubscription};
use crate::reconciler::{Command, StoreApplier, TeardownHook};
use crate::StateValue;
use chansync_core::{ChannelEvent, ChannelInfo, ConnectionMode, ConnectionState, Event, Origin};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, mpsc, watch};

/// The serialized apply path shared by local emits and the remote feed.
///
/// Applying and publishing happen under one lock, so the event stream observes
/// exactly the order in which events reached the store.
pub(crate) struct Pipeline<E, T> {
    inner: Mutex<PipelineInner<E, T>>,
}

struct PipelineInner<E, T> {
    store: BoxedStore<E, T>,
    apply: StoreApplier<E, T>,
    events: Option<broadcast::Sender<ChannelEvent<E>>>,
}

impl<E: Event, T: StateValue> Pipeline<E, T> {
    pub(crate) fn new(
        store: BoxedStore<E, T>,
        apply: StoreApplier<E, T>,
        events: broadcast::Sender<ChannelEvent<E>>,
    ) -> Self {
        Self {
            inner: Mutex::new(PipelineInner {
                store,
                apply,
                events: Some(events),
            }),
        }
    }

    /// Apply one event and return the store's value afterwards.
    ///
    /// Returns `None` once the pipeline is closed.
    pub(crate) fn apply(&self, origin: Origin, event: &E) -> Option<T> {
        let mut inner = self.inner.lock();
        let PipelineInner {
            store,
            apply,
            events,
        } = &mut *inner;
        let events = events.as_ref()?;
        (**apply)(&mut **store, event);
        let snapshot = store.state().clone();
        let _ = events.send(ChannelEvent {
            origin,
            event: event.clone(),
        });
        Some(snapshot)
    }

    pub(crate) fn state(&self) -> T {
        self.inner.lock().store.state().clone()
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(self.inner.lock().store.state())
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ChannelEvent<E>> {
        match &self.inner.lock().events {
            Some(tx) => tx.subscribe(),
            None => {
                // Already finalized: hand out a receiver that reports Closed.
                let (_, rx) = broadcast::channel(1);
                rx
            }
        }
    }
}

impl<E, T> Pipeline<E, T> {
    /// Finalize the event stream. Later applies are dropped.
    pub(crate) fn close(&self) {
        self.inner.lock().events = None;
    }
}

/// A live channel connection.
///
/// Owns the channel's store; every write goes through [`emit`](Self::emit) or
/// the connector's remote feed. Torn down exactly once, by
/// [`unsubscribe`](Self::unsubscribe) or by dropping the last handle.
pub struct Connection<E, T> {
    info: ChannelInfo,
    pipeline: Arc<Pipeline<E, T>>,
    states: Arc<StateFeed<ConnectionState<T>>>,
    commands: mpsc::UnboundedSender<Command<E, T>>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    teardown: Mutex<Option<TeardownHook>>,
}

impl<E: Event, T: StateValue> Connection<E, T> {
    pub(crate) fn new(
        info: ChannelInfo,
        pipeline: Arc<Pipeline<E, T>>,
        states: Arc<StateFeed<ConnectionState<T>>>,
        commands: mpsc::UnboundedSender<Command<E, T>>,
        shutdown: watch::Sender<bool>,
        teardown: Option<TeardownHook>,
    ) -> Self {
        Self {
            info,
            pipeline,
            states,
            commands,
            shutdown,
            closed: AtomicBool::new(false),
            teardown: Mutex::new(teardown),
        }
    }

    pub fn info(&self) -> &ChannelInfo {
        &self.info
    }

    /// Apply a local event to the store now, then hand it to the connector
    /// for persistence and, while online, forwarding to the remote.
    ///
    /// A panicking reducer propagates to the caller.
    pub fn emit(&self, event: E) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        let snapshot = self
            .pipeline
            .apply(Origin::Local, &event)
            .ok_or(ConnectionError::Closed)?;
        tracing::debug!(channel = %self.info.id(), event = event.event_type(), "applied local event");
        self.commands
            .send(Command::Local { event, snapshot })
            .map_err(|_| ConnectionError::Closed)
    }

    /// All applied events, local and remote, from now on.
    pub fn events(&self) -> broadcast::Receiver<ChannelEvent<E>> {
        self.pipeline.subscribe()
    }

    /// Connection states, starting with the current one.
    pub fn connection_states(&self) -> StateSubscription<ConnectionState<T>> {
        self.states.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState<T> {
        self.states.current()
    }

    pub fn mode(&self) -> ConnectionMode {
        self.states.current().mode
    }

    /// An owned copy of the store's current value.
    pub fn state(&self) -> T {
        self.pipeline.state()
    }

    /// Borrow the store's current value without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.pipeline.with_state(f)
    }

    /// Move from online-disconnected to online. A no-op in any other mode.
    pub fn reconnect(&self) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        self.commands
            .send(Command::Reconnect)
            .map_err(|_| ConnectionError::Closed)
    }

    /// Tear the connection down. Idempotent; the teardown hook fires once.
    pub fn unsubscribe(&self) {
        if self.shut_down() {
            tracing::info!(channel = %self.info.id(), "connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the connection has been torn down.
    pub async fn closed(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl<E, T> Connection<E, T> {
    /// Returns false if the connection was already down.
    fn shut_down(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.pipeline.close();
        let _ = self.shutdown.send(true);
        if let Some(hook) = self.teardown.lock().take() {
            hook();
        }
        true
    }
}

impl<E, T> Drop for Connection<E, T> {
    fn drop(&mut self) {
        if self.shut_down() {
            tracing::debug!(channel = %self.info.id(), "connection dropped");
        }
    }
}
