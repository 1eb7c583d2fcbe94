//! The reconciling connector: the offline / online-disconnected / online
//! state machine shared by every transport.
//!
//! Transitions:
//!
//! | From                        | Trigger              | To                  |
//! |-----------------------------|----------------------|---------------------|
//! | online, online-disconnected | connectivity = false | offline             |
//! | offline                     | connectivity = true  | online-disconnected |
//! | online-disconnected         | `reconnect()`        | online              |
//!
//! Entering online-disconnected always pulls the full remote state; nothing
//! is known about divergence after a disconnect. Every other combination is
//! a no-op.

use crate::connection::{Connection, Pipeline};
use crate::connector::{BoxedStore, ConnectRequest};
use crate::error::ConfigError;
use crate::feed::StateFeed;
use crate::settings::SyncSettings;
use crate::snapshot::SnapshotStore;
use crate::StateValue;
use chansync_core::{ChannelInfo, ConnectionMode, ConnectionState, Event, Origin, SnapshotRole, StateStore};
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

/// Forwards a local event to the remote. Resolves once the remote accepted it.
pub type RemoteSender<E> = Arc<dyn Fn(E) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Fetches the authoritative remote value.
pub type StateFetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// Routes an event into the store. Defaults to `StateStore::process`.
pub type StoreApplier<E, T> = Arc<dyn Fn(&mut dyn StateStore<E, State = T>, &E) + Send + Sync>;

/// Fired once when a connection is torn down.
pub type TeardownHook = Box<dyn FnOnce() + Send>;

/// Wrap an async closure as a [`RemoteSender`].
pub fn remote_sender<E, F, Fut>(f: F) -> RemoteSender<E>
where
    F: Fn(E) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

/// Wrap an async closure as a [`StateFetcher`].
pub fn state_fetcher<T, F, Fut>(f: F) -> StateFetcher<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

fn process_into<E, T>(store: &mut dyn StateStore<E, State = T>, event: &E) {
    store.process(event);
}

/// Every I/O hook a transport may supply. All optional, except that a
/// connectivity feed requires `fetch_remote_state`.
pub struct ReconcilerConfig<E, T> {
    /// Remotely originated events.
    pub remote_events: Option<BoxStream<'static, E>>,
    /// Whether the remote is currently reachable.
    pub connectivity: Option<BoxStream<'static, bool>>,
    pub send_to_remote: Option<RemoteSender<E>>,
    pub apply_to_store: Option<StoreApplier<E, T>>,
    pub fetch_remote_state: Option<StateFetcher<T>>,
    /// Persistence of the store's own value.
    pub local_snapshots: Option<Arc<dyn SnapshotStore<T>>>,
    /// Persistence of the last known server value.
    pub remote_snapshots: Option<Arc<dyn SnapshotStore<T>>>,
    pub on_teardown: Option<TeardownHook>,
    pub settings: SyncSettings,
}

impl<E, T> Default for ReconcilerConfig<E, T> {
    fn default() -> Self {
        Self {
            remote_events: None,
            connectivity: None,
            send_to_remote: None,
            apply_to_store: None,
            fetch_remote_state: None,
            local_snapshots: None,
            remote_snapshots: None,
            on_teardown: None,
            settings: SyncSettings::default(),
        }
    }
}

impl<E, T> ReconcilerConfig<E, T> {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.connectivity.is_some() && self.fetch_remote_state.is_none() {
            return Err(ConfigError::MissingStateFetcher);
        }
        self.settings.validate()
    }
}

/// Builds one connection from a request and a validated hook set.
///
/// `build` consumes the connector; each connection attempt needs a fresh one.
pub struct ReconcilingConnector<E, T> {
    info: ChannelInfo,
    store: BoxedStore<E, T>,
    config: ReconcilerConfig<E, T>,
}

impl<E: Event, T: StateValue> ReconcilingConnector<E, T> {
    pub fn new(
        request: ConnectRequest<E, T>,
        config: ReconcilerConfig<E, T>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            info: request.info,
            store: request.store,
            config,
        })
    }

    pub fn info(&self) -> &ChannelInfo {
        &self.info
    }

    /// Seed from persisted snapshots, start the dispatcher, and hand back the
    /// connection. Must run inside a tokio runtime.
    pub async fn build(self) -> Arc<Connection<E, T>> {
        let Self {
            info,
            mut store,
            config,
        } = self;
        let ReconcilerConfig {
            remote_events,
            connectivity,
            send_to_remote,
            apply_to_store,
            fetch_remote_state,
            local_snapshots,
            remote_snapshots,
            on_teardown,
            settings,
        } = config;

        if let Some(snapshots) = &local_snapshots {
            let key = info.snapshot_key(SnapshotRole::Local);
            match snapshots.load(&key).await {
                Ok(Some(seed)) => {
                    tracing::debug!(channel = %info.id(), "seeded store from local snapshot");
                    store.init(seed);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(channel = %info.id(), "failed to load local snapshot: {}", e),
            }
        }

        let mut last_known = store.state().clone();
        if let Some(snapshots) = &remote_snapshots {
            let key = info.snapshot_key(SnapshotRole::Server);
            match snapshots.load(&key).await {
                Ok(Some(value)) => last_known = value,
                Ok(None) => {}
                Err(e) => tracing::warn!(channel = %info.id(), "failed to load server snapshot: {}", e),
            }
        }

        let apply: StoreApplier<E, T> = match apply_to_store {
            Some(apply) => apply,
            None => Arc::new(process_into::<E, T>),
        };
        let (events_tx, _) = broadcast::channel(settings.event_buffer);
        let pipeline = Arc::new(Pipeline::new(store, apply, events_tx));
        let states = Arc::new(StateFeed::new(
            ConnectionState::new(ConnectionMode::Offline, last_known.clone()),
            settings.state_buffer,
        ));
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let outbox = send_to_remote.map(|sender| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(run_outbox(info.clone(), sender, rx, commands_tx.clone()));
            tx
        });

        let reconciler = Reconciler {
            info: info.clone(),
            pipeline: pipeline.clone(),
            states: states.clone(),
            mode: ConnectionMode::Offline,
            last_known,
            outbox,
            fetch_remote_state,
            local_snapshots,
            remote_snapshots,
        };
        let inputs = Inputs {
            commands: commands_rx,
            remote_events,
            connectivity,
            shutdown: shutdown_rx,
        };
        tokio::spawn(reconciler.run(inputs));

        tracing::info!(channel = %info.id(), kind = info.kind(), "connection built");
        Arc::new(Connection::new(
            info,
            pipeline,
            states,
            commands_tx,
            shutdown_tx,
            on_teardown,
        ))
    }
}

/// Messages into the dispatcher.
pub(crate) enum Command<E, T> {
    /// A local event already applied to the store, with the value it produced.
    Local { event: E, snapshot: T },
    Reconnect,
    /// The remote accepted a forwarded event; it now holds `snapshot`.
    Acknowledged(T),
}

/// Everything the dispatcher polls.
struct Inputs<E, T> {
    commands: mpsc::UnboundedReceiver<Command<E, T>>,
    remote_events: Option<BoxStream<'static, E>>,
    connectivity: Option<BoxStream<'static, bool>>,
    shutdown: watch::Receiver<bool>,
}

/// The single dispatcher loop behind a connection.
struct Reconciler<E, T> {
    info: ChannelInfo,
    pipeline: Arc<Pipeline<E, T>>,
    states: Arc<StateFeed<ConnectionState<T>>>,
    mode: ConnectionMode,
    last_known: T,
    outbox: Option<mpsc::UnboundedSender<(E, T)>>,
    fetch_remote_state: Option<StateFetcher<T>>,
    local_snapshots: Option<Arc<dyn SnapshotStore<T>>>,
    remote_snapshots: Option<Arc<dyn SnapshotStore<T>>>,
}

impl<E: Event, T: StateValue> Reconciler<E, T> {
    async fn run(mut self, inputs: Inputs<E, T>) {
        let Inputs {
            mut commands,
            mut remote_events,
            mut connectivity,
            mut shutdown,
        } = inputs;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command).await,
                    None => break,
                },
                online = next_or_pending(&mut connectivity) => match online {
                    Some(online) => self.on_connectivity(online).await,
                    None => connectivity = None,
                },
                event = next_or_pending(&mut remote_events) => match event {
                    Some(event) => self.on_remote_event(event).await,
                    None => {
                        tracing::debug!(channel = %self.info.id(), "remote event feed ended");
                        remote_events = None;
                    }
                },
            }
        }
        self.drain(&mut commands).await;
        tracing::debug!(channel = %self.info.id(), "dispatcher stopped");
    }

    /// Settles local events emitted before teardown: the final local value is
    /// persisted and, when online, each event still goes to the outbox.
    async fn drain(&self, commands: &mut mpsc::UnboundedReceiver<Command<E, T>>) {
        let mut pending = 0usize;
        while let Ok(command) = commands.try_recv() {
            if let Command::Local { event, snapshot } = command {
                pending += 1;
                self.forward(event, snapshot);
            }
        }
        if pending > 0 {
            tracing::debug!(channel = %self.info.id(), pending, "settling events queued before teardown");
            self.save_local().await;
        }
    }

    async fn on_command(&mut self, command: Command<E, T>) {
        match command {
            Command::Local { event, snapshot } => {
                self.save_local().await;
                self.forward(event, snapshot);
            }
            Command::Reconnect => {
                if self.mode == ConnectionMode::OnlineDisconnected {
                    self.transition(ConnectionMode::Online);
                }
            }
            Command::Acknowledged(snapshot) => {
                self.last_known = snapshot;
                self.save_server().await;
                self.publish();
            }
        }
    }

    fn forward(&self, event: E, snapshot: T) {
        if !self.mode.forwards() {
            return;
        }
        if let Some(outbox) = &self.outbox {
            tracing::debug!(channel = %self.info.id(), event = event.event_type(), "forwarding to remote");
            if outbox.send((event, snapshot)).is_err() {
                tracing::warn!(channel = %self.info.id(), "outbox stopped, event not forwarded");
            }
        }
    }

    async fn on_connectivity(&mut self, online: bool) {
        match (self.mode, online) {
            (ConnectionMode::Online | ConnectionMode::OnlineDisconnected, false) => {
                self.transition(ConnectionMode::Offline);
            }
            (ConnectionMode::Offline, true) => {
                let Some(fetch) = self.fetch_remote_state.clone() else {
                    return;
                };
                match fetch().await {
                    Ok(remote) => {
                        self.last_known = remote;
                        self.save_server().await;
                        self.transition(ConnectionMode::OnlineDisconnected);
                    }
                    Err(e) => {
                        tracing::warn!(channel = %self.info.id(), "failed to fetch remote state, staying offline: {:#}", e);
                    }
                }
            }
            _ => {}
        }
    }

    async fn on_remote_event(&mut self, event: E) {
        let Some(snapshot) = self.pipeline.apply(Origin::Remote, &event) else {
            return;
        };
        tracing::debug!(channel = %self.info.id(), event = event.event_type(), "applied remote event");
        self.save_local().await;
        // The remote originated this event, so it already holds the result.
        self.last_known = snapshot;
        self.save_server().await;
        self.publish();
    }

    fn transition(&mut self, mode: ConnectionMode) {
        tracing::debug!(channel = %self.info.id(), from = ?self.mode, to = ?mode, "mode transition");
        self.mode = mode;
        self.publish();
    }

    fn publish(&self) {
        self.states
            .publish(ConnectionState::new(self.mode, self.last_known.clone()));
    }

    async fn save_local(&self) {
        if let Some(snapshots) = &self.local_snapshots {
            let key = self.info.snapshot_key(SnapshotRole::Local);
            let value = self.pipeline.state();
            if let Err(e) = snapshots.save(&key, &value).await {
                tracing::warn!(channel = %self.info.id(), "failed to save local snapshot: {}", e);
            }
        }
    }

    async fn save_server(&self) {
        if let Some(snapshots) = &self.remote_snapshots {
            let key = self.info.snapshot_key(SnapshotRole::Server);
            if let Err(e) = snapshots.save(&key, &self.last_known).await {
                tracing::warn!(channel = %self.info.id(), "failed to save server snapshot: {}", e);
            }
        }
    }
}

/// Sends forwarded events one at a time, in order, reporting each success
/// back to the dispatcher. Failures are logged and not retried.
///
/// Runs until the dispatcher drops its sender, so events forwarded just before
/// teardown are still delivered.
async fn run_outbox<E: Event, T: StateValue>(
    info: ChannelInfo,
    sender: RemoteSender<E>,
    mut rx: mpsc::UnboundedReceiver<(E, T)>,
    acks: mpsc::UnboundedSender<Command<E, T>>,
) {
    while let Some((event, snapshot)) = rx.recv().await {
        let event_type = event.event_type();
        match sender(event).await {
            Ok(()) => {
                // Dispatcher may be gone after teardown.
                let _ = acks.send(Command::Acknowledged(snapshot));
            }
            Err(e) => {
                tracing::warn!(channel = %info.id(), event = event_type, "remote send failed: {:#}", e);
            }
        }
    }
}

async fn next_or_pending<S>(stream: &mut Option<S>) -> Option<S::Item>
where
    S: Stream + Unpin,
{
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
