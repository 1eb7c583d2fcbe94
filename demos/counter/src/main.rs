//! Counter channel walkthrough.
//!
//! Drives one counter channel against a simulated remote:
//! - local adds while offline are applied but not forwarded
//! - coming online pulls the remote value (online-disconnected)
//! - reconnect enables forwarding; acknowledged sends advance the server snapshot
//! - remote-originated events fold into the local store
//!
//! Run:
//!   cargo run -p chansync-demo-counter -- --channel counter:main --remote-start 10
//!   cargo run -p chansync-demo-counter -- --config chansync.toml

mod protocol;
mod remote;

use chansync_client::{ChannelInfo, ChannelRegistry, ConnectionMode, SyncSettings};
use protocol::CounterEvent;
use remote::{SimulatedConnector, SimulatedRemote};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("chansync_client=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let info: ChannelInfo = parse_arg_string(&args, "--channel")
        .unwrap_or_else(|| "counter:main".to_string())
        .parse()?;
    let remote_start = parse_arg(&args, "--remote-start").unwrap_or(10);
    let settings = match parse_arg_string(&args, "--config") {
        Some(path) => SyncSettings::load(path)?,
        None => SyncSettings::default(),
    };

    let remote = SimulatedRemote::new(remote_start);
    let connector = Arc::new(SimulatedConnector::new(remote.clone(), settings));
    let registry =
        ChannelRegistry::new(connector.clone(), |_info: &ChannelInfo| protocol::counter_store())
            .await?;

    let channel = registry.register_channel(&info).await?;
    tracing::info!("Known channels: {:?}", registry.known_channels());

    let mut states = channel.connection().connection_states();
    tokio::spawn(async move {
        while let Some(state) = states.recv().await {
            tracing::info!(
                "mode={:?} server={}",
                state.mode,
                state.last_known_server_state
            );
        }
    });

    channel.emit(CounterEvent::add())?;
    channel.emit(CounterEvent::add())?;
    tracing::info!("Offline, local value {}", channel.state());

    connector.set_online(true);
    wait_for_mode(&channel, ConnectionMode::OnlineDisconnected).await;
    channel.connection().reconnect()?;
    wait_for_mode(&channel, ConnectionMode::Online).await;

    channel.emit(CounterEvent::subtract())?;
    remote.push(CounterEvent::add());
    tokio::time::sleep(Duration::from_millis(100)).await;
    tracing::info!(
        "Online, local value {}, remote value {}",
        channel.state(),
        remote.value().await
    );

    connector.set_online(false);
    wait_for_mode(&channel, ConnectionMode::Offline).await;

    registry.remove_channel(info.id())?;
    tracing::info!("Known channels: {:?}", registry.known_channels());
    Ok(())
}

async fn wait_for_mode(channel: &chansync_client::Channel<CounterEvent, i64>, mode: ConnectionMode) {
    let mut states = channel.connection().connection_states();
    while let Some(state) = states.recv().await {
        if state.mode == mode {
            return;
        }
    }
}

fn parse_arg(args: &[String], flag: &str) -> Option<i64> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn parse_arg_string(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
