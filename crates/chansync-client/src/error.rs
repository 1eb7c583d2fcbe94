//! Error types.

use std::path::PathBuf;

/// Invalid reconciler configuration or settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("a connectivity feed requires a remote state fetcher")]
    MissingStateFetcher,
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("failed to parse settings: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to produce a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("connector does not implement a transport")]
    NotImplemented,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("channel {channel_id} is already connected with different event or state types")]
    TypeMismatch { channel_id: String },
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

/// Failure to operate on a live connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,
}

/// Failure to save or load a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
