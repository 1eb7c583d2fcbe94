//! Channel identity.
//!
//! Textual form: `type:id`, e.g. `counter:main`. Only `id` takes part in
//! equality and lookup; `type` and `name` are descriptive.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Identifies a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl ChannelInfo {
    /// Create a new unnamed channel identity.
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            name: None,
        }
    }

    /// Attach a human-readable name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The channel type (e.g., "counter", "discovery").
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Stable key used for persistence and deduplication.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Persistence key for a snapshot of this channel in the given role.
    pub fn snapshot_key(&self, role: SnapshotRole) -> String {
        role.key(&self.id)
    }
}

impl PartialEq for ChannelInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChannelInfo {}

impl Hash for ChannelInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ChannelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

impl FromStr for ChannelInfo {
    type Err = ChannelInfoParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| ChannelInfoParseError::MissingColon(s.to_string()))?;

        if id.is_empty() {
            return Err(ChannelInfoParseError::EmptyId);
        }

        Ok(Self::new(kind, id))
    }
}

/// Error parsing a channel identity string.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelInfoParseError {
    #[error("channel must be written as 'type:id', got: {0}")]
    MissingColon(String),
    #[error("channel id cannot be empty")]
    EmptyId,
}

/// Which value a persisted snapshot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRole {
    /// The store's own (possibly optimistic) value.
    Local,
    /// The last value the remote is known to hold.
    Server,
}

impl SnapshotRole {
    /// `{channel_id}_local_state` or `{channel_id}_server_state`.
    pub fn key(self, channel_id: &str) -> String {
        match self {
            SnapshotRole::Local => format!("{channel_id}_local_state"),
            SnapshotRole::Server => format!("{channel_id}_server_state"),
        }
    }
}
