//! The discovery channel vocabulary.
//!
//! Every registry owns one discovery channel whose state is the open set of
//! known channels, in announcement order.

use crate::{ChannelInfo, Event, Reducer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed id of the discovery channel.
pub const DISCOVERY_CHANNEL_ID: &str = "discovery_channel";

/// Known channels, oldest announcement first.
pub type DiscoveryState = Vec<ChannelInfo>;

/// Events on the discovery channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoveryEvent {
    ChannelCreated {
        #[serde(rename = "creationTime")]
        creation_time: DateTime<Utc>,
        info: ChannelInfo,
    },
    ChannelRemoved {
        #[serde(rename = "creationTime")]
        creation_time: DateTime<Utc>,
        #[serde(rename = "channelId")]
        channel_id: String,
    },
}

impl DiscoveryEvent {
    pub fn created(info: ChannelInfo) -> Self {
        Self::ChannelCreated {
            creation_time: Utc::now(),
            info,
        }
    }

    pub fn removed(channel_id: impl Into<String>) -> Self {
        Self::ChannelRemoved {
            creation_time: Utc::now(),
            channel_id: channel_id.into(),
        }
    }
}

impl Event for DiscoveryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::ChannelCreated { .. } => "channel_created",
            Self::ChannelRemoved { .. } => "channel_removed",
        }
    }

    fn creation_time(&self) -> DateTime<Utc> {
        match self {
            Self::ChannelCreated { creation_time, .. }
            | Self::ChannelRemoved { creation_time, .. } => *creation_time,
        }
    }
}

/// Maintains the known-channel list in place.
///
/// Removal drops the most recent entry with a matching id, so a created/removed
/// pair always restores the previous list.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscoveryReducer;

impl Reducer<DiscoveryState, DiscoveryEvent> for DiscoveryReducer {
    fn reduce(&self, state: &mut DiscoveryState, event: &DiscoveryEvent) {
        match event {
            DiscoveryEvent::ChannelCreated { info, .. } => state.push(info.clone()),
            DiscoveryEvent::ChannelRemoved { channel_id, .. } => {
                if let Some(pos) = state.iter().rposition(|c| c.id() == channel_id) {
                    state.remove(pos);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReducingStore, StateStore};

    fn discovery_store(initial: DiscoveryState) -> ReducingStore<DiscoveryState, DiscoveryReducer> {
        ReducingStore::new(initial, DiscoveryReducer)
    }

    #[test]
    fn created_then_removed_restores_state() {
        let mut store = discovery_store(vec![ChannelInfo::new("chat", "lobby")]);
        let before = store.state().clone();

        let info = ChannelInfo::new("counter", "c1");
        store.process(&DiscoveryEvent::created(info.clone()));
        assert_eq!(store.state().len(), 2);
        store.process(&DiscoveryEvent::removed(info.id()));

        assert_eq!(store.state(), &before);
    }

    #[test]
    fn round_trip_with_duplicate_id() {
        let original = ChannelInfo::new("counter", "c1").named("first");
        let mut store = discovery_store(vec![original.clone(), ChannelInfo::new("chat", "x")]);
        let before = store.state().clone();

        store.process(&DiscoveryEvent::created(ChannelInfo::new("counter", "c1")));
        store.process(&DiscoveryEvent::removed("c1"));

        assert_eq!(store.state(), &before);
        assert_eq!(store.state()[0].name(), Some("first"));
    }

    #[test]
    fn removing_unknown_is_noop() {
        let mut store = discovery_store(vec![ChannelInfo::new("chat", "lobby")]);
        store.process(&DiscoveryEvent::removed("nope"));
        assert_eq!(store.state().len(), 1);
    }

    #[test]
    fn wire_format() {
        let event = DiscoveryEvent::removed("c1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "channel_removed");
        assert_eq!(json["channelId"], "c1");
        assert!(json.get("creationTime").is_some());

        let parsed: DiscoveryEvent = serde_json::from_value(serde_json::json!({
            "type": "channel_created",
            "creationTime": "2024-01-01T00:00:00Z",
            "info": { "type": "counter", "id": "c2" }
        }))
        .unwrap();
        assert_eq!(parsed.event_type(), "channel_created");
        assert!(matches!(parsed, DiscoveryEvent::ChannelCreated { ref info, .. } if info.id() == "c2"));
    }
}
