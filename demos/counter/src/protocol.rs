//! Counter-specific event vocabulary.

use chansync_client::{BoxedStore, Event, ReducingStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Counter events (what clients and the remote can apply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CounterEvent {
    Add {
        #[serde(rename = "creationTime")]
        creation_time: DateTime<Utc>,
    },
    Subtract {
        #[serde(rename = "creationTime")]
        creation_time: DateTime<Utc>,
    },
}

impl CounterEvent {
    pub fn add() -> Self {
        Self::Add {
            creation_time: Utc::now(),
        }
    }

    pub fn subtract() -> Self {
        Self::Subtract {
            creation_time: Utc::now(),
        }
    }
}

impl Event for CounterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Subtract { .. } => "subtract",
        }
    }

    fn creation_time(&self) -> DateTime<Utc> {
        match self {
            Self::Add { creation_time } | Self::Subtract { creation_time } => *creation_time,
        }
    }
}

pub fn reduce(state: &mut i64, event: &CounterEvent) {
    match event {
        CounterEvent::Add { .. } => *state += 1,
        CounterEvent::Subtract { .. } => *state -= 1,
    }
}

pub fn counter_store() -> BoxedStore<CounterEvent, i64> {
    Box::new(ReducingStore::new(0i64, reduce))
}
