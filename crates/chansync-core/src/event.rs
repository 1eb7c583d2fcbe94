//! Domain events.
//!
//! Each channel defines its own event vocabulary as an enum; this module only
//! fixes the envelope every event must expose.

use chrono::{DateTime, Utc};

/// A time-stamped domain event.
///
/// Ordering across sources is arrival order at the local pipeline, not
/// `creation_time`.
pub trait Event: Clone + Send + Sync + 'static {
    /// Discriminant name (e.g., "channel_created"), used for logging.
    fn event_type(&self) -> &'static str;

    /// When the event was created by its originator.
    fn creation_time(&self) -> DateTime<Utc>;
}

/// Where an applied event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Emitted by this process.
    Local,
    /// Received from the remote feed.
    Remote,
}

/// An event as published on a connection's combined event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent<E> {
    pub origin: Origin,
    pub event: E,
}

impl<E> ChannelEvent<E> {
    pub fn local(event: E) -> Self {
        Self {
            origin: Origin::Local,
            event,
        }
    }

    pub fn remote(event: E) -> Self {
        Self {
            origin: Origin::Remote,
            event,
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }
}
