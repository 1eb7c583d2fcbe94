//! A broadcast that replays its latest value to new subscribers.

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Multi-subscriber feed with a cached latest value.
///
/// A subscriber first receives the value current at subscription time, then
/// every later publication in order. Publishing and subscribing share one lock,
/// so nothing falls between the replayed value and the live tail.
///
/// A subscriber that falls more than `capacity` values behind loses the
/// intermediate values. It is resynced to the newest value still buffered,
/// so it may observe a jump (say `Offline` straight to `Online`) but never an
/// older value after a newer one.
pub struct StateFeed<T> {
    latest: Mutex<T>,
    tx: broadcast::Sender<T>,
}

impl<T: Clone> StateFeed<T> {
    pub fn new(initial: T, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            latest: Mutex::new(initial),
            tx,
        }
    }

    pub fn publish(&self, value: T) {
        let mut latest = self.latest.lock();
        *latest = value.clone();
        // No receivers is fine; the value is still cached.
        let _ = self.tx.send(value);
    }

    pub fn current(&self) -> T {
        self.latest.lock().clone()
    }

    pub fn subscribe(&self) -> StateSubscription<T> {
        let latest = self.latest.lock();
        StateSubscription {
            replay: Some(latest.clone()),
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half of a [`StateFeed`].
pub struct StateSubscription<T> {
    replay: Option<T>,
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> StateSubscription<T> {
    /// Next value, or `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "state subscriber lagged, resyncing to newest");
                    if let Some(value) = self.newest_buffered() {
                        return Some(value);
                    }
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next value if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        if let Some(value) = self.replay.take() {
            return Some(value);
        }
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "state subscriber lagged, resyncing to newest");
                    return self.newest_buffered();
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    fn newest_buffered(&mut self) -> Option<T> {
        let mut newest = None;
        loop {
            match self.rx.try_recv() {
                Ok(value) => newest = Some(value),
                Err(TryRecvError::Lagged(_)) => {}
                Err(TryRecvError::Empty | TryRecvError::Closed) => return newest,
            }
        }
    }
}

impl<T: Clone + Send + 'static> StateSubscription<T> {
    pub fn into_stream(self) -> impl Stream<Item = T> + Send {
        futures_util::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|value| (value, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn replays_latest_then_follows() {
        let feed = StateFeed::new(0u32, 8);
        feed.publish(1);

        let mut sub = feed.subscribe();
        feed.publish(2);
        feed.publish(3);

        assert_eq!(sub.recv().await, Some(1));
        assert_eq!(sub.recv().await, Some(2));
        assert_eq!(sub.recv().await, Some(3));
        assert_eq!(sub.try_recv(), None);
        assert_eq!(feed.current(), 3);
    }

    #[tokio::test]
    async fn lagging_subscriber_resyncs_to_newest() {
        let feed = StateFeed::new(0u32, 2);
        let mut sub = feed.subscribe();
        for value in 1..=5 {
            feed.publish(value);
        }

        assert_eq!(sub.recv().await, Some(0));
        // 1..=3 fell out of the buffer; 4 is skipped so the jump lands on the latest.
        assert_eq!(sub.recv().await, Some(5));
        assert_eq!(sub.try_recv(), None);

        let mut polled = feed.subscribe();
        assert_eq!(polled.try_recv(), Some(5));
        for value in 6..=9 {
            feed.publish(value);
        }
        assert_eq!(polled.try_recv(), Some(9));
        assert_eq!(polled.try_recv(), None);
    }

    #[tokio::test]
    async fn closes_when_feed_dropped() {
        let feed = StateFeed::new("a".to_string(), 4);
        let sub = feed.subscribe();
        feed.publish("b".to_string());
        drop(feed);

        let seen: Vec<String> = sub.into_stream().collect().await;
        assert_eq!(seen, vec!["a", "b"]);
    }
}
