//! Broadcast hub.
//!
//! Holds the live subscriber set and fans alerts out to it. Each subscriber
//! owns a bounded queue; a subscriber that is closed, or whose queue stays
//! full past the send timeout, is removed from the registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vigil_models::AlertMessage;

use crate::metrics;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

/// Registry key of one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving end handed to a connection on registration.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<AlertMessage>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next alert, or `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<AlertMessage>> {
        self.rx.recv().await
    }
}

/// Result of one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers in the snapshot
    pub attempted: usize,
    pub delivered: usize,
    /// Subscribers removed because delivery failed
    pub dropped: usize,
}

/// Live subscriber registry.
#[derive(Debug)]
pub struct BroadcastHub {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<AlertMessage>>>>,
    send_timeout: Duration,
    buffer: usize,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_TIMEOUT, DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl BroadcastHub {
    pub fn new(send_timeout: Duration, buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            send_timeout,
            buffer: buffer.max(1),
        }
    }

    /// Add a subscriber.
    pub fn register(&self) -> Subscription {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.buffer);

        let count = {
            let mut subscribers = self.lock();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        metrics::set_active_subscribers(count);

        info!(subscriber_id = %id, subscribers = count, "Subscriber registered");
        Subscription { id, rx }
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.lock();
            let removed = subscribers.remove(&id).is_some();
            (removed, subscribers.len())
        };

        if removed {
            metrics::set_active_subscribers(count);
            info!(subscriber_id = %id, subscribers = count, "Subscriber unregistered");
        }
        removed
    }

    /// Bound on delivering one message to one subscriber.
    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id)
    }

    /// Deliver one alert to every subscriber registered right now.
    ///
    /// Sends run concurrently, each bounded by the send timeout. Failed
    /// subscribers are removed before this returns.
    pub async fn publish(&self, message: Arc<AlertMessage>) -> PublishReport {
        let snapshot: Vec<(SubscriberId, mpsc::Sender<Arc<AlertMessage>>)> = self
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let attempted = snapshot.len();
        if attempted == 0 {
            debug!("No subscribers; alert not delivered");
            return PublishReport::default();
        }

        let send_timeout = self.send_timeout;
        let sends = snapshot.into_iter().map(|(id, tx)| {
            let message = Arc::clone(&message);
            async move {
                match tokio::time::timeout(send_timeout, tx.send(message)).await {
                    Ok(Ok(())) => None,
                    Ok(Err(_)) => {
                        debug!(subscriber_id = %id, "Subscriber channel closed");
                        Some(id)
                    }
                    Err(_) => {
                        warn!(
                            subscriber_id = %id,
                            timeout_ms = send_timeout.as_millis() as u64,
                            "Subscriber stalled; dropping"
                        );
                        Some(id)
                    }
                }
            }
        });

        let failed: Vec<SubscriberId> = join_all(sends).await.into_iter().flatten().collect();

        let count = {
            let mut subscribers = self.lock();
            for id in &failed {
                subscribers.remove(id);
            }
            subscribers.len()
        };

        let report = PublishReport {
            attempted,
            delivered: attempted - failed.len(),
            dropped: failed.len(),
        };

        metrics::record_publish(report.delivered, report.dropped);
        if report.dropped > 0 {
            metrics::set_active_subscribers(count);
        }
        debug!(
            attempted = report.attempted,
            delivered = report.delivered,
            dropped = report.dropped,
            "Alert published"
        );

        report
    }

    /// Publish on a background task.
    pub fn publish_detached(self: &Arc<Self>, message: Arc<AlertMessage>) -> JoinHandle<PublishReport> {
        let hub = Arc::clone(self);
        tokio::spawn(async move { hub.publish(message).await })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Arc<AlertMessage>>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(log: &str) -> Arc<AlertMessage> {
        Arc::new(AlertMessage::new(log, "data:image/jpeg;base64,AA==", &[], 1_700_000_000))
    }

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = BroadcastHub::default();
        let mut subs: Vec<Subscription> = (0..3).map(|_| hub.register()).collect();

        let report = hub.publish(alert("a")).await;
        assert_eq!(
            report,
            PublishReport {
                attempted: 3,
                delivered: 3,
                dropped: 0
            }
        );

        for sub in &mut subs {
            assert_eq!(sub.recv().await.unwrap().log_text, "a");
        }
    }

    #[tokio::test]
    async fn test_unregistered_subscriber_is_not_attempted() {
        let hub = BroadcastHub::default();
        let _a = hub.register();
        let b = hub.register();
        let _c = hub.register();

        assert!(hub.unregister(b.id()));
        assert!(!hub.unregister(b.id()));

        assert_eq!(hub.publish(alert("x")).await.attempted, 2);
    }

    #[tokio::test]
    async fn test_closed_subscriber_is_dropped() {
        let hub = BroadcastHub::default();
        let mut alive = hub.register();
        let gone = hub.register();
        let gone_id = gone.id();
        drop(gone);

        let report = hub.publish(alert("x")).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert!(!hub.is_registered(gone_id));
        assert!(alive.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_stalled_subscriber_is_dropped_and_skipped_later() {
        let hub = BroadcastHub::new(Duration::from_millis(20), 1);
        let mut healthy = hub.register();
        let stalled = hub.register();

        assert_eq!(hub.publish(alert("1")).await.delivered, 2);
        healthy.recv().await.unwrap();

        // stalled never reads, so its single-slot queue is full
        let report = hub.publish(alert("2")).await;
        assert_eq!(report.dropped, 1);
        assert!(!hub.is_registered(stalled.id()));
        healthy.recv().await.unwrap();

        let report = hub.publish(alert("3")).await;
        assert_eq!(report.attempted, 1);
        assert_eq!(healthy.recv().await.unwrap().log_text, "3");
    }

    #[tokio::test]
    async fn test_dropped_subscription_sees_end_of_stream() {
        let hub = BroadcastHub::new(Duration::from_millis(10), 1);
        let mut stalled = hub.register();

        hub.publish(alert("1")).await;
        hub.publish(alert("2")).await;

        assert_eq!(stalled.recv().await.unwrap().log_text, "1");
        assert!(stalled.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_publish_detached() {
        let hub = Arc::new(BroadcastHub::default());
        let mut sub = hub.register();

        let report = hub.publish_detached(alert("bg")).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(sub.recv().await.unwrap().log_text, "bg");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let hub = BroadcastHub::default();
        assert_eq!(hub.publish(alert("x")).await, PublishReport::default());
        assert_eq!(hub.subscriber_count(), 0);
    }
}
