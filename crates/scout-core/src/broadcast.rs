use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::ScrapedItem;
use crate::traits::Publisher;

/// Message pushed to a live subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// Snapshot of recent items, always the first message on a subscription.
    Initial { items: Vec<ScrapedItem> },
    Update { item: ScrapedItem },
    Ping,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-subscriber buffer. A subscriber that falls this far behind is dropped.
    pub buffer: usize,
    pub ping_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            buffer: 64,
            ping_interval: Duration::from_secs(30),
        }
    }
}

struct SubscriberHandle {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

struct HubInner {
    subscribers: Mutex<HashMap<Uuid, SubscriberHandle>>,
    config: HubConfig,
}

impl HubInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, SubscriberHandle>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: Uuid) -> bool {
        match self.lock().remove(&id) {
            Some(handle) => {
                handle.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

/// Fan-out of new items to every connected live subscriber.
///
/// Cloning shares the same subscriber set. Delivery is non-blocking: a
/// subscriber whose buffer is full or whose receiver is gone is removed
/// without affecting the others.
#[derive(Clone)]
pub struct BroadcastHub {
    inner: Arc<HubInner>,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

impl BroadcastHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Register a subscriber whose first message is `snapshot`.
    ///
    /// The snapshot is queued under the same lock that `publish` takes, so no
    /// update can overtake it. Spawns the subscriber's heartbeat task.
    pub fn subscribe(&self, snapshot: Vec<ScrapedItem>) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.inner.config.buffer.max(1));
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();

        {
            let mut subscribers = self.inner.lock();
            // Fresh channel with capacity >= 1, cannot be full.
            let _ = tx.try_send(StreamEvent::Initial { items: snapshot });
            subscribers.insert(
                id,
                SubscriberHandle {
                    tx: tx.clone(),
                    cancel: cancel.clone(),
                },
            );
        }
        tracing::debug!(%id, subscribers = self.subscriber_count(), "Subscriber connected");

        tokio::spawn(heartbeat(
            Arc::clone(&self.inner),
            id,
            tx,
            cancel.clone(),
        ));

        Subscription {
            id,
            receiver,
            hub: self.clone(),
            cancel,
        }
    }

    /// Deliver `item` to every connected subscriber.
    pub fn publish(&self, item: &ScrapedItem) {
        let event = StreamEvent::Update { item: item.clone() };
        let mut subscribers = self.inner.lock();
        subscribers.retain(|id, handle| match handle.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(%id, error = %e, "Dropping subscriber");
                handle.cancel.cancel();
                false
            }
        });
    }

    /// Remove a subscriber. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.inner.remove(id);
        if removed {
            tracing::debug!(%id, "Subscriber disconnected");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Drop every subscriber, ending their streams. Used on shutdown so open
    /// event streams do not hold the server up.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.inner.lock().drain().collect();
        for (_, handle) in &drained {
            handle.cancel.cancel();
        }
        if !drained.is_empty() {
            tracing::info!(subscribers = drained.len(), "Closed all subscribers");
        }
    }
}

impl Publisher for BroadcastHub {
    fn publish(&self, item: &ScrapedItem) {
        BroadcastHub::publish(self, item);
    }
}

/// Periodic keep-alive. A ping that cannot be queued removes the subscriber.
async fn heartbeat(
    hub: Arc<HubInner>,
    id: Uuid,
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let interval = hub.config.ping_interval;
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {
                if let Err(e) = tx.try_send(StreamEvent::Ping) {
                    tracing::debug!(%id, error = %e, "Heartbeat failed, dropping subscriber");
                    hub.remove(id);
                    break;
                }
            }
        }
    }
}

/// A live subscriber's receiving end. Dropping it unregisters the
/// subscriber and stops its heartbeat.
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<StreamEvent>,
    hub: BroadcastHub,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.hub.unsubscribe(self.id);
    }
}
