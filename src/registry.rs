use ahash::AHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::event::PipelineEvent;

/// An internal identifier for connected subscribers.
pub type SubscriberId = u64;
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Per-subscriber outbound buffer. A subscriber that falls this far behind
/// starts losing events; delivery is best-effort, at-most-once.
const CHANNEL_CAPACITY: usize = 64;

/// Tracks the set of currently connected socket subscribers and fans
/// canonical events out to them.
///
/// Internally synchronized; handlers share one instance through `AppState`
/// and never take their own locks.
pub struct SubscriberRegistry {
    subscribers: RwLock<AHashMap<SubscriberId, mpsc::Sender<String>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(AHashMap::new()),
        }
    }

    /// Registers a new subscriber and hands back the receiving half of its
    /// outbound buffer.
    pub async fn connect(&self) -> (SubscriberId, mpsc::Receiver<String>) {
        let id = NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.subscribers.write().await.insert(id, tx);
        debug!("Subscriber {id} connected");
        (id, rx)
    }

    /// Removes a subscriber. Idempotent: an already-removed id is a no-op.
    pub async fn disconnect(&self, id: SubscriberId) {
        if self.subscribers.write().await.remove(&id).is_some() {
            debug!("Subscriber {id} disconnected");
        }
    }

    pub async fn count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Serializes the event once and delivers it to every subscriber in a
    /// snapshot taken at call time.
    ///
    /// Sends never block: a subscriber with a full buffer misses the event,
    /// and one whose channel is closed gets disconnected. Neither affects
    /// delivery to the rest or the caller.
    #[instrument(skip_all)]
    pub async fn broadcast(&self, event: &PipelineEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("Failed to serialize event for broadcast: {err}");
                return;
            }
        };

        let snapshot: Vec<(SubscriberId, mpsc::Sender<String>)> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };
        if snapshot.is_empty() {
            return;
        }
        debug!("Broadcasting to {} subscribers", snapshot.len());

        let mut closed = Vec::new();
        for (id, tx) in snapshot {
            match tx.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("Subscriber {id} is not keeping up, dropping event for it");
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("Subscriber {id} transport closed, removing it");
                    closed.push(id);
                }
            }
        }
        for id in closed {
            self.disconnect(id).await;
        }
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}
