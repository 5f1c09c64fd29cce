//! Session pub/sub bus.
//!
//! A published event reaches every live subscriber of the session. A slow
//! subscriber lags behind on its own receiver and never blocks the publisher.
//! A subscriber that falls further behind than the channel capacity has its
//! subscription ended; it must re-subscribe and replay the store.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{broadcast, RwLock};
use tracing::warn;
use veil_common::{Result, SessionEvent};

/// Stream of events for one subscribed session.
pub type Subscription = BoxStream<'static, SessionEvent>;

/// Fan-out bus shared by all connections.
#[async_trait]
pub trait PubSub: Send + Sync + 'static {
    /// Subscribe to future events of a session.
    ///
    /// The stream ends if the subscriber can no longer be given every event.
    async fn subscribe(&self, session_id: &str) -> Result<Subscription>;

    /// Deliver an event to every current subscriber of a session.
    async fn publish(&self, session_id: &str, event: SessionEvent) -> Result<()>;
}

/// In-memory bus backed by one broadcast channel per session.
pub struct MemoryPubSub {
    channels: RwLock<HashMap<String, broadcast::Sender<SessionEvent>>>,
    capacity: usize,
}

impl MemoryPubSub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscriptions to a session.
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        self.channels
            .read()
            .await
            .get(session_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl PubSub for MemoryPubSub {
    async fn subscribe(&self, session_id: &str) -> Result<Subscription> {
        let rx = {
            let mut guard = self.channels.write().await;
            guard.retain(|_, tx| tx.receiver_count() > 0);
            guard
                .entry(session_id.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let session = session_id.to_string();
        let stream = futures::stream::unfold(rx, move |mut rx| {
            let session = session.clone();
            async move {
                match rx.recv().await {
                    Ok(event) => Some((event, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "subscriber of {} lagged by {} events, ending subscription",
                            session, skipped
                        );
                        None
                    }
                    Err(broadcast::error::RecvError::Closed) => None,
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn publish(&self, session_id: &str, event: SessionEvent) -> Result<()> {
        let tx = self.channels.read().await.get(session_id).cloned();
        if let Some(tx) = tx {
            // No receivers is not an error; the event is still in the store.
            let _ = tx.send(event);
        }
        Ok(())
    }
}
