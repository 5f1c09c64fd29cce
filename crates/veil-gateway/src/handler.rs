//! Per-connection message handler.
//!
//! Interprets raw frames as [`ClientMessage`]s and answers through the
//! connection's outbound queue. Each joined session gets a forwarder task that
//! copies bus events into the queue; forwarders are aborted when the handler
//! is dropped, so the queue never outlives the handler.
//!
//! When the bus ends a subscription the forwarder reports
//! [`ServerMessage::SubscriptionLost`]. A later `JoinSession` for that session
//! subscribes again instead of being treated as a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use veil_common::helpers::is_valid_session_id;
use veil_common::{ClientMessage, Error, Result, ServerMessage, SessionEvent};

use crate::pubsub::PubSub;
use crate::store::SessionStore;

struct Forwarder {
    task: JoinHandle<()>,
    lost: Arc<AtomicBool>,
}

impl Forwarder {
    fn is_live(&self) -> bool {
        !self.lost.load(Ordering::Acquire) && !self.task.is_finished()
    }
}

/// Handler bound to one connection for its whole lifetime.
pub struct MessageHandler {
    outbound: mpsc::Sender<ServerMessage>,
    store: Arc<dyn SessionStore>,
    pubsub: Arc<dyn PubSub>,
    subscriptions: HashMap<String, Forwarder>,
}

impl MessageHandler {
    pub fn new(
        outbound: mpsc::Sender<ServerMessage>,
        store: Arc<dyn SessionStore>,
        pubsub: Arc<dyn PubSub>,
    ) -> Self {
        Self {
            outbound,
            store,
            pubsub,
            subscriptions: HashMap::new(),
        }
    }

    /// Sessions this connection is subscribed to.
    pub fn joined_sessions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.keys().map(String::as_str)
    }

    /// Parse and handle one inbound frame.
    ///
    /// Malformed JSON is a protocol error; store or bus failures are handler
    /// errors. Both end the connection.
    pub async fn handle_raw_message(&mut self, data: &[u8]) -> Result<()> {
        let message: ClientMessage = serde_json::from_slice(data)
            .map_err(|e| Error::protocol(format!("invalid message: {}", e)))?;
        self.handle_message(message).await
    }

    pub async fn handle_message(&mut self, message: ClientMessage) -> Result<()> {
        let id = message.id();
        if !is_valid_session_id(message.session_id()) {
            return self
                .send(ServerMessage::fail(id, message.session_id(), "invalid session id"))
                .await;
        }

        match message {
            ClientMessage::JoinSession { id, session_id } => {
                self.join(&session_id).await?;
                self.send(ServerMessage::ok(id, session_id)).await
            }
            ClientMessage::LeaveSession { id, session_id } => {
                if let Some(forwarder) = self.subscriptions.remove(&session_id) {
                    forwarder.task.abort();
                }
                self.send(ServerMessage::ok(id, session_id)).await
            }
            ClientMessage::PublishEvent {
                id,
                session_id,
                event,
                data,
            } => {
                if !self.subscriptions.contains_key(&session_id) {
                    return self
                        .send(ServerMessage::fail(id, session_id, "session not joined"))
                        .await;
                }

                let event = SessionEvent::new(event, data);
                let event_id = event.event_id;
                self.store.append(&session_id, event.clone()).await?;
                self.pubsub.publish(&session_id, event).await?;
                debug!("published event {} to session {}", event_id, session_id);

                self.send(ServerMessage::Ok {
                    id,
                    session_id,
                    event_id: Some(event_id),
                })
                .await
            }
            ClientMessage::FetchBacklog { id, session_id } => {
                if !self.subscriptions.contains_key(&session_id) {
                    return self
                        .send(ServerMessage::fail(id, session_id, "session not joined"))
                        .await;
                }

                let events = self.store.backlog(&session_id).await?;
                self.send(ServerMessage::Backlog {
                    id,
                    session_id,
                    events,
                })
                .await
            }
        }
    }

    async fn join(&mut self, session_id: &str) -> Result<()> {
        if self
            .subscriptions
            .get(session_id)
            .is_some_and(Forwarder::is_live)
        {
            return Ok(());
        }
        if let Some(stale) = self.subscriptions.remove(session_id) {
            stale.task.abort();
        }

        let mut subscription = self.pubsub.subscribe(session_id).await?;
        let outbound = self.outbound.clone();
        let session = session_id.to_string();
        let lost = Arc::new(AtomicBool::new(false));
        let flag = lost.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                let message = ServerMessage::Event {
                    session_id: session.clone(),
                    event,
                };
                if outbound.send(message).await.is_err() {
                    return;
                }
            }

            // Marked before reporting so a rejoin triggered by the report resubscribes.
            flag.store(true, Ordering::Release);
            drop(subscription);
            warn!("subscription to {} ended", session);
            let _ = outbound
                .send(ServerMessage::SubscriptionLost { session_id: session })
                .await;
        });

        self.subscriptions
            .insert(session_id.to_string(), Forwarder { task, lost });
        Ok(())
    }

    async fn send(&self, message: ServerMessage) -> Result<()> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| Error::connection("outbound queue closed"))
    }

    /// Abort every subscription forwarder.
    pub fn close(&mut self) {
        for (session_id, forwarder) in self.subscriptions.drain() {
            debug!("releasing subscription to {}", session_id);
            forwarder.task.abort();
        }
    }
}

impl Drop for MessageHandler {
    fn drop(&mut self) {
        if !self.subscriptions.is_empty() {
            self.close();
        }
    }
}

/// Log a handler failure the way the relay reports it.
pub(crate) fn log_handler_error(err: &Error) {
    match err {
        Error::Protocol(msg) => warn!("rejecting connection: {}", msg),
        other => warn!("message handling failed: {}", other),
    }
}
