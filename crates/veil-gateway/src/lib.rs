//! Veil gateway: a WebSocket relay that moves encrypted envelopes between
//! the peers of a session.
//!
//! The relay never sees plaintext. Peers join a session, publish opaque
//! events into it and receive every event published by the other side.

#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod handler;
pub mod pubsub;
pub mod store;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;

pub use config::RelayConfig;
pub use connection::{serve_connection, CloseReason};
pub use pubsub::{MemoryPubSub, PubSub};
pub use store::{MemoryStore, SessionStore};

/// State shared by every connection of one relay.
#[derive(Clone)]
pub struct RelayState {
    pub store: Arc<dyn SessionStore>,
    pub pubsub: Arc<dyn PubSub>,
    pub config: Arc<RelayConfig>,
    active_connections: Arc<AtomicUsize>,
}

impl RelayState {
    pub fn new(
        store: Arc<dyn SessionStore>,
        pubsub: Arc<dyn PubSub>,
        config: RelayConfig,
    ) -> Self {
        Self {
            store,
            pubsub,
            config: Arc::new(config),
            active_connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Relay backed by the in-memory store and bus.
    pub fn in_memory(config: RelayConfig) -> Self {
        let store =
            Arc::new(MemoryStore::new(config.backlog_limit).with_max_sessions(config.max_sessions));
        let pubsub = Arc::new(MemoryPubSub::new(config.backlog_limit));
        Self::new(store, pubsub, config)
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub(crate) fn connection_counter(&self) -> Arc<AtomicUsize> {
        self.active_connections.clone()
    }
}

#[derive(Serialize)]
struct RuntimeMetrics {
    active_connections: usize,
}

async fn health(State(state): State<RelayState>) -> impl IntoResponse {
    Json(RuntimeMetrics {
        active_connections: state.active_connections(),
    })
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(|| async { "Veil Gateway Online" }))
        .route("/health", get(health))
        .route("/rpc", get(connection::ws_handler))
        .with_state(state)
}

/// Serve the relay on an already-bound listener until the server stops.
pub async fn serve(listener: TcpListener, state: RelayState) -> std::io::Result<()> {
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
}
