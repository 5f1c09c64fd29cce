//! Per-socket relay loop.
//!
//! Each upgraded socket is split in two. The reader half stays on the
//! connection task and feeds frames to a [`MessageHandler`]; the writer half
//! moves into a dedicated task that drains the connection's bounded outbound
//! queue in FIFO order. The writer task is the only writer of the socket.
//!
//! Shutdown order on every exit path: handler dropped (subscription
//! forwarders aborted), queue senders gone, writer drains and closes the sink.
//!
//! This module starts at an upgraded socket. The HTTP upgrade exchange and
//! any deadline on it are owned by axum and hyper, so no handshake timeout
//! is applied here.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use veil_common::ServerMessage;

use crate::config::RelayConfig;
use crate::handler::{log_handler_error, MessageHandler};
use crate::pubsub::PubSub;
use crate::store::SessionStore;
use crate::RelayState;

/// Why a connection's read loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer sent a close frame or the stream ended.
    PeerClosed,
    /// Inbound frame exceeded the configured ceiling.
    FrameTooLarge(usize),
    /// Socket read failed.
    ReadError(String),
    /// Handler rejected a frame or a collaborator failed.
    Handler(String),
    /// Writer task stopped after a failed write.
    WriterClosed,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<RelayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> impl IntoResponse {
    let max_frame_bytes = state.config.max_frame_bytes;
    ws.max_message_size(max_frame_bytes)
        .max_frame_size(max_frame_bytes)
        .on_failed_upgrade(move |err| warn!("websocket upgrade from {} failed: {}", addr, err))
        .on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Decrements the live connection gauge when the socket task ends.
struct ActiveConnection(Arc<AtomicUsize>);

impl ActiveConnection {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

async fn handle_socket(socket: WebSocket, state: RelayState, addr: SocketAddr) {
    let _active = ActiveConnection::enter(state.connection_counter());
    let span = info_span!("connection", id = %Uuid::new_v4(), peer = %addr);

    async move {
        info!("client connected");
        let (sink, stream) = socket.split();
        let reason = serve_connection(
            sink,
            stream,
            state.store.clone(),
            state.pubsub.clone(),
            &state.config,
        )
        .await;
        info!("client disconnected: {:?}", reason);
    }
    .instrument(span)
    .await
}

/// Run one connection to completion over an already-upgraded socket.
pub async fn serve_connection<S, R, E>(
    sink: S,
    mut stream: R,
    store: Arc<dyn SessionStore>,
    pubsub: Arc<dyn PubSub>,
    config: &RelayConfig,
) -> CloseReason
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let (tx, rx) = mpsc::channel::<ServerMessage>(config.outbox_capacity);
    let (disconnect_tx, mut disconnect_rx) = mpsc::channel::<()>(1);
    let writer = spawn_writer(sink, rx, disconnect_tx);

    let reason = {
        let mut handler = MessageHandler::new(tx, store, pubsub);
        read_loop(
            &mut stream,
            &mut handler,
            &mut disconnect_rx,
            config.max_frame_bytes,
        )
        .await
    };

    if let Err(err) = writer.await {
        warn!("websocket writer task failed: {}", err);
    }
    reason
}

async fn read_loop<R, E>(
    stream: &mut R,
    handler: &mut MessageHandler,
    disconnect_rx: &mut mpsc::Receiver<()>,
    max_frame_bytes: usize,
) -> CloseReason
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        tokio::select! {
            _ = disconnect_rx.recv() => {
                return CloseReason::WriterClosed;
            }
            frame = stream.next() => {
                let Some(frame) = frame else {
                    return CloseReason::PeerClosed;
                };
                let frame = match frame {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!("websocket read failed: {}", err);
                        return CloseReason::ReadError(err.to_string());
                    }
                };

                let data = match frame {
                    Message::Text(text) => text.into_bytes(),
                    Message::Binary(data) => data,
                    Message::Close(_) => return CloseReason::PeerClosed,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };

                if data.len() > max_frame_bytes {
                    warn!(
                        "frame of {} bytes exceeds limit of {} bytes",
                        data.len(),
                        max_frame_bytes
                    );
                    return CloseReason::FrameTooLarge(data.len());
                }

                debug!("received {} byte frame", data.len());
                if let Err(err) = handler.handle_raw_message(&data).await {
                    log_handler_error(&err);
                    return CloseReason::Handler(err.to_string());
                }
            }
        }
    }
}

/// Spawn the single writer of a socket.
///
/// Writes queued messages in order until every sender is dropped, then
/// closes the sink. A failed write closes the sink and signals `disconnect`.
pub fn spawn_writer<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<ServerMessage>,
    disconnect: mpsc::Sender<()>,
) -> JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display + Send,
{
    tokio::spawn(
        async move {
            while let Some(message) = rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!("failed to serialize outbound message: {}", err);
                        continue;
                    }
                };
                if let Err(err) = sink.send(Message::Text(text)).await {
                    warn!("websocket write failed: {}", err);
                    let _ = disconnect.try_send(());
                    break;
                }
            }
            let _ = sink.close().await;
        }
        .in_current_span(),
    )
}
