//! Viewer WebSocket endpoint
//!
//! On upgrade the connection is split: the write half becomes the
//! subscriber's [`ChunkSink`] and the read half feeds the disconnect
//! detector. The protocol is one-directional; whatever the viewer sends is
//! discarded and only its arrival or absence matters.
//!
//! Origins are not checked here. Any page may open the socket; this endpoint
//! is not an access-control boundary.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};

use crate::error::Error;
use crate::registry::{ChunkSink, RegistryError, SinkError, Subscriber};
use crate::server::state::{PeerAddr, RelayState};

/// Writes chunks as binary WebSocket frames, one frame per chunk
pub struct WebSocketSink<S> {
    inner: S,
}

impl<S> WebSocketSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> ChunkSink for WebSocketSink<S>
where
    S: Sink<Message> + Send + Unpin + 'static,
    S::Error: std::fmt::Display,
{
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        self.inner
            .send(Message::Binary(chunk))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        self.inner
            .close()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}

/// Why the disconnect detector stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The viewer sent a close frame
    Closed,
    /// The read half ended without a close frame
    StreamEnded,
    /// Reading from the viewer failed
    ReadError(String),
    /// The distributor evicted the subscriber
    Evicted,
}

/// Handler for the upgrade path
pub async fn handle_subscribe(
    State(state): State<RelayState>,
    PeerAddr(peer_addr): PeerAddr,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!(peer = ?peer_addr, error = %rejection.body_text(), "Subscriber rejected");
            return Error::UpgradeFailed(rejection.body_text()).into_response();
        }
    };

    let max = state.registry().config().max_subscribers;
    if max > 0 && state.registry().len().await >= max {
        tracing::warn!(peer = ?peer_addr, limit = max, "Subscriber rejected: limit reached");
        return Error::Registry(RegistryError::CapacityReached(max)).into_response();
    }

    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |e| {
            tracing::warn!(peer = ?peer_addr, error = %e, "WebSocket handshake failed");
        })
        .on_upgrade(move |socket| serve_subscriber(socket, state, peer_addr))
}

async fn serve_subscriber(
    socket: WebSocket,
    state: RelayState,
    peer_addr: Option<std::net::SocketAddr>,
) {
    let (sink, stream) = socket.split();
    let registry = state.registry();

    let mut subscriber = Subscriber::new(registry.next_id(), WebSocketSink::new(sink));
    if let Some(addr) = peer_addr {
        subscriber = subscriber.with_peer_addr(addr);
    }
    let subscriber = Arc::new(subscriber);
    let close_timeout = registry.config().close_timeout;

    if let Err(e) = registry.add(Arc::clone(&subscriber)).await {
        tracing::warn!(subscriber = %subscriber.id(), error = %e, "Subscriber registration failed");
        subscriber.evict();
        close_quietly(&subscriber, close_timeout).await;
        return;
    }
    state.stats().record_join();

    let reason = detect_disconnect(&subscriber, stream).await;

    if registry.evict(&subscriber).await {
        close_quietly(&subscriber, close_timeout).await;
    }

    tracing::info!(
        subscriber = %subscriber.id(),
        peer = ?peer_addr,
        reason = ?reason,
        chunks = subscriber.chunks_sent(),
        bytes = subscriber.bytes_sent(),
        "Subscriber disconnected"
    );
}

async fn close_quietly(subscriber: &Subscriber, deadline: std::time::Duration) {
    if let Err(e) = subscriber.close(deadline).await {
        tracing::debug!(subscriber = %subscriber.id(), error = %e, "Close after disconnect failed");
    }
}

/// Read from the viewer until it goes away or the subscriber is evicted
///
/// Received frames are discarded.
pub async fn detect_disconnect<S, E>(subscriber: &Subscriber, mut stream: S) -> DisconnectReason
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        tokio::select! {
            _ = subscriber.evicted() => return DisconnectReason::Evicted,
            frame = stream.next() => match frame {
                Some(Ok(Message::Close(_))) => return DisconnectReason::Closed,
                Some(Ok(_)) => {}
                Some(Err(e)) => return DisconnectReason::ReadError(e.to_string()),
                None => return DisconnectReason::StreamEnded,
            },
        }
    }
}
