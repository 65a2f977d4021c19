//! Producer push endpoint
//!
//! Accepts `POST` or `PUT` with an unbounded body (the encoder's transport
//! stream). The body is read in chunks of at most `ServerConfig::chunk_size`
//! bytes and each chunk is published before the next read, which is what
//! keeps broadcast order equal to arrival order.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use bytes::BytesMut;
use futures::TryStreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};
use crate::registry::Chunk;
use crate::relay::Distributor;
use crate::server::state::{PeerAddr, RelayState};
use crate::session::{EndReason, ProducerSession};

/// Handler for the push path
pub async fn handle_ingest(
    State(state): State<RelayState>,
    method: Method,
    PeerAddr(peer_addr): PeerAddr,
    body: Body,
) -> Result<impl IntoResponse> {
    if method != Method::POST && method != Method::PUT {
        tracing::warn!(method = %method, peer = ?peer_addr, "Ingest rejected: method not allowed");
        return Err(Error::MethodNotAllowed(method.to_string()));
    }

    let guard = state.producers.acquire(peer_addr).inspect_err(|_| {
        state.stats().record_producer_rejected();
    })?;
    state.stats().record_producer();

    let mut session = ProducerSession::new(guard.session_id(), peer_addr);
    tracing::debug!(session_id = session.id, peer = ?peer_addr, "Producer connected");

    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));
    let result = run_ingest(
        &state.distributor,
        &mut session,
        reader,
        state.config.chunk_size,
    )
    .await;

    let stats = session.stats();
    tracing::info!(
        session_id = session.id,
        bytes = stats.bytes_received,
        chunks = stats.chunks,
        evictions = stats.evictions,
        bitrate = stats.bitrate,
        reason = ?session.end_reason,
        "Producer session ended"
    );
    drop(guard);

    result?;
    Ok((
        StatusCode::OK,
        format!("{} bytes in {} chunks\n", stats.bytes_received, stats.chunks),
    ))
}

/// Read `reader` to the end, publishing each chunk in turn
///
/// Stops at end of stream or on the first read error; nothing is retried and
/// a failed read publishes nothing.
pub async fn run_ingest<R>(
    distributor: &Distributor,
    session: &mut ProducerSession,
    mut reader: R,
    chunk_size: usize,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut buf = BytesMut::zeroed(chunk_size);
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                session.close(EndReason::EndOfStream);
                return Ok(());
            }
            Ok(n) => n,
            Err(e) => {
                session.close(EndReason::ReadError(e.to_string()));
                return Err(Error::IngestRead(e));
            }
        };
        buf.truncate(n);

        let report = distributor.publish(Chunk::new(buf.freeze())).await;
        if session.on_chunk(n, &report) {
            tracing::info!(
                session_id = session.id,
                peer = ?session.peer_addr,
                subscribers = report.delivered,
                "Producer session started"
            );
        }
    }
}
