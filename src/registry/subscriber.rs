//! Subscriber state and the outbound sink seam
//!
//! A `Subscriber` is one live viewer connection. It moves through exactly one
//! transition, `Registered` → `Evicted`, and is never resurrected: a viewer
//! that reconnects gets a brand-new `Subscriber`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::chunk::{Chunk, SubscriberId};
use super::error::SinkError;

/// Outbound half of a subscriber connection
///
/// Implemented by the WebSocket writer in production and by in-memory sinks
/// in tests. The payload is forwarded verbatim; implementations must not add
/// framing beyond what their transport requires.
#[async_trait]
pub trait ChunkSink: Send + 'static {
    /// Write one chunk
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Lifecycle state of a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Eligible for delivery
    Registered,
    /// Removed from delivery; the connection is being or has been closed
    Evicted,
}

/// One live outbound connection
pub struct Subscriber {
    id: SubscriberId,
    peer_addr: Option<SocketAddr>,
    joined_at: Instant,
    evicted: AtomicBool,
    closed: CancellationToken,
    sink: Mutex<Box<dyn ChunkSink>>,
    chunks_sent: AtomicU64,
    bytes_sent: AtomicU64,
}

impl Subscriber {
    /// Create a subscriber bound to `sink`
    pub fn new(id: SubscriberId, sink: impl ChunkSink) -> Self {
        Self {
            id,
            peer_addr: None,
            joined_at: Instant::now(),
            evicted: AtomicBool::new(false),
            closed: CancellationToken::new(),
            sink: Mutex::new(Box::new(sink)),
            chunks_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        }
    }

    /// Record the remote address of the viewer
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Time since the subscriber was created
    pub fn connected_for(&self) -> Duration {
        self.joined_at.elapsed()
    }

    pub fn state(&self) -> SubscriberState {
        if self.evicted.load(Ordering::Acquire) {
            SubscriberState::Evicted
        } else {
            SubscriberState::Registered
        }
    }

    pub fn is_registered(&self) -> bool {
        self.state() == SubscriberState::Registered
    }

    /// Number of chunks successfully written
    pub fn chunks_sent(&self) -> u64 {
        self.chunks_sent.load(Ordering::Relaxed)
    }

    /// Number of payload bytes successfully written
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    /// Write one chunk, bounded by `deadline`
    ///
    /// Waiting for the sink lock counts against the deadline. An evicted
    /// subscriber is never written to.
    pub async fn deliver(&self, chunk: &Chunk, deadline: Duration) -> Result<(), SinkError> {
        if !self.is_registered() {
            return Err(SinkError::Closed);
        }

        let write = async {
            let mut sink = self.sink.lock().await;
            // Re-check under the lock: eviction may have raced the snapshot.
            if !self.is_registered() {
                return Err(SinkError::Closed);
            }
            sink.send_chunk(chunk.bytes().clone()).await
        };

        match tokio::time::timeout(deadline, write).await {
            Ok(Ok(())) => {
                self.chunks_sent.fetch_add(1, Ordering::Relaxed);
                self.bytes_sent
                    .fetch_add(chunk.len() as u64, Ordering::Relaxed);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SinkError::TimedOut(deadline)),
        }
    }

    /// Transition to `Evicted`
    ///
    /// Returns `true` only for the caller that performed the transition; that
    /// caller owns closing the connection. Also wakes the disconnect detector.
    pub fn evict(&self) -> bool {
        let won = self
            .evicted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        self.closed.cancel();
        won
    }

    /// Resolves once the subscriber has been evicted
    pub fn evicted(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    /// Close the connection, bounded by `deadline`
    pub async fn close(&self, deadline: Duration) -> Result<(), SinkError> {
        let close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };

        match tokio::time::timeout(deadline, close).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::TimedOut(deadline)),
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state())
            .field("chunks_sent", &self.chunks_sent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_support::{FailingSink, RecordingSink, StallingSink};

    #[tokio::test]
    async fn test_deliver_records_payload() {
        let (sink, received) = RecordingSink::new();
        let sub = Subscriber::new(SubscriberId::new(1), sink);

        sub.deliver(&Chunk::from_static(b"AA"), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(received.chunks(), vec![Bytes::from_static(b"AA")]);
        assert_eq!(sub.chunks_sent(), 1);
        assert_eq!(sub.bytes_sent(), 2);
    }

    #[tokio::test]
    async fn test_deliver_after_evict_is_refused() {
        let (sink, received) = RecordingSink::new();
        let sub = Subscriber::new(SubscriberId::new(1), sink);

        assert!(sub.evict());
        let result = sub
            .deliver(&Chunk::from_static(b"AA"), Duration::from_secs(1))
            .await;

        assert_eq!(result, Err(SinkError::Closed));
        assert!(received.chunks().is_empty());
    }

    #[tokio::test]
    async fn test_evict_is_one_way() {
        let (sink, _) = RecordingSink::new();
        let sub = Subscriber::new(SubscriberId::new(1), sink);

        assert_eq!(sub.state(), SubscriberState::Registered);
        assert!(sub.evict());
        assert!(!sub.evict());
        assert_eq!(sub.state(), SubscriberState::Evicted);

        // Detector wake-up resolves immediately once evicted
        sub.evicted().await;
    }

    #[tokio::test]
    async fn test_deliver_failure_is_reported() {
        let sub = Subscriber::new(SubscriberId::new(1), FailingSink);

        let result = sub
            .deliver(&Chunk::from_static(b"AA"), Duration::from_secs(1))
            .await;

        assert!(matches!(result, Err(SinkError::Transport(_))));
        assert_eq!(sub.chunks_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_times_out() {
        let sub = Subscriber::new(SubscriberId::new(1), StallingSink);

        let result = sub
            .deliver(&Chunk::from_static(b"AA"), Duration::from_millis(100))
            .await;

        assert_eq!(
            result,
            Err(SinkError::TimedOut(Duration::from_millis(100)))
        );
    }
}
