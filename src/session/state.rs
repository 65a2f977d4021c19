//! Producer session state machine
//!
//! Tracks one ingest connection from request acceptance to end of stream.
//! The session only counts as started once the first byte arrives.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::relay::SweepReport;
use crate::stats::SessionStats;

/// Producer session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Request accepted, no body bytes yet
    Waiting,
    /// At least one chunk received
    Streaming,
    /// Body ended or broke
    Closed,
}

/// Why a producer session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The producer finished the body
    EndOfStream,
    /// Reading the body failed
    ReadError(String),
}

/// State of one producer session
#[derive(Debug)]
pub struct ProducerSession {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address, when known
    pub peer_addr: Option<SocketAddr>,

    /// Current phase
    pub phase: SessionPhase,

    /// When the request was accepted
    pub accepted_at: Instant,

    /// When the first byte arrived
    pub started_at: Option<Instant>,

    /// Why the session ended
    pub end_reason: Option<EndReason>,

    /// Bytes received from the producer
    pub bytes_received: u64,

    /// Chunks published
    pub chunks: u64,

    /// Successful subscriber writes across all sweeps
    pub deliveries: u64,

    /// Subscribers evicted during this session
    pub evictions: u64,
}

impl ProducerSession {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: Option<SocketAddr>) -> Self {
        Self {
            id,
            peer_addr,
            phase: SessionPhase::Waiting,
            accepted_at: Instant::now(),
            started_at: None,
            end_reason: None,
            bytes_received: 0,
            chunks: 0,
            deliveries: 0,
            evictions: 0,
        }
    }

    /// Account for one published chunk
    ///
    /// Returns `true` when this was the first chunk of the session.
    pub fn on_chunk(&mut self, len: usize, report: &SweepReport) -> bool {
        let first = self.phase == SessionPhase::Waiting;
        if first {
            self.phase = SessionPhase::Streaming;
            self.started_at = Some(Instant::now());
        }

        self.bytes_received += len as u64;
        self.chunks += 1;
        self.deliveries += report.delivered as u64;
        self.evictions += report.evicted.len() as u64;
        first
    }

    /// Close the session
    pub fn close(&mut self, reason: EndReason) {
        if self.phase != SessionPhase::Closed {
            self.phase = SessionPhase::Closed;
            self.end_reason = Some(reason);
        }
    }

    /// Whether the first byte has arrived and the session is not closed
    pub fn is_streaming(&self) -> bool {
        self.phase == SessionPhase::Streaming
    }

    /// Time since the first byte, if any
    pub fn duration(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Summary statistics
    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats {
            bytes_received: self.bytes_received,
            chunks: self.chunks,
            deliveries: self.deliveries,
            evictions: self.evictions,
            duration: self.duration().unwrap_or_default(),
            bitrate: 0,
        };
        stats.calculate_bitrate();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SubscriberId;

    #[test]
    fn test_session_lifecycle() {
        let mut session = ProducerSession::new(1, None);
        assert_eq!(session.phase, SessionPhase::Waiting);
        assert!(session.duration().is_none());

        let report = SweepReport {
            delivered: 2,
            evicted: vec![SubscriberId::new(3)],
            skipped: 0,
        };
        assert!(session.on_chunk(4096, &report));
        assert!(!session.on_chunk(100, &SweepReport::default()));
        assert!(session.is_streaming());

        session.close(EndReason::EndOfStream);
        assert_eq!(session.phase, SessionPhase::Closed);

        let stats = session.stats();
        assert_eq!(stats.bytes_received, 4196);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.deliveries, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn test_close_keeps_first_reason() {
        let mut session = ProducerSession::new(1, None);

        session.close(EndReason::ReadError("reset".into()));
        session.close(EndReason::EndOfStream);

        assert_eq!(session.end_reason, Some(EndReason::ReadError("reset".into())));
    }
}
