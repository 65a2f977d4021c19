//! Statistics and metrics for the relay

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Producer-session statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Total bytes received from the producer
    pub bytes_received: u64,
    /// Number of chunks published
    pub chunks: u64,
    /// Subscriber writes that succeeded
    pub deliveries: u64,
    /// Subscribers evicted during this session
    pub evictions: u64,
    /// Session duration
    pub duration: Duration,
    /// Average ingest bitrate (bits/sec)
    pub bitrate: u64,
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate bitrate from bytes and duration
    pub fn calculate_bitrate(&mut self) {
        let millis = self.duration.as_millis() as u64;
        if millis > 0 {
            self.bitrate = (self.bytes_received * 8 * 1000) / millis;
        }
    }
}

/// Server-wide counters, updated lock-free
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    chunks_published: AtomicU64,
    bytes_published: AtomicU64,
    subscribers_joined: AtomicU64,
    subscribers_evicted: AtomicU64,
    producer_sessions: AtomicU64,
    producers_rejected: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            chunks_published: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
            subscribers_joined: AtomicU64::new(0),
            subscribers_evicted: AtomicU64::new(0),
            producer_sessions: AtomicU64::new(0),
            producers_rejected: AtomicU64::new(0),
        }
    }

    pub fn record_chunk(&self, len: usize) {
        self.chunks_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn record_join(&self) {
        self.subscribers_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.subscribers_evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_producer(&self) {
        self.producer_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_producer_rejected(&self) {
        self.producers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the relay started
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Copy the counters
    ///
    /// `subscribers` and `producer_active` are live values supplied by the
    /// caller; the counters here are cumulative.
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            uptime_secs: self.uptime().as_secs(),
            subscribers: 0,
            producer_active: false,
            chunks_published: self.chunks_published.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
            subscribers_joined: self.subscribers_joined.load(Ordering::Relaxed),
            subscribers_evicted: self.subscribers_evicted.load(Ordering::Relaxed),
            producer_sessions: self.producer_sessions.load(Ordering::Relaxed),
            producers_rejected: self.producers_rejected.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of the relay counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    pub uptime_secs: u64,
    /// Currently registered subscribers
    pub subscribers: usize,
    /// Whether a producer is currently pushing
    pub producer_active: bool,
    pub chunks_published: u64,
    pub bytes_published: u64,
    pub subscribers_joined: u64,
    pub subscribers_evicted: u64,
    pub producer_sessions: u64,
    pub producers_rejected: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_stats_new() {
        let stats = SessionStats::new();
        assert_eq!(stats.bytes_received, 0);
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.bitrate, 0);
    }

    #[test]
    fn test_session_stats_calculate_bitrate() {
        let mut stats = SessionStats::new();
        stats.bytes_received = 1_000_000; // 1 MB
        stats.duration = Duration::from_secs(10);

        stats.calculate_bitrate();

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(stats.bitrate, 800_000);
    }

    #[test]
    fn test_session_stats_calculate_bitrate_zero_duration() {
        let mut stats = SessionStats::new();
        stats.bytes_received = 1_000_000;

        stats.calculate_bitrate();

        assert_eq!(stats.bitrate, 0);
    }

    #[test]
    fn test_relay_stats_counters() {
        let stats = RelayStats::new();

        stats.record_chunk(4096);
        stats.record_chunk(100);
        stats.record_join();
        stats.record_eviction();
        stats.record_producer();
        stats.record_producer_rejected();

        let snap = stats.snapshot();
        assert_eq!(snap.chunks_published, 2);
        assert_eq!(snap.bytes_published, 4196);
        assert_eq!(snap.subscribers_joined, 1);
        assert_eq!(snap.subscribers_evicted, 1);
        assert_eq!(snap.producer_sessions, 1);
        assert_eq!(snap.producers_rejected, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let snap = RelayStats::new().snapshot();
        let json = serde_json::to_value(&snap).unwrap();

        assert_eq!(json["chunks_published"], 0);
        assert_eq!(json["producer_active"], false);
    }
}
