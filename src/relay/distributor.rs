//! Chunk fan-out
//!
//! `publish` takes a registry snapshot and writes the chunk to every member.
//! The ingest loop awaits each `publish` before reading the next chunk, and a
//! sweep returns only once every write has finished or failed, so a
//! subscriber that stays registered sees chunks in exactly publish order.
//!
//! # Bounded writes
//!
//! Writes within one sweep are issued concurrently and each is bounded by
//! `RegistryConfig::write_timeout`. A subscriber that cannot accept a chunk in
//! time is treated like one whose write failed: it is evicted at the end of
//! the sweep. A stalled viewer therefore delays the sweep by at most one
//! deadline and never blocks delivery to the others indefinitely. This
//! differs from strictly sequential, unbounded writes, where one slow viewer
//! would hold up every viewer behind it and the next publish.

use std::sync::Arc;

use futures::future::join_all;

use crate::registry::{Chunk, SinkError, Subscriber, SubscriberId, SubscriberRegistry};
use crate::stats::RelayStats;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Subscribers that accepted the chunk
    pub delivered: usize,
    /// Subscribers evicted because their write failed or timed out
    pub evicted: Vec<SubscriberId>,
    /// Subscribers skipped because they left during the sweep
    pub skipped: usize,
}

/// Delivers chunks to all registered subscribers
#[derive(Clone)]
pub struct Distributor {
    registry: Arc<SubscriberRegistry>,
    stats: Arc<RelayStats>,
}

impl Distributor {
    /// Create a distributor over `registry`
    pub fn new(registry: Arc<SubscriberRegistry>, stats: Arc<RelayStats>) -> Self {
        Self { registry, stats }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Deliver `chunk` to every subscriber registered at the time of the call
    ///
    /// Subscribers that join while the sweep runs do not receive this chunk.
    /// Failed subscribers are evicted after all writes have completed.
    pub async fn publish(&self, chunk: Chunk) -> SweepReport {
        let snapshot = self.registry.snapshot().await;
        self.stats.record_chunk(chunk.len());

        let mut report = SweepReport::default();
        if snapshot.is_empty() {
            return report;
        }

        let deadline = self.registry.config().write_timeout;
        let writes = snapshot.iter().map(|subscriber| {
            let chunk = &chunk;
            async move { (subscriber, subscriber.deliver(chunk, deadline).await) }
        });
        let results = join_all(writes).await;

        let mut failed = Vec::new();
        for (subscriber, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(SinkError::Closed) if !subscriber.is_registered() => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        subscriber = %subscriber.id(),
                        error = %e,
                        "Subscriber write failed, evicting"
                    );
                    failed.push(Arc::clone(subscriber));
                }
            }
        }

        for subscriber in failed {
            let id = subscriber.id();
            if self.evict(subscriber).await {
                report.evicted.push(id);
            }
        }

        report
    }

    /// Evict a subscriber and close its connection in the background
    ///
    /// Returns `false` if someone else (usually the disconnect detector)
    /// already evicted it.
    pub async fn evict(&self, subscriber: Arc<Subscriber>) -> bool {
        if !self.registry.evict(&subscriber).await {
            return false;
        }
        self.stats.record_eviction();

        let close_timeout = self.registry.config().close_timeout;
        tokio::spawn(async move {
            if let Err(e) = subscriber.close(close_timeout).await {
                tracing::debug!(subscriber = %subscriber.id(), error = %e, "Close after eviction failed");
            }
        });
        true
    }
}
