//! End-to-end relay behavior through the public API

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use remoter::registry::{ChunkSink, SinkError, Subscriber, SubscriberRegistry};
use remoter::stats::RelayStats;
use remoter::{Chunk, Distributor};

/// Collects chunks; `close_connection` makes later writes fail like a dropped socket
#[derive(Clone, Default)]
struct Viewer {
    received: Arc<Mutex<Vec<Bytes>>>,
    gone: Arc<Mutex<bool>>,
}

impl Viewer {
    fn received(&self) -> Vec<Bytes> {
        self.received.lock().unwrap().clone()
    }

    fn close_connection(&self) {
        *self.gone.lock().unwrap() = true;
    }
}

#[async_trait]
impl ChunkSink for Viewer {
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if *self.gone.lock().unwrap() {
            return Err(SinkError::Closed);
        }
        self.received.lock().unwrap().push(chunk);
        Ok(())
    }
}

async fn join(registry: &SubscriberRegistry) -> (Arc<Subscriber>, Viewer) {
    let viewer = Viewer::default();
    let sub = Arc::new(Subscriber::new(registry.next_id(), viewer.clone()));
    registry.add(Arc::clone(&sub)).await.unwrap();
    (sub, viewer)
}

fn chunks(items: &[&'static str]) -> Vec<Bytes> {
    items.iter().map(|c| Bytes::from_static(c.as_bytes())).collect()
}

#[tokio::test]
async fn three_viewers_one_drops_and_a_late_joiner_gets_no_replay() {
    let registry = Arc::new(SubscriberRegistry::new());
    let distributor = Distributor::new(Arc::clone(&registry), Arc::new(RelayStats::new()));

    let (_s1, v1) = join(&registry).await;
    let (s2, v2) = join(&registry).await;
    let (_s3, v3) = join(&registry).await;

    let report = distributor.publish(Chunk::from_static(b"AA")).await;
    assert_eq!(report.delivered, 3);

    v2.close_connection();
    let report = distributor.publish(Chunk::from_static(b"BB")).await;
    assert_eq!(report.delivered, 2);
    assert_eq!(report.evicted, vec![s2.id()]);

    let report = distributor.publish(Chunk::from_static(b"CC")).await;
    assert_eq!(report.delivered, 2);
    assert!(report.evicted.is_empty());

    let (_s4, v4) = join(&registry).await;
    distributor.publish(Chunk::from_static(b"DD")).await;

    assert_eq!(v1.received(), chunks(&["AA", "BB", "CC", "DD"]));
    assert_eq!(v2.received(), chunks(&["AA"]));
    assert_eq!(v3.received(), chunks(&["AA", "BB", "CC", "DD"]));
    assert_eq!(v4.received(), chunks(&["DD"]));

    assert!(!registry.contains(s2.id()).await);
    assert!(!registry.snapshot().await.ids().contains(&s2.id()));
    assert_eq!(registry.len().await, 3);
}

#[tokio::test]
async fn long_stream_arrives_byte_identical_and_in_order() {
    let registry = Arc::new(SubscriberRegistry::new());
    let distributor = Distributor::new(Arc::clone(&registry), Arc::new(RelayStats::new()));
    let (_sub, viewer) = join(&registry).await;

    let sent: Vec<Bytes> = (0..500u32)
        .map(|i| Bytes::from(i.to_be_bytes().repeat((i % 7 + 1) as usize)))
        .collect();
    for chunk in &sent {
        distributor.publish(Chunk::new(chunk.clone())).await;
    }

    assert_eq!(viewer.received(), sent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_membership_changes_keep_the_registry_consistent() {
    let registry = Arc::new(SubscriberRegistry::new());
    let distributor = Distributor::new(Arc::clone(&registry), Arc::new(RelayStats::new()));

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let registry = Arc::clone(&registry);
        tasks.push(tokio::spawn(async move {
            let mut kept = Vec::new();
            for round in 0..20 {
                let (sub, _viewer) = join(&registry).await;
                if round % 2 == 0 {
                    registry.remove(sub.id()).await;
                    // Removal is idempotent
                    assert!(registry.remove(sub.id()).await.is_none());
                    assert!(!registry.contains(sub.id()).await);
                } else {
                    kept.push(sub.id());
                }
                tokio::task::yield_now().await;
            }
            kept
        }));
    }

    let publisher = {
        let distributor = distributor.clone();
        tokio::spawn(async move {
            for _ in 0..200 {
                distributor.publish(Chunk::from_static(b"x")).await;
                tokio::task::yield_now().await;
            }
        })
    };

    let mut expected = HashSet::new();
    for task in tasks {
        expected.extend(task.await.unwrap());
    }
    publisher.await.unwrap();

    let snapshot = registry.snapshot().await;
    let ids = snapshot.ids();
    let unique: HashSet<_> = ids.iter().copied().collect();

    assert_eq!(ids.len(), unique.len(), "duplicate entries in snapshot");
    assert_eq!(unique, expected);
    assert_eq!(registry.len().await, expected.len());
}
