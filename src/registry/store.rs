//! Subscriber registry implementation
//!
//! Membership set of active subscribers. Mutations and snapshots hold the
//! lock only long enough to touch the map; no network I/O ever happens under
//! it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::chunk::SubscriberId;
use super::config::RegistryConfig;
use super::error::RegistryError;
use super::subscriber::Subscriber;

/// Central registry of subscribers
///
/// Thread-safe via `RwLock`. Snapshots copy the member list so a broadcast
/// sweep can iterate and write without blocking joins or leaves.
pub struct SubscriberRegistry {
    /// Map of subscriber id to subscriber
    members: RwLock<HashMap<SubscriberId, Arc<Subscriber>>>,

    /// Next id handed out by `next_id`
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl SubscriberRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocate a fresh subscriber id
    pub fn next_id(&self) -> SubscriberId {
        SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a subscriber
    ///
    /// Idempotent: adding the same subscriber twice returns `Ok(false)` the
    /// second time. Returns an error if a different subscriber already owns
    /// the id, if the subscriber was evicted, or if the limit is reached.
    pub async fn add(&self, subscriber: Arc<Subscriber>) -> Result<bool, RegistryError> {
        let id = subscriber.id();
        let mut members = self.members.write().await;

        if let Some(existing) = members.get(&id) {
            if Arc::ptr_eq(existing, &subscriber) {
                return Ok(false);
            }
            return Err(RegistryError::DuplicateId(id));
        }

        if !subscriber.is_registered() {
            return Err(RegistryError::AlreadyEvicted(id));
        }

        if self.config.max_subscribers > 0 && members.len() >= self.config.max_subscribers {
            return Err(RegistryError::CapacityReached(self.config.max_subscribers));
        }

        members.insert(id, subscriber);
        let count = members.len();
        drop(members);

        tracing::info!(subscriber = %id, subscribers = count, "Subscriber added");
        Ok(true)
    }

    /// Remove a subscriber
    ///
    /// Idempotent: returns `None` if the subscriber was not present.
    pub async fn remove(&self, id: SubscriberId) -> Option<Arc<Subscriber>> {
        let mut members = self.members.write().await;
        let removed = members.remove(&id);
        let count = members.len();
        drop(members);

        if removed.is_some() {
            tracing::info!(subscriber = %id, subscribers = count, "Subscriber removed");
        }
        removed
    }

    /// Evict a subscriber and drop it from membership
    ///
    /// Flips the subscriber to `Evicted` before removing it, so a sweep that
    /// already holds it in a snapshot skips it. Returns `true` only for the
    /// caller that performed the eviction; that caller owns closing the
    /// connection.
    pub async fn evict(&self, subscriber: &Subscriber) -> bool {
        let won = subscriber.evict();
        self.remove(subscriber.id()).await;
        won
    }

    /// Point-in-time copy of the registered members
    ///
    /// Members already evicted but not yet removed are skipped.
    pub async fn snapshot(&self) -> RegistrySnapshot {
        let members = self.members.read().await;
        let subscribers = members
            .values()
            .filter(|s| s.is_registered())
            .cloned()
            .collect();
        RegistrySnapshot { subscribers }
    }

    /// Whether `id` is currently registered
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.members.read().await.contains_key(&id)
    }

    /// Number of registered subscribers
    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    /// Whether no subscriber is registered
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable copy of the registry membership
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    subscribers: Vec<Arc<Subscriber>>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<Subscriber>> {
        self.subscribers.iter()
    }

    /// Ids of the members, in no particular order
    pub fn ids(&self) -> Vec<SubscriberId> {
        self.subscribers.iter().map(|s| s.id()).collect()
    }
}

impl<'a> IntoIterator for &'a RegistrySnapshot {
    type Item = &'a Arc<Subscriber>;
    type IntoIter = std::slice::Iter<'a, Arc<Subscriber>>;

    fn into_iter(self) -> Self::IntoIter {
        self.subscribers.iter()
    }
}
