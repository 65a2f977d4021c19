//! Single-producer discipline
//!
//! Two simultaneous pushes would interleave their chunks into every
//! subscriber's stream and corrupt decoding on the viewer side. The slot
//! hands out one `ProducerGuard` at a time; the guard releases the slot when
//! the ingest request ends, however it ends.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Error, Result};

/// What to do when a push arrives while another is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProducerPolicy {
    /// Refuse the second producer (409 Conflict)
    #[default]
    Reject,
    /// Accept it; chunks from both sessions interleave
    Allow,
}

#[derive(Debug)]
struct Active {
    session_id: u64,
    peer_addr: Option<SocketAddr>,
}

/// Tracks the active producer sessions
#[derive(Debug)]
pub struct ProducerSlot {
    policy: ProducerPolicy,
    next_session_id: AtomicU64,
    active: Mutex<Vec<Active>>,
}

impl ProducerSlot {
    pub fn new(policy: ProducerPolicy) -> Self {
        Self {
            policy,
            next_session_id: AtomicU64::new(1),
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn policy(&self) -> ProducerPolicy {
        self.policy
    }

    /// Claim the slot for a new producer session
    ///
    /// Under `ProducerPolicy::Reject` this fails with `Error::ProducerBusy`
    /// while another session holds the slot.
    pub fn acquire(self: &Arc<Self>, peer_addr: Option<SocketAddr>) -> Result<ProducerGuard> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if self.policy == ProducerPolicy::Reject {
            if let Some(current) = active.first() {
                tracing::warn!(
                    active_session = current.session_id,
                    active_peer = ?current.peer_addr,
                    peer = ?peer_addr,
                    "Producer rejected: session already active"
                );
                return Err(Error::ProducerBusy(current.session_id));
            }
        } else if let Some(current) = active.first() {
            tracing::warn!(
                active_session = current.session_id,
                peer = ?peer_addr,
                "Concurrent producer accepted; chunks will interleave"
            );
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        active.push(Active {
            session_id,
            peer_addr,
        });

        Ok(ProducerGuard {
            slot: Arc::clone(self),
            session_id,
        })
    }

    /// Number of sessions currently holding the slot
    pub fn active_count(&self) -> usize {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether any producer is currently pushing
    pub fn is_active(&self) -> bool {
        self.active_count() > 0
    }

    fn release(&self, session_id: u64) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.retain(|a| a.session_id != session_id);
    }
}

impl Default for ProducerSlot {
    fn default() -> Self {
        Self::new(ProducerPolicy::default())
    }
}

/// Held for the lifetime of one producer session
#[derive(Debug)]
pub struct ProducerGuard {
    slot: Arc<ProducerSlot>,
    session_id: u64,
}

impl ProducerGuard {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }
}

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        self.slot.release(self.session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_second_producer() {
        let slot = Arc::new(ProducerSlot::new(ProducerPolicy::Reject));

        let first = slot.acquire(None).unwrap();
        let second = slot.acquire(None);

        assert!(matches!(second, Err(Error::ProducerBusy(id)) if id == first.session_id()));
        assert_eq!(slot.active_count(), 1);
    }

    #[test]
    fn test_release_on_drop() {
        let slot = Arc::new(ProducerSlot::default());

        let first = slot.acquire(None).unwrap();
        drop(first);
        assert!(!slot.is_active());

        let second = slot.acquire(None).unwrap();
        assert_eq!(second.session_id(), 2);
    }

    #[test]
    fn test_allow_policy() {
        let slot = Arc::new(ProducerSlot::new(ProducerPolicy::Allow));

        let _a = slot.acquire(None).unwrap();
        let _b = slot.acquire(None).unwrap();

        assert_eq!(slot.active_count(), 2);
    }
}
