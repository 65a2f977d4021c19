//! Subscriber registry
//!
//! The registry is the only shared mutable state of the relay: the set of
//! viewers currently eligible to receive chunks. Subscriber lifecycle handlers
//! add and remove members while the distributor takes point-in-time snapshots
//! to iterate outside the lock.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<SubscriberRegistry>
//!                   ┌──────────────────────────────┐
//!                   │ members: HashMap<Id,         │
//!                   │   Arc<Subscriber {           │
//!                   │     state, sink, closed,     │
//!                   │   }>                         │
//!                   │ >                            │
//!                   └──────────────┬───────────────┘
//!            add / remove          │          snapshot()
//!   ┌──────────────────────────────┼───────────────────────────┐
//!   │                              │                           │
//! [ws upgrade]              [disconnect detector]        [Distributor]
//! registry.add()            registry.remove()            write outside lock
//! ```
//!
//! # Zero-Copy Fan-Out
//!
//! `Chunk` wraps `bytes::Bytes`, so every subscriber write shares the same
//! allocation. Cloning a chunk only bumps a reference count.

pub mod chunk;
pub mod config;
pub mod error;
pub mod store;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod test_support;

pub use chunk::{Chunk, SubscriberId};
pub use config::{RegistryConfig, MIN_WRITE_TIMEOUT};
pub use error::{RegistryError, SinkError};
pub use store::{RegistrySnapshot, SubscriberRegistry};
pub use subscriber::{ChunkSink, Subscriber, SubscriberState};
