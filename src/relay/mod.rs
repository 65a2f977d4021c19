//! Broadcast core
//!
//! [`Distributor`] delivers each ingest chunk to every registered subscriber;
//! [`ProducerSlot`] keeps a single producer session active at a time.

pub mod distributor;
pub mod producer;

pub use distributor::{Distributor, SweepReport};
pub use producer::{ProducerGuard, ProducerPolicy, ProducerSlot};
