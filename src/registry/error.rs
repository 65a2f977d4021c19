//! Registry error types
//!
//! Error types for membership changes and per-subscriber writes.

use std::time::Duration;

use super::chunk::SubscriberId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A different subscriber is already registered under this id
    #[error("subscriber id already registered: {0}")]
    DuplicateId(SubscriberId),
    /// The subscriber was evicted and cannot be registered again
    #[error("subscriber already evicted: {0}")]
    AlreadyEvicted(SubscriberId),
    /// The configured subscriber limit is reached
    #[error("subscriber limit reached ({0})")]
    CapacityReached(usize),
}

/// Error returned when a chunk cannot be written to one subscriber
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The connection is closed or the subscriber was evicted
    #[error("connection closed")]
    Closed,
    /// The write did not complete within the deadline
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),
    /// The transport reported an error
    #[error("transport error: {0}")]
    Transport(String),
}
