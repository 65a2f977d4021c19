//! Chunk and subscriber identity types
//!
//! A chunk is an opaque span of the producer's push stream. It carries no
//! framing, timestamps or codec boundaries; its only identity is the order in
//! which the ingest loop published it.

use std::ops::Deref;

use bytes::Bytes;

/// Unique identifier for a subscriber
///
/// Ids are allocated by the registry and never reused within a process, so a
/// viewer that reconnects always gets a new identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Create an id from a raw value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// An opaque chunk of the ingest stream
///
/// Cheap to clone: the payload is reference counted, not copied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk(Bytes);

impl Chunk {
    /// Wrap a payload
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    /// Wrap a static payload without allocating
    pub const fn from_static(data: &'static [u8]) -> Self {
        Self(Bytes::from_static(data))
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying `Bytes`
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    /// Consume into the underlying `Bytes`
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Chunk {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for Chunk {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_clone_shares_payload() {
        let chunk = Chunk::new(vec![0x47, 0x40, 0x00, 0x10]);
        let copy = chunk.clone();

        assert_eq!(chunk.bytes().as_ptr(), copy.bytes().as_ptr());
        assert_eq!(&copy[..], &[0x47, 0x40, 0x00, 0x10]);
    }

    #[test]
    fn test_subscriber_id_display() {
        assert_eq!(SubscriberId::new(42).to_string(), "sub-42");
        assert_eq!(SubscriberId::new(42).get(), 42);
    }
}
