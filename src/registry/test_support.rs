//! In-memory sinks for tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use super::error::SinkError;
use super::subscriber::ChunkSink;

/// Shared view of what a `RecordingSink` received
#[derive(Clone, Default)]
pub struct Received {
    chunks: Arc<Mutex<Vec<Bytes>>>,
    closed: Arc<Mutex<bool>>,
}

impl Received {
    pub fn chunks(&self) -> Vec<Bytes> {
        self.chunks.lock().unwrap().clone()
    }

    /// All received payloads concatenated
    pub fn concat(&self) -> Vec<u8> {
        self.chunks().iter().flat_map(|c| c.to_vec()).collect()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

/// Records every chunk; can be told to start failing
pub struct RecordingSink {
    received: Received,
    fail: Arc<Mutex<bool>>,
}

impl RecordingSink {
    pub fn new() -> (Self, Received) {
        let received = Received::default();
        let sink = Self {
            received: received.clone(),
            fail: Arc::new(Mutex::new(false)),
        };
        (sink, received)
    }

    /// Like `new`, plus a switch that makes later writes fail
    pub fn with_switch() -> (Self, Received, Arc<Mutex<bool>>) {
        let (sink, received) = Self::new();
        let fail = Arc::clone(&sink.fail);
        (sink, received, fail)
    }
}

#[async_trait]
impl ChunkSink for RecordingSink {
    async fn send_chunk(&mut self, chunk: Bytes) -> Result<(), SinkError> {
        if *self.fail.lock().unwrap() {
            return Err(SinkError::Closed);
        }
        self.received.chunks.lock().unwrap().push(chunk);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        *self.received.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Fails every write
pub struct FailingSink;

#[async_trait]
impl ChunkSink for FailingSink {
    async fn send_chunk(&mut self, _chunk: Bytes) -> Result<(), SinkError> {
        Err(SinkError::Transport("broken pipe".into()))
    }
}

/// Never completes a write
pub struct StallingSink;

#[async_trait]
impl ChunkSink for StallingSink {
    async fn send_chunk(&mut self, _chunk: Bytes) -> Result<(), SinkError> {
        std::future::pending().await
    }
}
