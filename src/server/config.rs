//! Server configuration

use std::net::SocketAddr;

use crate::relay::ProducerPolicy;

/// Default listen port for the relay
pub const DEFAULT_PORT: u16 = 8642;

/// Default size of one ingest read
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Upper bound for the ingest read size
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum bytes read from the producer body per chunk
    pub chunk_size: usize,

    /// How a second concurrent producer is handled
    pub producer_policy: ProducerPolicy,

    /// Largest frame accepted from a viewer; viewers only send liveness traffic
    pub max_message_size: usize,

    /// Producer push path (POST or PUT)
    pub ingest_path: String,

    /// WebSocket upgrade path
    pub subscribe_path: String,

    /// JSON stats path
    pub stats_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            chunk_size: DEFAULT_CHUNK_SIZE,
            producer_policy: ProducerPolicy::Reject,
            max_message_size: 64 * 1024, // 64KB
            ingest_path: "/stream".into(),
            subscribe_path: "/ws".into(),
            stats_path: "/stats".into(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set only the port, keeping the bind host
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set the ingest chunk size, clamped to `1..=MAX_CHUNK_SIZE`
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    /// Set the concurrent-producer policy
    pub fn producer_policy(mut self, policy: ProducerPolicy) -> Self {
        self.producer_policy = policy;
        self
    }
}
