//! HTTP server
//!
//! Two independent entry points share one registry:
//!
//! - `POST|PUT /stream`: the producer push, see [`ingest`]
//! - `GET /ws`: viewer WebSocket upgrade, see [`subscribe`]
//!
//! plus `GET /stats` for the relay counters.

pub mod config;
pub mod ingest;
pub mod listener;
pub mod state;
pub mod subscribe;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use state::RelayState;
