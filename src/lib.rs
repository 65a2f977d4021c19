//! # remoter
//!
//! Single-producer, multi-consumer byte-stream relay for live screen sharing.
//!
//! One encoder pushes a continuous MPEG transport stream over HTTP
//! (`POST /stream` or `PUT /stream`). Every chunk is fanned out, in arrival
//! order, to all viewers currently connected over WebSocket (`GET /ws`).
//! Nothing is buffered for replay: a viewer sees only chunks published after
//! it joined.
//!
//! ```text
//!   encoder ──HTTP push──► ingest ──► Distributor::publish(chunk)
//!                                          │
//!                                  registry.snapshot()
//!                                          │
//!                      ┌───────────────────┼───────────────────┐
//!                      ▼                   ▼                   ▼
//!                 [Subscriber]        [Subscriber]        [Subscriber]
//!                  ws binary           ws binary           ws binary
//! ```
//!
//! The external capture pipeline (virtual display, desktop, ffmpeg) is
//! managed by [`supervisor`]; the relay core only consumes its byte stream.
//!
//! ## Example
//!
//! ```no_run
//! use remoter::{RelayServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> remoter::Result<()> {
//!     let server = RelayServer::new(ServerConfig::default());
//!     server.run().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;
pub mod supervisor;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use registry::{Chunk, SubscriberRegistry};
pub use relay::Distributor;
pub use server::{RelayServer, ServerConfig};
