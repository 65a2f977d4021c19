//! Producer session tracking
//!
//! One `ProducerSession` per ingest connection: phase, byte and chunk
//! accounting, and how the session ended.

pub mod state;

pub use state::{EndReason, ProducerSession, SessionPhase};
