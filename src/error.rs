//! Error types
//!
//! `Error` is the crate-wide error. Component errors (`RegistryError`,
//! `SinkError`, `SupervisorError`) convert into it with `?`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::registry::{RegistryError, SinkError};
use crate::supervisor::SupervisorError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O failure (bind, accept, file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be read, parsed or written
    #[error("configuration error: {0}")]
    Config(String),

    /// Subscriber registry rejected an operation
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Write to a single subscriber failed
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The producer connection broke while reading the push body
    #[error("ingest read failed: {0}")]
    IngestRead(#[source] std::io::Error),

    /// WebSocket upgrade handshake was refused
    #[error("socket upgrade failed: {0}")]
    UpgradeFailed(String),

    /// Ingest request used a method other than POST or PUT
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Another producer session is already pushing
    #[error("a producer session is already active (session {0})")]
    ProducerBusy(u64),

    /// External process management failed
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl Error {
    /// HTTP status code reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::ProducerBusy(_) => StatusCode::CONFLICT,
            Error::IngestRead(_) | Error::UpgradeFailed(_) => StatusCode::BAD_REQUEST,
            Error::Registry(RegistryError::CapacityReached(_)) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::MethodNotAllowed("GET".into()).status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(Error::ProducerBusy(1).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            Error::Registry(RegistryError::CapacityReached(4)).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            Error::Config("bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display() {
        let err = Error::ProducerBusy(7);
        assert_eq!(
            err.to_string(),
            "a producer session is already active (session 7)"
        );
    }
}
