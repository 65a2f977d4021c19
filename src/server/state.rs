//! Shared handler state and extractors

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::registry::SubscriberRegistry;
use crate::relay::{Distributor, ProducerSlot};
use crate::server::config::ServerConfig;
use crate::stats::{RelayStats, RelayStatsSnapshot};

/// State shared by all request handlers
#[derive(Clone)]
pub struct RelayState {
    pub distributor: Distributor,
    pub producers: Arc<ProducerSlot>,
    pub config: Arc<ServerConfig>,
}

impl RelayState {
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        self.distributor.registry()
    }

    pub fn stats(&self) -> &Arc<RelayStats> {
        self.distributor.stats()
    }

    /// Counters plus live membership and producer status
    pub async fn stats_snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            subscribers: self.registry().len().await,
            producer_active: self.producers.is_active(),
            ..self.stats().snapshot()
        }
    }
}

/// Remote address of the connection, when the server recorded it
#[derive(Debug, Clone, Copy)]
pub struct PeerAddr(pub Option<SocketAddr>);

impl<S: Send + Sync> FromRequestParts<S> for PeerAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(PeerAddr(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        ))
    }
}
