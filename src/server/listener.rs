//! Relay server listener
//!
//! Builds the axum router and runs the accept loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{any, get};
use axum::{Json, Router};
use tokio::net::TcpListener;

use crate::error::Result;
use crate::registry::{RegistryConfig, SubscriberRegistry};
use crate::relay::{Distributor, ProducerSlot};
use crate::server::config::ServerConfig;
use crate::server::ingest::handle_ingest;
use crate::server::state::RelayState;
use crate::server::subscribe::handle_subscribe;
use crate::stats::{RelayStats, RelayStatsSnapshot};

/// Relay server
pub struct RelayServer {
    state: RelayState,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::with_config(registry_config));
        let stats = Arc::new(RelayStats::new());
        let producers = Arc::new(ProducerSlot::new(config.producer_policy));

        Self {
            state: RelayState {
                distributor: Distributor::new(registry, stats),
                producers,
                config: Arc::new(config),
            },
        }
    }

    /// Get a reference to the subscriber registry
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        self.state.registry()
    }

    /// Get the distributor that fans chunks out
    pub fn distributor(&self) -> &Distributor {
        &self.state.distributor
    }

    /// Get the producer slot
    pub fn producers(&self) -> &Arc<ProducerSlot> {
        &self.state.producers
    }

    /// Current counters
    pub async fn stats(&self) -> RelayStatsSnapshot {
        self.state.stats_snapshot().await
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let config = &self.state.config;

        Router::new()
            .route(
                &config.ingest_path,
                any(handle_ingest).layer(DefaultBodyLimit::disable()),
            )
            .route(&config.subscribe_path, get(handle_subscribe))
            .route(&config.stats_path, get(handle_stats))
            .with_state(self.state.clone())
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.state.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            ingest = %self.state.config.ingest_path,
            subscribe = %self.state.config.subscribe_path,
            "Relay server listening"
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.state.config.bind_addr
    }
}

async fn handle_stats(State(state): State<RelayState>) -> Json<RelayStatsSnapshot> {
    Json(state.stats_snapshot().await)
}
