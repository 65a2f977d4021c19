//! remoter: share this machine's screen with browsers on the local network
//!
//! Run with: remoter [--port 8642] [--no-supervise]
//!
//! Starts the relay, then (unless `--no-supervise`) the capture stack from
//! the settings file. The relay shuts down if a required process exits. Viewers connect to `ws://HOST:PORT/ws`; the encoder
//! pushes to `http://localhost:PORT/stream`.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use remoter::config::AppConfig;
use remoter::registry::RegistryConfig;
use remoter::relay::ProducerPolicy;
use remoter::supervisor::Supervisor;
use remoter::{RelayServer, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "remoter", version, about = "Live screen relay")]
struct Cli {
    /// Settings file (defaults to ~/.remoter.json)
    #[arg(long, env = "REMOTER_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port (overrides the settings file)
    #[arg(long, env = "REMOTER_PORT")]
    port: Option<u16>,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0", env = "REMOTER_BIND")]
    bind: IpAddr,

    /// Bytes read from the producer per chunk
    #[arg(long, default_value_t = remoter::server::config::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Per-viewer write deadline in milliseconds
    #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
    write_timeout_ms: u64,

    /// Maximum concurrent viewers (0 = unlimited)
    #[arg(long, default_value_t = 0)]
    max_subscribers: usize,

    /// Accept a second producer while one is pushing
    #[arg(long)]
    allow_concurrent_producers: bool,

    /// Only run the relay; do not launch display or capture processes
    #[arg(long)]
    no_supervise: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config_path = match cli.config.clone() {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let mut settings = AppConfig::load_or_init(&config_path)
        .with_context(|| format!("loading settings from {}", config_path.display()))?;
    if let Some(port) = cli.port {
        settings.port = port;
    }

    let server_config = ServerConfig::with_addr(SocketAddr::new(cli.bind, settings.port))
        .chunk_size(cli.chunk_size)
        .producer_policy(if cli.allow_concurrent_producers {
            ProducerPolicy::Allow
        } else {
            ProducerPolicy::Reject
        });
    let registry_config = RegistryConfig::default()
        .write_timeout(Duration::from_millis(cli.write_timeout_ms))
        .max_subscribers(cli.max_subscribers);
    let server = RelayServer::with_registry_config(server_config, registry_config);

    // Bind before launching the encoder so its first push finds the relay.
    let listener = TcpListener::bind(server.bind_addr())
        .await
        .with_context(|| format!("binding {}", server.bind_addr()))?;

    let mut supervisor = Supervisor::new();
    if cli.no_supervise {
        tracing::info!("Process supervision disabled");
    } else {
        let changed = supervisor
            .start(&mut settings)
            .await
            .context("starting capture stack")?;
        if changed {
            if let Err(e) = settings.save(&config_path) {
                tracing::warn!(error = %e, "Could not persist detected screen settings");
            }
        }
    }

    let stop = CancellationToken::new();
    let serve = server.serve(listener, {
        let stop = stop.clone();
        async move {
            tokio::select! {
                _ = shutdown_signal() => {}
                _ = stop.cancelled() => {}
            }
        }
    });
    tokio::pin!(serve);

    let mut exited = None;
    let result = loop {
        tokio::select! {
            result = &mut serve => break result,
            exit = supervisor.watch(), if exited.is_none() => {
                tracing::error!(program = %exit.program, state = ?exit.state, "Required process exited, shutting down");
                exited = Some(exit);
                stop.cancel();
            }
        }
    };

    supervisor.poll();
    supervisor.stop_all().await;
    result.context("relay server failed")?;
    if let Some(exit) = exited {
        anyhow::bail!("{} exited ({:?})", exit.program, exit.state);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
