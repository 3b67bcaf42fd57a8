//! Walkup queue server.
//!
//! Serves the kiosk, desk, display and report API plus the event WebSocket.
//!
//! # Configuration
//!
//! Read from the environment (a `.env` file is honoured). See
//! [`walkup_web::Config`] for the variables and their defaults.
//!
//! # Endpoints
//!
//! - API: `http://localhost:8080/api/...`
//! - Health: `http://localhost:8080/health`, `http://localhost:8080/ready`
//! - Metrics: `http://localhost:9090/metrics`

use anyhow::Context;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkup_core::environment::SystemClock;
use walkup_core::persistence::PersistenceGateway;
use walkup_core::queue::QueueEnvironment;
use walkup_postgres::PostgresGateway;
use walkup_runtime::QueueStore;
use walkup_runtime::file_gateway::JsonFileGateway;
use walkup_runtime::metrics::MetricsServer;
use walkup_web::config::StorageConfig;
use walkup_web::{AppState, Config, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env().context("Invalid configuration")?;
    info!(
        port = config.server.port,
        display_history = config.queue.display_history,
        "Configuration loaded"
    );

    let catalog = config.queue.load_catalog()?;
    info!(services = catalog.services().len(), "Catalog loaded");

    let gateway = open_gateway(&config.storage).await?;
    let environment = QueueEnvironment::new(Arc::new(SystemClock), Arc::new(catalog));
    let store = QueueStore::open(environment, gateway, config.queue.store_config())
        .await
        .context("Failed to load queue state")?;
    let store = Arc::new(store);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics_handle = match config.server.metrics_addr {
        Some(addr) => Some(spawn_metrics(addr, shutdown_rx.clone()).await?),
        None => {
            info!("Metrics endpoint disabled");
            None
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "HTTP server listening");

    let app = build_router(AppState::new(store));
    let mut server_shutdown = shutdown_rx.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown");
    let _ = shutdown_tx.send(true);

    let timeout = config.server.shutdown_timeout;
    match tokio::time::timeout(timeout, server_handle).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped"),
        Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server error during shutdown"),
        Ok(Err(e)) => warn!(error = %e, "HTTP server task failed"),
        Err(_) => warn!(?timeout, "HTTP server shutdown timed out"),
    }

    if let Some(handle) = metrics_handle {
        if tokio::time::timeout(timeout, handle).await.is_err() {
            warn!("Metrics server shutdown timed out");
        }
    }

    info!("Graceful shutdown complete");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,walkup=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn open_gateway(storage: &StorageConfig) -> anyhow::Result<Arc<dyn PersistenceGateway>> {
    match storage {
        StorageConfig::File { path } => {
            info!(path = %path.display(), "Using JSON file storage");
            Ok(Arc::new(JsonFileGateway::new(path.clone())))
        }
        StorageConfig::Postgres {
            url,
            max_connections,
        } => {
            info!(max_connections, "Using PostgreSQL storage");
            let gateway = PostgresGateway::new(url, *max_connections).await?;
            gateway.migrate().await?;
            Ok(Arc::new(gateway))
        }
    }
}

/// Install the Prometheus recorder and serve it on its own port.
async fn spawn_metrics(
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let mut metrics = MetricsServer::new(addr);
    metrics.start()?;
    let metrics = Arc::new(metrics);

    let metrics_app = Router::new().route(
        "/metrics",
        get(move || {
            let metrics = Arc::clone(&metrics);
            async move { metrics.render().unwrap_or_default() }
        }),
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics address {addr}"))?;
    info!(%addr, "Prometheus metrics available at /metrics");

    Ok(tokio::spawn(async move {
        let served = axum::serve(listener, metrics_app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await;
        if let Err(e) = served {
            warn!(error = %e, "Metrics server error");
        }
    }))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed, that signal source is ignored and the
/// other one still works.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        () = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
