//! Adapter entry point.

use std::sync::Arc;

use client::{HttpContextStore, HttpErpClient, Resilience};
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Build clients, facade, and engine state
    let config = api::Config::from_env();
    let erp = Arc::new(HttpErpClient::new(config.erp_config()));
    let store = Arc::new(HttpContextStore::new(
        config.context_store_url.clone(),
        std::time::Duration::from_secs(30),
    ));
    let resilience = Arc::new(Resilience::new(
        config.retry_policy(),
        config.breaker_config(),
    ));
    let state = api::build_state(
        erp,
        store,
        resilience,
        config.resolver_config(),
        config.sync_config(),
    );

    // 4. Start the inventory sync loop
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sync_handle = tokio::spawn(state.inventory.clone().run(shutdown_rx));

    // 5. Build and serve the application
    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting adapter");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 6. Stop the sync loop and drain
    let _ = shutdown_tx.send(true);
    let _ = sync_handle.await;

    tracing::info!("adapter shut down gracefully");
}
