//! HTTP surface for the reconciliation adapter.
//!
//! Exposes the engine's two entry points — recompute triggering (webhook
//! and administrative) and the inventory sync tick — plus health and
//! Prometheus metrics, with structured logging on every request.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use client::{ContextStore, ErpClient, Resilience};
use engine::{InventorySync, InventorySyncConfig, Orchestrator, Resolver, ResolverConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
use routes::projects::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<E, C>(state: Arc<AppState<E, C>>, metrics_handle: PrometheusHandle) -> Router
where
    E: ErpClient + Send + Sync + 'static,
    C: ContextStore + Send + Sync + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<E, C>))
        .route("/notifications", post(routes::notifications::receive::<E, C>))
        .route(
            "/projects/{id}/recompute",
            post(routes::projects::recompute::<E, C>),
        )
        .route("/inventory/sync", post(routes::inventory::sync::<E, C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the engine components around a pair of clients and returns the
/// shared application state.
pub fn build_state<E, C>(
    erp: Arc<E>,
    store: Arc<C>,
    resilience: Arc<Resilience>,
    resolver_config: ResolverConfig,
    sync_config: InventorySyncConfig,
) -> Arc<AppState<E, C>>
where
    E: ErpClient + Send + Sync + 'static,
    C: ContextStore + Send + Sync + 'static,
{
    let resolver = Resolver::new(erp.clone(), resilience.clone(), resolver_config);
    let orchestrator = Arc::new(Orchestrator::new(resolver, store.clone(), resilience.clone()));
    let inventory = Arc::new(InventorySync::new(
        erp,
        store,
        resilience.clone(),
        sync_config,
    ));

    Arc::new(AppState {
        orchestrator,
        inventory,
        resilience,
    })
}
