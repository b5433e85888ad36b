//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use client::{ContextStore, ErpClient, Target};
use serde::Serialize;

use crate::routes::projects::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub erp_breaker: &'static str,
    pub context_store_breaker: &'static str,
}

/// GET /health — liveness plus the current breaker state per dependency.
///
/// The process is healthy even while a breaker is open; the breaker fields
/// tell an operator which dependency is degraded.
pub async fn check<E, C>(State(state): State<Arc<AppState<E, C>>>) -> Json<HealthResponse>
where
    E: ErpClient + Send + Sync + 'static,
    C: ContextStore + Send + Sync + 'static,
{
    Json(HealthResponse {
        status: "ok",
        erp_breaker: state.resilience.breaker_state(Target::Erp).as_str(),
        context_store_breaker: state
            .resilience
            .breaker_state(Target::ContextStore)
            .as_str(),
    })
}
