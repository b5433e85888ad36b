//! Manual inventory sync trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use client::{ContextStore, ErpClient};
use engine::SyncReport;

use crate::routes::projects::AppState;

/// POST /inventory/sync — run one sync tick now and report the counts.
#[tracing::instrument(skip(state))]
pub async fn sync<E, C>(State(state): State<Arc<AppState<E, C>>>) -> Json<SyncReport>
where
    E: ErpClient + Send + Sync + 'static,
    C: ContextStore + Send + Sync + 'static,
{
    Json(state.inventory.sync_tick().await)
}
