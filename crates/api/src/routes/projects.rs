//! Administrative recompute trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use client::{ContextStore, ErpClient, Resilience};
use common::{ProductCode, ProjectId};
use engine::{InventorySync, Orchestrator, RecomputeRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<E: ErpClient, C: ContextStore> {
    pub orchestrator: Arc<Orchestrator<E, C>>,
    pub inventory: Arc<InventorySync<E, C>>,
    pub resilience: Arc<Resilience>,
}

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeBody {
    pub product_code: ProductCode,
    pub station: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

fn default_quantity() -> f64 {
    1.0
}

// -- Response types --

#[derive(Serialize)]
pub struct AcceptedResponse {
    pub project_id: String,
    pub accepted: bool,
}

// -- Handlers --

/// POST /projects/{id}/recompute — force a recomputation for one project.
///
/// Returns 202 immediately; the pipeline completes asynchronously and its
/// result lands in the project status. Clears the settled-revision marker
/// first so an operator can rerun a project the trigger source has not
/// revised.
#[tracing::instrument(skip(state, body), fields(project = %id))]
pub async fn recompute<E, C>(
    State(state): State<Arc<AppState<E, C>>>,
    Path(id): Path<String>,
    Json(body): Json<RecomputeBody>,
) -> Result<(StatusCode, Json<AcceptedResponse>), ApiError>
where
    E: ErpClient + Send + Sync + 'static,
    C: ContextStore + Send + Sync + 'static,
{
    if !body.quantity.is_finite() || body.quantity <= 0.0 {
        return Err(ApiError::BadRequest(format!(
            "invalid quantity: {}",
            body.quantity
        )));
    }

    let project_id = ProjectId::from_uri(&id);
    state.orchestrator.clear_settled(&project_id);

    let mut request = RecomputeRequest::new(project_id.clone(), body.product_code)
        .with_quantity(body.quantity);
    if let Some(station) = body.station {
        request = request.with_station(station);
    }
    state.orchestrator.trigger_recompute(request);

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            project_id: project_id.to_string(),
            accepted: true,
        }),
    ))
}
